//! Byte quantities with an "unlimited" sentinel
//!
//! `DiskSize` is the unit every sizing decision is made in. Finite values are
//! plain byte counts; `Unlimited` compares greater than any finite value, so
//! the derived ordering is the total order the planner relies on.

use crate::utils::error::{LayoutixError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

/// Binary units, smallest first
const BINARY_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)(?:[.,](\d+))?\s*([a-zA-Z]*)\s*$").expect("size regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiskSize {
    Bytes(u64),
    Unlimited,
}

impl Default for DiskSize {
    fn default() -> Self {
        DiskSize::zero()
    }
}

impl DiskSize {
    pub const fn zero() -> Self {
        DiskSize::Bytes(0)
    }

    pub const fn unlimited() -> Self {
        DiskSize::Unlimited
    }

    pub const fn b(bytes: u64) -> Self {
        DiskSize::Bytes(bytes)
    }

    pub const fn kib(n: u64) -> Self {
        DiskSize::Bytes(n * KIB)
    }

    pub const fn mib(n: u64) -> Self {
        DiskSize::Bytes(n * MIB)
    }

    pub const fn gib(n: u64) -> Self {
        DiskSize::Bytes(n * GIB)
    }

    pub const fn tib(n: u64) -> Self {
        DiskSize::Bytes(n * TIB)
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, DiskSize::Unlimited)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, DiskSize::Bytes(0))
    }

    /// Byte count, `None` for unlimited
    pub fn to_bytes(&self) -> Option<u64> {
        match self {
            DiskSize::Bytes(b) => Some(*b),
            DiskSize::Unlimited => None,
        }
    }

    /// Byte count where unlimited saturates to `u64::MAX`
    pub fn saturating_bytes(&self) -> u64 {
        self.to_bytes().unwrap_or(u64::MAX)
    }

    /// Subtraction that reports underflow instead of saturating
    pub fn checked_sub(self, other: DiskSize) -> Option<DiskSize> {
        match (self, other) {
            (DiskSize::Unlimited, DiskSize::Bytes(_)) => Some(DiskSize::Unlimited),
            (DiskSize::Bytes(a), DiskSize::Bytes(b)) => a.checked_sub(b).map(DiskSize::Bytes),
            (_, DiskSize::Unlimited) => None,
        }
    }

    /// Percentage of this size, truncated to whole bytes
    pub fn percent(self, percent: f64) -> DiskSize {
        match self {
            DiskSize::Unlimited => DiskSize::Unlimited,
            DiskSize::Bytes(b) => DiskSize::Bytes((b as f64 * percent / 100.0) as u64),
        }
    }

    /// Round down to a multiple of `rounding`
    pub fn floor(self, rounding: DiskSize) -> DiskSize {
        match (self, rounding) {
            (DiskSize::Bytes(b), DiskSize::Bytes(r)) if r > 0 => DiskSize::Bytes((b / r) * r),
            _ => self,
        }
    }

    /// Round up to a multiple of `rounding`
    pub fn ceil(self, rounding: DiskSize) -> DiskSize {
        match (self, rounding) {
            (DiskSize::Bytes(b), DiskSize::Bytes(r)) if r > 0 => {
                DiskSize::Bytes(b.div_ceil(r).saturating_mul(r))
            }
            _ => self,
        }
    }

    pub fn is_aligned(&self, rounding: DiskSize) -> bool {
        self.floor(rounding) == *self
    }

    /// Parse a size expression.
    ///
    /// With `legacy_units` the decimal-looking units (KB, MB, GB...) are
    /// interpreted as powers of 1024, the way installation profiles
    /// historically used them. Single letters (K, M, G...) are always binary.
    pub fn parse(input: &str, legacy_units: bool) -> Result<DiskSize> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("unlimited") {
            return Ok(DiskSize::Unlimited);
        }

        let caps = SIZE_RE
            .captures(trimmed)
            .ok_or_else(|| LayoutixError::InvalidSize(input.to_string()))?;
        let unit = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let multiplier = unit_multiplier(unit, legacy_units)
            .ok_or_else(|| LayoutixError::InvalidSize(input.to_string()))?;

        let overflow = || LayoutixError::InvalidSize(format!("{} is too big", input));
        let integer: u128 = caps[1].parse().map_err(|_| overflow())?;
        let mut bytes = integer
            .checked_mul(u128::from(multiplier))
            .ok_or_else(overflow)?;

        if let Some(fraction) = caps.get(2) {
            let digits = fraction.as_str();
            // Nothing past 19 decimals can change a byte count
            let digits = &digits[..digits.len().min(19)];
            let numerator: u128 = digits.parse().map_err(|_| overflow())?;
            let denominator = 10u128.pow(digits.len() as u32);
            bytes += numerator * u128::from(multiplier) / denominator;
        }

        u64::try_from(bytes).map(DiskSize::Bytes).map_err(|_| overflow())
    }

    /// Lossless representation, used for serialization
    pub fn to_exact_string(&self) -> String {
        match self {
            DiskSize::Unlimited => "unlimited".to_string(),
            DiskSize::Bytes(0) => "0 B".to_string(),
            DiskSize::Bytes(b) => {
                let mut unit = 0;
                let mut value = *b;
                while unit + 1 < BINARY_UNITS.len() && value % KIB == 0 {
                    value /= KIB;
                    unit += 1;
                }
                format!("{} {}", value, BINARY_UNITS[unit])
            }
        }
    }
}

fn unit_multiplier(unit: &str, legacy_units: bool) -> Option<u64> {
    let decimal = |exp: u32| {
        if legacy_units {
            KIB.pow(exp)
        } else {
            1000u64.pow(exp)
        }
    };

    let multiplier = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kib" => KIB,
        "m" | "mib" => MIB,
        "g" | "gib" => GIB,
        "t" | "tib" => TIB,
        "p" | "pib" => TIB * KIB,
        "kb" => decimal(1),
        "mb" => decimal(2),
        "gb" => decimal(3),
        "tb" => decimal(4),
        "pb" => decimal(5),
        _ => return None,
    };
    Some(multiplier)
}

impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = match self {
            DiskSize::Unlimited => return write!(f, "unlimited"),
            DiskSize::Bytes(b) => *b,
        };

        let mut unit = 0;
        let mut scale = 1u64;
        while unit + 1 < BINARY_UNITS.len() && bytes >= scale * KIB {
            scale *= KIB;
            unit += 1;
        }

        if bytes % scale == 0 {
            write!(f, "{} {}", bytes / scale, BINARY_UNITS[unit])
        } else {
            write!(f, "{:.2} {}", bytes as f64 / scale as f64, BINARY_UNITS[unit])
        }
    }
}

impl FromStr for DiskSize {
    type Err = LayoutixError;

    fn from_str(s: &str) -> Result<Self> {
        DiskSize::parse(s, false)
    }
}

impl Add for DiskSize {
    type Output = DiskSize;

    fn add(self, other: DiskSize) -> DiskSize {
        match (self, other) {
            (DiskSize::Bytes(a), DiskSize::Bytes(b)) => DiskSize::Bytes(a.saturating_add(b)),
            _ => DiskSize::Unlimited,
        }
    }
}

impl AddAssign for DiskSize {
    fn add_assign(&mut self, other: DiskSize) {
        *self = *self + other;
    }
}

/// Saturating subtraction: never goes below zero
impl Sub for DiskSize {
    type Output = DiskSize;

    fn sub(self, other: DiskSize) -> DiskSize {
        self.checked_sub(other).unwrap_or(DiskSize::zero())
    }
}

impl SubAssign for DiskSize {
    fn sub_assign(&mut self, other: DiskSize) {
        *self = *self - other;
    }
}

impl Mul<u64> for DiskSize {
    type Output = DiskSize;

    fn mul(self, factor: u64) -> DiskSize {
        match self {
            DiskSize::Bytes(b) => DiskSize::Bytes(b.saturating_mul(factor)),
            DiskSize::Unlimited => DiskSize::Unlimited,
        }
    }
}

impl Sum for DiskSize {
    fn sum<I: Iterator<Item = DiskSize>>(iter: I) -> DiskSize {
        iter.fold(DiskSize::zero(), |acc, s| acc + s)
    }
}

impl<'a> Sum<&'a DiskSize> for DiskSize {
    fn sum<I: Iterator<Item = &'a DiskSize>>(iter: I) -> DiskSize {
        iter.copied().sum()
    }
}

impl Serialize for DiskSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_exact_string())
    }
}

struct DiskSizeVisitor;

impl Visitor<'_> for DiskSizeVisitor {
    type Value = DiskSize;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a byte count or a size string such as \"10 GiB\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<DiskSize, E> {
        Ok(DiskSize::Bytes(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<DiskSize, E> {
        u64::try_from(v)
            .map(DiskSize::Bytes)
            .map_err(|_| E::custom(format!("negative size: {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<DiskSize, E> {
        DiskSize::parse(v, false).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for DiskSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(DiskSizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_is_bigger_than_everything() {
        assert!(DiskSize::unlimited() > DiskSize::tib(1024 * 1024));
        assert!(DiskSize::mib(1) < DiskSize::gib(1));
        assert_eq!(
            [DiskSize::gib(2), DiskSize::unlimited(), DiskSize::mib(3)]
                .iter()
                .max(),
            Some(&DiskSize::unlimited())
        );
    }

    #[test]
    fn subtraction_saturates_at_zero() {
        assert_eq!(DiskSize::gib(1) - DiskSize::gib(3), DiskSize::zero());
        assert_eq!(DiskSize::gib(3) - DiskSize::gib(1), DiskSize::gib(2));
        assert_eq!(DiskSize::gib(1).checked_sub(DiskSize::gib(3)), None);
        assert_eq!(DiskSize::unlimited() - DiskSize::gib(3), DiskSize::unlimited());
    }

    #[test]
    fn addition_with_unlimited_is_unlimited() {
        assert_eq!(DiskSize::gib(1) + DiskSize::unlimited(), DiskSize::unlimited());
        let total: DiskSize = [DiskSize::mib(512), DiskSize::mib(512)].iter().sum();
        assert_eq!(total, DiskSize::gib(1));
    }

    #[test]
    fn rounding() {
        let grain = DiskSize::mib(1);
        assert_eq!(DiskSize::kib(1536).floor(grain), DiskSize::mib(1));
        assert_eq!(DiskSize::kib(1536).ceil(grain), DiskSize::mib(2));
        assert_eq!(DiskSize::mib(4).ceil(grain), DiskSize::mib(4));
        assert!(DiskSize::gib(1).is_aligned(grain));
        assert_eq!(DiskSize::unlimited().floor(grain), DiskSize::unlimited());
    }

    #[test]
    fn percent_of_size() {
        assert_eq!(DiskSize::gib(50).percent(10.0), DiskSize::gib(5));
        assert_eq!(DiskSize::gib(1).percent(50.0), DiskSize::mib(512));
    }

    #[test]
    fn parse_international_and_legacy_units() {
        assert_eq!(DiskSize::parse("10 GiB", false).unwrap(), DiskSize::gib(10));
        assert_eq!(DiskSize::parse("10G", false).unwrap(), DiskSize::gib(10));
        assert_eq!(DiskSize::parse("1GB", false).unwrap(), DiskSize::b(1_000_000_000));
        assert_eq!(DiskSize::parse("1GB", true).unwrap(), DiskSize::gib(1));
        assert_eq!(DiskSize::parse("1.5 GiB", false).unwrap(), DiskSize::mib(1536));
        assert_eq!(DiskSize::parse("1,5g", true).unwrap(), DiskSize::mib(1536));
        assert_eq!(DiskSize::parse("4096", false).unwrap(), DiskSize::kib(4));
        assert_eq!(DiskSize::parse("unlimited", false).unwrap(), DiskSize::unlimited());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(DiskSize::parse("auto", true).is_err());
        assert!(DiskSize::parse("10 parsecs", true).is_err());
        assert!(DiskSize::parse("", true).is_err());
        assert!(DiskSize::parse("99999999999 EiB", false).is_err());
    }

    #[test]
    fn human_readable_display() {
        assert_eq!(DiskSize::gib(10).to_string(), "10 GiB");
        assert_eq!(DiskSize::mib(1536).to_string(), "1.50 GiB");
        assert_eq!(DiskSize::b(512).to_string(), "512 B");
        assert_eq!(DiskSize::unlimited().to_string(), "unlimited");
    }

    #[test]
    fn exact_string_is_lossless() {
        for size in [
            DiskSize::mib(1536),
            DiskSize::b(1_000_000_001),
            DiskSize::gib(50),
            DiskSize::zero(),
            DiskSize::unlimited(),
        ] {
            assert_eq!(DiskSize::parse(&size.to_exact_string(), false).unwrap(), size);
        }
        assert_eq!(DiskSize::mib(1536).to_exact_string(), "1536 MiB");
    }

    #[test]
    fn deserializes_from_strings_and_integers() {
        #[derive(Deserialize)]
        struct Holder {
            a: DiskSize,
            b: DiskSize,
        }
        let h: Holder = toml::from_str("a = \"2 GiB\"\nb = 4096\n").unwrap();
        assert_eq!(h.a, DiskSize::gib(2));
        assert_eq!(h.b, DiskSize::kib(4));
    }
}
