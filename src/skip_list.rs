//! Disk skip lists
//!
//! A drive section keyed `auto` takes the first disk that no other section
//! names and that none of its skip rules matches.

use crate::disk::graph::{basename, Disk};
use crate::disk::types::{DasdFormat, DasdType, DiskKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SkipValue {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Predicate {
    LessThan,
    MoreThan,
    EqualTo,
}

/// One rule: `skip_key` names a disk attribute, compared with `skip_value`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRule {
    pub skip_key: String,
    pub skip_value: String,
    #[serde(default)]
    pub skip_if_less_than: bool,
    #[serde(default)]
    pub skip_if_more_than: bool,
}

impl SkipRule {
    pub fn equal(key: &str, value: &str) -> Self {
        Self {
            skip_key: key.to_string(),
            skip_value: value.to_string(),
            ..Self::default()
        }
    }

    fn predicate(&self) -> Predicate {
        if self.skip_if_less_than {
            Predicate::LessThan
        } else if self.skip_if_more_than {
            Predicate::MoreThan
        } else {
            Predicate::EqualTo
        }
    }

    fn disk_value(&self, disk: &Disk) -> Option<SkipValue> {
        let value = match self.skip_key.as_str() {
            "name" => SkipValue::Text(basename(&disk.name).to_string()),
            "device" => SkipValue::Text(disk.name.clone()),
            "size_k" => SkipValue::Number(disk.size.to_bytes()? / 1024),
            "block_size" => SkipValue::Number(disk.block_size.to_bytes()?),
            "dasd_type" => match disk.kind {
                DiskKind::Dasd { dasd_type, .. } => SkipValue::Text(
                    match dasd_type {
                        DasdType::Eckd => "eckd",
                        DasdType::Fba => "fba",
                        DasdType::Unknown => "unknown",
                    }
                    .to_string(),
                ),
                DiskKind::Disk => return None,
            },
            "dasd_format" => match disk.kind {
                DiskKind::Dasd { format, .. } => SkipValue::Text(
                    match format {
                        DasdFormat::Cdl => "cdl",
                        DasdFormat::Ldl => "ldl",
                        DasdFormat::None => "none",
                    }
                    .to_string(),
                ),
                DiskKind::Disk => return None,
            },
            _ => return None,
        };
        Some(value)
    }

    pub fn matches(&self, disk: &Disk) -> bool {
        let Some(value) = self.disk_value(disk) else {
            return false;
        };
        let reference = self.skip_value.trim();
        match (self.predicate(), value) {
            (Predicate::EqualTo, SkipValue::Text(text)) => text == reference,
            (predicate, SkipValue::Number(n)) => {
                let Ok(reference) = reference.parse::<u64>() else {
                    return false;
                };
                match predicate {
                    Predicate::LessThan => n < reference,
                    Predicate::MoreThan => n > reference,
                    Predicate::EqualTo => n == reference,
                }
            }
            _ => false,
        }
    }
}

impl fmt::Display for SkipRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.predicate() {
            Predicate::LessThan => "<",
            Predicate::MoreThan => ">",
            Predicate::EqualTo => "==",
        };
        write!(f, "{} {} {}", self.skip_key, op, self.skip_value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipList {
    rules: Vec<SkipRule>,
}

impl SkipList {
    pub fn new(rules: Vec<SkipRule>) -> Self {
        Self { rules }
    }

    /// True when any rule matches the disk
    pub fn matches(&self, disk: &Disk) -> bool {
        self.rules.iter().any(|r| r.matches(disk))
    }
}

impl From<&[SkipRule]> for SkipList {
    fn from(rules: &[SkipRule]) -> Self {
        Self::new(rules.to_vec())
    }
}
