//! Closed enumerations describing on-disk objects

use crate::disk::size::DiskSize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Partition ids, using the numeric codes installation profiles refer to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionId {
    #[default]
    Linux,
    Swap,
    Lvm,
    Raid,
    Esp,
    BiosBoot,
    Prep,
    Extended,
    Dos32,
    Ntfs,
}

impl PartitionId {
    pub fn code(&self) -> u32 {
        match self {
            Self::Linux => 131,
            Self::Swap => 130,
            Self::Lvm => 142,
            Self::Raid => 253,
            Self::Esp => 239,
            Self::BiosBoot => 257,
            Self::Prep => 65,
            Self::Extended => 5,
            Self::Dos32 => 12,
            Self::Ntfs => 7,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        let id = match code {
            131 => Self::Linux,
            130 => Self::Swap,
            142 => Self::Lvm,
            253 => Self::Raid,
            239 | 259 => Self::Esp,
            257 | 263 => Self::BiosBoot,
            65 => Self::Prep,
            5 | 15 => Self::Extended,
            12 => Self::Dos32,
            7 => Self::Ntfs,
            _ => return None,
        };
        Some(id)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "Linux"),
            Self::Swap => write!(f, "Linux swap"),
            Self::Lvm => write!(f, "Linux LVM"),
            Self::Raid => write!(f, "Linux RAID"),
            Self::Esp => write!(f, "EFI System"),
            Self::BiosBoot => write!(f, "BIOS boot"),
            Self::Prep => write!(f, "PReP boot"),
            Self::Extended => write!(f, "Extended"),
            Self::Dos32 => write!(f, "FAT32"),
            Self::Ntfs => write!(f, "NTFS"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionType {
    #[default]
    Primary,
    Extended,
    Logical,
}

impl fmt::Display for PartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Extended => write!(f, "extended"),
            Self::Logical => write!(f, "logical"),
        }
    }
}

/// Maximum number of logical partitions inside an MS-DOS extended partition
pub const MSDOS_MAX_LOGICAL: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PtableType {
    Gpt,
    Msdos,
    Dasd,
}

impl PtableType {
    /// Number of primary slots (the extended partition takes one of them)
    pub fn max_primary(&self) -> u32 {
        match self {
            Self::Gpt => 128,
            Self::Msdos => 4,
            Self::Dasd => 3,
        }
    }

    pub fn extended_possible(&self) -> bool {
        matches!(self, Self::Msdos)
    }

    /// Space kept free at the end of the disk (backup GPT header)
    pub fn end_reserve(&self, grain: DiskSize) -> DiskSize {
        match self {
            Self::Gpt => grain,
            Self::Msdos | Self::Dasd => DiskSize::zero(),
        }
    }
}

impl fmt::Display for PtableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpt => write!(f, "gpt"),
            Self::Msdos => write!(f, "msdos"),
            Self::Dasd => write!(f, "dasd"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemType {
    Btrfs,
    Ext2,
    Ext3,
    Ext4,
    Xfs,
    F2fs,
    Vfat,
    Swap,
}

impl FilesystemType {
    /// Whether GRUB can keep its core image inside the filesystem itself
    pub fn embeds_bootloader(&self) -> bool {
        matches!(self, Self::Btrfs)
    }
}

impl fmt::Display for FilesystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Btrfs => write!(f, "btrfs"),
            Self::Ext2 => write!(f, "ext2"),
            Self::Ext3 => write!(f, "ext3"),
            Self::Ext4 => write!(f, "ext4"),
            Self::Xfs => write!(f, "xfs"),
            Self::F2fs => write!(f, "f2fs"),
            Self::Vfat => write!(f, "vfat"),
            Self::Swap => write!(f, "swap"),
        }
    }
}

impl FromStr for FilesystemType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btrfs" => Ok(Self::Btrfs),
            "ext2" => Ok(Self::Ext2),
            "ext3" => Ok(Self::Ext3),
            "ext4" => Ok(Self::Ext4),
            "xfs" => Ok(Self::Xfs),
            "f2fs" => Ok(Self::F2fs),
            "vfat" | "fat" => Ok(Self::Vfat),
            "swap" => Ok(Self::Swap),
            other => Err(format!("unknown filesystem type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DasdType {
    Eckd,
    Fba,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DasdFormat {
    Cdl,
    Ldl,
    None,
}

/// What kind of disk device a disk is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiskKind {
    #[default]
    Disk,
    Dasd {
        dasd_type: DasdType,
        format: DasdFormat,
    },
}

impl DiskKind {
    /// Partition table type used when a disk has none yet
    pub fn default_ptable_type(&self) -> PtableType {
        match self {
            Self::Disk => PtableType::Gpt,
            Self::Dasd { .. } => PtableType::Dasd,
        }
    }
}
