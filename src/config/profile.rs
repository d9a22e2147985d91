//! Installation profile structure
//!
//! Only the partitioning part of a profile is modelled: a map from drive
//! name (`/dev/sda`, `/dev/system` for volume groups, or `auto`) to the
//! partitions or logical volumes it should hold.

use crate::skip_list::SkipRule;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Drive name that picks the first free disk not in the skip list
pub const AUTO_DRIVE: &str = "auto";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub drives: BTreeMap<String, DriveSection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveType {
    #[default]
    #[serde(rename = "CT_DISK")]
    Disk,
    #[serde(rename = "CT_LVM")]
    Lvm,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveSection {
    #[serde(rename = "type", default)]
    pub drive_type: DriveType,
    /// Partitions, or logical volumes for an LVM drive
    #[serde(default)]
    pub partitions: Vec<PartitionSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_list: Vec<SkipRule>,
}

/// One partition or logical volume entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSection {
    /// Mount point (e.g., "/", "/home", "swap")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount: Option<String>,
    /// Size expression: "max", "30%", "10GB", "512M"...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<String>,
    /// false to reuse an existing device
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub create: bool,
    /// Format the device (only meaningful when reusing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Number of the partition to reuse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_nr: Option<u32>,
    /// Volume group this partition becomes a physical volume of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lvm_group: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub crypt_fs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypt_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lv_name: Option<String>,
    /// Numeric partition id (131 Linux, 130 swap, 142 LVM...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<u32>,
}

impl Default for PartitionSection {
    fn default() -> Self {
        Self {
            mount: None,
            size: None,
            filesystem: None,
            create: true,
            format: None,
            label: None,
            partition_nr: None,
            lvm_group: None,
            crypt_fs: false,
            crypt_key: None,
            lv_name: None,
            partition_id: None,
        }
    }
}

impl PartitionSection {
    pub fn mounted(mount: &str, filesystem: &str, size: &str) -> Self {
        Self {
            mount: Some(mount.to_string()),
            filesystem: Some(filesystem.to_string()),
            size: Some(size.to_string()),
            ..Self::default()
        }
    }
}

impl Profile {
    /// Load a profile from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let profile: Profile = toml::from_str(&content)?;
        Ok(profile)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Disk names the profile refers to directly
    pub fn named_drives(&self) -> impl Iterator<Item = &str> {
        self.drives
            .iter()
            .filter(|(name, drive)| drive.drive_type == DriveType::Disk && name.as_str() != AUTO_DRIVE)
            .map(|(name, _)| name.as_str())
    }

    /// Generate a sample profile: LVM on /dev/sda with a separate home
    pub fn sample() -> Self {
        let mut drives = BTreeMap::new();
        drives.insert(
            "/dev/sda".to_string(),
            DriveSection {
                drive_type: DriveType::Disk,
                partitions: vec![
                    PartitionSection::mounted("swap", "swap", "2GiB"),
                    PartitionSection {
                        size: Some("max".to_string()),
                        lvm_group: Some("system".to_string()),
                        ..PartitionSection::default()
                    },
                ],
                skip_list: Vec::new(),
            },
        );
        drives.insert(
            "/dev/system".to_string(),
            DriveSection {
                drive_type: DriveType::Lvm,
                partitions: vec![
                    PartitionSection::mounted("/", "btrfs", "20GiB"),
                    PartitionSection::mounted("/home", "xfs", "max"),
                ],
                skip_list: Vec::new(),
            },
        );
        Profile { drives }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_drive_sections() {
        let profile: Profile = toml::from_str(
            r#"
            [drives."/dev/sda"]
            type = "CT_DISK"

            [[drives."/dev/sda".partitions]]
            mount = "/"
            filesystem = "btrfs"
            size = "20GB"

            [[drives."/dev/sda".partitions]]
            create = false
            partition_nr = 3
            format = true

            [drives."/dev/vg0"]
            type = "CT_LVM"

            [[drives."/dev/vg0".partitions]]
            mount = "/home"
            lv_name = "home"
            "#,
        )
        .unwrap();

        let sda = &profile.drives["/dev/sda"];
        assert_eq!(sda.drive_type, DriveType::Disk);
        assert_eq!(sda.partitions.len(), 2);
        assert!(sda.partitions[0].create);
        assert!(!sda.partitions[1].create);
        assert_eq!(sda.partitions[1].partition_nr, Some(3));
        assert_eq!(profile.drives["/dev/vg0"].drive_type, DriveType::Lvm);
        assert_eq!(profile.named_drives().collect::<Vec<_>>(), vec!["/dev/sda"]);
    }

    #[test]
    fn sample_round_trips() {
        let sample = Profile::sample();
        let text = sample.to_toml_string().unwrap();
        let back: Profile = toml::from_str(&text).unwrap();
        assert_eq!(back, sample);
    }
}
