//! Planned volume groups and logical volumes

use crate::disk::size::DiskSize;
use crate::disk::types::FilesystemType;
use crate::planned::{FormatIntent, Sizing};
use serde::Serialize;

/// Default name for logical volumes without mount point or explicit name
pub const DEFAULT_LV_NAME: &str = "lv";

/// Default name of new volume groups
pub const DEFAULT_VG_NAME: &str = "system";

/// Logical volume name derived from a mount point (`/` -> `root`,
/// `/var/lib` -> `var_lib`)
pub fn lv_name_for_mount(mount_point: &str) -> String {
    let trimmed = mount_point.trim_matches('/');
    if trimmed.is_empty() {
        return if mount_point == "/" {
            "root".to_string()
        } else {
            DEFAULT_LV_NAME.to_string()
        };
    }
    trimmed.replace('/', "_")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedLogicalVolume {
    pub logical_volume_name: String,
    pub sizing: Sizing,
    pub format: FormatIntent,
    pub encryption_password: Option<String>,
    /// Name of the existing logical volume to reuse
    pub reuse: Option<String>,
    pub reformat: bool,
}

impl PlannedLogicalVolume {
    /// New volume named after its mount point
    pub fn new(mount_point: Option<&str>, sizing: Sizing) -> Self {
        let name = mount_point
            .map(lv_name_for_mount)
            .unwrap_or_else(|| DEFAULT_LV_NAME.to_string());
        Self {
            logical_volume_name: name,
            sizing,
            format: FormatIntent {
                mount_point: mount_point.map(str::to_string),
                ..FormatIntent::default()
            },
            encryption_password: None,
            reuse: None,
            reformat: false,
        }
    }

    pub fn with_filesystem(mut self, filesystem: FilesystemType) -> Self {
        self.format.filesystem = Some(filesystem);
        self
    }

    pub fn min_size(&self) -> DiskSize {
        self.sizing.min_size
    }

    pub fn is_reused(&self) -> bool {
        self.reuse.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedVolumeGroup {
    /// Requested name; disambiguated when the group is created
    pub volume_group_name: Option<String>,
    pub lvs: Vec<PlannedLogicalVolume>,
    /// Name of the existing volume group to reuse
    pub reuse: Option<String>,
}

impl PlannedVolumeGroup {
    pub fn new(name: &str) -> Self {
        Self {
            volume_group_name: Some(name.to_string()),
            lvs: Vec::new(),
            reuse: None,
        }
    }

    pub fn base_name(&self) -> &str {
        self.volume_group_name.as_deref().unwrap_or(DEFAULT_VG_NAME)
    }

    pub fn root_lv(&self) -> Option<&PlannedLogicalVolume> {
        self.lvs.iter().find(|lv| lv.format.mounts("/"))
    }
}
