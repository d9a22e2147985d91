//! Planned partitions

use crate::disk::size::DiskSize;
use crate::disk::types::{FilesystemType, PartitionId};
use crate::planned::{FormatIntent, Sizing};
use serde::Serialize;

/// A partition to create, or an existing one to reuse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPartition {
    /// Target disk; `None` lets the distribution pick any candidate disk
    pub disk: Option<String>,
    pub sizing: Sizing,
    pub partition_id: PartitionId,
    pub bootable: bool,
    pub format: FormatIntent,
    /// Encrypt the partition with this password
    pub encryption_password: Option<String>,
    /// Name of the existing partition to reuse
    pub reuse: Option<String>,
    /// Only meaningful with `reuse`: recreate the content
    pub reformat: bool,
    /// Volume group this partition becomes a physical volume of
    pub lvm_volume_group_name: Option<String>,
}

impl PlannedPartition {
    pub fn new(min_size: DiskSize, max_size: DiskSize) -> Self {
        Self {
            disk: None,
            sizing: Sizing::new(min_size, max_size),
            partition_id: PartitionId::Linux,
            bootable: false,
            format: FormatIntent::default(),
            encryption_password: None,
            reuse: None,
            reformat: false,
            lvm_volume_group_name: None,
        }
    }

    pub fn with_mount(mut self, filesystem: FilesystemType, mount_point: &str) -> Self {
        self.format = FormatIntent::new(filesystem, Some(mount_point));
        self
    }

    pub fn on_disk(mut self, disk: &str) -> Self {
        self.disk = Some(disk.to_string());
        self
    }

    pub fn with_id(mut self, id: PartitionId) -> Self {
        self.partition_id = id;
        self
    }

    pub fn min_size(&self) -> DiskSize {
        self.sizing.min_size
    }

    pub fn max_size(&self) -> DiskSize {
        self.sizing.max_size
    }

    pub fn is_reused(&self) -> bool {
        self.reuse.is_some()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption_password.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.format.mounts("/")
    }
}
