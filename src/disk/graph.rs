//! In-memory devicegraph
//!
//! A `Devicegraph` is a snapshot of disks, partition tables, partitions and
//! LVM volume groups. The planner never mutates the snapshot it receives: it
//! works on a [`Devicegraph::duplicate`] and hands the copy back.
//!
//! Devices are addressed by their kernel names (`/dev/sda1`,
//! `/dev/system/root`), which also serve as the identifiers planned devices
//! store when they reuse something.

use crate::disk::lvm::{LvmLv, LvmVg};
use crate::disk::size::DiskSize;
use crate::disk::types::{DiskKind, FilesystemType, PartitionId, PartitionType, PtableType};
use crate::utils::error::{LayoutixError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

fn default_block_size() -> DiskSize {
    DiskSize::b(512)
}

fn default_min_grain() -> DiskSize {
    DiskSize::mib(1)
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Last path component of a device name (`/dev/sda1` -> `sda1`)
pub fn basename(device: &str) -> &str {
    device.rsplit('/').next().unwrap_or(device)
}

/// Get the partition naming prefix for a device
/// e.g., /dev/sda -> /dev/sda, /dev/nvme0n1 -> /dev/nvme0n1p
pub fn partition_prefix(device: &str) -> String {
    let ends_with_digit = device.chars().last().is_some_and(|c| c.is_ascii_digit());
    if ends_with_digit
        || device.contains("nvme")
        || device.contains("mmcblk")
        || device.contains("loop")
    {
        format!("{}p", device)
    } else {
        device.to_string()
    }
}

/// Get partition path for a device and partition number
pub fn partition_path(device: &str, partition_num: u32) -> String {
    format!("{}{}", partition_prefix(device), partition_num)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filesystem {
    #[serde(rename = "type")]
    pub fs_type: FilesystemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
}

impl Filesystem {
    pub fn new(fs_type: FilesystemType) -> Self {
        Self {
            fs_type,
            label: None,
            mount_point: None,
        }
    }
}

/// LUKS layer on top of a block device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encryption {
    pub name: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<Filesystem>,
}

impl Encryption {
    /// Device name of the opened mapping
    pub fn device_name(&self) -> String {
        format!("/dev/mapper/{}", self.name)
    }
}

/// Shared behaviour of everything that can hold an encryption layer and a
/// filesystem (partitions and logical volumes).
pub trait BlkDevice {
    fn name(&self) -> &str;
    fn size(&self) -> DiskSize;
    fn encryption(&self) -> Option<&Encryption>;
    fn direct_filesystem(&self) -> Option<&Filesystem>;
    fn content_mut(&mut self) -> (&mut Option<Encryption>, &mut Option<Filesystem>);

    /// Filesystem on the device or on its encryption layer
    fn filesystem(&self) -> Option<&Filesystem> {
        match self.encryption() {
            Some(enc) => enc.filesystem.as_ref(),
            None => self.direct_filesystem(),
        }
    }

    fn filesystem_mut(&mut self) -> Option<&mut Filesystem> {
        let (enc, fs) = self.content_mut();
        match enc {
            Some(enc) => enc.filesystem.as_mut(),
            None => fs.as_mut(),
        }
    }

    /// Name of the device that carries the data: the encryption mapping if
    /// there is one, the device itself otherwise
    fn plain_device_name(&self) -> String {
        match self.encryption() {
            Some(enc) => enc.device_name(),
            None => self.name().to_string(),
        }
    }

    /// Wrap the device in a new encryption layer, dropping previous content
    fn create_encryption(&mut self, password: Option<String>) -> &mut Encryption {
        let name = format!("cr_{}", basename(self.name()));
        let (enc, fs) = self.content_mut();
        *fs = None;
        enc.insert(Encryption {
            name,
            password,
            filesystem: None,
        })
    }

    /// Create a filesystem, on the encryption layer when present
    fn create_filesystem(&mut self, fs_type: FilesystemType) -> &mut Filesystem {
        let (enc, fs) = self.content_mut();
        let slot = match enc {
            Some(enc) => &mut enc.filesystem,
            None => fs,
        };
        slot.insert(Filesystem::new(fs_type))
    }

    fn remove_descendants(&mut self) {
        let (enc, fs) = self.content_mut();
        *enc = None;
        *fs = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    pub number: u32,
    pub start: DiskSize,
    pub size: DiskSize,
    #[serde(rename = "type", default)]
    pub partition_type: PartitionType,
    #[serde(default)]
    pub id: PartitionId,
    #[serde(default, skip_serializing_if = "is_false")]
    pub boot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<Encryption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<Filesystem>,
}

impl Partition {
    pub fn end(&self) -> DiskSize {
        self.start + self.size
    }
}

impl BlkDevice for Partition {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> DiskSize {
        self.size
    }

    fn encryption(&self) -> Option<&Encryption> {
        self.encryption.as_ref()
    }

    fn direct_filesystem(&self) -> Option<&Filesystem> {
        self.filesystem.as_ref()
    }

    fn content_mut(&mut self) -> (&mut Option<Encryption>, &mut Option<Filesystem>) {
        (&mut self.encryption, &mut self.filesystem)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionTable {
    #[serde(rename = "type")]
    pub ptable_type: PtableType,
    /// Gap before the first partition, when known better than the layout says
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbr_gap: Option<DiskSize>,
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

impl PartitionTable {
    pub fn new(ptable_type: PtableType) -> Self {
        Self {
            ptable_type,
            mbr_gap: None,
            partitions: Vec::new(),
        }
    }

    /// Primary and extended partitions, the ones taking primary slots
    pub fn primary_slots_used(&self) -> u32 {
        self.partitions
            .iter()
            .filter(|p| p.partition_type != PartitionType::Logical)
            .count() as u32
    }

    pub fn free_primary_slots(&self) -> u32 {
        self.ptable_type
            .max_primary()
            .saturating_sub(self.primary_slots_used())
    }

    pub fn extended(&self) -> Option<&Partition> {
        self.partitions
            .iter()
            .find(|p| p.partition_type == PartitionType::Extended)
    }

    pub fn logicals(&self) -> impl Iterator<Item = &Partition> {
        self.partitions
            .iter()
            .filter(|p| p.partition_type == PartitionType::Logical)
    }

    pub fn free_logical_slots(&self) -> u32 {
        if self.extended().is_none() {
            return 0;
        }
        crate::disk::types::MSDOS_MAX_LOGICAL.saturating_sub(self.logicals().count() as u32)
    }

    /// Lowest unused number for a primary or extended partition
    fn next_primary_number(&self) -> Option<u32> {
        (1..=self.ptable_type.max_primary())
            .find(|n| !self.partitions.iter().any(|p| p.number == *n))
    }

    fn next_logical_number(&self) -> u32 {
        self.logicals()
            .map(|p| p.number + 1)
            .max()
            .unwrap_or(5)
            .max(5)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub name: String,
    pub size: DiskSize,
    #[serde(default = "default_block_size")]
    pub block_size: DiskSize,
    #[serde(default = "default_min_grain")]
    pub min_grain: DiskSize,
    #[serde(default)]
    pub kind: DiskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_table: Option<PartitionTable>,
}

impl Disk {
    pub fn new(name: &str, size: DiskSize) -> Self {
        Self {
            name: name.to_string(),
            size,
            block_size: default_block_size(),
            min_grain: default_min_grain(),
            kind: DiskKind::Disk,
            partition_table: None,
        }
    }

    pub fn partition_table(&self) -> Option<&PartitionTable> {
        self.partition_table.as_ref()
    }

    /// Type of the current partition table, or of the one that would be
    /// created on the disk
    pub fn ptable_type(&self) -> PtableType {
        self.partition_table
            .as_ref()
            .map(|t| t.ptable_type)
            .unwrap_or_else(|| self.kind.default_ptable_type())
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partition_table
            .iter()
            .flat_map(|t| t.partitions.iter())
    }

    /// Space before the first partition of an MS-DOS style table
    pub fn mbr_gap(&self) -> Option<DiskSize> {
        let table = self.partition_table.as_ref()?;
        if table.ptable_type != PtableType::Msdos {
            return None;
        }
        if table.mbr_gap.is_some() {
            return table.mbr_gap;
        }
        let first = table.partitions.iter().map(|p| p.start).min();
        Some(first.unwrap_or(self.min_grain))
    }

    /// Start of the area partitions may use
    pub fn usable_start(&self) -> DiskSize {
        self.min_grain
    }

    /// End of the area partitions may use
    pub fn usable_end(&self) -> DiskSize {
        (self.size - self.ptable_type().end_reserve(self.min_grain)).floor(self.min_grain)
    }
}

/// Placement of a partition to be created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionSpec {
    pub start: DiskSize,
    pub size: DiskSize,
    pub partition_type: PartitionType,
    pub id: PartitionId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Devicegraph {
    #[serde(default)]
    pub disks: Vec<Disk>,
    #[serde(default)]
    pub volume_groups: Vec<LvmVg>,
}

impl Devicegraph {
    /// Load a devicegraph from a TOML or JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let devicegraph: Self = if Path::new(path).extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        devicegraph.validate()?;
        Ok(devicegraph)
    }

    /// Check the values sizes are rounded to
    pub fn validate(&self) -> Result<()> {
        for disk in &self.disks {
            if disk.min_grain.is_zero() || disk.min_grain.is_unlimited() {
                return Err(LayoutixError::ConfigError(format!(
                    "{}: min_grain must be a positive size",
                    disk.name
                )));
            }
        }
        for vg in &self.volume_groups {
            if vg.extent_size.is_zero() || vg.extent_size.is_unlimited() {
                return Err(LayoutixError::ConfigError(format!(
                    "volume group {}: extent_size must be a positive size",
                    vg.name
                )));
            }
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Independent deep copy
    pub fn duplicate(&self) -> Devicegraph {
        self.clone()
    }

    pub fn disk(&self, name: &str) -> Option<&Disk> {
        self.disks.iter().find(|d| d.name == name)
    }

    pub fn disk_mut(&mut self, name: &str) -> Option<&mut Disk> {
        self.disks.iter_mut().find(|d| d.name == name)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.disks.iter().flat_map(|d| d.partitions())
    }

    pub fn partition(&self, name: &str) -> Option<&Partition> {
        self.partitions().find(|p| p.name == name)
    }

    pub fn partition_mut(&mut self, name: &str) -> Option<&mut Partition> {
        self.disks
            .iter_mut()
            .filter_map(|d| d.partition_table.as_mut())
            .flat_map(|t| t.partitions.iter_mut())
            .find(|p| p.name == name)
    }

    /// Disk holding the given partition
    pub fn disk_of(&self, partition_name: &str) -> Option<&Disk> {
        self.disks
            .iter()
            .find(|d| d.partitions().any(|p| p.name == partition_name))
    }

    pub fn volume_group(&self, name: &str) -> Option<&LvmVg> {
        self.volume_groups.iter().find(|vg| vg.name == name)
    }

    pub fn volume_group_mut(&mut self, name: &str) -> Option<&mut LvmVg> {
        self.volume_groups.iter_mut().find(|vg| vg.name == name)
    }

    pub fn logical_volumes(&self) -> impl Iterator<Item = (&LvmVg, &LvmLv)> {
        self.volume_groups
            .iter()
            .flat_map(|vg| vg.lvs.iter().map(move |lv| (vg, lv)))
    }

    /// Every partition or logical volume, as block devices
    pub fn blk_devices(&self) -> Vec<&dyn BlkDevice> {
        let mut devices: Vec<&dyn BlkDevice> = Vec::new();
        for partition in self.partitions() {
            devices.push(partition);
        }
        for (_, lv) in self.logical_volumes() {
            devices.push(lv);
        }
        devices
    }

    /// Size of a block device that can become a physical volume
    pub fn blk_device_size(&self, name: &str) -> Option<DiskSize> {
        self.partitions()
            .find(|p| p.name == name || p.encryption.as_ref().is_some_and(|e| e.device_name() == name))
            .map(|p| p.size)
    }

    pub fn create_partition_table(&mut self, disk_name: &str, ptable_type: PtableType) -> Result<()> {
        let disk = self
            .disk_mut(disk_name)
            .ok_or_else(|| LayoutixError::DeviceNotFound(disk_name.to_string()))?;
        if disk.partition_table.is_some() {
            return Err(LayoutixError::PartitionError(format!(
                "{} already has a partition table",
                disk_name
            )));
        }
        debug!("Creating {} partition table on {}", ptable_type, disk_name);
        disk.partition_table = Some(PartitionTable::new(ptable_type));
        Ok(())
    }

    /// Create a partition and return its device name
    pub fn create_partition(&mut self, disk_name: &str, spec: PartitionSpec) -> Result<String> {
        let disk = self
            .disk_mut(disk_name)
            .ok_or_else(|| LayoutixError::DeviceNotFound(disk_name.to_string()))?;
        let disk_size = disk.size;
        let table = disk.partition_table.as_mut().ok_or_else(|| {
            LayoutixError::PartitionError(format!("{} has no partition table", disk_name))
        })?;

        if spec.start + spec.size > disk_size {
            return Err(LayoutixError::PartitionError(format!(
                "partition at {} with size {} does not fit in {}",
                spec.start, spec.size, disk_name
            )));
        }

        let number = match spec.partition_type {
            PartitionType::Logical => {
                let ext = table.extended().ok_or_else(|| {
                    LayoutixError::PartitionError(format!(
                        "logical partition requested but {} has no extended partition",
                        disk_name
                    ))
                })?;
                if spec.start < ext.start || spec.start + spec.size > ext.end() {
                    return Err(LayoutixError::PartitionError(format!(
                        "logical partition at {} is outside the extended partition",
                        spec.start
                    )));
                }
                if table.free_logical_slots() == 0 {
                    return Err(LayoutixError::NoMorePartitionSlot(disk_name.to_string()));
                }
                table.next_logical_number()
            }
            PartitionType::Extended if !table.ptable_type.extended_possible() => {
                return Err(LayoutixError::PartitionError(format!(
                    "{} partition tables cannot hold an extended partition",
                    table.ptable_type
                )));
            }
            PartitionType::Extended if table.extended().is_some() => {
                return Err(LayoutixError::PartitionError(format!(
                    "{} already has an extended partition",
                    disk_name
                )));
            }
            PartitionType::Primary | PartitionType::Extended => table
                .next_primary_number()
                .ok_or_else(|| LayoutixError::NoMorePartitionSlot(disk_name.to_string()))?,
        };

        let name = partition_path(disk_name, number);
        debug!(
            "Creating {} partition {} at {} ({})",
            spec.partition_type, name, spec.start, spec.size
        );
        table.partitions.push(Partition {
            name: name.clone(),
            number,
            start: spec.start,
            size: spec.size,
            partition_type: spec.partition_type,
            id: spec.id,
            boot: false,
            encryption: None,
            filesystem: None,
        });
        table.partitions.sort_by_key(|p| p.start);
        Ok(name)
    }

    /// Delete a partition (and its logicals, for an extended one)
    pub fn delete_partition(&mut self, name: &str) -> Result<()> {
        for disk in &mut self.disks {
            let Some(table) = disk.partition_table.as_mut() else {
                continue;
            };
            let Some(target) = table.partitions.iter().find(|p| p.name == name).cloned() else {
                continue;
            };
            debug!("Deleting partition {}", name);
            table.partitions.retain(|p| {
                let inside_extended = target.partition_type == PartitionType::Extended
                    && p.partition_type == PartitionType::Logical;
                p.name != name && !inside_extended
            });
            return Ok(());
        }
        Err(LayoutixError::DeviceNotFound(name.to_string()))
    }

    pub fn create_volume_group(&mut self, name: &str, extent_size: DiskSize) -> Result<()> {
        if self.volume_group(name).is_some() {
            return Err(LayoutixError::ConfigError(format!(
                "volume group {} already exists",
                name
            )));
        }
        debug!("Creating volume group {}", name);
        self.volume_groups.push(LvmVg::new(name, extent_size));
        Ok(())
    }

    /// Add a partition (or its encryption mapping) to a volume group
    pub fn add_physical_volume(&mut self, vg_name: &str, device: &str) -> Result<()> {
        let size = self
            .blk_device_size(device)
            .ok_or_else(|| LayoutixError::DeviceNotFound(device.to_string()))?;
        let vg = self
            .volume_group_mut(vg_name)
            .ok_or_else(|| LayoutixError::DeviceNotFound(vg_name.to_string()))?;
        vg.add_pv(device, size);
        Ok(())
    }

    pub fn create_logical_volume(&mut self, vg_name: &str, lv_name: &str, size: DiskSize) -> Result<()> {
        self.volume_group_mut(vg_name)
            .ok_or_else(|| LayoutixError::DeviceNotFound(vg_name.to_string()))?
            .create_lv(lv_name, size)
    }

    pub fn delete_logical_volume(&mut self, vg_name: &str, lv_name: &str) -> Result<()> {
        self.volume_group_mut(vg_name)
            .ok_or_else(|| LayoutixError::DeviceNotFound(vg_name.to_string()))?
            .delete_lv(lv_name)
    }
}
