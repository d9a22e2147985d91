//! LVM volume group records
//!
//! Volume groups are tracked by name with their physical volumes and logical
//! volumes. Capacity is counted in whole extents; physical volume metadata
//! is not subtracted.

use crate::disk::graph::{BlkDevice, Encryption, Filesystem};
use crate::disk::size::DiskSize;
use crate::utils::error::{LayoutixError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default extent size of new volume groups
pub const DEFAULT_EXTENT_SIZE: DiskSize = DiskSize::mib(4);

fn default_extent_size() -> DiskSize {
    DEFAULT_EXTENT_SIZE
}

/// Get the device path of a logical volume
pub fn lv_path(vg_name: &str, lv_name: &str) -> String {
    format!("/dev/{}/{}", vg_name, lv_name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LvmPv {
    /// Partition or encryption mapping backing the volume
    pub device: String,
    pub size: DiskSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LvmLv {
    pub name: String,
    pub size: DiskSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<Encryption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<Filesystem>,
}

impl LvmLv {
    pub fn new(name: &str, size: DiskSize) -> Self {
        Self {
            name: name.to_string(),
            size,
            encryption: None,
            filesystem: None,
        }
    }
}

impl BlkDevice for LvmLv {
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
pub struct LvmVg {
    pub name: String,
    #[serde(default = "default_extent_size")]
    pub extent_size: DiskSize,
    #[serde(default)]
    pub pvs: Vec<LvmPv>,
    #[serde(default)]
    pub lvs: Vec<LvmLv>,
}

impl LvmVg {
    pub fn new(name: &str, extent_size: DiskSize) -> Self {
        Self {
            name: name.to_string(),
            extent_size,
            pvs: Vec::new(),
            lvs: Vec::new(),
        }
    }

    /// Usable size: every physical volume rounded down to whole extents
    pub fn size(&self) -> DiskSize {
        self.pvs.iter().map(|pv| pv.size.floor(self.extent_size)).sum()
    }

    pub fn used_space(&self) -> DiskSize {
        self.lvs.iter().map(|lv| lv.size).sum()
    }

    pub fn available_space(&self) -> DiskSize {
        self.size() - self.used_space()
    }

    pub fn lv(&self, name: &str) -> Option<&LvmLv> {
        self.lvs.iter().find(|lv| lv.name == name)
    }

    pub fn lv_mut(&mut self, name: &str) -> Option<&mut LvmLv> {
        self.lvs.iter_mut().find(|lv| lv.name == name)
    }

    pub fn has_pv(&self, device: &str) -> bool {
        self.pvs.iter().any(|pv| pv.device == device)
    }

    pub fn add_pv(&mut self, device: &str, size: DiskSize) {
        if self.has_pv(device) {
            return;
        }
        debug!("Adding physical volume {} to {}", device, self.name);
        self.pvs.push(LvmPv {
            device: device.to_string(),
            size,
        });
    }

    pub fn create_lv(&mut self, name: &str, size: DiskSize) -> Result<()> {
        if self.lv(name).is_some() {
            return Err(LayoutixError::ConfigError(format!(
                "logical volume {} already exists",
                lv_path(&self.name, name)
            )));
        }
        if size > self.available_space() {
            return Err(LayoutixError::NotEnoughVgSpace {
                vg: self.name.clone(),
                missing: size - self.available_space(),
            });
        }
        info!("Creating logical volume {} ({})", lv_path(&self.name, name), size);
        self.lvs.push(LvmLv::new(name, size));
        Ok(())
    }

    pub fn delete_lv(&mut self, name: &str) -> Result<()> {
        let before = self.lvs.len();
        self.lvs.retain(|lv| lv.name != name);
        if self.lvs.len() == before {
            return Err(LayoutixError::DeviceNotFound(lv_path(&self.name, name)));
        }
        info!("Deleted logical volume {}", lv_path(&self.name, name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vg_with(pvs: &[DiskSize], lvs: &[(&str, DiskSize)]) -> LvmVg {
        let mut vg = LvmVg::new("system", DEFAULT_EXTENT_SIZE);
        for (i, size) in pvs.iter().enumerate() {
            vg.add_pv(&format!("/dev/sda{}", i + 1), *size);
        }
        for (name, size) in lvs {
            vg.lvs.push(LvmLv::new(name, *size));
        }
        vg
    }

    #[test]
    fn test_lv_path() {
        assert_eq!(lv_path("system", "root"), "/dev/system/root");
    }

    #[test]
    fn size_counts_whole_extents() {
        let vg = vg_with(&[DiskSize::mib(10), DiskSize::mib(7)], &[]);
        assert_eq!(vg.size(), DiskSize::mib(8 + 4));
    }

    #[test]
    fn available_space_subtracts_volumes() {
        let vg = vg_with(&[DiskSize::gib(14)], &[("home", DiskSize::gib(6))]);
        assert_eq!(vg.available_space(), DiskSize::gib(8));
    }

    #[test]
    fn create_lv_refuses_oversized_volumes() {
        let mut vg = vg_with(&[DiskSize::gib(1)], &[]);
        let err = vg.create_lv("root", DiskSize::gib(2)).unwrap_err();
        assert!(matches!(err, LayoutixError::NotEnoughVgSpace { .. }));
        vg.create_lv("root", DiskSize::mib(512)).unwrap();
        assert!(vg.create_lv("root", DiskSize::mib(4)).is_err());
    }

    #[test]
    fn pvs_are_not_added_twice() {
        let mut vg = vg_with(&[DiskSize::gib(1)], &[]);
        vg.add_pv("/dev/sda1", DiskSize::gib(1));
        assert_eq!(vg.pvs.len(), 1);
    }

    #[test]
    fn delete_missing_lv_fails() {
        let mut vg = vg_with(&[DiskSize::gib(1)], &[]);
        assert!(matches!(
            vg.delete_lv("nope"),
            Err(LayoutixError::DeviceNotFound(_))
        ));
    }
}
