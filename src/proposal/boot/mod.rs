//! Boot requirements
//!
//! Given the target platform and the devices planned so far, decide which
//! extra partitions the bootloader needs on the boot disk. Each platform
//! has its own strategy module; they share the facts collected in
//! [`BootContext`].

mod efi;
mod legacy;
mod prep;
mod zipl;

use crate::config::system::{Architecture, SystemInfo};
use crate::disk::graph::{Devicegraph, Disk, Partition};
use crate::disk::size::DiskSize;
use crate::disk::types::{FilesystemType, PartitionId, PtableType};
use crate::planned::{PlannedDevice, PlannedPartition};
use crate::utils::error::Result;
use tracing::{debug, info};

/// Facts about the planned layout the strategies decide on
pub(crate) struct BootContext<'a> {
    planned: &'a [PlannedDevice],
    boot_disk: &'a Disk,
}

impl<'a> BootContext<'a> {
    fn planned_partitions(&self) -> impl Iterator<Item = &'a PlannedPartition> {
        self.planned.iter().filter_map(PlannedDevice::as_partition)
    }

    fn boot_disk_name(&self) -> &'a str {
        &self.boot_disk.name
    }

    fn ptable_type(&self) -> PtableType {
        self.boot_disk.ptable_type()
    }

    fn planned_with_id(&self, id: PartitionId) -> bool {
        self.planned_partitions().any(|p| p.partition_id == id)
    }

    fn planned_mount(&self, path: &str) -> bool {
        self.planned.iter().any(|d| d.mounts(path))
    }

    /// Existing partition of the boot disk with the given id
    fn existing_with_id(&self, id: PartitionId) -> Option<&'a Partition> {
        self.boot_disk.partitions().find(|p| p.id == id)
    }

    fn root_partition(&self) -> Option<&'a PlannedPartition> {
        self.planned_partitions().find(|p| p.is_root())
    }

    fn root_on_lvm(&self) -> bool {
        self.planned
            .iter()
            .filter_map(PlannedDevice::as_volume_group)
            .any(|vg| vg.root_lv().is_some())
    }

    fn root_encrypted(&self) -> bool {
        let partition = self.root_partition().is_some_and(|p| p.is_encrypted());
        let lv = self
            .planned
            .iter()
            .filter_map(PlannedDevice::as_volume_group)
            .filter_map(|vg| vg.root_lv())
            .any(|lv| lv.encryption_password.is_some());
        partition || lv
    }

    fn root_filesystem(&self) -> Option<FilesystemType> {
        if let Some(root) = self.root_partition() {
            return root.format.filesystem;
        }
        self.planned
            .iter()
            .filter_map(PlannedDevice::as_volume_group)
            .find_map(|vg| vg.root_lv())
            .and_then(|lv| lv.format.filesystem)
    }

    /// New partition on the boot disk
    fn new_partition(&self, id: PartitionId, min: DiskSize, max: DiskSize) -> PlannedPartition {
        PlannedPartition::new(min, max)
            .on_disk(self.boot_disk_name())
            .with_id(id)
    }
}

pub struct BootRequirementsChecker<'a> {
    devicegraph: &'a Devicegraph,
    planned: &'a [PlannedDevice],
    system: SystemInfo,
}

impl<'a> BootRequirementsChecker<'a> {
    pub fn new(devicegraph: &'a Devicegraph, planned: &'a [PlannedDevice], system: SystemInfo) -> Self {
        Self {
            devicegraph,
            planned,
            system,
        }
    }

    /// Disk the bootloader goes to: the one holding root, directly or as a
    /// physical volume, else the first disk of the layout
    pub fn boot_disk(&self) -> Option<&'a Disk> {
        let partitions = || self.planned.iter().filter_map(PlannedDevice::as_partition);
        let disk_of = |part: &PlannedPartition| -> Option<&'a Disk> {
            match (&part.reuse, &part.disk) {
                (Some(reuse), _) => self.devicegraph.disk_of(reuse),
                (None, Some(disk)) => self.devicegraph.disk(disk),
                (None, None) => None,
            }
        };

        if let Some(disk) = partitions().find(|p| p.is_root()).and_then(disk_of) {
            return Some(disk);
        }

        let root_vg = self
            .planned
            .iter()
            .filter_map(PlannedDevice::as_volume_group)
            .find(|vg| vg.root_lv().is_some());
        if let Some(vg) = root_vg {
            let vg_name = vg.reuse.as_deref().unwrap_or(vg.base_name());
            let pv_disk = partitions()
                .filter(|p| p.lvm_volume_group_name.as_deref() == Some(vg_name))
                .find_map(disk_of);
            if pv_disk.is_some() {
                return pv_disk;
            }
            let existing_pv = self
                .devicegraph
                .volume_group(vg_name)
                .and_then(|vg| vg.pvs.first())
                .and_then(|pv| {
                    self.devicegraph.partitions().find(|p| {
                        p.name == pv.device
                            || p.encryption.as_ref().is_some_and(|e| e.device_name() == pv.device)
                    })
                })
                .and_then(|p| self.devicegraph.disk_of(&p.name));
            if existing_pv.is_some() {
                return existing_pv;
            }
        }

        partitions()
            .find_map(disk_of)
            .or_else(|| self.devicegraph.disks.first())
    }

    /// Partitions that must be added for the system to boot
    pub fn needed_partitions(&self) -> Result<Vec<PlannedPartition>> {
        let Some(boot_disk) = self.boot_disk() else {
            debug!("No disk to boot from, no boot requirements");
            return Ok(Vec::new());
        };
        let ctx = BootContext {
            planned: self.planned,
            boot_disk,
        };

        let needed = match self.system.architecture {
            Architecture::X86_64 | Architecture::Aarch64 if self.system.uses_efi() => efi::needed_partitions(&ctx),
            Architecture::X86_64 | Architecture::Aarch64 => legacy::needed_partitions(&ctx)?,
            Architecture::Ppc64le => prep::needed_partitions(&ctx),
            Architecture::S390x => zipl::needed_partitions(&ctx)?,
        };

        info!(
            "Boot requirements for {} on {}: {} partition(s)",
            self.system,
            boot_disk.name,
            needed.len()
        );
        Ok(needed)
    }
}
