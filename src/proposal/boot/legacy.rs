//! Legacy BIOS booting with GRUB
//!
//! On GPT GRUB needs a BIOS boot partition for its core image. On MS-DOS
//! tables it is embedded in the gap before the first partition, unless that
//! gap is too small; then the core image goes to a filesystem that can hold
//! it or to a separate `/boot`.

use super::BootContext;
use crate::disk::size::DiskSize;
use crate::disk::types::{FilesystemType, PartitionId, PtableType};
use crate::planned::PlannedPartition;
use crate::utils::error::{LayoutixError, Result};
use tracing::debug;

pub const BIOS_BOOT_MIN_SIZE: DiskSize = DiskSize::mib(2);
pub const BIOS_BOOT_MAX_SIZE: DiskSize = DiskSize::mib(8);

/// Smallest gap GRUB fits in with plain partitions
pub const MIN_GRUB_GAP: DiskSize = DiskSize::kib(256);
/// GRUB core with the LVM and crypto modules
pub const MIN_GRUB_GAP_LVM: DiskSize = DiskSize::kib(260);

pub const BOOT_MIN_SIZE: DiskSize = DiskSize::mib(100);
pub const BOOT_MAX_SIZE: DiskSize = DiskSize::mib(500);

pub(super) fn needed_partitions(ctx: &BootContext<'_>) -> Result<Vec<PlannedPartition>> {
    match ctx.ptable_type() {
        PtableType::Msdos => msdos_partitions(ctx),
        _ => Ok(gpt_partitions(ctx)),
    }
}

fn gpt_partitions(ctx: &BootContext<'_>) -> Vec<PlannedPartition> {
    if ctx.planned_with_id(PartitionId::BiosBoot) {
        return Vec::new();
    }
    if let Some(existing) = ctx.existing_with_id(PartitionId::BiosBoot) {
        debug!("BIOS boot partition {} already present", existing.name);
        return Vec::new();
    }
    vec![ctx.new_partition(PartitionId::BiosBoot, BIOS_BOOT_MIN_SIZE, BIOS_BOOT_MAX_SIZE)]
}

fn msdos_partitions(ctx: &BootContext<'_>) -> Result<Vec<PlannedPartition>> {
    let gap = ctx.boot_disk.mbr_gap().unwrap_or_else(DiskSize::zero);
    let complex_root = ctx.root_on_lvm() || ctx.root_encrypted();
    let needed_gap = if complex_root { MIN_GRUB_GAP_LVM } else { MIN_GRUB_GAP };
    debug!("MBR gap of {}: {} needed", gap, needed_gap);

    if gap >= needed_gap {
        return Ok(Vec::new());
    }

    let embeds = ctx.root_filesystem().is_some_and(|fs| fs.embeds_bootloader());
    if !complex_root && embeds {
        debug!("GRUB goes into the root filesystem");
        return Ok(Vec::new());
    }

    if gap >= MIN_GRUB_GAP {
        if ctx.planned_mount("/boot") {
            return Ok(Vec::new());
        }
        let boot = ctx
            .new_partition(PartitionId::Linux, BOOT_MIN_SIZE, BOOT_MAX_SIZE)
            .with_mount(FilesystemType::Ext4, "/boot");
        return Ok(vec![boot]);
    }

    Err(LayoutixError::BootInfeasible(format!(
        "the gap before the first partition of {} is {}, GRUB needs at least {}",
        ctx.boot_disk_name(),
        gap,
        needed_gap
    )))
}
