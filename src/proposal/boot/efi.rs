//! UEFI: the firmware loads the bootloader from an EFI system partition

use super::BootContext;
use crate::disk::size::DiskSize;
use crate::disk::types::{FilesystemType, PartitionId};
use crate::planned::PlannedPartition;
use tracing::debug;

pub const ESP_MOUNT_POINT: &str = "/boot/efi";
pub const ESP_MIN_SIZE: DiskSize = DiskSize::mib(256);
pub const ESP_MAX_SIZE: DiskSize = DiskSize::mib(500);

pub(super) fn needed_partitions(ctx: &BootContext<'_>) -> Vec<PlannedPartition> {
    if ctx.planned_with_id(PartitionId::Esp) || ctx.planned_mount(ESP_MOUNT_POINT) {
        debug!("EFI system partition already planned");
        return Vec::new();
    }

    let mut esp = match ctx.existing_with_id(PartitionId::Esp) {
        Some(existing) => {
            debug!("Reusing EFI system partition {}", existing.name);
            let mut esp = PlannedPartition::new(existing.size, existing.size);
            esp.reuse = Some(existing.name.clone());
            esp
        }
        None => ctx.new_partition(PartitionId::Esp, ESP_MIN_SIZE, ESP_MAX_SIZE),
    };
    esp = esp.with_mount(FilesystemType::Vfat, ESP_MOUNT_POINT);
    vec![esp]
}
