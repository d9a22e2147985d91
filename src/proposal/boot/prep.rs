//! PowerPC: firmware reads the bootloader from a PReP partition

use super::BootContext;
use crate::disk::size::DiskSize;
use crate::disk::types::PartitionId;
use crate::planned::PlannedPartition;

pub const PREP_MIN_SIZE: DiskSize = DiskSize::mib(2);
pub const PREP_MAX_SIZE: DiskSize = DiskSize::mib(8);

pub(super) fn needed_partitions(ctx: &BootContext<'_>) -> Vec<PlannedPartition> {
    if ctx.planned_with_id(PartitionId::Prep) || ctx.existing_with_id(PartitionId::Prep).is_some() {
        return Vec::new();
    }
    let mut prep = ctx.new_partition(PartitionId::Prep, PREP_MIN_SIZE, PREP_MAX_SIZE);
    prep.bootable = true;
    vec![prep]
}
