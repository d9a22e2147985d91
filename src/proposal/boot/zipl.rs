//! s390x: zipl reads the kernel from a small ext2 partition

use super::BootContext;
use crate::disk::size::DiskSize;
use crate::disk::types::{DasdFormat, DasdType, DiskKind, FilesystemType, PartitionId};
use crate::planned::PlannedPartition;
use crate::utils::error::{LayoutixError, Result};

pub const ZIPL_MOUNT_POINT: &str = "/boot/zipl";
pub const ZIPL_MIN_SIZE: DiskSize = DiskSize::mib(100);
pub const ZIPL_MAX_SIZE: DiskSize = DiskSize::gib(1);

pub(super) fn needed_partitions(ctx: &BootContext<'_>) -> Result<Vec<PlannedPartition>> {
    if let DiskKind::Dasd { dasd_type, format } = ctx.boot_disk.kind {
        let unbootable = match dasd_type {
            DasdType::Fba => Some("FBA"),
            DasdType::Eckd if format == DasdFormat::Ldl => Some("LDL formatted"),
            _ => None,
        };
        if let Some(what) = unbootable {
            return Err(LayoutixError::BootInfeasible(format!(
                "cannot boot from {} DASD {}",
                what,
                ctx.boot_disk_name()
            )));
        }
    }

    if ctx.planned_mount(ZIPL_MOUNT_POINT) {
        return Ok(Vec::new());
    }
    let zipl = ctx
        .new_partition(PartitionId::Linux, ZIPL_MIN_SIZE, ZIPL_MAX_SIZE)
        .with_mount(FilesystemType::Ext2, ZIPL_MOUNT_POINT);
    Ok(vec![zipl])
}
