//! Devicegraph builders shared by unit tests

use crate::disk::graph::{partition_path, Devicegraph, Disk, Filesystem, Partition, PartitionTable};
use crate::disk::lvm::{LvmLv, LvmVg, DEFAULT_EXTENT_SIZE};
use crate::disk::size::DiskSize;
use crate::disk::types::{FilesystemType, PartitionId, PartitionType, PtableType};

pub fn partition(disk: &str, number: u32, start: DiskSize, size: DiskSize) -> Partition {
    Partition {
        name: partition_path(disk, number),
        number,
        start,
        size,
        partition_type: PartitionType::Primary,
        id: PartitionId::Linux,
        boot: false,
        encryption: None,
        filesystem: None,
    }
}

pub fn logical(disk: &str, number: u32, start: DiskSize, size: DiskSize) -> Partition {
    Partition {
        partition_type: PartitionType::Logical,
        ..partition(disk, number, start, size)
    }
}

pub fn formatted(mut part: Partition, fs_type: FilesystemType, label: Option<&str>) -> Partition {
    part.filesystem = Some(Filesystem {
        fs_type,
        label: label.map(str::to_string),
        mount_point: None,
    });
    part
}

pub fn disk_with_table(
    name: &str,
    size: DiskSize,
    ptable_type: PtableType,
    partitions: Vec<Partition>,
) -> Disk {
    let mut disk = Disk::new(name, size);
    let mut table = PartitionTable::new(ptable_type);
    table.partitions = partitions;
    disk.partition_table = Some(table);
    disk
}

pub fn graph(disks: Vec<Disk>) -> Devicegraph {
    Devicegraph {
        disks,
        volume_groups: Vec::new(),
    }
}

/// Volume group with one physical volume and the given logical volumes
pub fn volume_group(name: &str, pv: &str, pv_size: DiskSize, lvs: &[(&str, DiskSize)]) -> LvmVg {
    let mut vg = LvmVg::new(name, DEFAULT_EXTENT_SIZE);
    vg.add_pv(pv, pv_size);
    vg.lvs = lvs.iter().map(|(n, s)| LvmLv::new(n, *s)).collect();
    vg
}
