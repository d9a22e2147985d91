//! Materialization of a distribution into a devicegraph

use crate::disk::graph::{Devicegraph, PartitionSpec};
use crate::disk::types::{PartitionId, PartitionType};
use crate::planned::PlannedPartition;
use crate::proposal::distribution::{AssignedPartition, AssignedSpace, Distribution};
use crate::utils::error::{LayoutixError, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Planned partition index -> name of the partition created or reused for it
pub type DevicesMap = BTreeMap<usize, String>;

#[derive(Debug, Clone)]
pub struct CreatorResult {
    pub devicegraph: Devicegraph,
    pub devices_map: DevicesMap,
}

pub struct PartitionCreator<'a> {
    original: &'a Devicegraph,
}

impl<'a> PartitionCreator<'a> {
    pub fn new(original: &'a Devicegraph) -> Self {
        Self { original }
    }

    /// Create the distributed partitions and update the reused ones, on a
    /// copy of the original devicegraph
    pub fn create_partitions(
        &self,
        planned: &[PlannedPartition],
        distribution: &Distribution,
    ) -> Result<CreatorResult> {
        let mut devicegraph = self.original.duplicate();
        let mut devices_map = DevicesMap::new();

        for (index, part) in planned.iter().enumerate() {
            if let Some(name) = &part.reuse {
                reuse_partition(&mut devicegraph, part, name)?;
                devices_map.insert(index, name.clone());
            }
        }

        for space in &distribution.spaces {
            for (index, name) in create_in_space(&mut devicegraph, planned, space)? {
                devices_map.insert(index, name);
            }
        }

        info!(
            "Partitions ready: {} created, {} reused",
            distribution.partition_count(),
            planned.iter().filter(|p| p.is_reused()).count()
        );
        Ok(CreatorResult {
            devicegraph,
            devices_map,
        })
    }
}

fn reuse_partition(devicegraph: &mut Devicegraph, part: &PlannedPartition, name: &str) -> Result<()> {
    let device = devicegraph
        .partition_mut(name)
        .ok_or_else(|| LayoutixError::MissingReuseTarget(name.to_string()))?;
    debug!("Reusing partition {} (reformat: {})", name, part.reformat);
    part.format
        .apply_to_reused(device, part.encryption_password.as_deref(), part.reformat);
    if part.reformat {
        device.id = part.partition_id;
    }
    Ok(())
}

fn create_in_space(
    devicegraph: &mut Devicegraph,
    planned: &[PlannedPartition],
    space: &AssignedSpace,
) -> Result<Vec<(usize, String)>> {
    let disk_name = space.disk_name();
    let has_table = devicegraph
        .disk(disk_name)
        .ok_or_else(|| LayoutixError::DeviceNotFound(disk_name.to_string()))?
        .partition_table()
        .is_some();
    if !has_table {
        devicegraph.create_partition_table(disk_name, space.free_space.slots.ptable_type)?;
    }

    let mut pending_extended = space.extended;
    let mut created = Vec::with_capacity(space.partitions.len());
    for assigned in &space.partitions {
        if assigned.partition_type == PartitionType::Logical {
            if let Some(ext) = pending_extended.take() {
                devicegraph.create_partition(
                    disk_name,
                    PartitionSpec {
                        start: ext.start,
                        size: ext.length,
                        partition_type: PartitionType::Extended,
                        id: PartitionId::Extended,
                    },
                )?;
            }
        }
        let part = planned.get(assigned.planned_index).ok_or_else(|| {
            LayoutixError::PartitionError(format!(
                "distribution refers to unknown planned partition #{}",
                assigned.planned_index
            ))
        })?;
        let spec = aligned_spec(space, assigned, part);
        let name = devicegraph.create_partition(disk_name, spec)?;
        let device = devicegraph
            .partition_mut(&name)
            .ok_or_else(|| LayoutixError::DeviceNotFound(name.clone()))?;
        device.boot = part.bootable;
        part.format
            .apply_to(device, part.encryption_password.as_deref());
        info!(
            "Created {} ({}, {})",
            name,
            spec.size,
            part.format.mount_point.as_deref().unwrap_or("no mount point")
        );
        created.push((assigned.planned_index, name));
    }
    Ok(created)
}

/// Start rounded up to the grain; size rounded down unless it is fixed,
/// never past the region nor the planned maximum
fn aligned_spec(space: &AssignedSpace, assigned: &AssignedPartition, part: &PlannedPartition) -> PartitionSpec {
    let grain = space.free_space.grain;
    let start = assigned.start.ceil(grain);
    let mut size = if part.sizing.is_fixed() {
        assigned.size
    } else {
        assigned.size.floor(grain)
    };
    size = size
        .min(space.free_space.region.end() - start)
        .min(part.max_size());
    PartitionSpec {
        start,
        size,
        partition_type: assigned.partition_type,
        id: part.partition_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::graph::{BlkDevice, Disk};
    use crate::disk::size::DiskSize;
    use crate::disk::types::{FilesystemType, PtableType};
    use crate::proposal::distribution::best_distribution;
    use crate::testing::{disk_with_table, formatted, graph, partition};

    fn fixed(size: DiskSize, mount: &str) -> PlannedPartition {
        PlannedPartition::new(size, size).with_mount(FilesystemType::Ext4, mount)
    }

    fn materialize(devicegraph: &Devicegraph, planned: &[PlannedPartition]) -> Result<CreatorResult> {
        let spaces = devicegraph.free_spaces_of(&["/dev/sda".to_string()]);
        let dist = best_distribution(planned, &spaces)?;
        PartitionCreator::new(devicegraph).create_partitions(planned, &dist)
    }

    #[test]
    fn creates_missing_partition_table() {
        let original = graph(vec![Disk::new("/dev/sda", DiskSize::gib(50))]);
        let planned = vec![fixed(DiskSize::gib(10), "/")];
        let result = materialize(&original, &planned).unwrap();

        let disk = result.devicegraph.disk("/dev/sda").unwrap();
        assert_eq!(disk.ptable_type(), PtableType::Gpt);
        assert_eq!(result.devices_map[&0], "/dev/sda1");
        assert!(original.disk("/dev/sda").unwrap().partition_table.is_none());
    }

    #[test]
    fn fixed_sizes_are_exact() {
        let original = graph(vec![Disk::new("/dev/sda", DiskSize::gib(50))]);
        let planned = vec![
            fixed(DiskSize::mib(2) + DiskSize::kib(512), "/boot"),
            fixed(DiskSize::gib(10), "/"),
        ];
        let result = materialize(&original, &planned).unwrap();
        for (index, name) in &result.devices_map {
            let part = result.devicegraph.partition(name).unwrap();
            assert_eq!(part.size, planned[*index].min_size());
            assert!(part.start.is_aligned(DiskSize::mib(1)));
        }
    }

    #[test]
    fn encryption_wraps_the_filesystem() {
        let original = graph(vec![Disk::new("/dev/sda", DiskSize::gib(50))]);
        let mut root = fixed(DiskSize::gib(10), "/");
        root.encryption_password = Some("s3cr3t".to_string());
        root.bootable = true;
        let result = materialize(&original, &[root]).unwrap();

        let part = result.devicegraph.partition("/dev/sda1").unwrap();
        assert!(part.boot);
        let enc = part.encryption.as_ref().unwrap();
        assert_eq!(enc.name, "cr_sda1");
        assert_eq!(
            enc.filesystem.as_ref().map(|fs| fs.fs_type),
            Some(FilesystemType::Ext4)
        );
        assert!(part.filesystem.is_none());
    }

    #[test]
    fn logical_partitions_follow_the_extended_one() {
        let original = graph(vec![disk_with_table(
            "/dev/sda",
            DiskSize::gib(50),
            PtableType::Msdos,
            vec![],
        )]);
        let planned: Vec<_> = (0..5)
            .map(|i| fixed(DiskSize::gib(2), &format!("/data{}", i)))
            .collect();
        let result = materialize(&original, &planned).unwrap();

        let names: Vec<_> = result.devices_map.values().cloned().collect();
        assert_eq!(
            names,
            vec!["/dev/sda1", "/dev/sda2", "/dev/sda3", "/dev/sda5", "/dev/sda6"]
        );
        let table = result.devicegraph.disk("/dev/sda").unwrap().partition_table().unwrap();
        let ext = table.extended().unwrap();
        assert_eq!(ext.number, 4);
        for logical in table.logicals() {
            assert!(logical.start > ext.start && logical.end() <= ext.end());
        }
    }

    #[test]
    fn reused_partition_keeps_its_filesystem() {
        let original = graph(vec![disk_with_table(
            "/dev/sda",
            DiskSize::gib(50),
            PtableType::Gpt,
            vec![formatted(
                partition("/dev/sda", 1, DiskSize::mib(1), DiskSize::gib(20)),
                FilesystemType::Xfs,
                Some("data"),
            )],
        )]);
        let mut home = fixed(DiskSize::gib(1), "/home");
        home.reuse = Some("/dev/sda1".to_string());
        let planned = vec![home, fixed(DiskSize::gib(10), "/")];
        let result = materialize(&original, &planned).unwrap();

        let reused = result.devicegraph.partition("/dev/sda1").unwrap();
        let fs = reused.filesystem().unwrap();
        assert_eq!(fs.fs_type, FilesystemType::Xfs);
        assert_eq!(fs.label.as_deref(), Some("data"));
        assert_eq!(fs.mount_point.as_deref(), Some("/home"));
        assert_eq!(result.devices_map[&1], "/dev/sda2");
    }

    #[test]
    fn reformat_replaces_the_filesystem() {
        let original = graph(vec![disk_with_table(
            "/dev/sda",
            DiskSize::gib(50),
            PtableType::Gpt,
            vec![formatted(
                partition("/dev/sda", 1, DiskSize::mib(1), DiskSize::gib(20)),
                FilesystemType::Xfs,
                Some("data"),
            )],
        )]);
        let mut root = fixed(DiskSize::gib(1), "/");
        root.reuse = Some("/dev/sda1".to_string());
        root.reformat = true;
        let result = materialize(&original, &[root]).unwrap();

        let fs = result.devicegraph.partition("/dev/sda1").unwrap().filesystem().unwrap();
        assert_eq!(fs.fs_type, FilesystemType::Ext4);
        assert_eq!(fs.label, None);
    }

    #[test]
    fn missing_reuse_target_is_an_error() {
        let original = graph(vec![Disk::new("/dev/sda", DiskSize::gib(50))]);
        let mut root = fixed(DiskSize::gib(1), "/");
        root.reuse = Some("/dev/sda7".to_string());
        let result = materialize(&original, &[root]);
        assert!(matches!(result, Err(LayoutixError::MissingReuseTarget(_))));
    }
}
