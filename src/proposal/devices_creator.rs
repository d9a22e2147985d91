//! Pipeline from planned devices to a populated devicegraph
//!
//! Distribution, partition creation and then one LVM creator run per planned
//! volume group, each stage working on the devicegraph the previous one
//! returned.

use crate::disk::graph::Devicegraph;
use crate::planned::{PlannedDevice, PlannedPartition};
use crate::proposal::distribution::best_distribution;
use crate::proposal::lvm_creator::LvmCreator;
use crate::proposal::partition_creator::{CreatorResult, DevicesMap, PartitionCreator};
use crate::utils::error::Result;
use tracing::info;

pub struct DevicesCreator<'a> {
    original: &'a Devicegraph,
}

impl<'a> DevicesCreator<'a> {
    pub fn new(original: &'a Devicegraph) -> Self {
        Self { original }
    }

    /// Create the planned devices on the given disks. The devices map is
    /// keyed by the index of each partition within the planned partitions.
    pub fn populated_devicegraph(&self, planned: &[PlannedDevice], disk_names: &[String]) -> Result<CreatorResult> {
        let partitions: Vec<PlannedPartition> = planned
            .iter()
            .filter_map(PlannedDevice::as_partition)
            .cloned()
            .collect();

        let (reused, created): (Vec<&PlannedPartition>, Vec<&PlannedPartition>) =
            partitions.iter().partition(|p| p.is_reused());
        info!(
            "Partitions to reuse: {:?}",
            reused.iter().filter_map(|p| p.reuse.as_deref()).collect::<Vec<_>>()
        );
        info!("Partitions to create: {}", created.len());

        let spaces = self.original.free_spaces_of(disk_names);
        let distribution = best_distribution(&partitions, &spaces)?;
        info!("Distribution:\n{}", distribution);

        let CreatorResult {
            mut devicegraph,
            devices_map,
        } = PartitionCreator::new(self.original).create_partitions(&partitions, &distribution)?;

        for vg in planned.iter().filter_map(PlannedDevice::as_volume_group) {
            let vg_name = vg.reuse.as_deref().unwrap_or(vg.base_name());
            let pvs = physical_volumes(&partitions, &devices_map, vg_name);
            info!("Volume group {} on {:?}", vg_name, pvs);
            let next = LvmCreator::new(&devicegraph).create_volumes(vg, &pvs)?;
            devicegraph = next;
        }

        Ok(CreatorResult {
            devicegraph,
            devices_map,
        })
    }
}

/// Partitions created or reused for the physical volumes of `vg_name`
fn physical_volumes(partitions: &[PlannedPartition], devices_map: &DevicesMap, vg_name: &str) -> Vec<String> {
    devices_map
        .iter()
        .filter(|(index, _)| {
            partitions
                .get(**index)
                .and_then(|p| p.lvm_volume_group_name.as_deref())
                == Some(vg_name)
        })
        .map(|(_, name)| name.clone())
        .collect()
}
