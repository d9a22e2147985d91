//! Storage proposal driven by an installation profile
//!
//! [`AutoinstProposal`] plans the devices a profile asks for, stops when the
//! plan has fatal problems and otherwise builds the resulting devicegraph.
//! The starting devicegraph is never modified.

pub mod boot;
pub mod devices_creator;
pub mod devices_planner;
pub mod distribution;
pub mod lvm_creator;
pub mod partition_creator;

pub use boot::BootRequirementsChecker;
pub use devices_creator::DevicesCreator;
pub use devices_planner::DevicesPlanner;
pub use distribution::{best_distribution, Distribution};
pub use lvm_creator::LvmCreator;
pub use partition_creator::{CreatorResult, DevicesMap, PartitionCreator};

use crate::config::profile::Profile;
use crate::config::system::SystemInfo;
use crate::disk::graph::Devicegraph;
use crate::planned::{PlannedDevice, PlannedPartition};
use crate::problems::ProblemList;
use crate::utils::error::{LayoutixError, Result};
use tracing::{info, warn};

/// Outcome of a successful proposal
#[derive(Debug, Clone)]
pub struct Proposal {
    pub devicegraph: Devicegraph,
    pub planned_devices: Vec<PlannedDevice>,
    /// Keyed by the index in [`Proposal::planned_partitions`], not in
    /// `planned_devices`
    pub devices_map: DevicesMap,
    /// Non-fatal problems; the affected sections were skipped
    pub problems: ProblemList,
}

impl Proposal {
    /// Planned partitions in the order `devices_map` indexes them
    pub fn planned_partitions(&self) -> Vec<&PlannedPartition> {
        self.planned_devices
            .iter()
            .filter_map(PlannedDevice::as_partition)
            .collect()
    }

    /// Device created or reused for a planned partition
    pub fn device_for(&self, planned: &PlannedPartition) -> Option<&str> {
        self.planned_partitions()
            .iter()
            .position(|p| std::ptr::eq(*p, planned))
            .and_then(|index| self.devices_map.get(&index))
            .map(String::as_str)
    }
}

pub struct AutoinstProposal<'a> {
    devicegraph: &'a Devicegraph,
    system: SystemInfo,
}

impl<'a> AutoinstProposal<'a> {
    pub fn new(devicegraph: &'a Devicegraph, system: SystemInfo) -> Self {
        Self { devicegraph, system }
    }

    /// Planned devices and problems, without creating anything
    pub fn plan(&self, profile: &Profile) -> (Vec<PlannedDevice>, ProblemList) {
        let mut problems = ProblemList::new();
        let planned = DevicesPlanner::new(self.devicegraph, self.system).planned_devices(profile, &mut problems);
        (planned, problems)
    }

    pub fn propose(&self, profile: &Profile) -> Result<Proposal> {
        let (planned_devices, problems) = self.plan(profile);
        if problems.is_fatal() {
            return Err(LayoutixError::FatalProblems(problems));
        }
        for problem in &problems {
            warn!("Continuing despite: {}", problem.message());
        }

        let disk_names = disks_in_use(&planned_devices);
        info!("Creating devices on {}", disk_names.join(", "));
        let result = DevicesCreator::new(self.devicegraph).populated_devicegraph(&planned_devices, &disk_names)?;

        Ok(Proposal {
            devicegraph: result.devicegraph,
            planned_devices,
            devices_map: result.devices_map,
            problems,
        })
    }
}

/// Disks planned partitions go to, in planning order
fn disks_in_use(planned: &[PlannedDevice]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for disk in planned
        .iter()
        .filter_map(PlannedDevice::as_partition)
        .filter_map(|p| p.disk.as_ref())
    {
        if !names.contains(disk) {
            names.push(disk.clone());
        }
    }
    names
}
