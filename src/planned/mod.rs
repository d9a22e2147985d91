//! Planned devices
//!
//! A planned device describes something that should exist once planning is
//! done, whether it gets created or an existing device is reused. Planned
//! devices are built once per planning run and only read afterwards.

pub mod lvm;
pub mod partition;

pub use lvm::{PlannedLogicalVolume, PlannedVolumeGroup};
pub use partition::PlannedPartition;

use crate::disk::graph::BlkDevice;
use crate::disk::size::DiskSize;
use crate::disk::types::FilesystemType;
use serde::Serialize;

/// Size constraints of a planned device
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sizing {
    pub min_size: DiskSize,
    pub max_size: DiskSize,
    /// Share of the extra space this device takes when growing
    pub weight: f64,
}

impl Sizing {
    pub fn new(min_size: DiskSize, max_size: DiskSize) -> Self {
        Self {
            min_size,
            max_size,
            weight: 1.0,
        }
    }

    pub fn fixed(size: DiskSize) -> Self {
        Self::new(size, size)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.min_size == self.max_size
    }
}

impl Default for Sizing {
    fn default() -> Self {
        Self::new(DiskSize::zero(), DiskSize::unlimited())
    }
}

/// What should end up on a planned block device
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormatIntent {
    pub filesystem: Option<FilesystemType>,
    pub label: Option<String>,
    pub mount_point: Option<String>,
}

impl FormatIntent {
    pub fn new(filesystem: FilesystemType, mount_point: Option<&str>) -> Self {
        Self {
            filesystem: Some(filesystem),
            label: None,
            mount_point: mount_point.map(str::to_string),
        }
    }

    pub fn mounts(&self, path: &str) -> bool {
        self.mount_point.as_deref() == Some(path)
    }

    /// Create encryption and filesystem on a freshly created device
    pub fn apply_to<D: BlkDevice + ?Sized>(&self, device: &mut D, password: Option<&str>) {
        if let Some(password) = password {
            device.create_encryption(Some(password.to_string()));
        }
        if let Some(fs_type) = self.filesystem {
            let fs = device.create_filesystem(fs_type);
            fs.label = self.label.clone();
            fs.mount_point = self.mount_point.clone();
        }
    }

    /// Update a reused device: reformat it, or only mount what is there
    pub fn apply_to_reused<D: BlkDevice + ?Sized>(
        &self,
        device: &mut D,
        password: Option<&str>,
        reformat: bool,
    ) {
        if reformat {
            device.remove_descendants();
            self.apply_to(device, password);
        } else if let Some(fs) = device.filesystem_mut() {
            if self.mount_point.is_some() {
                fs.mount_point = self.mount_point.clone();
            }
        }
    }
}

/// One entry of the planner output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "device", rename_all = "snake_case")]
pub enum PlannedDevice {
    Partition(PlannedPartition),
    VolumeGroup(PlannedVolumeGroup),
}

impl PlannedDevice {
    pub fn as_partition(&self) -> Option<&PlannedPartition> {
        match self {
            Self::Partition(p) => Some(p),
            Self::VolumeGroup(_) => None,
        }
    }

    pub fn as_volume_group(&self) -> Option<&PlannedVolumeGroup> {
        match self {
            Self::VolumeGroup(vg) => Some(vg),
            Self::Partition(_) => None,
        }
    }

    /// Whether this device, or one of its logical volumes, mounts `path`
    pub fn mounts(&self, path: &str) -> bool {
        match self {
            Self::Partition(p) => p.format.mounts(path),
            Self::VolumeGroup(vg) => vg.lvs.iter().any(|lv| lv.format.mounts(path)),
        }
    }
}

/// Resolve sizes for devices sharing `space`.
///
/// Every device starts at its minimum (rounded up to `rounding` when the
/// maximum allows it). Extra space is then handed out in multiples of
/// `rounding`, proportionally to the weights, never past a maximum. Space a
/// capped device cannot absorb goes to the others on the next round. Ties
/// follow the order of `sizings`.
pub fn distribute_space(sizings: &[Sizing], space: DiskSize, rounding: DiskSize) -> Vec<DiskSize> {
    let rounding = if rounding.is_zero() || rounding.is_unlimited() {
        DiskSize::b(1)
    } else {
        rounding
    };
    let mut sizes: Vec<DiskSize> = sizings
        .iter()
        .map(|s| {
            let rounded = s.min_size.ceil(rounding);
            if rounded <= s.max_size {
                rounded
            } else {
                s.min_size
            }
        })
        .collect();

    let used: DiskSize = sizes.iter().sum();
    let mut extra = space - used;

    loop {
        let growable: Vec<usize> = (0..sizings.len())
            .filter(|&i| (sizings[i].max_size - sizes[i]) >= rounding)
            .collect();
        if growable.is_empty() || extra.is_zero() || extra < rounding {
            break;
        }

        let total_weight: f64 = growable.iter().map(|&i| sizings[i].weight.max(0.0)).sum();
        let extra_bytes = extra.saturating_bytes() as f64;
        let mut distributed = DiskSize::zero();

        for &i in &growable {
            let share = if total_weight > 0.0 {
                extra_bytes * sizings[i].weight.max(0.0) / total_weight
            } else {
                extra_bytes / growable.len() as f64
            };
            let share = DiskSize::b(share as u64).floor(rounding);
            let room = (sizings[i].max_size - sizes[i]).floor(rounding);
            let grow = share.min(room);
            sizes[i] += grow;
            distributed += grow;
        }

        if distributed.is_zero() {
            // Shares too small to round: hand out single units in order
            let weighted: Vec<usize> = growable
                .iter()
                .copied()
                .filter(|&i| sizings[i].weight > 0.0)
                .collect();
            let receivers = if weighted.is_empty() { growable } else { weighted };
            for i in receivers {
                if extra - distributed < rounding {
                    break;
                }
                sizes[i] += rounding;
                distributed += rounding;
            }
        }

        extra -= distributed;
    }

    sizes
}
