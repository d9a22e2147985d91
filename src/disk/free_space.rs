//! Free regions of a disk
//!
//! Regions are computed from the partition table on demand and aligned to
//! the disk grain. Gaps between logical partitions inside an extended
//! partition are reported separately and flagged.

use crate::disk::graph::{Devicegraph, Disk, PartitionTable};
use crate::disk::size::DiskSize;
use crate::disk::types::{PartitionType, PtableType};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Region {
    pub start: DiskSize,
    pub length: DiskSize,
}

impl Region {
    pub fn new(start: DiskSize, length: DiskSize) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> DiskSize {
        self.start + self.length
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.length, self.start)
    }
}

/// Partition table facts a region inherits from its disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtableSlots {
    pub ptable_type: PtableType,
    /// False when the table still has to be created
    pub exists: bool,
    pub free_primary: u32,
    pub has_extended: bool,
    pub free_logical: u32,
}

impl PtableSlots {
    fn of(disk: &Disk) -> Self {
        match disk.partition_table() {
            Some(table) => Self::of_table(table),
            None => {
                let ptable_type = disk.kind.default_ptable_type();
                Self {
                    ptable_type,
                    exists: false,
                    free_primary: ptable_type.max_primary(),
                    has_extended: false,
                    free_logical: 0,
                }
            }
        }
    }

    fn of_table(table: &PartitionTable) -> Self {
        Self {
            ptable_type: table.ptable_type,
            exists: true,
            free_primary: table.free_primary_slots(),
            has_extended: table.extended().is_some(),
            free_logical: table.free_logical_slots(),
        }
    }
}

/// Unused, aligned region of a disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeSpace {
    pub disk_name: String,
    pub region: Region,
    pub grain: DiskSize,
    pub inside_extended: bool,
    pub slots: PtableSlots,
}

impl FreeSpace {
    pub fn start(&self) -> DiskSize {
        self.region.start
    }

    pub fn length(&self) -> DiskSize {
        self.region.length
    }
}

impl fmt::Display for FreeSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.disk_name, self.region)?;
        if self.inside_extended {
            write!(f, " (extended)")?;
        }
        Ok(())
    }
}

/// Gaps in `[start, limit)` not covered by `used`, as (start, end) pairs
fn gaps(start: DiskSize, limit: DiskSize, mut used: Vec<(DiskSize, DiskSize)>) -> Vec<(DiskSize, DiskSize)> {
    let mut free = Vec::new();

    used.sort();
    // Sentinel so the last gap is closed by the fold
    used.push((limit, DiskSize::zero()));

    used.into_iter().fold(start, |prev_end, (used_start, len)| {
        let used_start = used_start.min(limit);
        if prev_end < used_start {
            free.push((prev_end, used_start));
        }
        prev_end.max(used_start + len)
    });

    free
}

fn aligned_regions(
    raw: Vec<(DiskSize, DiskSize)>,
    grain: DiskSize,
    min_length: DiskSize,
) -> impl Iterator<Item = Region> {
    raw.into_iter().filter_map(move |(start, end)| {
        let start = start.ceil(grain);
        let end = end.floor(grain);
        let length = end.checked_sub(start)?;
        (length >= min_length).then_some(Region::new(start, length))
    })
}

impl Disk {
    /// Free regions of the disk, ordered by start
    pub fn free_spaces(&self) -> Vec<FreeSpace> {
        let grain = self.min_grain;
        let slots = PtableSlots::of(self);
        let make = |region: Region, inside_extended: bool| FreeSpace {
            disk_name: self.name.clone(),
            region,
            grain,
            inside_extended,
            slots,
        };

        let top_level: Vec<_> = self
            .partitions()
            .filter(|p| p.partition_type != PartitionType::Logical)
            .map(|p| (p.start, p.size))
            .collect();
        let mut spaces: Vec<FreeSpace> =
            aligned_regions(gaps(self.usable_start(), self.usable_end(), top_level), grain, grain)
                .map(|r| make(r, false))
                .collect();

        if let Some(ext) = self.partition_table().and_then(|t| t.extended()) {
            let logicals: Vec<_> = self
                .partitions()
                .filter(|p| p.partition_type == PartitionType::Logical)
                .map(|p| (p.start, p.size))
                .collect();
            // A logical partition needs one more grain for its EBR
            spaces.extend(
                aligned_regions(gaps(ext.start, ext.end(), logicals), grain, grain * 2)
                    .map(|r| make(r, true)),
            );
        }

        spaces.sort_by_key(|s| s.region.start);
        spaces
    }
}

impl Devicegraph {
    /// Free regions of one disk; empty when the disk does not exist
    pub fn free_spaces(&self, disk_name: &str) -> Vec<FreeSpace> {
        self.disk(disk_name)
            .map(|d| d.free_spaces())
            .unwrap_or_default()
    }

    /// Free regions of several disks, in the order the names are given
    pub fn free_spaces_of(&self, disk_names: &[String]) -> Vec<FreeSpace> {
        disk_names
            .iter()
            .flat_map(|name| self.free_spaces(name))
            .collect()
    }
}
