//! Distribution of planned partitions over free regions
//!
//! Sets of candidate regions are tried from the smallest up. For each set the
//! placements of the planned partitions, biggest first, are explored depth
//! first, skipping placements that only swap identical partitions or
//! identical empty regions. A placement is feasible when the
//! minimum sizes fit each region and each disk has enough partition slots
//! (an extended partition is synthesized on MS-DOS tables when primaries run
//! out). The best feasible placement uses the fewest regions, then leaves
//! the least space unused, then uses the lowest regions.

use crate::disk::free_space::{FreeSpace, Region};
use crate::disk::size::DiskSize;
use crate::disk::types::{PartitionType, MSDOS_MAX_LOGICAL};
use crate::planned::{distribute_space, PlannedPartition, Sizing};
use crate::utils::error::{LayoutixError, Result};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// A planned partition with its final place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedPartition {
    /// Index in the planned partition list given to [`best_distribution`]
    pub planned_index: usize,
    pub partition_type: PartitionType,
    pub start: DiskSize,
    pub size: DiskSize,
}

/// A free region and what goes into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedSpace {
    pub free_space: FreeSpace,
    pub partitions: Vec<AssignedPartition>,
    /// Extended partition to create before the logical ones
    pub extended: Option<Region>,
}

impl AssignedSpace {
    pub fn disk_name(&self) -> &str {
        &self.free_space.disk_name
    }

    pub fn used(&self) -> DiskSize {
        self.partitions.iter().map(|p| p.size).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    /// Ordered by disk name and start
    pub spaces: Vec<AssignedSpace>,
}

impl Distribution {
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn assigned(&self, planned_index: usize) -> Option<(&AssignedSpace, &AssignedPartition)> {
        self.spaces.iter().find_map(|space| {
            space
                .partitions
                .iter()
                .find(|p| p.planned_index == planned_index)
                .map(|p| (space, p))
        })
    }

    pub fn partition_count(&self) -> usize {
        self.spaces.iter().map(|s| s.partitions.len()).sum()
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for space in &self.spaces {
            writeln!(f, "{}", space.free_space)?;
            if let Some(ext) = &space.extended {
                writeln!(f, "  extended {}", ext)?;
            }
            for part in &space.partitions {
                writeln!(
                    f,
                    "  #{} {} {} at {}",
                    part.planned_index, part.partition_type, part.size, part.start
                )?;
            }
        }
        Ok(())
    }
}

/// Ranking of a feasible placement, smaller is better
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    regions: usize,
    unused: DiskSize,
    offsets: Vec<usize>,
}

/// Space a partition takes in a region before growing
fn footprint(sizing: &Sizing, grain: DiskSize) -> DiskSize {
    sizing.min_size.ceil(grain)
}

/// Logical partitions need room for their EBR
fn overhead(space: &FreeSpace) -> DiskSize {
    if space.inside_extended {
        space.grain
    } else {
        DiskSize::zero()
    }
}

struct Search<'a> {
    planned: &'a [PlannedPartition],
    spaces: &'a [FreeSpace],
    /// Planned indices in search order, biggest first
    pending: Vec<usize>,
    candidates: Vec<Vec<usize>>,
    /// Regions of the set being tried
    allowed: Vec<bool>,
    set_size: usize,
    used: usize,
    assignment: Vec<usize>,
    load: Vec<DiskSize>,
    members: Vec<usize>,
    best: Option<(Score, Vec<AssignedSpace>)>,
}

impl<'a> Search<'a> {
    /// Try every set of `left` more regions taken from `usable[from..]`
    fn choose(&mut self, usable: &[usize], from: usize, left: usize) {
        if left == 0 {
            if self.set_can_hold() {
                self.visit(0);
            }
            return;
        }
        for i in from..=usable.len() - left {
            self.allowed[usable[i]] = true;
            self.choose(usable, i + 1, left - 1);
            self.allowed[usable[i]] = false;
        }
    }

    /// Cheap rejection of a region set before searching assignments
    fn set_can_hold(&self) -> bool {
        let every_partition_fits = self
            .candidates
            .iter()
            .all(|found| found.iter().any(|&s| self.allowed[s]));
        if !every_partition_fits {
            return false;
        }
        let capacity: DiskSize = (0..self.spaces.len())
            .filter(|&s| self.allowed[s])
            .map(|s| self.spaces[s].length())
            .sum();
        let needed: DiskSize = self.pending.iter().map(|&i| self.planned[i].min_size()).sum();
        needed <= capacity
    }

    /// Same constraints, so swapping both partitions changes nothing
    fn interchangeable(&self, a: usize, b: usize) -> bool {
        let (a, b) = (&self.planned[self.pending[a]], &self.planned[self.pending[b]]);
        a.sizing == b.sizing && a.disk == b.disk
    }

    /// Empty regions that give the same result whichever one is picked.
    /// Tables with extended partitions are left out, the last region of
    /// such a disk is special.
    fn twin_key(&self, s: usize) -> Option<(&'a str, DiskSize, DiskSize, bool)> {
        let spaces: &'a [FreeSpace] = self.spaces;
        let space = &spaces[s];
        if self.members[s] > 0 || space.slots.ptable_type.extended_possible() {
            return None;
        }
        Some((space.disk_name.as_str(), space.length(), space.grain, space.inside_extended))
    }

    fn visit(&mut self, pos: usize) {
        // every region of the set must get a partition
        if self.pending.len() - pos < self.set_size - self.used {
            return;
        }
        if pos == self.pending.len() {
            if let Some((score, spaces)) = self.evaluate() {
                let better = self.best.as_ref().is_none_or(|(best, _)| score < *best);
                if better {
                    self.best = Some((score, spaces));
                }
            }
            return;
        }

        let lowest = if pos > 0 && self.interchangeable(pos - 1, pos) {
            self.assignment[pos - 1]
        } else {
            0
        };
        let planned = &self.planned[self.pending[pos]];
        let mut tried = Vec::new();
        for c in 0..self.candidates[pos].len() {
            let s = self.candidates[pos][c];
            if !self.allowed[s] || s < lowest {
                continue;
            }
            let space = &self.spaces[s];
            let need = footprint(&planned.sizing, space.grain) + overhead(space);
            let load = self.load[s] + need;
            if load > space.length() {
                continue;
            }
            if let Some(key) = self.twin_key(s) {
                if tried.contains(&key) {
                    continue;
                }
                tried.push(key);
            }
            let previous = self.load[s];
            self.load[s] = load;
            self.members[s] += 1;
            if self.members[s] == 1 {
                self.used += 1;
            }
            self.assignment.push(s);
            self.visit(pos + 1);
            self.assignment.pop();
            if self.members[s] == 1 {
                self.used -= 1;
            }
            self.members[s] -= 1;
            self.load[s] = previous;
        }
    }

    /// Check partition slots and resolve sizes for the current assignment
    fn evaluate(&self) -> Option<(Score, Vec<AssignedSpace>)> {
        let mut by_space: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (pos, &s) in self.assignment.iter().enumerate() {
            by_space.entry(s).or_default().push(self.pending[pos]);
        }
        for members in by_space.values_mut() {
            members.sort_unstable();
        }

        let mut by_disk: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for &s in by_space.keys() {
            by_disk
                .entry(self.spaces[s].disk_name.as_str())
                .or_default()
                .push(s);
        }

        let mut result = Vec::new();
        let mut unused = DiskSize::zero();

        for space_ids in by_disk.values_mut() {
            space_ids.sort_by_key(|&s| self.spaces[s].start());
            let slots = self.spaces[space_ids[0]].slots;

            let (inner, top): (Vec<usize>, Vec<usize>) = space_ids
                .iter()
                .copied()
                .partition(|&s| self.spaces[s].inside_extended);
            let count = |ids: &[usize]| -> u32 { ids.iter().map(|s| by_space[s].len() as u32).sum() };

            if count(&inner) > slots.free_logical {
                return None;
            }

            // Number of primaries per top level region; the rest are logical
            let mut primaries: BTreeMap<usize, usize> = top.iter().map(|&s| (s, by_space[&s].len())).collect();
            let mut new_extended = None;
            let top_count = count(&top);
            if top_count > slots.free_primary {
                let can_extend = slots.ptable_type.extended_possible()
                    && !slots.has_extended
                    && slots.free_primary >= 1;
                if !can_extend {
                    return None;
                }
                let last = *top.last()?;
                let primaries_left = slots.free_primary - 1;
                let before_last = top_count - by_space[&last].len() as u32;
                if before_last > primaries_left {
                    return None;
                }
                let primary_in_last = (primaries_left - before_last) as usize;
                let logical_in_last = by_space[&last].len() - primary_in_last;
                if logical_in_last as u32 > MSDOS_MAX_LOGICAL {
                    return None;
                }
                primaries.insert(last, primary_in_last);
                new_extended = Some(last);
            }

            for &s in space_ids.iter() {
                let members = &by_space[&s];
                let n_primary = if self.spaces[s].inside_extended {
                    0
                } else {
                    primaries.get(&s).copied().unwrap_or(members.len())
                };
                let assigned = self.layout(s, members, n_primary, new_extended == Some(s))?;
                let space = &self.spaces[s];
                let taken: DiskSize = assigned.partitions.iter().map(|p| p.size.ceil(space.grain)).sum();
                unused += space.length() - taken - space.grain * (members.len() - n_primary) as u64;
                result.push(assigned);
            }
        }

        result.sort_by(|a, b| {
            (a.disk_name(), a.free_space.start()).cmp(&(b.disk_name(), b.free_space.start()))
        });
        let score = Score {
            regions: by_space.len(),
            unused,
            offsets: by_space.keys().copied().collect(),
        };
        Some((score, result))
    }

    /// Place `members` in one region: primaries first, then logicals each
    /// preceded by one grain of EBR
    fn layout(
        &self,
        s: usize,
        members: &[usize],
        n_primary: usize,
        new_extended: bool,
    ) -> Option<AssignedSpace> {
        let space = &self.spaces[s];
        let grain = space.grain;
        let logical_count = members.len() - n_primary;

        let sizings: Vec<Sizing> = members.iter().map(|&i| self.planned[i].sizing).collect();
        let footprints: DiskSize = sizings.iter().map(|s| footprint(s, grain)).sum();
        let initial: DiskSize = distribute_space(&sizings, DiskSize::zero(), grain).iter().sum();
        let reserved = grain * logical_count as u64;
        if footprints + reserved > space.length() {
            return None;
        }
        let padding = footprints - initial;
        let available = space.length() - reserved - padding;
        let sizes = distribute_space(&sizings, available, grain);

        let mut cursor = space.start();
        let mut extended = None;
        let mut partitions = Vec::with_capacity(members.len());
        for (n, (&planned_index, &size)) in members.iter().zip(sizes.iter()).enumerate() {
            let partition_type = if n < n_primary {
                PartitionType::Primary
            } else {
                if new_extended && extended.is_none() {
                    extended = Some(Region::new(cursor, space.region.end() - cursor));
                }
                cursor += grain;
                PartitionType::Logical
            };
            partitions.push(AssignedPartition {
                planned_index,
                partition_type,
                start: cursor,
                size,
            });
            cursor += size.ceil(grain);
        }

        if cursor > space.region.end() {
            return None;
        }
        Some(AssignedSpace {
            free_space: space.clone(),
            partitions,
            extended,
        })
    }
}

/// Find the best placement of the planned partitions that are not reused
pub fn best_distribution(planned: &[PlannedPartition], spaces: &[FreeSpace]) -> Result<Distribution> {
    let mut pending: Vec<usize> = planned
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_reused())
        .map(|(i, _)| i)
        .collect();
    pending.sort_by(|&a, &b| {
        let (a, b) = (&planned[a], &planned[b]);
        b.min_size()
            .cmp(&a.min_size())
            .then(a.max_size().cmp(&b.max_size()))
            .then(a.disk.cmp(&b.disk))
    });
    if pending.is_empty() {
        debug!("Nothing to distribute");
        return Ok(Distribution::default());
    }

    let mut candidates = Vec::with_capacity(pending.len());
    for &i in &pending {
        let part = &planned[i];
        let found: Vec<usize> = spaces
            .iter()
            .enumerate()
            .filter(|(_, space)| part.disk.as_deref().is_none_or(|d| d == space.disk_name))
            .filter(|(_, space)| footprint(&part.sizing, space.grain) + overhead(space) <= space.length())
            .map(|(s, _)| s)
            .collect();
        if found.is_empty() {
            return Err(LayoutixError::NoDistribution(format!(
                "no free region on {} can hold {} for {}",
                part.disk.as_deref().unwrap_or("any disk"),
                part.min_size(),
                part.format.mount_point.as_deref().unwrap_or("a partition"),
            )));
        }
        debug!("Planned partition #{} fits in {} region(s)", i, found.len());
        candidates.push(found);
    }

    let mut usable: Vec<usize> = candidates.iter().flatten().copied().collect();
    usable.sort_unstable();
    usable.dedup();

    let mut search = Search {
        planned,
        spaces,
        pending,
        candidates,
        allowed: vec![false; spaces.len()],
        set_size: 0,
        used: 0,
        assignment: Vec::new(),
        load: vec![DiskSize::zero(); spaces.len()],
        members: vec![0; spaces.len()],
        best: None,
    };
    for set_size in 1..=search.pending.len().min(usable.len()) {
        search.set_size = set_size;
        search.choose(&usable, 0, set_size);
        if search.best.is_some() {
            break;
        }
        debug!("No placement in {} region(s)", set_size);
    }

    match search.best {
        Some((score, result)) => {
            let distribution = Distribution { spaces: result };
            info!(
                "Distribution uses {} region(s), {} left unused",
                score.regions, score.unused
            );
            debug!("Distribution:\n{}", distribution);
            Ok(distribution)
        }
        None => Err(LayoutixError::NoDistribution(
            "the planned partitions do not fit in the free space".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::graph::Disk;
    use crate::disk::types::{FilesystemType, PtableType};
    use crate::testing::{disk_with_table, partition};

    fn fixed(size: DiskSize, mount: &str) -> PlannedPartition {
        PlannedPartition::new(size, size).with_mount(FilesystemType::Ext4, mount)
    }

    fn empty_disk(name: &str, size: DiskSize, ptable: PtableType) -> Disk {
        disk_with_table(name, size, ptable, vec![])
    }

    #[test]
    fn single_partition_starts_at_the_first_grain() {
        let disk = empty_disk("/dev/sda", DiskSize::gib(50), PtableType::Gpt);
        let planned = vec![fixed(DiskSize::gib(10), "/")];
        let dist = best_distribution(&planned, &disk.free_spaces()).unwrap();
        let (_, part) = dist.assigned(0).unwrap();
        assert_eq!(part.start, DiskSize::mib(1));
        assert_eq!(part.size, DiskSize::gib(10));
        assert_eq!(part.partition_type, PartitionType::Primary);
    }

    #[test]
    fn partitions_share_one_region_when_possible() {
        let disk = disk_with_table(
            "/dev/sda",
            DiskSize::gib(50),
            PtableType::Gpt,
            vec![partition("/dev/sda", 1, DiskSize::gib(20), DiskSize::gib(1))],
        );
        let planned = vec![fixed(DiskSize::gib(5), "/"), fixed(DiskSize::gib(5), "/home")];
        let dist = best_distribution(&planned, &disk.free_spaces()).unwrap();
        assert_eq!(dist.spaces.len(), 1);
        assert_eq!(dist.partition_count(), 2);
    }

    #[test]
    fn tighter_region_is_preferred() {
        let disk = disk_with_table(
            "/dev/sda",
            DiskSize::gib(50),
            PtableType::Gpt,
            vec![partition(
                "/dev/sda",
                1,
                DiskSize::gib(20),
                DiskSize::gib(20) - DiskSize::mib(1),
            )],
        );
        // Regions: ~20 GiB at 1 MiB and ~10 GiB at 40 GiB - 1 MiB
        let planned = vec![fixed(DiskSize::gib(8), "/")];
        let dist = best_distribution(&planned, &disk.free_spaces()).unwrap();
        assert!(dist.spaces[0].free_space.start() > DiskSize::gib(30));
    }

    #[test]
    fn growing_partition_fills_the_region() {
        let disk = empty_disk("/dev/sda", DiskSize::gib(50), PtableType::Gpt);
        let planned = vec![
            fixed(DiskSize::gib(10), "/"),
            PlannedPartition::new(DiskSize::gib(1), DiskSize::unlimited())
                .with_mount(FilesystemType::Xfs, "/home"),
        ];
        let spaces = disk.free_spaces();
        let dist = best_distribution(&planned, &spaces).unwrap();
        let (_, home) = dist.assigned(1).unwrap();
        assert_eq!(home.size, spaces[0].length() - DiskSize::gib(10));
        assert_eq!(home.start, DiskSize::gib(10) + DiskSize::mib(1));
        assert!(dist.spaces[0].used() <= spaces[0].length());
    }

    #[test]
    fn disk_affinity_is_honoured() {
        let sda = empty_disk("/dev/sda", DiskSize::gib(50), PtableType::Gpt);
        let sdb = empty_disk("/dev/sdb", DiskSize::gib(50), PtableType::Gpt);
        let mut spaces = sda.free_spaces();
        spaces.extend(sdb.free_spaces());
        let planned = vec![fixed(DiskSize::gib(10), "/").on_disk("/dev/sdb")];
        let dist = best_distribution(&planned, &spaces).unwrap();
        assert_eq!(dist.spaces[0].disk_name(), "/dev/sdb");
    }

    #[test]
    fn lowest_region_wins_ties() {
        let sda = empty_disk("/dev/sda", DiskSize::gib(50), PtableType::Gpt);
        let sdb = empty_disk("/dev/sdb", DiskSize::gib(50), PtableType::Gpt);
        let mut spaces = sda.free_spaces();
        spaces.extend(sdb.free_spaces());
        let planned = vec![fixed(DiskSize::gib(10), "/")];
        let dist = best_distribution(&planned, &spaces).unwrap();
        assert_eq!(dist.spaces[0].disk_name(), "/dev/sda");
    }

    #[test]
    fn msdos_overflow_synthesizes_an_extended_partition() {
        let disk = empty_disk("/dev/sda", DiskSize::gib(50), PtableType::Msdos);
        let planned: Vec<_> = (0..5)
            .map(|i| fixed(DiskSize::gib(2), &format!("/data{}", i)))
            .collect();
        let dist = best_distribution(&planned, &disk.free_spaces()).unwrap();
        let space = &dist.spaces[0];
        let types: Vec<_> = space.partitions.iter().map(|p| p.partition_type).collect();
        assert_eq!(
            types,
            vec![
                PartitionType::Primary,
                PartitionType::Primary,
                PartitionType::Primary,
                PartitionType::Logical,
                PartitionType::Logical,
            ]
        );
        let ext = space.extended.unwrap();
        assert_eq!(ext.start, DiskSize::mib(1) + DiskSize::gib(6));
        assert_eq!(space.partitions[3].start, ext.start + DiskSize::mib(1));
        assert_eq!(space.partitions[4].start, space.partitions[3].start + DiskSize::gib(2) + DiskSize::mib(1));
    }

    #[test]
    fn full_disk_is_skipped_for_any_disk_partitions() {
        let sda = disk_with_table(
            "/dev/sda",
            DiskSize::gib(50),
            PtableType::Gpt,
            vec![partition("/dev/sda", 1, DiskSize::mib(1), DiskSize::gib(50) - DiskSize::mib(2))],
        );
        let sdb = empty_disk("/dev/sdb", DiskSize::gib(50), PtableType::Gpt);
        let mut spaces = sda.free_spaces();
        spaces.extend(sdb.free_spaces());
        let planned = vec![fixed(DiskSize::gib(10), "/")];
        let dist = best_distribution(&planned, &spaces).unwrap();
        assert_eq!(dist.spaces.len(), 1);
        assert_eq!(dist.spaces[0].disk_name(), "/dev/sdb");
    }

    #[test]
    fn many_small_gaps_are_searched_quickly() {
        // 1 GiB gaps between 1 GiB partitions, each gap holds one 700 MiB partition
        let used: Vec<_> = (0..13u32)
            .map(|i| partition("/dev/sda", i + 1, DiskSize::gib(2 * i as u64 + 1), DiskSize::gib(1)))
            .collect();
        let disk = disk_with_table("/dev/sda", DiskSize::gib(28), PtableType::Gpt, used);
        let spaces = disk.free_spaces();
        assert!(spaces.len() >= 13);
        let planned: Vec<_> = (0..8)
            .map(|i| fixed(DiskSize::mib(700), &format!("/data{}", i)))
            .collect();

        let started = std::time::Instant::now();
        let dist = best_distribution(&planned, &spaces).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(dist.spaces.len(), 8);
        assert_eq!(dist.partition_count(), 8);
        assert!(dist.spaces.iter().all(|space| space.partitions.len() == 1));
    }

    #[test]
    fn identical_partitions_keep_planning_order_in_a_region() {
        let disk = empty_disk("/dev/sda", DiskSize::gib(20), PtableType::Gpt);
        let planned: Vec<_> = (0..3)
            .map(|i| fixed(DiskSize::gib(2), &format!("/data{}", i)))
            .collect();
        let dist = best_distribution(&planned, &disk.free_spaces()).unwrap();
        let order: Vec<_> = dist.spaces[0].partitions.iter().map(|p| p.planned_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn dasd_slots_limit_the_partition_count() {
        let disk = empty_disk("/dev/dasda", DiskSize::gib(50), PtableType::Dasd);
        let planned: Vec<_> = (0..4)
            .map(|i| fixed(DiskSize::gib(1), &format!("/data{}", i)))
            .collect();
        let result = best_distribution(&planned, &disk.free_spaces());
        assert!(matches!(result, Err(LayoutixError::NoDistribution(_))));
    }

    #[test]
    fn too_big_partition_fails() {
        let disk = empty_disk("/dev/sda", DiskSize::gib(5), PtableType::Gpt);
        let planned = vec![fixed(DiskSize::gib(10), "/")];
        let result = best_distribution(&planned, &disk.free_spaces());
        assert!(matches!(result, Err(LayoutixError::NoDistribution(_))));
    }

    #[test]
    fn combined_minimums_must_fit() {
        let disk = empty_disk("/dev/sda", DiskSize::gib(10), PtableType::Gpt);
        let planned = vec![fixed(DiskSize::gib(6), "/"), fixed(DiskSize::gib(6), "/home")];
        assert!(best_distribution(&planned, &disk.free_spaces()).is_err());
    }

    #[test]
    fn reused_partitions_are_not_placed() {
        let disk = empty_disk("/dev/sda", DiskSize::gib(10), PtableType::Gpt);
        let mut reused = fixed(DiskSize::gib(100), "/home");
        reused.reuse = Some("/dev/sda1".to_string());
        let planned = vec![reused, fixed(DiskSize::gib(5), "/")];
        let dist = best_distribution(&planned, &disk.free_spaces()).unwrap();
        assert_eq!(dist.partition_count(), 1);
        assert!(dist.assigned(0).is_none());
        assert!(dist.assigned(1).is_some());
    }

    #[test]
    fn results_are_deterministic() {
        let sda = empty_disk("/dev/sda", DiskSize::gib(30), PtableType::Gpt);
        let sdb = empty_disk("/dev/sdb", DiskSize::gib(30), PtableType::Msdos);
        let mut spaces = sda.free_spaces();
        spaces.extend(sdb.free_spaces());
        let planned = vec![
            fixed(DiskSize::gib(20), "/"),
            fixed(DiskSize::gib(20), "/home"),
            PlannedPartition::new(DiskSize::gib(1), DiskSize::gib(4)),
        ];
        let first = best_distribution(&planned, &spaces).unwrap();
        let second = best_distribution(&planned, &spaces).unwrap();
        assert_eq!(first, second);
    }
}
