//! Planned devices from an installation profile
//!
//! Every drive section becomes planned partitions (plain disks) or one
//! planned volume group (LVM drives). Anything the profile gets wrong is
//! recorded in the problem list instead of aborting, so a single run reports
//! every issue.

use crate::config::profile::{DriveSection, DriveType, PartitionSection, Profile, AUTO_DRIVE};
use crate::config::system::SystemInfo;
use crate::disk::graph::{basename, BlkDevice, Devicegraph, Disk, Partition};
use crate::disk::size::DiskSize;
use crate::disk::types::{FilesystemType, PartitionId};
use crate::planned::{
    FormatIntent, PlannedDevice, PlannedLogicalVolume, PlannedPartition, PlannedVolumeGroup, Sizing,
};
use crate::problems::{Problem, ProblemList};
use crate::proposal::boot::BootRequirementsChecker;
use crate::skip_list::SkipList;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:[.,]\d+)?)\s*%$").expect("percent regex is valid"));

/// Smallest logical volume planned for a `max` size
const MIN_LV_SIZE: DiskSize = DiskSize::mib(1);

/// Size expression of a section, before it is related to a disk
#[derive(Debug, Clone, Copy, PartialEq)]
enum SizeExpr {
    Max,
    Percent(f64),
    Fixed(DiskSize),
}

fn parse_size_expr(expr: &str) -> Option<SizeExpr> {
    let expr = expr.trim();
    if expr.is_empty() || expr.eq_ignore_ascii_case("max") {
        return Some(SizeExpr::Max);
    }
    if let Some(caps) = PERCENT_RE.captures(expr) {
        let percent: f64 = caps[1].replace(',', ".").parse().ok()?;
        return (percent > 0.0 && percent <= 100.0).then_some(SizeExpr::Percent(percent));
    }
    match DiskSize::parse(expr, true) {
        Ok(size) if !size.is_unlimited() && !size.is_zero() => Some(SizeExpr::Fixed(size)),
        _ => None,
    }
}

fn section_filesystem(section: &PartitionSection, name: &str) -> Result<Option<FilesystemType>, Problem> {
    let Some(value) = section.filesystem.as_deref() else {
        return Ok(None);
    };
    value.parse::<FilesystemType>().map(Some).map_err(|_| Problem::InvalidValue {
        section: name.to_string(),
        attr: "filesystem".to_string(),
        value: value.to_string(),
        replacement: None,
    })
}

fn section_password(section: &PartitionSection, name: &str, problems: &mut ProblemList) -> Option<String> {
    if !section.crypt_fs {
        return None;
    }
    if section.crypt_key.is_none() {
        problems.add(Problem::MissingValue {
            section: name.to_string(),
            attr: "crypt_key".to_string(),
        });
    }
    section.crypt_key.clone()
}

fn format_intent(section: &PartitionSection, filesystem: Option<FilesystemType>) -> FormatIntent {
    FormatIntent {
        filesystem,
        label: section.label.clone(),
        mount_point: section.mount.clone(),
    }
}

pub struct DevicesPlanner<'a> {
    devicegraph: &'a Devicegraph,
    system: SystemInfo,
}

impl<'a> DevicesPlanner<'a> {
    pub fn new(devicegraph: &'a Devicegraph, system: SystemInfo) -> Self {
        Self { devicegraph, system }
    }

    /// Planned devices for the profile, boot partitions included
    pub fn planned_devices(&self, profile: &Profile, problems: &mut ProblemList) -> Vec<PlannedDevice> {
        let mut result = Vec::new();

        for (drive_name, drive) in &profile.drives {
            match drive.drive_type {
                DriveType::Disk => {
                    let Some(disk) = self.resolve_disk(profile, drive_name, drive) else {
                        problems.add(Problem::NoDisk {
                            drive: drive_name.clone(),
                        });
                        continue;
                    };
                    let partitions = self.planned_for_disk(disk, drive_name, drive, problems);
                    result.extend(partitions.into_iter().map(PlannedDevice::Partition));
                }
                DriveType::Lvm => {
                    let vg = self.planned_for_lvm(drive_name, drive, problems);
                    result.push(PlannedDevice::VolumeGroup(vg));
                }
            }
        }

        if !result.iter().any(|d| d.mounts("/")) {
            problems.add(Problem::MissingRoot);
        }

        let checker = BootRequirementsChecker::new(self.devicegraph, &result, self.system);
        match checker.needed_partitions() {
            Ok(boot) => {
                let boot: Vec<_> = boot.into_iter().map(PlannedDevice::Partition).collect();
                result.extend(boot);
            }
            Err(e) => problems.add(Problem::Exception { message: e.to_string() }),
        }

        info!("Planned {} device(s), {} problem(s)", result.len(), problems.len());
        result
    }

    /// Disk a `CT_DISK` drive refers to; `auto` takes the first disk no
    /// other drive names and the skip list lets through
    fn resolve_disk(&self, profile: &Profile, drive_name: &str, drive: &DriveSection) -> Option<&'a Disk> {
        if drive_name != AUTO_DRIVE {
            return self.devicegraph.disk(drive_name);
        }
        let named: Vec<&str> = profile.named_drives().collect();
        let skip_list = SkipList::from(drive.skip_list.as_slice());
        let disk = self
            .devicegraph
            .disks
            .iter()
            .find(|d| !named.contains(&d.name.as_str()) && !skip_list.matches(d));
        if let Some(disk) = disk {
            debug!("Drive '{}' resolved to {}", AUTO_DRIVE, disk.name);
        }
        disk
    }

    fn planned_for_disk(
        &self,
        disk: &Disk,
        drive_name: &str,
        drive: &DriveSection,
        problems: &mut ProblemList,
    ) -> Vec<PlannedPartition> {
        drive
            .partitions
            .iter()
            .enumerate()
            .filter_map(|(index, section)| {
                let name = format!("{}[{}]", drive_name, index);
                self.planned_partition(disk, section, &name, problems)
            })
            .collect()
    }

    fn planned_partition(
        &self,
        disk: &Disk,
        section: &PartitionSection,
        name: &str,
        problems: &mut ProblemList,
    ) -> Option<PlannedPartition> {
        let filesystem = match section_filesystem(section, name) {
            Ok(fs) => fs,
            Err(problem) => {
                problems.add(problem);
                return None;
            }
        };

        let mut part = if section.create {
            let sizing = self.partition_sizing(disk, section, name, problems);
            PlannedPartition::new(sizing.min_size, sizing.max_size)
        } else {
            let existing = self.partition_to_reuse(disk, section, name, problems)?;
            let mut part = PlannedPartition::new(existing.size, existing.size);
            part.reuse = Some(existing.name.clone());
            part.reformat = section.format.unwrap_or(false);
            part
        };

        part.disk = Some(disk.name.clone());
        part.format = format_intent(section, filesystem);
        part.encryption_password = section_password(section, name, problems);
        part.lvm_volume_group_name = section.lvm_group.clone();
        part.partition_id = self.partition_id(section, filesystem, name, problems);
        Some(part)
    }

    fn partition_sizing(
        &self,
        disk: &Disk,
        section: &PartitionSection,
        name: &str,
        problems: &mut ProblemList,
    ) -> Sizing {
        let value = section.size.as_deref().unwrap_or("");
        let expr = parse_size_expr(value).unwrap_or_else(|| {
            problems.add(Problem::InvalidValue {
                section: name.to_string(),
                attr: "size".to_string(),
                value: value.to_string(),
                replacement: Some("max".to_string()),
            });
            SizeExpr::Max
        });
        match expr {
            SizeExpr::Max => Sizing::new(disk.min_grain, DiskSize::unlimited()),
            SizeExpr::Percent(percent) => Sizing::fixed(disk.size.percent(percent)),
            SizeExpr::Fixed(size) => Sizing::fixed(size),
        }
    }

    /// Existing partition of `disk` a `create = false` section points to,
    /// by number first and by label otherwise
    fn partition_to_reuse<'d>(
        &self,
        disk: &'d Disk,
        section: &PartitionSection,
        name: &str,
        problems: &mut ProblemList,
    ) -> Option<&'d Partition> {
        let found = if let Some(number) = section.partition_nr {
            disk.partitions().find(|p| p.number == number)
        } else if let Some(label) = section.label.as_deref() {
            disk.partitions()
                .find(|p| p.filesystem().and_then(|fs| fs.label.as_deref()) == Some(label))
        } else {
            problems.add(Problem::MissingReuseInfo {
                section: name.to_string(),
            });
            return None;
        };

        if found.is_none() {
            problems.add(Problem::MissingReusableDevice {
                section: name.to_string(),
            });
        }
        found
    }

    fn partition_id(
        &self,
        section: &PartitionSection,
        filesystem: Option<FilesystemType>,
        name: &str,
        problems: &mut ProblemList,
    ) -> PartitionId {
        let default = if section.lvm_group.is_some() {
            PartitionId::Lvm
        } else if filesystem == Some(FilesystemType::Swap) {
            PartitionId::Swap
        } else {
            PartitionId::Linux
        };

        let Some(code) = section.partition_id else {
            return default;
        };
        PartitionId::from_code(code).unwrap_or_else(|| {
            problems.add(Problem::InvalidValue {
                section: name.to_string(),
                attr: "partition_id".to_string(),
                value: code.to_string(),
                replacement: Some(default.code().to_string()),
            });
            default
        })
    }

    fn planned_for_lvm(&self, drive_name: &str, drive: &DriveSection, problems: &mut ProblemList) -> PlannedVolumeGroup {
        let vg_name = basename(drive_name);
        let mut vg = PlannedVolumeGroup::new(vg_name);
        if self.devicegraph.volume_group(vg_name).is_some() {
            debug!("Volume group {} exists, reusing it", vg_name);
            vg.reuse = Some(vg_name.to_string());
        }

        for (index, section) in drive.partitions.iter().enumerate() {
            let name = format!("{}[{}]", drive_name, index);
            if let Some(lv) = self.planned_lv(vg_name, section, &name, problems) {
                vg.lvs.push(lv);
            }
        }
        vg
    }

    fn planned_lv(
        &self,
        vg_name: &str,
        section: &PartitionSection,
        name: &str,
        problems: &mut ProblemList,
    ) -> Option<PlannedLogicalVolume> {
        let filesystem = match section_filesystem(section, name) {
            Ok(fs) => fs,
            Err(problem) => {
                problems.add(problem);
                return None;
            }
        };

        let mut lv = if section.create {
            PlannedLogicalVolume::new(section.mount.as_deref(), self.lv_sizing(section, name, problems))
        } else {
            let Some(lv_name) = section.lv_name.as_deref() else {
                problems.add(Problem::MissingReuseInfo {
                    section: name.to_string(),
                });
                return None;
            };
            let Some(existing) = self
                .devicegraph
                .volume_group(vg_name)
                .and_then(|vg| vg.lv(lv_name))
            else {
                problems.add(Problem::MissingReusableDevice {
                    section: name.to_string(),
                });
                return None;
            };
            let mut lv = PlannedLogicalVolume::new(section.mount.as_deref(), Sizing::fixed(existing.size));
            lv.reuse = Some(lv_name.to_string());
            lv.reformat = section.format.unwrap_or(false);
            lv
        };

        if let Some(lv_name) = &section.lv_name {
            lv.logical_volume_name = lv_name.clone();
        }
        lv.format = format_intent(section, filesystem);
        lv.encryption_password = section_password(section, name, problems);
        Some(lv)
    }

    fn lv_sizing(&self, section: &PartitionSection, name: &str, problems: &mut ProblemList) -> Sizing {
        let value = section.size.as_deref().unwrap_or("");
        match parse_size_expr(value) {
            Some(SizeExpr::Fixed(size)) => Sizing::fixed(size),
            Some(SizeExpr::Max) => Sizing::new(MIN_LV_SIZE, DiskSize::unlimited()),
            Some(SizeExpr::Percent(_)) | None => {
                problems.add(Problem::InvalidValue {
                    section: name.to_string(),
                    attr: "size".to_string(),
                    value: value.to_string(),
                    replacement: Some("max".to_string()),
                });
                Sizing::new(MIN_LV_SIZE, DiskSize::unlimited())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::system::Architecture;
    use crate::disk::types::PtableType;
    use crate::skip_list::SkipRule;
    use crate::testing::{disk_with_table, formatted, graph, partition, volume_group};
    use std::collections::BTreeMap;

    fn profile(drives: Vec<(&str, DriveSection)>) -> Profile {
        Profile {
            drives: drives
                .into_iter()
                .map(|(name, drive)| (name.to_string(), drive))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn disk_drive(partitions: Vec<PartitionSection>) -> DriveSection {
        DriveSection {
            drive_type: DriveType::Disk,
            partitions,
            skip_list: Vec::new(),
        }
    }

    fn lvm_drive(partitions: Vec<PartitionSection>) -> DriveSection {
        DriveSection {
            drive_type: DriveType::Lvm,
            ..disk_drive(partitions)
        }
    }

    fn sda_graph() -> Devicegraph {
        let data = formatted(
            partition("/dev/sda", 1, DiskSize::mib(1), DiskSize::gib(10)),
            FilesystemType::Ext4,
            Some("data"),
        );
        graph(vec![disk_with_table("/dev/sda", DiskSize::gib(50), PtableType::Gpt, vec![data])])
    }

    fn plan(g: &Devicegraph, profile: &Profile) -> (Vec<PlannedDevice>, ProblemList) {
        let mut problems = ProblemList::new();
        let planned = DevicesPlanner::new(g, SystemInfo::new(Architecture::X86_64, true))
            .planned_devices(profile, &mut problems);
        (planned, problems)
    }

    fn partitions(planned: &[PlannedDevice]) -> Vec<&PlannedPartition> {
        planned.iter().filter_map(PlannedDevice::as_partition).collect()
    }

    #[test]
    fn size_expressions() {
        assert_eq!(parse_size_expr(""), Some(SizeExpr::Max));
        assert_eq!(parse_size_expr("MAX"), Some(SizeExpr::Max));
        assert_eq!(parse_size_expr("30%"), Some(SizeExpr::Percent(30.0)));
        assert_eq!(parse_size_expr("10GB"), Some(SizeExpr::Fixed(DiskSize::gib(10))));
        assert_eq!(parse_size_expr("512M"), Some(SizeExpr::Fixed(DiskSize::mib(512))));
        assert_eq!(parse_size_expr("1.5G"), Some(SizeExpr::Fixed(DiskSize::mib(1536))));
        assert_eq!(parse_size_expr("lots"), None);
        assert_eq!(parse_size_expr("150%"), None);
    }

    #[test]
    fn disk_sections_become_planned_partitions() {
        let g = sda_graph();
        let p = profile(vec![(
            "/dev/sda",
            disk_drive(vec![
                PartitionSection::mounted("/", "btrfs", "20GB"),
                PartitionSection::mounted("swap", "swap", "2G"),
                PartitionSection::mounted("/home", "xfs", "max"),
                PartitionSection::mounted("/srv", "ext4", "10%"),
            ]),
        )]);
        let (planned, problems) = plan(&g, &p);
        assert!(problems.is_empty(), "{}", problems);

        let parts = partitions(&planned);
        // the ESP comes last
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0].min_size(), DiskSize::gib(20));
        assert_eq!(parts[0].max_size(), DiskSize::gib(20));
        assert_eq!(parts[0].disk.as_deref(), Some("/dev/sda"));
        assert_eq!(parts[1].partition_id, PartitionId::Swap);
        assert_eq!(parts[2].min_size(), DiskSize::mib(1));
        assert!(parts[2].max_size().is_unlimited());
        assert_eq!(parts[3].min_size(), DiskSize::gib(5));
        assert_eq!(parts[4].partition_id, PartitionId::Esp);
    }

    #[test]
    fn invalid_size_falls_back_to_max() {
        let g = sda_graph();
        let p = profile(vec![("/dev/sda", disk_drive(vec![PartitionSection::mounted("/", "btrfs", "huge")]))]);
        let (planned, problems) = plan(&g, &p);
        assert_eq!(problems.len(), 1);
        assert!(!problems.is_fatal());
        assert!(partitions(&planned)[0].max_size().is_unlimited());
    }

    #[test]
    fn reuse_by_number_and_by_label() {
        let g = sda_graph();
        let by_number = PartitionSection {
            mount: Some("/data".to_string()),
            create: false,
            partition_nr: Some(1),
            format: Some(true),
            ..PartitionSection::default()
        };
        let by_label = PartitionSection {
            mount: Some("/srv".to_string()),
            create: false,
            label: Some("data".to_string()),
            ..PartitionSection::default()
        };
        let p = profile(vec![(
            "/dev/sda",
            disk_drive(vec![PartitionSection::mounted("/", "btrfs", "max"), by_number, by_label]),
        )]);
        let (planned, problems) = plan(&g, &p);
        assert!(problems.is_empty());
        let parts = partitions(&planned);
        assert_eq!(parts[1].reuse.as_deref(), Some("/dev/sda1"));
        assert!(parts[1].reformat);
        assert_eq!(parts[1].min_size(), DiskSize::gib(10));
        assert_eq!(parts[2].reuse.as_deref(), Some("/dev/sda1"));
        assert!(!parts[2].reformat);
    }

    #[test]
    fn missing_reuse_target_is_recoverable() {
        let g = sda_graph();
        let missing = PartitionSection {
            mount: Some("/data".to_string()),
            create: false,
            partition_nr: Some(7),
            ..PartitionSection::default()
        };
        let p = profile(vec![(
            "/dev/sda",
            disk_drive(vec![PartitionSection::mounted("/", "btrfs", "max"), missing]),
        )]);
        let (planned, problems) = plan(&g, &p);
        assert_eq!(
            problems.to_vec(),
            vec![Problem::MissingReusableDevice {
                section: "/dev/sda[1]".to_string()
            }]
        );
        assert!(!problems.is_fatal());
        assert!(partitions(&planned).iter().all(|p| !p.format.mounts("/data")));
    }

    #[test]
    fn reuse_without_identifier() {
        let g = sda_graph();
        let section = PartitionSection {
            create: false,
            ..PartitionSection::mounted("/", "btrfs", "max")
        };
        let p = profile(vec![("/dev/sda", disk_drive(vec![section]))]);
        let (_, problems) = plan(&g, &p);
        assert!(problems
            .iter()
            .any(|p| matches!(p, Problem::MissingReuseInfo { .. })));
        assert!(problems.iter().any(|p| *p == Problem::MissingRoot));
    }

    #[test]
    fn encryption_needs_a_key() {
        let g = sda_graph();
        let mut section = PartitionSection::mounted("/", "btrfs", "max");
        section.crypt_fs = true;
        let p = profile(vec![("/dev/sda", disk_drive(vec![section.clone()]))]);
        let (_, problems) = plan(&g, &p);
        assert!(problems.is_fatal());

        section.crypt_key = Some("secret".to_string());
        let p = profile(vec![("/dev/sda", disk_drive(vec![section]))]);
        let (planned, problems) = plan(&g, &p);
        assert!(problems.is_empty());
        assert!(partitions(&planned)[0].is_encrypted());
    }

    #[test]
    fn unknown_filesystem_skips_the_section() {
        let g = sda_graph();
        let p = profile(vec![(
            "/dev/sda",
            disk_drive(vec![
                PartitionSection::mounted("/", "btrfs", "max"),
                PartitionSection::mounted("/home", "zfs", "max"),
            ]),
        )]);
        let (planned, problems) = plan(&g, &p);
        assert_eq!(problems.len(), 1);
        assert!(!planned.iter().any(|d| d.mounts("/home")));
    }

    #[test]
    fn partition_ids() {
        let g = sda_graph();
        let pv = PartitionSection {
            lvm_group: Some("system".to_string()),
            ..PartitionSection::default()
        };
        let explicit = PartitionSection {
            partition_id: Some(PartitionId::Raid.code()),
            ..PartitionSection::default()
        };
        let bogus = PartitionSection {
            partition_id: Some(4242),
            ..PartitionSection::mounted("/", "btrfs", "max")
        };
        let p = profile(vec![("/dev/sda", disk_drive(vec![pv, explicit, bogus]))]);
        let (planned, problems) = plan(&g, &p);
        let parts = partitions(&planned);
        assert_eq!(parts[0].partition_id, PartitionId::Lvm);
        assert_eq!(parts[0].lvm_volume_group_name.as_deref(), Some("system"));
        assert_eq!(parts[1].partition_id, PartitionId::Raid);
        assert_eq!(parts[2].partition_id, PartitionId::Linux);
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn lvm_drive_becomes_a_volume_group() {
        let g = sda_graph();
        let p = profile(vec![
            (
                "/dev/sda",
                disk_drive(vec![PartitionSection {
                    lvm_group: Some("system".to_string()),
                    ..PartitionSection::default()
                }]),
            ),
            (
                "/dev/system",
                lvm_drive(vec![
                    PartitionSection::mounted("/", "btrfs", "20G"),
                    PartitionSection {
                        lv_name: Some("data".to_string()),
                        ..PartitionSection::mounted("/srv", "xfs", "max")
                    },
                    PartitionSection::mounted("/tmp", "ext4", "25%"),
                ]),
            ),
        ]);
        let (planned, problems) = plan(&g, &p);
        let vg = planned.iter().find_map(PlannedDevice::as_volume_group).unwrap();
        assert_eq!(vg.base_name(), "system");
        assert!(vg.reuse.is_none());
        let names: Vec<_> = vg.lvs.iter().map(|lv| lv.logical_volume_name.as_str()).collect();
        assert_eq!(names, vec!["root", "data", "tmp"]);
        assert_eq!(vg.lvs[0].sizing, Sizing::fixed(DiskSize::gib(20)));
        assert_eq!(vg.lvs[1].min_size(), DiskSize::mib(1));
        assert!(vg.lvs[2].sizing.max_size.is_unlimited());
        // the percentage is reported
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn existing_volume_group_is_reused() {
        let mut g = sda_graph();
        g.volume_groups
            .push(volume_group("system", "/dev/sda1", DiskSize::gib(10), &[("home", DiskSize::gib(4))]));
        let home = PartitionSection {
            mount: Some("/home".to_string()),
            create: false,
            lv_name: Some("home".to_string()),
            ..PartitionSection::default()
        };
        let ghost = PartitionSection {
            mount: Some("/srv".to_string()),
            create: false,
            lv_name: Some("srv".to_string()),
            ..PartitionSection::default()
        };
        let p = profile(vec![(
            "/dev/system",
            lvm_drive(vec![PartitionSection::mounted("/", "btrfs", "max"), home, ghost]),
        )]);
        let (planned, problems) = plan(&g, &p);
        let vg = planned.iter().find_map(PlannedDevice::as_volume_group).unwrap();
        assert_eq!(vg.reuse.as_deref(), Some("system"));
        assert_eq!(vg.lvs.len(), 2);
        assert_eq!(vg.lvs[1].reuse.as_deref(), Some("home"));
        assert_eq!(vg.lvs[1].min_size(), DiskSize::gib(4));
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn auto_drive_honours_the_skip_list() {
        let g = graph(vec![
            disk_with_table("/dev/sda", DiskSize::gib(50), PtableType::Gpt, vec![]),
            disk_with_table("/dev/sdb", DiskSize::gib(8), PtableType::Gpt, vec![]),
            disk_with_table("/dev/sdc", DiskSize::gib(100), PtableType::Gpt, vec![]),
        ]);
        let mut small = SkipRule::equal("size_k", &(10 * 1024 * 1024).to_string());
        small.skip_if_less_than = true;
        let auto = DriveSection {
            skip_list: vec![small],
            ..disk_drive(vec![PartitionSection::mounted("/", "btrfs", "max")])
        };
        let p = profile(vec![
            ("/dev/sda", disk_drive(vec![PartitionSection::mounted("/home", "xfs", "max")])),
            (AUTO_DRIVE, auto),
        ]);
        let (planned, problems) = plan(&g, &p);
        assert!(problems.is_empty());
        let root = partitions(&planned).into_iter().find(|p| p.is_root()).unwrap();
        assert_eq!(root.disk.as_deref(), Some("/dev/sdc"));
    }

    #[test]
    fn unknown_disk_is_reported() {
        let g = sda_graph();
        let p = profile(vec![("/dev/sdz", disk_drive(vec![PartitionSection::mounted("/", "btrfs", "max")]))]);
        let (planned, problems) = plan(&g, &p);
        assert!(problems.iter().any(|p| *p
            == Problem::NoDisk {
                drive: "/dev/sdz".to_string()
            }));
        assert!(problems.iter().any(|p| *p == Problem::MissingRoot));
        assert!(problems.is_fatal());
        assert!(planned.iter().all(|d| !d.mounts("/")));
    }

    #[test]
    fn boot_failures_become_problems() {
        let mut disk = disk_with_table(
            "/dev/sda",
            DiskSize::gib(50),
            PtableType::Msdos,
            vec![partition("/dev/sda", 1, DiskSize::kib(64), DiskSize::gib(1))],
        );
        if let Some(table) = disk.partition_table.as_mut() {
            table.mbr_gap = Some(DiskSize::kib(64));
        }
        let g = graph(vec![disk]);
        let p = profile(vec![("/dev/sda", disk_drive(vec![PartitionSection::mounted("/", "ext4", "10G")]))]);
        let mut problems = ProblemList::new();
        DevicesPlanner::new(&g, SystemInfo::new(Architecture::X86_64, false)).planned_devices(&p, &mut problems);
        assert!(problems
            .iter()
            .any(|p| matches!(p, Problem::Exception { .. })));
        assert!(problems.is_fatal());
    }
}
