//! Human readable summary of a devicegraph

use crate::disk::graph::{BlkDevice, Devicegraph, Disk};
use crate::disk::lvm::{lv_path, LvmVg};
use std::fmt::Write;

/// What a block device holds, e.g. `luks cr_sda2 > btrfs /`
pub fn content_summary(device: &dyn BlkDevice) -> String {
    let mut parts = Vec::new();
    if let Some(enc) = device.encryption() {
        parts.push(format!("luks {}", enc.name));
    }
    if let Some(fs) = device.filesystem() {
        let mut text = fs.fs_type.to_string();
        if let Some(mount) = &fs.mount_point {
            text.push(' ');
            text.push_str(mount);
        }
        if let Some(label) = &fs.label {
            text.push_str(&format!(" [{}]", label));
        }
        parts.push(text);
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(" > ")
    }
}

fn disk_summary(out: &mut String, disk: &Disk, show_free: bool) {
    let table = match disk.partition_table() {
        Some(table) => table.ptable_type.to_string(),
        None => "no partition table".to_string(),
    };
    let _ = writeln!(out, "{} ({}, {})", disk.name, disk.size, table);
    let _ = writeln!(
        out,
        "{:<6} {:<16} {:>12} {:>12} {:<10} {}",
        "NUM", "NAME", "START", "SIZE", "ID", "CONTENT"
    );
    let _ = writeln!(out, "{}", "-".repeat(72));

    for part in disk.partitions() {
        let _ = writeln!(
            out,
            "{:<6} {:<16} {:>12} {:>12} {:<10} {}",
            part.number,
            part.name,
            part.start.to_string(),
            part.size.to_string(),
            part.id.to_string(),
            content_summary(part)
        );
    }

    if show_free {
        for space in disk.free_spaces() {
            let _ = writeln!(
                out,
                "{:<6} {:<16} {:>12} {:>12}",
                "",
                if space.inside_extended { "(free, ext)" } else { "(free)" },
                space.start().to_string(),
                space.length().to_string()
            );
        }
    }
}

fn volume_group_summary(out: &mut String, vg: &LvmVg) {
    let _ = writeln!(
        out,
        "Volume group {} ({}, {} available)",
        vg.name,
        vg.size(),
        vg.available_space()
    );
    let pvs: Vec<&str> = vg.pvs.iter().map(|pv| pv.device.as_str()).collect();
    let _ = writeln!(out, "  physical volumes: {}", pvs.join(", "));
    let _ = writeln!(out, "{:<24} {:>12} {}", "LV", "SIZE", "CONTENT");
    let _ = writeln!(out, "{}", "-".repeat(50));
    for lv in &vg.lvs {
        let _ = writeln!(
            out,
            "{:<24} {:>12} {}",
            lv_path(&vg.name, &lv.name),
            lv.size.to_string(),
            content_summary(lv)
        );
    }
}

/// Tables for every disk and volume group, optionally with free regions
pub fn layout_summary(devicegraph: &Devicegraph, show_free: bool) -> String {
    let mut out = String::new();
    for disk in &devicegraph.disks {
        disk_summary(&mut out, disk, show_free);
        out.push('\n');
    }
    for vg in &devicegraph.volume_groups {
        volume_group_summary(&mut out, vg);
        out.push('\n');
    }
    out
}
