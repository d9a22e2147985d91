//! Creation of volume groups and logical volumes
//!
//! The volume group is reused or created on top of the physical volumes,
//! existing logical volumes are deleted when the new ones would not fit, and
//! the remaining space is distributed among the new logical volumes in whole
//! extents.

use crate::disk::graph::{BlkDevice, Devicegraph};
use crate::disk::lvm::{lv_path, DEFAULT_EXTENT_SIZE};
use crate::disk::size::DiskSize;
use crate::planned::{distribute_space, PlannedLogicalVolume, PlannedVolumeGroup, Sizing};
use crate::utils::error::{LayoutixError, Result};
use tracing::{debug, info};

/// `base` if unused, otherwise `base` followed by the smallest free number
pub fn available_name(base: &str, taken: &[&str]) -> String {
    if !taken.contains(&base) {
        return base.to_string();
    }
    let mut suffix = 0u32;
    loop {
        let candidate = format!("{}{}", base, suffix);
        if !taken.contains(&candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}

pub struct LvmCreator<'a> {
    original: &'a Devicegraph,
}

impl<'a> LvmCreator<'a> {
    pub fn new(original: &'a Devicegraph) -> Self {
        Self { original }
    }

    /// Build the planned volume group on the given physical volumes and
    /// return the resulting devicegraph
    pub fn create_volumes(&self, planned_vg: &PlannedVolumeGroup, pv_names: &[String]) -> Result<Devicegraph> {
        let mut devicegraph = self.original.duplicate();
        if planned_vg.lvs.is_empty() {
            debug!("Volume group {} has no logical volumes, nothing to do", planned_vg.base_name());
            return Ok(devicegraph);
        }

        let vg_name = resolve_volume_group(&mut devicegraph, planned_vg)?;

        for pv in pv_names {
            let device = devicegraph
                .partition(pv)
                .map(|p| p.plain_device_name())
                .unwrap_or_else(|| pv.clone());
            devicegraph.add_physical_volume(&vg_name, &device)?;
        }

        let (reused, new): (Vec<&PlannedLogicalVolume>, Vec<&PlannedLogicalVolume>) =
            planned_vg.lvs.iter().partition(|lv| lv.is_reused());

        make_space(&mut devicegraph, &vg_name, &reused, &new)?;

        for lv in &reused {
            reuse_logical_volume(&mut devicegraph, &vg_name, lv)?;
        }
        create_logical_volumes(&mut devicegraph, &vg_name, &new)?;

        Ok(devicegraph)
    }
}

fn resolve_volume_group(devicegraph: &mut Devicegraph, planned_vg: &PlannedVolumeGroup) -> Result<String> {
    if let Some(name) = &planned_vg.reuse {
        if devicegraph.volume_group(name).is_none() {
            return Err(LayoutixError::MissingReuseTarget(format!("/dev/{}", name)));
        }
        info!("Reusing volume group {}", name);
        return Ok(name.clone());
    }

    let taken: Vec<&str> = devicegraph.volume_groups.iter().map(|vg| vg.name.as_str()).collect();
    let name = available_name(planned_vg.base_name(), &taken);
    info!("Creating volume group {}", name);
    devicegraph.create_volume_group(&name, DEFAULT_EXTENT_SIZE)?;
    Ok(name)
}

/// Delete existing logical volumes until the new ones fit. The smallest
/// volume that covers the missing space goes first; when none does, the
/// biggest one.
fn make_space(
    devicegraph: &mut Devicegraph,
    vg_name: &str,
    reused: &[&PlannedLogicalVolume],
    new: &[&PlannedLogicalVolume],
) -> Result<()> {
    // new volumes take whole extents
    let extent = devicegraph
        .volume_group(vg_name)
        .ok_or_else(|| LayoutixError::DeviceNotFound(vg_name.to_string()))?
        .extent_size;
    let required: DiskSize = new.iter().map(|lv| lv.min_size().ceil(extent)).sum();
    let kept: Vec<&str> = reused.iter().filter_map(|lv| lv.reuse.as_deref()).collect();

    loop {
        let vg = devicegraph
            .volume_group(vg_name)
            .ok_or_else(|| LayoutixError::DeviceNotFound(vg_name.to_string()))?;
        let missing = required - vg.available_space();
        if missing.is_zero() {
            return Ok(());
        }

        let deletable: Vec<_> = vg
            .lvs
            .iter()
            .filter(|lv| !kept.contains(&lv.name.as_str()))
            .collect();
        let target = deletable
            .iter()
            .filter(|lv| lv.size >= missing)
            .min_by_key(|lv| lv.size)
            .or_else(|| deletable.iter().max_by_key(|lv| lv.size))
            .map(|lv| lv.name.clone());

        let Some(target) = target else {
            return Err(LayoutixError::NotEnoughVgSpace {
                vg: vg_name.to_string(),
                missing,
            });
        };
        info!(
            "Deleting {} to reclaim space ({} missing)",
            lv_path(vg_name, &target),
            missing
        );
        devicegraph.delete_logical_volume(vg_name, &target)?;
    }
}

fn reuse_logical_volume(devicegraph: &mut Devicegraph, vg_name: &str, planned: &PlannedLogicalVolume) -> Result<()> {
    let name = planned.reuse.as_deref().unwrap_or(&planned.logical_volume_name);
    let lv = devicegraph
        .volume_group_mut(vg_name)
        .and_then(|vg| vg.lv_mut(name))
        .ok_or_else(|| LayoutixError::MissingReuseTarget(lv_path(vg_name, name)))?;
    debug!("Reusing logical volume {} (reformat: {})", lv_path(vg_name, name), planned.reformat);
    planned
        .format
        .apply_to_reused(lv, planned.encryption_password.as_deref(), planned.reformat);
    Ok(())
}

fn create_logical_volumes(devicegraph: &mut Devicegraph, vg_name: &str, new: &[&PlannedLogicalVolume]) -> Result<()> {
    let vg = devicegraph
        .volume_group(vg_name)
        .ok_or_else(|| LayoutixError::DeviceNotFound(vg_name.to_string()))?;
    let extent = vg.extent_size;
    let sizings: Vec<Sizing> = new.iter().map(|lv| lv.sizing).collect();
    let sizes = distribute_space(&sizings, vg.available_space(), extent);

    for (planned, size) in new.iter().zip(sizes) {
        let size = if size.floor(extent) >= planned.min_size() {
            size.floor(extent)
        } else {
            size.ceil(extent)
        };
        let name = {
            let vg = devicegraph
                .volume_group(vg_name)
                .ok_or_else(|| LayoutixError::DeviceNotFound(vg_name.to_string()))?;
            let taken: Vec<&str> = vg.lvs.iter().map(|lv| lv.name.as_str()).collect();
            available_name(&planned.logical_volume_name, &taken)
        };
        devicegraph.create_logical_volume(vg_name, &name, size)?;
        let lv = devicegraph
            .volume_group_mut(vg_name)
            .and_then(|vg| vg.lv_mut(&name))
            .ok_or_else(|| LayoutixError::DeviceNotFound(lv_path(vg_name, &name)))?;
        planned
            .format
            .apply_to(lv, planned.encryption_password.as_deref());
    }
    Ok(())
}
