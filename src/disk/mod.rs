//! Disk model: sizes, devicegraph, free space, LVM and reports

pub mod free_space;
pub mod graph;
pub mod lvm;
pub mod report;
pub mod size;
pub mod types;
