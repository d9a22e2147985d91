//! Layoutix library - partition, LVM and boot layout planning for
//! automated installations

pub mod config;
pub mod disk;
pub mod planned;
pub mod problems;
pub mod proposal;
pub mod skip_list;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::{Profile, SystemInfo};
pub use disk::graph::Devicegraph;
pub use proposal::AutoinstProposal;
pub use utils::error::LayoutixError;
