//! Configuration: installation profiles and target system facts

pub mod profile;
pub mod system;

pub use profile::{DriveSection, DriveType, PartitionSection, Profile};
pub use system::{Architecture, SystemInfo};
