//! Error types for Layoutix

use crate::disk::size::DiskSize;
use crate::problems::ProblemList;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutixError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Could not find a valid partitioning distribution: {0}")]
    NoDistribution(String),

    #[error("No free partition slot left on {0}")]
    NoMorePartitionSlot(String),

    #[error("The volume group {vg} is not big enough ({missing} missing)")]
    NotEnoughVgSpace { vg: String, missing: DiskSize },

    #[error("No bootable layout is possible: {0}")]
    BootInfeasible(String),

    #[error("Device to reuse not found: {0}")]
    MissingReuseTarget(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Partition error: {0}")]
    PartitionError(String),

    #[error("Planning aborted, the profile has fatal problems:\n{0}")]
    FatalProblems(ProblemList),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LayoutixError>;
