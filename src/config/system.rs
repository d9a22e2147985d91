//! Facts about the target system that decide the boot layout

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    X86_64,
    Aarch64,
    Ppc64le,
    S390x,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64 => write!(f, "x86_64"),
            Self::Aarch64 => write!(f, "aarch64"),
            Self::Ppc64le => write!(f, "ppc64le"),
            Self::S390x => write!(f, "s390x"),
        }
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::Aarch64),
            "ppc64le" | "ppc" => Ok(Self::Ppc64le),
            "s390x" | "s390" => Ok(Self::S390x),
            other => Err(format!("unsupported architecture '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub architecture: Architecture,
    /// Booted through UEFI firmware
    #[serde(default)]
    pub efiboot: bool,
}

impl SystemInfo {
    pub fn new(architecture: Architecture, efiboot: bool) -> Self {
        Self {
            architecture,
            efiboot,
        }
    }

    /// Whether the system boots through UEFI (always on aarch64)
    pub fn uses_efi(&self) -> bool {
        match self.architecture {
            Architecture::Aarch64 => true,
            Architecture::X86_64 => self.efiboot,
            Architecture::Ppc64le | Architecture::S390x => false,
        }
    }
}

impl fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let firmware = if self.uses_efi() { "UEFI" } else { "legacy" };
        write!(f, "{} ({})", self.architecture, firmware)
    }
}
