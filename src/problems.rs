//! Problems found while reading an installation profile
//!
//! Planning does not stop at the first issue: every problem is collected in
//! a [`ProblemList`] so it can be reported at once. A list holding a fatal
//! problem prevents materialization.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => write!(f, "warning"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    /// A value could not be used; `replacement` is `None` when the section
    /// is skipped
    InvalidValue {
        section: String,
        attr: String,
        value: String,
        replacement: Option<String>,
    },
    MissingValue {
        section: String,
        attr: String,
    },
    /// `create = false` without anything that identifies the device
    MissingReuseInfo {
        section: String,
    },
    MissingReusableDevice {
        section: String,
    },
    NoDisk {
        drive: String,
    },
    MissingRoot,
    Exception {
        message: String,
    },
}

impl Problem {
    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidValue { .. }
            | Self::MissingReuseInfo { .. }
            | Self::MissingReusableDevice { .. }
            | Self::NoDisk { .. } => Severity::Warn,
            Self::MissingValue { .. } | Self::MissingRoot | Self::Exception { .. } => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn message(&self) -> String {
        match self {
            Self::InvalidValue {
                section,
                attr,
                value,
                replacement,
            } => {
                let consequence = match replacement {
                    Some(r) => format!("replaced by '{}'", r),
                    None => "the section will be skipped".to_string(),
                };
                format!(
                    "Invalid value '{}' for attribute '{}' on section '{}': {}",
                    value, attr, section, consequence
                )
            }
            Self::MissingValue { section, attr } => {
                format!("Missing attribute '{}' on section '{}'", attr, section)
            }
            Self::MissingReuseInfo { section } => format!(
                "Not enough information to locate the device to reuse on section '{}'",
                section
            ),
            Self::MissingReusableDevice { section } => {
                format!("Reusable device not found for section '{}'", section)
            }
            Self::NoDisk { drive } => format!("Disk '{}' was not found", drive),
            Self::MissingRoot => "No root partition ('/') was found".to_string(),
            Self::Exception { message } => format!("Unexpected error: {}", message),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Ordered collection of problems
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProblemList {
    problems: Vec<Problem>,
}

impl ProblemList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        tracing::warn!("{} ({})", problem, problem.severity());
        self.problems.push(problem);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_fatal(&self) -> bool {
        self.problems.iter().any(Problem::is_fatal)
    }

    pub fn to_vec(&self) -> Vec<Problem> {
        self.problems.clone()
    }
}

impl fmt::Display for ProblemList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, problem) in self.problems.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  [{}] {}", problem.severity(), problem)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ProblemList {
    type Item = &'a Problem;
    type IntoIter = std::slice::Iter<'a, Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.iter()
    }
}
