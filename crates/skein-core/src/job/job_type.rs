//! JobType - identity of a job variant and its wire encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoding used for a job's exported bytes.
///
/// Only JSON ships with the crate. Envelopes naming any other format are
/// rejected at decode time with `SkeinError::Serialization`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
        }
    }
}

/// Concrete job variant + schema version + encoding.
///
/// `(name, version)` is the registry key used to rebuild a job from bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobType {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub format: Format,
}

impl JobType {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            format: Format::Json,
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{} ({})", self.name, self.version, self.format)
    }
}
