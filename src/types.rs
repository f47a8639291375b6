use std::fmt;

use serde::Deserialize;

/// Shape hint used by the staging loader to map JSON fields to columns.
///
/// - `Auto`: match table columns to top-level record keys (case-insensitive).
/// - `Paths`: location of a JSONPaths document listing one expression per
///   column, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JsonShape {
    Auto,
    Paths(String),
}

impl Default for JsonShape {
    fn default() -> Self {
        JsonShape::Auto
    }
}

impl From<String> for JsonShape {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("auto") {
            JsonShape::Auto
        } else {
            JsonShape::Paths(s.trim().to_string())
        }
    }
}

impl fmt::Display for JsonShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonShape::Auto => f.write_str("auto"),
            JsonShape::Paths(location) => f.write_str(location),
        }
    }
}

/// Classification of a task failure.
///
/// Operators never retry; the run engine uses this to decide whether a retry
/// can help and to keep "the pipeline broke" apart from "the data is wrong"
/// in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Storage or warehouse unreachable.
    Connectivity,
    /// Shape mismatch, bad SQL, missing table, nothing to load.
    MalformedInput,
    /// Quality gate did not pass.
    DataQuality,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connectivity => "connectivity",
            FailureKind::MalformedInput => "malformed_input",
            FailureKind::DataQuality => "data_quality",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
