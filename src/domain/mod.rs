//! Domain model for consent validation.
//!
//! Consent types, sync statuses and the validation-result record that the
//! reconciliation layer owns.

pub mod consent_type;
pub mod result;

pub use consent_type::{ConsentType, SyncStatus};
pub use result::{ConsentOtherError, ValidationResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Participant identifier. Rendered with the `P` prefix used in storage
/// paths and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub i64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches(['P', 'p']);
        digits.parse().map(ParticipantId)
    }
}

/// Platform that produced an uploaded PDF. Determines page layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadSource {
    Vibrent,
    CareEvolution,
}

impl UploadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vibrent => "vibrent",
            Self::CareEvolution => "ce",
        }
    }

    /// Only Vibrent layouts carry a printed-name field worth enforcing.
    pub fn requires_printed_name(&self) -> bool {
        matches!(self, Self::Vibrent)
    }
}

impl fmt::Display for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vibrent" | "ptsc" => Ok(Self::Vibrent),
            "ce" | "careevolution" | "care_evolution" => Ok(Self::CareEvolution),
            other => Err(format!("unknown upload source '{other}'")),
        }
    }
}
