//! Consent types and sync statuses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A distinct regulatory document a participant may sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentType {
    Primary,
    PrimaryReconsent,
    Cabor,
    Ehr,
    EhrReconsent,
    Gror,
    PrimaryUpdate,
    Wear,
    Etm,
    Unknown,
}

impl ConsentType {
    /// Every type a participant can be validated for.
    pub const VALIDATED: [ConsentType; 9] = [
        ConsentType::Primary,
        ConsentType::PrimaryReconsent,
        ConsentType::Cabor,
        ConsentType::Ehr,
        ConsentType::EhrReconsent,
        ConsentType::Gror,
        ConsentType::PrimaryUpdate,
        ConsentType::Wear,
        ConsentType::Etm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::PrimaryReconsent => "PRIMARY_RECONSENT",
            Self::Cabor => "CABOR",
            Self::Ehr => "EHR",
            Self::EhrReconsent => "EHR_RECONSENT",
            Self::Gror => "GROR",
            Self::PrimaryUpdate => "PRIMARY_UPDATE",
            Self::Wear => "WEAR",
            Self::Etm => "ETM",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// The type a reconsent supersedes.
    pub fn reconsent_base(&self) -> Option<ConsentType> {
        match self {
            Self::PrimaryReconsent => Some(Self::Primary),
            Self::EhrReconsent => Some(Self::Ehr),
            _ => None,
        }
    }
}

impl fmt::Display for ConsentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::VALIDATED
            .iter()
            .chain(std::iter::once(&Self::Unknown))
            .find(|ty| ty.as_str() == wanted)
            .copied()
            .ok_or_else(|| format!("unknown consent type '{}'", s.trim()))
    }
}

/// Lifecycle state controlling whether a result is distributed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    NeedsCorrecting,
    ReadyForSync,
    SyncComplete,
    Obsolete,
    Legacy,
    DelayingSync,
    Unknown,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsCorrecting => "NEEDS_CORRECTING",
            Self::ReadyForSync => "READY_FOR_SYNC",
            Self::SyncComplete => "SYNC_COMPLETE",
            Self::Obsolete => "OBSOLETE",
            Self::Legacy => "LEGACY",
            Self::DelayingSync => "DELAYING_SYNC",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Active rows are the single "winner" of a (participant, type) group.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::ReadyForSync | Self::SyncComplete)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
