//! Two-state sync status tracked per local survey row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Local column holding the autogenerated row id.
pub const LOCAL_ID_FIELD: &str = "_localId";
/// Local column holding the sync status.
pub const SYNC_STATUS_FIELD: &str = "_syncStatus";
/// Remote record id field.
pub const REMOTE_ID_FIELD: &str = "Id";

/// Sync status of a local survey.
///
/// The only transition is `Unsynced -> Synced`, taken after the remote
/// accepted the whole upload batch the survey was part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncStatus {
    #[default]
    Unsynced,
    Synced,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsynced => "Unsynced",
            Self::Synced => "Synced",
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Synced" => Ok(Self::Synced),
            "Unsynced" => Ok(Self::Unsynced),
            other => Err(format!("Unknown sync status '{}'", other)),
        }
    }
}

/// Result of pushing locally edited surveys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncUploadSummary {
    pub uploaded_count: usize,
    pub remote_ids: Vec<String>,
}

/// Pairing of a local row with the id the remote assigned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedRecordAssignment {
    pub local_id: i64,
    pub remote_id: Option<String>,
}
