//! Survey record model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::{Result, ValidationError};
use crate::sync::{SyncStatus, LOCAL_ID_FIELD, REMOTE_ID_FIELD, SYNC_STATUS_FIELD};

/// A survey as held on the device.
///
/// `local_id` is assigned by the local store on first save; `remote_id` once
/// the CRM has accepted the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    pub local_id: Option<i64>,
    pub remote_id: Option<String>,
    pub sync_status: SyncStatus,
    pub fields: BTreeMap<String, Value>,
}

impl SurveyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Edit a field. Synced surveys are read-only.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        self.ensure_editable()?;
        self.fields.insert(name.into(), value);
        Ok(())
    }

    pub fn ensure_editable(&self) -> Result<()> {
        if self.sync_status.is_synced() {
            let id = self
                .remote_id
                .clone()
                .or_else(|| self.local_id.map(|id| id.to_string()))
                .unwrap_or_default();
            return Err(ValidationError::ReadOnlySurvey(id).into());
        }
        Ok(())
    }

    /// Build from a flat row, lifting the bookkeeping columns out of `fields`.
    pub fn from_row(mut row: BTreeMap<String, Value>) -> Self {
        let local_id = row.remove(LOCAL_ID_FIELD).and_then(|v| v.as_i64());
        let sync_status = row
            .remove(SYNC_STATUS_FIELD)
            .and_then(|v| v.as_str().and_then(|s| s.parse::<SyncStatus>().ok()))
            .unwrap_or_default();
        let remote_id = match row.remove(REMOTE_ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        };
        Self {
            local_id,
            remote_id,
            sync_status,
            fields: row,
        }
    }

    /// Flat row including the bookkeeping columns.
    pub fn to_row(&self) -> BTreeMap<String, Value> {
        let mut row = self.fields.clone();
        if let Some(id) = self.local_id {
            row.insert(LOCAL_ID_FIELD.to_string(), Value::from(id));
        }
        row.insert(
            SYNC_STATUS_FIELD.to_string(),
            Value::from(self.sync_status.as_str()),
        );
        if let Some(id) = &self.remote_id {
            row.insert(REMOTE_ID_FIELD.to_string(), Value::from(id.clone()));
        }
        row
    }
}

/// Local survey joined with its record type, for list screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyListItem {
    pub survey: SurveyRecord,
    pub record_type_name: Option<String>,
    pub record_type_label: Option<String>,
}
