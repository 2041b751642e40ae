//! Conversion between local survey rows and remote records.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use super::survey_model::SurveyRecord;
use crate::crm::{reference_id, RemoteRecord, ATTRIBUTES_KEY};
use crate::errors::Result;
use crate::schema::{LocalType, RemoteFieldType, SurveySchema};
use crate::sync::{SyncStatus, LOCAL_ID_FIELD, REMOTE_ID_FIELD, SYNC_STATUS_FIELD};
use crate::utils::date::format_iso_to_api_date;

/// Map a local survey to the record sent in a composite tree batch.
///
/// Fields without a descriptor in `schema` are dropped, as are nulls, local
/// bookkeeping columns, the remote id and read-only title fields. Booleans
/// are rebuilt from their 0/1 storage and dates cut to `YYYY-MM-DD`.
pub fn to_remote_payload(
    record: &SurveyRecord,
    schema: &SurveySchema,
    readonly_fields: &HashSet<String>,
    index: usize,
    object_name: &str,
) -> Result<RemoteRecord> {
    let mut payload = RemoteRecord::new();

    for (name, value) in &record.fields {
        if matches!(
            name.as_str(),
            LOCAL_ID_FIELD | SYNC_STATUS_FIELD | REMOTE_ID_FIELD
        ) || readonly_fields.contains(name)
        {
            continue;
        }
        let Some(descriptor) = schema.get(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        let mapped = match descriptor.remote_type {
            RemoteFieldType::Boolean => Value::Bool(is_truthy_flag(value)),
            RemoteFieldType::Date => match value.as_str() {
                Some(text) => Value::String(format_iso_to_api_date(text)?),
                None => value.clone(),
            },
            _ => value.clone(),
        };
        payload.insert(name.clone(), mapped);
    }

    payload.insert(
        ATTRIBUTES_KEY.to_string(),
        serde_json::json!({
            "type": object_name,
            "referenceId": reference_id(index),
        }),
    );
    Ok(payload)
}

/// Local 0/1 (or a JSON bool) as a checkbox value. Anything else is unchecked.
fn is_truthy_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

/// Map a queried remote record to a synced local survey. Values are kept as-is.
pub fn from_remote_record(mut record: RemoteRecord) -> SurveyRecord {
    record.remove(ATTRIBUTES_KEY);
    let remote_id = match record.remove(REMOTE_ID_FIELD) {
        Some(Value::String(id)) => Some(id),
        _ => None,
    };
    SurveyRecord {
        local_id: None,
        remote_id,
        sync_status: SyncStatus::Synced,
        fields: record.into_iter().collect::<BTreeMap<_, _>>(),
    }
}

/// Normalize a value for a local column of the given type.
pub fn to_local_value(value: &Value, local_type: LocalType) -> Value {
    match (value, local_type) {
        (Value::Bool(b), LocalType::Integer) => Value::from(i64::from(*b)),
        (Value::Bool(b), LocalType::Text) => Value::String(b.to_string()),
        (Value::Array(_) | Value::Object(_), _) => Value::String(value.to_string()),
        (Value::String(text), LocalType::Integer) => {
            let text = text.trim();
            if let Ok(number) = text.parse::<i64>() {
                return Value::from(number);
            }
            // Non-finite floats have no JSON form; keep the text.
            text.parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .map(Value::from)
                .unwrap_or_else(|| value.clone())
        }
        _ => value.clone(),
    }
}
