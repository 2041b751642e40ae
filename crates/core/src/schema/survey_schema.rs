//! Survey table schema built from layout items, record type title fields and
//! background fields.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{LocalType, RemoteFieldType};
use crate::metadata::{PageLayoutItem, RecordTypeDescriptor};
use crate::settings::BackgroundField;
use crate::sync::REMOTE_ID_FIELD;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    pub remote_type: RemoteFieldType,
    pub local_type: LocalType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, remote_type: RemoteFieldType) -> Self {
        let local_type = remote_type.local_type();
        Self {
            name: name.into(),
            remote_type,
            local_type,
        }
    }
}

/// Ordered, name-unique set of survey fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveySchema {
    fields: Vec<FieldDescriptor>,
}

impl SurveySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or retype a field. A name keeps the position of its first insert.
    pub fn upsert(&mut self, field: FieldDescriptor) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Comma-separated field list for the remote query.
    pub fn select_list(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Stable digest of column names and local types.
    ///
    /// Two schemas with the same digest produce the same local table, so the
    /// table only has to be dropped and recreated when this changes.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in &self.fields {
            hasher.update(field.name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(field.local_type.sql_type().as_bytes());
            hasher.update([0x1e]);
        }
        let digest = hasher.finalize();
        let hex = digest
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>();
        format!("sha256:{}", hex)
    }
}

/// Build the survey schema.
///
/// The remote `Id` always comes first, followed by page layout items, title
/// fields of record types, then background fields.
pub fn build_survey_schema(
    layout_items: &[PageLayoutItem],
    record_types: &[RecordTypeDescriptor],
    background_fields: &[BackgroundField],
) -> SurveySchema {
    let mut schema = SurveySchema::new();
    schema.upsert(FieldDescriptor::new(REMOTE_ID_FIELD, RemoteFieldType::Id));

    for item in layout_items {
        schema.upsert(FieldDescriptor::new(
            item.field_name.clone(),
            item.field_type.clone(),
        ));
    }

    for record_type in record_types {
        if let Some(name) = &record_type.title_field_name {
            let remote_type = record_type
                .title_field_type
                .clone()
                .unwrap_or(RemoteFieldType::String);
            schema.upsert(FieldDescriptor::new(name.clone(), remote_type));
        }
    }

    for field in background_fields {
        schema.upsert(FieldDescriptor::new(
            field.field_name.clone(),
            RemoteFieldType::parse(&field.field_type),
        ));
    }

    schema
}
