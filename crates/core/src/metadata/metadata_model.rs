//! Locally stored layout metadata.

use serde::{Deserialize, Serialize};

use crate::schema::RemoteFieldType;

/// Record type of the survey object and its page layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTypeDescriptor {
    /// Developer name, unique per object.
    pub name: String,
    pub label: String,
    pub record_type_id: String,
    pub layout_id: String,
    pub title_field_name: Option<String>,
    pub title_field_type: Option<RemoteFieldType>,
    pub title_field_updateable: bool,
}

impl RecordTypeDescriptor {
    /// Title field that must not be sent back to the remote.
    pub fn readonly_title_field(&self) -> Option<&str> {
        match &self.title_field_name {
            Some(name) if !self.title_field_updateable => Some(name.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayoutSection {
    pub id: String,
    pub layout_id: String,
    pub section_label: String,
}

/// Editable field placed on a page layout section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayoutItem {
    pub section_id: String,
    pub field_name: String,
    pub field_label: String,
    pub field_type: RemoteFieldType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PicklistValue {
    pub field_name: String,
    pub label: String,
    pub value: String,
}

/// Translated label row. Stored only; label lookup belongs to the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Localization {
    pub locale: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub label: String,
}

/// What `store_page_layout_items` persisted for one record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPageLayout {
    pub sections: Vec<PageLayoutSection>,
    pub items: Vec<PageLayoutItem>,
    pub picklist_values: Vec<PicklistValue>,
}

/// Counts from a full metadata refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRefreshSummary {
    pub record_types: usize,
    pub layout_items: usize,
    pub picklist_values: usize,
    pub localizations: usize,
}
