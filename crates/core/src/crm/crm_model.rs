//! Wire models for the describe, query and composite endpoints.

use serde::{Deserialize, Serialize};

use crate::schema::RemoteFieldType;

/// Untyped remote record as returned by query endpoints.
pub type RemoteRecord = serde_json::Map<String, serde_json::Value>;

/// Key of the per-record metadata object the API attaches to records.
pub const ATTRIBUTES_KEY: &str = "attributes";

// ─────────────────────────────────────────────────────────────────────────────
// Describe layouts
// ─────────────────────────────────────────────────────────────────────────────

/// GET /sobjects/{object}/describe/layouts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeLayoutResult {
    #[serde(default)]
    pub record_type_mappings: Vec<RecordTypeMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTypeMapping {
    pub active: bool,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub default_record_type_mapping: bool,
    /// Label.
    pub name: String,
    pub developer_name: String,
    pub record_type_id: String,
    pub layout_id: String,
}

/// GET /sobjects/{object}/describe/layouts/{recordTypeId}
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeLayout {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub edit_layout_sections: Vec<LayoutSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSection {
    pub use_heading: bool,
    #[serde(default)]
    pub heading: String,
    pub layout_section_id: String,
    pub parent_layout_id: String,
    #[serde(default)]
    pub layout_rows: Vec<LayoutRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRow {
    #[serde(default)]
    pub layout_items: Vec<LayoutItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutItem {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub layout_components: Vec<LayoutComponent>,
}

pub const EMPTY_SPACE_COMPONENT: &str = "EmptySpace";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutComponent {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub details: Option<FieldDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDetails {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: RemoteFieldType,
    #[serde(default)]
    pub updateable: bool,
    #[serde(default)]
    pub reference_to: Vec<String>,
    #[serde(default)]
    pub picklist_values: Vec<PicklistEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PicklistEntry {
    pub active: bool,
    #[serde(default)]
    pub label: String,
    pub value: String,
}

impl DescribeLayout {
    /// Field components of every headed edit section, paired with the section id.
    pub fn field_components(&self) -> impl Iterator<Item = (&LayoutSection, &FieldDetails)> {
        self.edit_layout_sections
            .iter()
            .filter(|section| section.use_heading)
            .flat_map(|section| {
                section
                    .layout_rows
                    .iter()
                    .flat_map(|row| row.layout_items.iter())
                    .flat_map(|item| item.layout_components.iter())
                    .filter(|c| c.component_type != EMPTY_SPACE_COMPONENT)
                    .filter_map(move |c| c.details.as_ref().map(|d| (section, d)))
            })
    }

    /// Details of a field wherever it sits on the layout (headed or not).
    pub fn find_field(&self, field_name: &str) -> Option<&FieldDetails> {
        self.edit_layout_sections
            .iter()
            .flat_map(|section| section.layout_rows.iter())
            .flat_map(|row| row.layout_items.iter())
            .flat_map(|item| item.layout_components.iter())
            .filter_map(|c| c.details.as_ref())
            .find(|d| d.name == field_name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query
// ─────────────────────────────────────────────────────────────────────────────

/// GET /query?q=
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub total_size: u64,
    #[serde(default = "default_done")]
    pub done: bool,
    #[serde(default)]
    pub next_records_url: Option<String>,
    #[serde(default)]
    pub records: Vec<RemoteRecord>,
}

fn default_done() -> bool {
    true
}

// ─────────────────────────────────────────────────────────────────────────────
// Composite tree (batch create)
// ─────────────────────────────────────────────────────────────────────────────

/// POST /composite/tree/{object}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeTreeRequest {
    pub records: Vec<RemoteRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeTreeResponse {
    pub has_errors: bool,
    #[serde(default)]
    pub results: Vec<CompositeTreeResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeTreeResult {
    pub reference_id: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetail {
    #[serde(default, alias = "errorCode")]
    pub status_code: String,
    pub message: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl CompositeTreeResponse {
    /// Remote id assigned to the record sent with `reference_id`.
    pub fn id_for(&self, reference_id: &str) -> Option<&str> {
        self.results
            .iter()
            .find(|r| r.reference_id == reference_id)
            .and_then(|r| r.id.as_deref())
    }

    /// `referenceId: STATUS message` for every failed record.
    pub fn error_summary(&self) -> String {
        self.results
            .iter()
            .flat_map(|r| {
                r.errors
                    .iter()
                    .map(move |e| format!("{}: {} {}", r.reference_id, e.status_code, e.message))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Reference id of the n-th record of a composite tree batch.
pub fn reference_id(index: usize) -> String {
    format!("ref{}", index)
}

// ─────────────────────────────────────────────────────────────────────────────
// Composite (batched GETs)
// ─────────────────────────────────────────────────────────────────────────────

/// POST /composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRequest {
    pub all_or_none: bool,
    pub composite_request: Vec<CompositeSubrequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSubrequest {
    pub method: String,
    pub url: String,
    pub reference_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResponse {
    #[serde(default)]
    pub composite_response: Vec<CompositeSubresponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSubresponse {
    #[serde(default)]
    pub body: serde_json::Value,
    pub http_status_code: u16,
    #[serde(default)]
    pub reference_id: String,
}

impl CompositeSubresponse {
    pub fn is_success(&self) -> bool {
        self.http_status_code == 200
    }

    /// First error message of a failed subrequest body (`[{message, errorCode}]`).
    pub fn error_message(&self) -> String {
        self.body
            .as_array()
            .and_then(|errors| errors.first())
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", self.http_status_code))
    }
}
