//! Sync settings: object/field names used on the CRM side and transport tuning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_API_VERSION: &str = "v49.0";
pub const DEFAULT_SURVEY_OBJECT: &str = "Survey__c";
pub const DEFAULT_USER_CONTACT_FIELD: &str = "Survey_Taker__c";
pub const DEFAULT_SURVEY_DATE_FIELD: &str = "Survey_Date__c";
pub const DEFAULT_LOCALIZATION_OBJECT: &str = "GRMS_Localization__mdt";
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 250;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 4_000;

const ENV_PREFIX: &str = "SURVEY_SYNC_";

/// A field maintained by the app itself rather than by the page layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundField {
    pub field_name: String,
    pub field_type: String,
}

impl BackgroundField {
    pub fn new(field_name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            field_type: field_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub api_version: String,
    pub survey_object: String,
    pub user_contact_field: String,
    pub survey_date_field: String,
    pub localization_object: String,
    /// Fields always present on the local survey table regardless of layout.
    pub background_fields: Vec<BackgroundField>,
    /// Record type developer name -> title field API name.
    pub title_fields: BTreeMap<String, String>,
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            survey_object: DEFAULT_SURVEY_OBJECT.to_string(),
            user_contact_field: DEFAULT_USER_CONTACT_FIELD.to_string(),
            survey_date_field: DEFAULT_SURVEY_DATE_FIELD.to_string(),
            localization_object: DEFAULT_LOCALIZATION_OBJECT.to_string(),
            background_fields: vec![
                BackgroundField::new("RecordTypeId", "reference"),
                BackgroundField::new(DEFAULT_USER_CONTACT_FIELD, "reference"),
                BackgroundField::new(DEFAULT_SURVEY_DATE_FIELD, "datetime"),
            ],
            title_fields: BTreeMap::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SyncSettings {
    /// Defaults overridden by `SURVEY_SYNC_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(env_value)
    }

    /// Apply overrides from a key lookup (keys without the `SURVEY_SYNC_` prefix).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("API_VERSION") {
            self.api_version = v;
        }
        if let Some(v) = lookup("SURVEY_OBJECT") {
            self.survey_object = v;
        }
        if let Some(v) = lookup("USER_CONTACT_FIELD") {
            replace_background_field(&mut self.background_fields, &self.user_contact_field, &v);
            self.user_contact_field = v;
        }
        if let Some(v) = lookup("SURVEY_DATE_FIELD") {
            replace_background_field(&mut self.background_fields, &self.survey_date_field, &v);
            self.survey_date_field = v;
        }
        if let Some(v) = lookup("LOCALIZATION_OBJECT") {
            self.localization_object = v;
        }
        if let Some(v) = lookup("TITLE_FIELDS") {
            // RecordTypeA=Field_A__c,RecordTypeB=Field_B__c
            self.title_fields = v
                .split(',')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .collect();
        }
        if let Some(v) = lookup("MAX_ATTEMPTS").and_then(|v| v.parse::<usize>().ok()) {
            self.max_attempts = v.max(1);
        }
        if let Some(v) = lookup("BASE_BACKOFF_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.base_backoff_ms = v;
        }
        if let Some(v) = lookup("MAX_BACKOFF_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.max_backoff_ms = v;
        }
        self
    }

    pub fn is_background_field(&self, name: &str) -> bool {
        self.background_fields.iter().any(|f| f.field_name == name)
    }
}

fn replace_background_field(fields: &mut [BackgroundField], old: &str, new: &str) {
    for field in fields.iter_mut().filter(|f| f.field_name == old) {
        field.field_name = new.to_string();
    }
}
