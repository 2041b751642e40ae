use async_trait::async_trait;
use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::survey_mapping::{from_remote_record, to_remote_payload};
use super::survey_model::{SurveyListItem, SurveyRecord};
use super::survey_traits::{SurveyRepositoryTrait, SurveyServiceTrait};
use crate::crm::{reference_id, CrmClientTrait, RemoteRecord, ATTRIBUTES_KEY};
use crate::errors::{reasons, DatabaseError, Error, Rejection, Result};
use crate::metadata::MetadataRepositoryTrait;
use crate::schema::{build_survey_schema, SurveySchema};
use crate::session::SessionProvider;
use crate::settings::SyncSettings;
use crate::sync::{SyncStatus, SyncUploadSummary, SyncedRecordAssignment, REMOTE_ID_FIELD};
use crate::utils::date::now_iso_string;

/// Escape a value for use inside a single-quoted SOQL literal.
pub fn escape_soql_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub struct SurveyService {
    crm: Arc<dyn CrmClientTrait>,
    metadata_repository: Arc<dyn MetadataRepositoryTrait>,
    survey_repository: Arc<dyn SurveyRepositoryTrait>,
    session: Arc<dyn SessionProvider>,
    settings: Arc<SyncSettings>,
}

impl SurveyService {
    pub fn new(
        crm: Arc<dyn CrmClientTrait>,
        metadata_repository: Arc<dyn MetadataRepositoryTrait>,
        survey_repository: Arc<dyn SurveyRepositoryTrait>,
        session: Arc<dyn SessionProvider>,
        settings: Arc<SyncSettings>,
    ) -> Self {
        Self {
            crm,
            metadata_repository,
            survey_repository,
            session,
            settings,
        }
    }

    fn readonly_title_fields(&self) -> Result<HashSet<String>> {
        Ok(self
            .metadata_repository
            .load_record_types()?
            .iter()
            .filter_map(|rt| rt.readonly_title_field())
            .map(str::to_string)
            .collect())
    }

    fn title_fields(&self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        Ok(self
            .metadata_repository
            .load_record_types()?
            .into_iter()
            .filter_map(|rt| rt.title_field_name)
            .filter(|name| seen.insert(name.clone()))
            .collect())
    }
}

#[async_trait]
impl SurveyServiceTrait for SurveyService {
    fn current_schema(&self) -> Result<SurveySchema> {
        let items = self.metadata_repository.load_page_layout_items()?;
        let record_types = self.metadata_repository.load_record_types()?;
        Ok(build_survey_schema(
            &items,
            &record_types,
            &self.settings.background_fields,
        ))
    }

    async fn store_online_surveys(&self) -> Result<usize> {
        let schema = self.current_schema()?;
        let contact_id = self.session.user_contact_id().await?;
        let query = format!(
            "SELECT {} FROM {} WHERE {} = '{}'",
            schema.select_list(),
            self.settings.survey_object,
            self.settings.user_contact_field,
            escape_soql_literal(&contact_id)
        );
        // Local rows stay untouched until the download succeeded.
        let records = self.crm.query(&query).await?;
        let surveys: Vec<SurveyRecord> = records.into_iter().map(from_remote_record).collect();

        let fingerprint = schema.fingerprint();
        let rebuild = if self.survey_repository.schema_fingerprint()?.as_deref()
            == Some(fingerprint.as_str())
        {
            None
        } else {
            info!("Survey layout changed, rebuilding local table ({})", fingerprint);
            Some(schema)
        };
        let stored = self
            .survey_repository
            .replace_surveys(rebuild, surveys)
            .await?;
        debug!("store_online_surveys | stored {} surveys", stored);
        Ok(stored)
    }

    async fn upsert_local_survey(&self, mut record: SurveyRecord) -> Result<i64> {
        record.ensure_editable()?;
        record.fields.insert(
            self.settings.user_contact_field.clone(),
            self.session.user_contact_id().await?.into(),
        );
        record.fields.insert(
            self.settings.survey_date_field.clone(),
            now_iso_string().into(),
        );
        debug!("Saving survey {:?}", record);

        match record.local_id {
            Some(local_id) => {
                if let Some(existing) = self.survey_repository.get_survey(local_id)? {
                    existing.ensure_editable()?;
                }
                self.survey_repository.update_survey(record).await?;
                Ok(local_id)
            }
            None => {
                record.sync_status = SyncStatus::Unsynced;
                let ids = self.survey_repository.insert_surveys(vec![record]).await?;
                ids.into_iter().next().ok_or_else(|| {
                    Error::Database(DatabaseError::Internal(
                        "Insert returned no local id".to_string(),
                    ))
                })
            }
        }
    }

    async fn upload_surveys(
        &self,
        records: Vec<SurveyRecord>,
    ) -> Result<Vec<SyncedRecordAssignment>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let schema = self.current_schema()?;
        let readonly = self.readonly_title_fields()?;
        let payloads = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                to_remote_payload(
                    record,
                    &schema,
                    &readonly,
                    index,
                    &self.settings.survey_object,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let response = self
            .crm
            .create_records(&self.settings.survey_object, payloads)
            .await?;
        if response.has_errors {
            let summary = response.error_summary();
            error!("Survey upload rejected: {}", summary);
            return Err(Error::Rejected(
                Rejection::new(reasons::UPLOAD_FAILED).with_message(summary),
            ));
        }

        Ok(records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.local_id.map(|local_id| SyncedRecordAssignment {
                    local_id,
                    remote_id: response.id_for(&reference_id(index)).map(str::to_string),
                })
            })
            .collect())
    }

    async fn update_survey_status_synced(
        &self,
        assignments: Vec<SyncedRecordAssignment>,
    ) -> Result<usize> {
        if assignments.is_empty() {
            return Ok(0);
        }
        self.survey_repository.mark_synced(assignments).await
    }

    async fn sync_unsynced_surveys(&self) -> Result<SyncUploadSummary> {
        let pending = self
            .survey_repository
            .list_surveys_by_status(SyncStatus::Unsynced)?;
        if pending.is_empty() {
            return Ok(SyncUploadSummary::default());
        }
        info!("Uploading {} unsynced surveys", pending.len());

        let assignments = self.upload_surveys(pending).await?;
        let remote_ids = assignments
            .iter()
            .filter_map(|a| a.remote_id.clone())
            .collect();
        let uploaded_count = self.update_survey_status_synced(assignments).await?;
        Ok(SyncUploadSummary {
            uploaded_count,
            remote_ids,
        })
    }

    async fn fetch_surveys_with_title_fields(
        &self,
        survey_ids: Vec<String>,
    ) -> Result<HashMap<String, RemoteRecord>> {
        let title_fields = self.title_fields()?;
        if title_fields.is_empty() {
            return Ok(survey_ids
                .into_iter()
                .map(|id| (id, RemoteRecord::new()))
                .collect());
        }

        let response = self
            .crm
            .fetch_records_by_ids(&self.settings.survey_object, &survey_ids, &title_fields)
            .await?;
        debug!(
            "fetch_surveys_with_title_fields | {} subresponses",
            response.composite_response.len()
        );
        if let Some(failed) = response.composite_response.iter().find(|r| !r.is_success()) {
            let message = failed.error_message();
            error!("fetch_surveys_with_title_fields | {}", message);
            return Err(Error::Rejected(
                Rejection::new(reasons::COMPOSITE_FAILED).with_message(message),
            ));
        }

        Ok(response
            .composite_response
            .into_iter()
            .filter_map(|sub| match sub.body {
                serde_json::Value::Object(mut body) => {
                    body.remove(ATTRIBUTES_KEY);
                    let id = body.remove(REMOTE_ID_FIELD)?.as_str()?.to_string();
                    Some((id, body))
                }
                _ => None,
            })
            .collect())
    }

    fn list_local_surveys(&self) -> Result<Vec<SurveyListItem>> {
        self.survey_repository.list_surveys_with_record_types()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::{
        CompositeResponse, CompositeSubresponse, CompositeTreeResponse, CompositeTreeResult,
        DescribeLayout, DescribeLayoutResult,
    };
    use crate::errors::RemoteError;
    use crate::metadata::{
        Localization, PageLayoutItem, PageLayoutSection, PicklistValue, RecordTypeDescriptor,
    };
    use crate::schema::RemoteFieldType;
    use crate::session::StaticSession;
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCrm {
        query_records: Vec<RemoteRecord>,
        offline: bool,
        tree_response: Mutex<Option<CompositeTreeResponse>>,
        composite_response: Mutex<Option<CompositeResponse>>,
        queries: Mutex<Vec<String>>,
        created: Mutex<Vec<RemoteRecord>>,
        fetched_fields: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CrmClientTrait for FakeCrm {
        async fn query(&self, soql: &str) -> Result<Vec<RemoteRecord>> {
            self.queries.lock().unwrap().push(soql.to_string());
            if self.offline {
                return Err(Error::Remote(RemoteError::Transport("offline".to_string())));
            }
            Ok(self.query_records.clone())
        }

        async fn create_records(
            &self,
            _object_name: &str,
            records: Vec<RemoteRecord>,
        ) -> Result<CompositeTreeResponse> {
            let response = self.tree_response.lock().unwrap().take().unwrap_or_else(|| {
                CompositeTreeResponse {
                    has_errors: false,
                    results: (0..records.len())
                        .map(|i| CompositeTreeResult {
                            reference_id: reference_id(i),
                            id: Some(format!("a0B{}", i)),
                            errors: vec![],
                        })
                        .collect(),
                }
            });
            self.created.lock().unwrap().extend(records);
            Ok(response)
        }

        async fn describe_layouts(&self, _object_name: &str) -> Result<DescribeLayoutResult> {
            Ok(DescribeLayoutResult::default())
        }

        async fn describe_layout(
            &self,
            _object_name: &str,
            _record_type_id: &str,
        ) -> Result<DescribeLayout> {
            Ok(DescribeLayout::default())
        }

        async fn fetch_records_by_ids(
            &self,
            _object_name: &str,
            _ids: &[String],
            fields: &[String],
        ) -> Result<CompositeResponse> {
            self.fetched_fields.lock().unwrap().extend_from_slice(fields);
            Ok(self
                .composite_response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_default())
        }
    }

    struct FixedMetadata {
        items: Vec<PageLayoutItem>,
        record_types: Vec<RecordTypeDescriptor>,
    }

    #[async_trait]
    impl MetadataRepositoryTrait for FixedMetadata {
        fn load_record_types(&self) -> Result<Vec<RecordTypeDescriptor>> {
            Ok(self.record_types.clone())
        }
        fn load_page_layout_sections(&self, _layout_id: &str) -> Result<Vec<PageLayoutSection>> {
            Ok(vec![])
        }
        fn load_page_layout_items(&self) -> Result<Vec<PageLayoutItem>> {
            Ok(self.items.clone())
        }
        fn load_picklist_values(&self, _field_name: &str) -> Result<Vec<PicklistValue>> {
            Ok(vec![])
        }
        fn load_localizations(&self) -> Result<Vec<Localization>> {
            Ok(vec![])
        }
        async fn save_record_types(&self, r: Vec<RecordTypeDescriptor>) -> Result<usize> {
            Ok(r.len())
        }
        async fn save_page_layout_sections(&self, s: Vec<PageLayoutSection>) -> Result<usize> {
            Ok(s.len())
        }
        async fn save_page_layout_items(&self, i: Vec<PageLayoutItem>) -> Result<usize> {
            Ok(i.len())
        }
        async fn save_picklist_values(&self, v: Vec<PicklistValue>) -> Result<usize> {
            Ok(v.len())
        }
        async fn save_localizations(&self, l: Vec<Localization>) -> Result<usize> {
            Ok(l.len())
        }
        async fn update_title_field(
            &self,
            _record_type_name: String,
            _field_name: String,
            _field_type: RemoteFieldType,
            _updateable: bool,
        ) -> Result<()> {
            Ok(())
        }
        async fn clear_layouts(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemorySurveys {
        fingerprint: Mutex<Option<String>>,
        rows: Mutex<Vec<SurveyRecord>>,
        rebuilds: Mutex<usize>,
        clears: Mutex<usize>,
    }

    #[async_trait]
    impl SurveyRepositoryTrait for MemorySurveys {
        fn schema_fingerprint(&self) -> Result<Option<String>> {
            Ok(self.fingerprint.lock().unwrap().clone())
        }
        async fn replace_surveys(
            &self,
            schema: Option<SurveySchema>,
            records: Vec<SurveyRecord>,
        ) -> Result<usize> {
            match schema {
                Some(schema) => {
                    *self.fingerprint.lock().unwrap() = Some(schema.fingerprint());
                    *self.rebuilds.lock().unwrap() += 1;
                }
                None => *self.clears.lock().unwrap() += 1,
            }
            self.rows.lock().unwrap().clear();
            let count = records.len();
            self.insert_surveys(records).await?;
            Ok(count)
        }
        async fn insert_surveys(&self, records: Vec<SurveyRecord>) -> Result<Vec<i64>> {
            let mut rows = self.rows.lock().unwrap();
            let mut ids = Vec::new();
            for mut record in records {
                let id = rows.len() as i64 + 1;
                record.local_id = Some(id);
                rows.push(record);
                ids.push(id);
            }
            Ok(ids)
        }
        async fn update_survey(&self, record: SurveyRecord) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|r| r.local_id == record.local_id) {
                row.fields.extend(record.fields);
            }
            Ok(())
        }
        async fn mark_synced(&self, assignments: Vec<SyncedRecordAssignment>) -> Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            let mut n = 0;
            for a in assignments {
                if let Some(row) = rows.iter_mut().find(|r| r.local_id == Some(a.local_id)) {
                    row.sync_status = SyncStatus::Synced;
                    if a.remote_id.is_some() {
                        row.remote_id = a.remote_id;
                    }
                    n += 1;
                }
            }
            Ok(n)
        }
        fn get_survey(&self, local_id: i64) -> Result<Option<SurveyRecord>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.local_id == Some(local_id))
                .cloned())
        }
        fn list_surveys_by_status(&self, status: SyncStatus) -> Result<Vec<SurveyRecord>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.sync_status == status)
                .cloned()
                .collect())
        }
        fn list_surveys_with_record_types(&self) -> Result<Vec<SurveyListItem>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .map(|r| SurveyListItem {
                    survey: r.clone(),
                    record_type_name: None,
                    record_type_label: None,
                })
                .collect())
        }
    }

    fn layout_items() -> Vec<PageLayoutItem> {
        [
            ("Visits__c", "double"),
            ("Consent__c", "boolean"),
            ("Visit_Date__c", "date"),
        ]
        .iter()
        .map(|(name, kind)| PageLayoutItem {
            section_id: "sec-1".to_string(),
            field_name: name.to_string(),
            field_label: name.to_string(),
            field_type: RemoteFieldType::parse(kind),
        })
        .collect()
    }

    fn household(title_updateable: bool) -> RecordTypeDescriptor {
        RecordTypeDescriptor {
            name: "Household".to_string(),
            label: "Household".to_string(),
            record_type_id: "012A".to_string(),
            layout_id: "00hA".to_string(),
            title_field_name: Some("Household_Name__c".to_string()),
            title_field_type: Some(RemoteFieldType::String),
            title_field_updateable: title_updateable,
        }
    }

    struct Harness {
        service: SurveyService,
        crm: Arc<FakeCrm>,
        surveys: Arc<MemorySurveys>,
    }

    fn harness(crm: FakeCrm, record_types: Vec<RecordTypeDescriptor>) -> Harness {
        let crm = Arc::new(crm);
        let surveys = Arc::new(MemorySurveys::default());
        let metadata = Arc::new(FixedMetadata {
            items: layout_items(),
            record_types,
        });
        let session = Arc::new(StaticSession {
            instance_url: "https://example.my.salesforce.com".to_string(),
            access_token: "token".to_string(),
            user_contact_id: "003O'Brien".to_string(),
        });
        let service = SurveyService::new(
            crm.clone(),
            metadata,
            surveys.clone(),
            session,
            Arc::new(SyncSettings::default()),
        );
        Harness {
            service,
            crm,
            surveys,
        }
    }

    fn remote(id: &str) -> RemoteRecord {
        serde_json::from_value(serde_json::json!({
            "attributes": { "type": "Survey__c" },
            "Id": id,
            "Visits__c": 2,
            "Consent__c": true
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn online_surveys_rebuild_table_then_clear_on_same_layout() {
        let crm = FakeCrm {
            query_records: vec![remote("a0B1"), remote("a0B2")],
            ..Default::default()
        };
        let h = harness(crm, vec![household(true)]);

        assert_eq!(h.service.store_online_surveys().await.unwrap(), 2);
        assert_eq!(*h.surveys.rebuilds.lock().unwrap(), 1);
        assert_eq!(*h.surveys.clears.lock().unwrap(), 0);

        assert_eq!(h.service.store_online_surveys().await.unwrap(), 2);
        assert_eq!(*h.surveys.rebuilds.lock().unwrap(), 1);
        assert_eq!(*h.surveys.clears.lock().unwrap(), 1);

        let rows = h.surveys.rows.lock().unwrap().clone();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.sync_status == SyncStatus::Synced));
        assert_eq!(rows[0].remote_id.as_deref(), Some("a0B1"));

        let queries = h.crm.queries.lock().unwrap().clone();
        assert_eq!(
            queries[0],
            "SELECT Id,Visits__c,Consent__c,Visit_Date__c,Household_Name__c,RecordTypeId,\
             Survey_Taker__c,Survey_Date__c FROM Survey__c WHERE Survey_Taker__c = '003O\\'Brien'"
        );
    }

    #[tokio::test]
    async fn failed_download_keeps_local_surveys() {
        let crm = FakeCrm {
            offline: true,
            ..Default::default()
        };
        let h = harness(crm, vec![household(true)]);
        let schema = h.service.current_schema().unwrap();
        *h.surveys.fingerprint.lock().unwrap() = Some(schema.fingerprint());
        h.service
            .upsert_local_survey(SurveyRecord::new().with_field("Visits__c", 4))
            .await
            .unwrap();

        let err = h.service.store_online_surveys().await.unwrap_err();
        assert!(matches!(err, Error::Remote(RemoteError::Transport(_))));
        let pending = h
            .surveys
            .list_surveys_by_status(SyncStatus::Unsynced)
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fields["Visits__c"], Value::from(4));
        assert_eq!(*h.surveys.clears.lock().unwrap(), 0);
        assert_eq!(*h.surveys.rebuilds.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_download_still_replaces_local_surveys() {
        let h = harness(FakeCrm::default(), vec![]);
        h.service
            .upsert_local_survey(SurveyRecord::new().with_field("Visits__c", 4))
            .await
            .unwrap();

        assert_eq!(h.service.store_online_surveys().await.unwrap(), 0);
        assert!(h.surveys.rows.lock().unwrap().is_empty());
        assert_eq!(*h.surveys.rebuilds.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_stamps_contact_and_date_and_inserts_unsynced() {
        let h = harness(FakeCrm::default(), vec![]);
        let id = h
            .service
            .upsert_local_survey(SurveyRecord::new().with_field("Visits__c", 3))
            .await
            .unwrap();
        assert_eq!(id, 1);

        let saved = h.surveys.get_survey(1).unwrap().expect("saved survey");
        assert_eq!(saved.sync_status, SyncStatus::Unsynced);
        assert_eq!(saved.fields["Survey_Taker__c"], "003O'Brien");
        assert!(saved.fields["Survey_Date__c"].as_str().is_some());
    }

    #[tokio::test]
    async fn upsert_rejects_edits_to_synced_rows() {
        let h = harness(FakeCrm::default(), vec![]);
        h.surveys
            .insert_surveys(vec![SurveyRecord {
                sync_status: SyncStatus::Synced,
                remote_id: Some("a0B9".to_string()),
                ..Default::default()
            }])
            .await
            .unwrap();

        let edit = SurveyRecord {
            local_id: Some(1),
            ..Default::default()
        }
        .with_field("Visits__c", 5);
        let err = h.service.upsert_local_survey(edit).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(h.surveys.get_survey(1).unwrap().unwrap().fields.is_empty());
    }

    #[tokio::test]
    async fn sync_uploads_batch_and_marks_synced_with_remote_ids() {
        let h = harness(FakeCrm::default(), vec![household(false)]);
        for visits in [1, 2] {
            h.service
                .upsert_local_survey(
                    SurveyRecord::new()
                        .with_field("Visits__c", visits)
                        .with_field("Consent__c", 1)
                        .with_field("Household_Name__c", "computed"),
                )
                .await
                .unwrap();
        }

        let summary = h.service.sync_unsynced_surveys().await.unwrap();
        assert_eq!(summary.uploaded_count, 2);
        assert_eq!(summary.remote_ids, vec!["a0B0".to_string(), "a0B1".to_string()]);

        let created = h.crm.created.lock().unwrap().clone();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1]["Consent__c"], Value::Bool(true));
        assert!(!created[0].contains_key("Household_Name__c"));
        assert_eq!(created[1]["attributes"]["referenceId"], "ref1");

        let rows = h.surveys.rows.lock().unwrap().clone();
        assert!(rows.iter().all(|r| r.sync_status == SyncStatus::Synced));
        assert_eq!(rows[0].remote_id.as_deref(), Some("a0B0"));

        let again = h.service.sync_unsynced_surveys().await.unwrap();
        assert_eq!(again, SyncUploadSummary::default());
    }

    #[tokio::test]
    async fn partial_batch_failure_leaves_every_row_unsynced() {
        let crm = FakeCrm::default();
        *crm.tree_response.lock().unwrap() = Some(CompositeTreeResponse {
            has_errors: true,
            results: vec![CompositeTreeResult {
                reference_id: "ref1".to_string(),
                id: None,
                errors: vec![crate::crm::ApiErrorDetail {
                    status_code: "FIELD_CUSTOM_VALIDATION_EXCEPTION".to_string(),
                    message: "Visits must be positive".to_string(),
                    fields: vec![],
                }],
            }],
        });
        let h = harness(crm, vec![]);
        for visits in [1, -1] {
            h.service
                .upsert_local_survey(SurveyRecord::new().with_field("Visits__c", visits))
                .await
                .unwrap();
        }

        let err = h.service.sync_unsynced_surveys().await.unwrap_err();
        assert_eq!(
            err.to_payload(),
            serde_json::json!({
                "error": "upload_failed",
                "message": "ref1: FIELD_CUSTOM_VALIDATION_EXCEPTION Visits must be positive"
            })
        );
        let rows = h.surveys.rows.lock().unwrap().clone();
        assert!(rows.iter().all(|r| r.sync_status == SyncStatus::Unsynced));
    }

    #[tokio::test]
    async fn title_fields_short_circuit_without_title_configuration() {
        let h = harness(FakeCrm::default(), vec![]);
        let result = h
            .service
            .fetch_surveys_with_title_fields(vec!["a0B1".to_string()])
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert!(result["a0B1"].is_empty());
        assert!(h.crm.fetched_fields.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn title_fields_are_keyed_by_remote_id() {
        let crm = FakeCrm::default();
        *crm.composite_response.lock().unwrap() = Some(CompositeResponse {
            composite_response: vec![CompositeSubresponse {
                body: serde_json::json!({
                    "attributes": { "type": "Survey__c" },
                    "Id": "a0B1",
                    "Household_Name__c": "Doe"
                }),
                http_status_code: 200,
                reference_id: "a0B1".to_string(),
            }],
        });
        let h = harness(crm, vec![household(true)]);
        let result = h
            .service
            .fetch_surveys_with_title_fields(vec!["a0B1".to_string()])
            .await
            .unwrap();
        assert_eq!(result["a0B1"]["Household_Name__c"], "Doe");
        assert!(!result["a0B1"].contains_key("Id"));
        assert_eq!(
            h.crm.fetched_fields.lock().unwrap().clone(),
            vec!["Household_Name__c".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_title_subrequest_rejects_with_its_message() {
        let crm = FakeCrm::default();
        *crm.composite_response.lock().unwrap() = Some(CompositeResponse {
            composite_response: vec![CompositeSubresponse {
                body: serde_json::json!([{ "message": "The requested resource does not exist", "errorCode": "NOT_FOUND" }]),
                http_status_code: 404,
                reference_id: "a0B2".to_string(),
            }],
        });
        let h = harness(crm, vec![household(true)]);
        let err = h
            .service
            .fetch_surveys_with_title_fields(vec!["a0B2".to_string()])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_payload(),
            serde_json::json!({
                "error": "composite",
                "message": "The requested resource does not exist"
            })
        );
    }

    #[test]
    fn soql_literals_escape_quotes_and_backslashes() {
        assert_eq!(escape_soql_literal("O'Brien"), "O\\'Brien");
        assert_eq!(escape_soql_literal("a\\b"), "a\\\\b");
    }
}
