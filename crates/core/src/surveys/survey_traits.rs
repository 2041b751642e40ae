use async_trait::async_trait;
use std::collections::HashMap;

use super::survey_model::{SurveyListItem, SurveyRecord};
use crate::crm::RemoteRecord;
use crate::errors::Result;
use crate::schema::SurveySchema;
use crate::sync::{SyncStatus, SyncUploadSummary, SyncedRecordAssignment};

/// Local survey table whose columns follow the current [`SurveySchema`].
#[async_trait]
pub trait SurveyRepositoryTrait: Send + Sync {
    /// Fingerprint of the schema the table was last built from.
    fn schema_fingerprint(&self) -> Result<Option<String>>;

    /// Replace every survey row with `records` in one transaction; returns
    /// the number stored. With a schema the table is dropped and recreated
    /// for it first, otherwise the existing table is emptied.
    async fn replace_surveys(
        &self,
        schema: Option<SurveySchema>,
        records: Vec<SurveyRecord>,
    ) -> Result<usize>;

    /// Insert surveys, returning their new local ids in input order.
    async fn insert_surveys(&self, records: Vec<SurveyRecord>) -> Result<Vec<i64>>;

    /// Overwrite the columns present in `record` for its local id.
    async fn update_survey(&self, record: SurveyRecord) -> Result<()>;

    /// Flip rows to `Synced`, recording the remote id when one is given.
    async fn mark_synced(&self, assignments: Vec<SyncedRecordAssignment>) -> Result<usize>;

    fn get_survey(&self, local_id: i64) -> Result<Option<SurveyRecord>>;

    fn list_surveys_by_status(&self, status: SyncStatus) -> Result<Vec<SurveyRecord>>;

    /// Surveys left-joined with their record type.
    fn list_surveys_with_record_types(&self) -> Result<Vec<SurveyListItem>>;
}

#[async_trait]
pub trait SurveyServiceTrait: Send + Sync {
    /// Current schema derived from stored metadata.
    fn current_schema(&self) -> Result<SurveySchema>;

    /// Replace the local survey table with the user's surveys from the CRM.
    async fn store_online_surveys(&self) -> Result<usize>;

    /// Save a locally edited survey; returns its local id.
    async fn upsert_local_survey(&self, record: SurveyRecord) -> Result<i64>;

    /// Create surveys remotely in one batch. Fails as a whole if any record fails.
    async fn upload_surveys(
        &self,
        records: Vec<SurveyRecord>,
    ) -> Result<Vec<SyncedRecordAssignment>>;

    async fn update_survey_status_synced(
        &self,
        assignments: Vec<SyncedRecordAssignment>,
    ) -> Result<usize>;

    /// Upload every unsynced survey and mark the batch synced on success.
    async fn sync_unsynced_surveys(&self) -> Result<SyncUploadSummary>;

    /// Title field values for remote survey ids.
    async fn fetch_surveys_with_title_fields(
        &self,
        survey_ids: Vec<String>,
    ) -> Result<HashMap<String, RemoteRecord>>;

    fn list_local_surveys(&self) -> Result<Vec<SurveyListItem>>;
}
