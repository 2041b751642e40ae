use async_trait::async_trait;

use super::crm_model::{
    CompositeResponse, CompositeTreeResponse, DescribeLayout, DescribeLayoutResult, RemoteRecord,
};
use crate::errors::Result;

/// Calls the sync layer makes against the CRM REST API.
///
/// Implementations retry transient failures internally; an `Err` means the
/// retry budget is spent or the failure was permanent.
#[async_trait]
pub trait CrmClientTrait: Send + Sync {
    /// Run a query and return all records with `attributes` removed.
    async fn query(&self, soql: &str) -> Result<Vec<RemoteRecord>>;

    /// Create records in one batch. Per-record failures come back in the
    /// response (`has_errors`) rather than as an `Err`.
    async fn create_records(
        &self,
        object_name: &str,
        records: Vec<RemoteRecord>,
    ) -> Result<CompositeTreeResponse>;

    async fn describe_layouts(&self, object_name: &str) -> Result<DescribeLayoutResult>;

    async fn describe_layout(&self, object_name: &str, record_type_id: &str)
        -> Result<DescribeLayout>;

    /// Fetch selected fields of records by id, one subrequest per id.
    async fn fetch_records_by_ids(
        &self,
        object_name: &str,
        ids: &[String],
        fields: &[String],
    ) -> Result<CompositeResponse>;
}
