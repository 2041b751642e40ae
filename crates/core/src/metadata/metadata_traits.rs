use async_trait::async_trait;

use super::metadata_model::{
    Localization, MetadataRefreshSummary, PageLayoutItem, PageLayoutSection, PicklistValue,
    RecordTypeDescriptor, StoredPageLayout,
};
use crate::errors::Result;
use crate::schema::RemoteFieldType;

/// Local persistence of layout metadata.
#[async_trait]
pub trait MetadataRepositoryTrait: Send + Sync {
    fn load_record_types(&self) -> Result<Vec<RecordTypeDescriptor>>;
    fn load_page_layout_sections(&self, layout_id: &str) -> Result<Vec<PageLayoutSection>>;
    fn load_page_layout_items(&self) -> Result<Vec<PageLayoutItem>>;
    fn load_picklist_values(&self, field_name: &str) -> Result<Vec<PicklistValue>>;
    fn load_localizations(&self) -> Result<Vec<Localization>>;

    /// Upsert keyed by record type developer name; title field columns are kept.
    async fn save_record_types(&self, record_types: Vec<RecordTypeDescriptor>) -> Result<usize>;
    async fn save_page_layout_sections(&self, sections: Vec<PageLayoutSection>) -> Result<usize>;
    async fn save_page_layout_items(&self, items: Vec<PageLayoutItem>) -> Result<usize>;
    async fn save_picklist_values(&self, values: Vec<PicklistValue>) -> Result<usize>;
    async fn save_localizations(&self, rows: Vec<Localization>) -> Result<usize>;

    async fn update_title_field(
        &self,
        record_type_name: String,
        field_name: String,
        field_type: RemoteFieldType,
        updateable: bool,
    ) -> Result<()>;

    /// Remove sections, items and picklist values ahead of a full reload.
    async fn clear_layouts(&self) -> Result<()>;
}

#[async_trait]
pub trait MetadataServiceTrait: Send + Sync {
    async fn store_record_types(&self) -> Result<Vec<RecordTypeDescriptor>>;
    async fn store_page_layout_items(&self, record_type_id: &str) -> Result<StoredPageLayout>;
    async fn store_localization(&self) -> Result<usize>;
    async fn refresh_metadata(&self) -> Result<MetadataRefreshSummary>;
}
