use async_trait::async_trait;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::metadata_model::{
    Localization, MetadataRefreshSummary, PageLayoutItem, PageLayoutSection, PicklistValue,
    RecordTypeDescriptor, StoredPageLayout,
};
use super::metadata_traits::{MetadataRepositoryTrait, MetadataServiceTrait};
use crate::crm::{CrmClientTrait, DescribeLayout, FieldDetails, RemoteRecord};
use crate::errors::{reasons, Error, Result};
use crate::schema::RemoteFieldType;
use crate::settings::SyncSettings;

const MASTER_RECORD_TYPE: &str = "Master";
const CONTACT_OBJECT: &str = "Contact";

const LOCALIZATION_TYPE_FIELD: &str = "GRMS_Type__c";
const LOCALIZATION_LOCALE_FIELD: &str = "GRMS_Locale__c";
const LOCALIZATION_NAME_FIELD: &str = "GRMS_OriginalName__c";
const LOCALIZATION_LABEL_FIELD: &str = "GRMS_TranslatedLabel__c";

pub struct MetadataService {
    crm: Arc<dyn CrmClientTrait>,
    repository: Arc<dyn MetadataRepositoryTrait>,
    settings: Arc<SyncSettings>,
}

impl MetadataService {
    pub fn new(
        crm: Arc<dyn CrmClientTrait>,
        repository: Arc<dyn MetadataRepositoryTrait>,
        settings: Arc<SyncSettings>,
    ) -> Self {
        Self {
            crm,
            repository,
            settings,
        }
    }

    /// Editable fields only: no empty space, no read-only fields, no lookups
    /// other than to Contact, nothing the app fills in itself.
    fn is_editable_field(&self, details: &FieldDetails) -> bool {
        let lookup_ok = match details.reference_to.first() {
            None => true,
            Some(target) => target == CONTACT_OBJECT,
        };
        details.updateable && lookup_ok && !self.settings.is_background_field(&details.name)
    }

    async fn store_layout(&self, layout: &DescribeLayout) -> Result<StoredPageLayout> {
        let sections: Vec<PageLayoutSection> = layout
            .edit_layout_sections
            .iter()
            .filter(|section| section.use_heading)
            .map(|section| PageLayoutSection {
                id: section.layout_section_id.clone(),
                layout_id: section.parent_layout_id.clone(),
                section_label: section.heading.clone(),
            })
            .collect();
        debug!("store_page_layout_items | {} sections", sections.len());
        self.repository
            .save_page_layout_sections(sections.clone())
            .await?;

        let mut picklist_values = BTreeSet::new();
        let mut items = Vec::new();
        for (section, details) in layout.field_components() {
            if !self.is_editable_field(details) {
                continue;
            }
            if details.field_type == RemoteFieldType::Picklist {
                for entry in details.picklist_values.iter().filter(|v| v.active) {
                    picklist_values.insert(PicklistValue {
                        field_name: details.name.clone(),
                        label: entry.label.clone(),
                        value: entry.value.clone(),
                    });
                }
            }
            items.push(PageLayoutItem {
                section_id: section.layout_section_id.clone(),
                field_name: details.name.clone(),
                field_label: details.label.clone(),
                field_type: details.field_type.clone(),
            });
        }
        debug!("store_page_layout_items | {} items", items.len());
        if items.is_empty() {
            return Err(Error::rejected(reasons::NO_EDITABLE_FIELDS));
        }
        self.repository.save_page_layout_items(items.clone()).await?;

        let picklist_values: Vec<PicklistValue> = picklist_values.into_iter().collect();
        self.repository
            .save_picklist_values(picklist_values.clone())
            .await?;

        Ok(StoredPageLayout {
            sections,
            items,
            picklist_values,
        })
    }

    /// Persist type and updateability of the configured title field of a record type.
    async fn store_title_field(
        &self,
        record_type: &RecordTypeDescriptor,
        layout: &DescribeLayout,
    ) -> Result<()> {
        let Some(field_name) = self.settings.title_fields.get(&record_type.name) else {
            return Ok(());
        };
        match layout.find_field(field_name) {
            Some(details) => {
                self.repository
                    .update_title_field(
                        record_type.name.clone(),
                        field_name.clone(),
                        details.field_type.clone(),
                        details.updateable,
                    )
                    .await
            }
            None => {
                warn!(
                    "Title field {} not found on layout of record type {}",
                    field_name, record_type.name
                );
                Ok(())
            }
        }
    }
}

fn text_field(record: &RemoteRecord, field: &str) -> String {
    record
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl MetadataServiceTrait for MetadataService {
    /// Fetch record type mappings of the survey object and store the active ones.
    async fn store_record_types(&self) -> Result<Vec<RecordTypeDescriptor>> {
        let response = self
            .crm
            .describe_layouts(&self.settings.survey_object)
            .await?;
        let record_types: Vec<RecordTypeDescriptor> = response
            .record_type_mappings
            .into_iter()
            .filter(|r| r.active && r.name != MASTER_RECORD_TYPE)
            .map(|r| RecordTypeDescriptor {
                name: r.developer_name,
                label: r.name,
                record_type_id: r.record_type_id,
                layout_id: r.layout_id,
                title_field_name: None,
                title_field_type: None,
                title_field_updateable: false,
            })
            .collect();
        if record_types.is_empty() {
            return Err(Error::rejected(reasons::NO_RECORD_TYPES));
        }
        debug!("store_record_types | {:?}", record_types);
        self.repository
            .save_record_types(record_types.clone())
            .await?;
        Ok(record_types)
    }

    async fn store_page_layout_items(&self, record_type_id: &str) -> Result<StoredPageLayout> {
        let layout = self
            .crm
            .describe_layout(&self.settings.survey_object, record_type_id)
            .await?;
        self.store_layout(&layout).await
    }

    async fn store_localization(&self) -> Result<usize> {
        let query = format!(
            "SELECT {}, {}, {}, {} FROM {}",
            LOCALIZATION_TYPE_FIELD,
            LOCALIZATION_LOCALE_FIELD,
            LOCALIZATION_NAME_FIELD,
            LOCALIZATION_LABEL_FIELD,
            self.settings.localization_object
        );
        let records = self.crm.query(&query).await?;
        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Localization> = records
            .iter()
            .map(|r| Localization {
                locale: text_field(r, LOCALIZATION_LOCALE_FIELD),
                kind: text_field(r, LOCALIZATION_TYPE_FIELD),
                name: text_field(r, LOCALIZATION_NAME_FIELD),
                label: text_field(r, LOCALIZATION_LABEL_FIELD),
            })
            .collect();
        self.repository.save_localizations(rows).await
    }

    async fn refresh_metadata(&self) -> Result<MetadataRefreshSummary> {
        let record_types = self.store_record_types().await?;
        self.repository.clear_layouts().await?;

        let mut summary = MetadataRefreshSummary {
            record_types: record_types.len(),
            ..Default::default()
        };
        for record_type in &record_types {
            let layout = self
                .crm
                .describe_layout(&self.settings.survey_object, &record_type.record_type_id)
                .await?;
            let stored = self.store_layout(&layout).await?;
            summary.layout_items += stored.items.len();
            summary.picklist_values += stored.picklist_values.len();
            self.store_title_field(record_type, &layout).await?;
        }
        summary.localizations = self.store_localization().await?;
        Ok(summary)
    }
}
