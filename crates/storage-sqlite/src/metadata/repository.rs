use async_trait::async_trait;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel::SqliteConnection;
use log::debug;
use std::sync::Arc;

use survey_sync_core::metadata::{
    Localization, MetadataRepositoryTrait, PageLayoutItem, PageLayoutSection, PicklistValue,
    RecordTypeDescriptor,
};
use survey_sync_core::schema::RemoteFieldType;
use survey_sync_core::Result;

use super::model::{
    LocalizationDB, PageLayoutItemDB, PageLayoutSectionDB, PicklistValueDB, RecordTypeDB,
};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{
    localizations, page_layout_items, page_layout_sections, picklist_values, record_types,
};

pub struct MetadataRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl MetadataRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        MetadataRepository { pool, writer }
    }
}

#[async_trait]
impl MetadataRepositoryTrait for MetadataRepository {
    fn load_record_types(&self) -> Result<Vec<RecordTypeDescriptor>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = record_types::table
            .select(RecordTypeDB::as_select())
            .order(sql::<BigInt>("rowid"))
            .load::<RecordTypeDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(RecordTypeDescriptor::from).collect())
    }

    fn load_page_layout_sections(&self, layout_id: &str) -> Result<Vec<PageLayoutSection>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = page_layout_sections::table
            .filter(page_layout_sections::layout_id.eq(layout_id))
            .select(PageLayoutSectionDB::as_select())
            .order(sql::<BigInt>("rowid"))
            .load::<PageLayoutSectionDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(PageLayoutSection::from).collect())
    }

    fn load_page_layout_items(&self) -> Result<Vec<PageLayoutItem>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = page_layout_items::table
            .select(PageLayoutItemDB::as_select())
            .order(sql::<BigInt>("rowid"))
            .load::<PageLayoutItemDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(PageLayoutItem::from).collect())
    }

    fn load_picklist_values(&self, field_name: &str) -> Result<Vec<PicklistValue>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = picklist_values::table
            .filter(picklist_values::field_name.eq(field_name))
            .select(PicklistValueDB::as_select())
            .order(sql::<BigInt>("rowid"))
            .load::<PicklistValueDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(PicklistValue::from).collect())
    }

    fn load_localizations(&self) -> Result<Vec<Localization>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = localizations::table
            .select(LocalizationDB::as_select())
            .order(sql::<BigInt>("rowid"))
            .load::<LocalizationDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(Localization::from).collect())
    }

    async fn save_record_types(&self, descriptors: Vec<RecordTypeDescriptor>) -> Result<usize> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let keep: Vec<&str> = descriptors.iter().map(|rt| rt.name.as_str()).collect();
                let removed = diesel::delete(
                    record_types::table.filter(record_types::name.ne_all(keep)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                if removed > 0 {
                    debug!("Removed {} stale record types", removed);
                }

                // Title columns belong to the layout refresh; an upsert leaves them alone.
                for rt in &descriptors {
                    diesel::insert_into(record_types::table)
                        .values((
                            record_types::name.eq(&rt.name),
                            record_types::label.eq(&rt.label),
                            record_types::record_type_id.eq(&rt.record_type_id),
                            record_types::layout_id.eq(&rt.layout_id),
                        ))
                        .on_conflict(record_types::name)
                        .do_update()
                        .set((
                            record_types::label.eq(&rt.label),
                            record_types::record_type_id.eq(&rt.record_type_id),
                            record_types::layout_id.eq(&rt.layout_id),
                        ))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(descriptors.len())
            })
            .await
    }

    async fn save_page_layout_sections(&self, sections: Vec<PageLayoutSection>) -> Result<usize> {
        if sections.is_empty() {
            return Ok(0);
        }
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let rows: Vec<PageLayoutSectionDB> =
                    sections.into_iter().map(PageLayoutSectionDB::from).collect();
                for row in &rows {
                    diesel::replace_into(page_layout_sections::table)
                        .values(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(rows.len())
            })
            .await
    }

    async fn save_page_layout_items(&self, items: Vec<PageLayoutItem>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let rows: Vec<PageLayoutItemDB> =
                    items.into_iter().map(PageLayoutItemDB::from).collect();
                for row in &rows {
                    diesel::replace_into(page_layout_items::table)
                        .values(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(rows.len())
            })
            .await
    }

    async fn save_picklist_values(&self, values: Vec<PicklistValue>) -> Result<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let rows: Vec<PicklistValueDB> =
                    values.into_iter().map(PicklistValueDB::from).collect();
                for row in &rows {
                    diesel::replace_into(picklist_values::table)
                        .values(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(rows.len())
            })
            .await
    }

    async fn save_localizations(&self, rows: Vec<Localization>) -> Result<usize> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                diesel::delete(localizations::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                let rows: Vec<LocalizationDB> = rows.into_iter().map(LocalizationDB::from).collect();
                for row in &rows {
                    diesel::replace_into(localizations::table)
                        .values(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(rows.len())
            })
            .await
    }

    async fn update_title_field(
        &self,
        record_type_name: String,
        field_name: String,
        field_type: RemoteFieldType,
        updateable: bool,
    ) -> Result<()> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::update(record_types::table.find(&record_type_name))
                    .set((
                        record_types::title_field_name.eq(Some(field_name)),
                        record_types::title_field_type.eq(Some(field_type.as_str().to_string())),
                        record_types::title_field_updateable.eq(updateable),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn clear_layouts(&self) -> Result<()> {
        self.writer
            .exec(|conn: &mut SqliteConnection| -> Result<()> {
                diesel::delete(page_layout_sections::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(page_layout_items::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(picklist_values::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
