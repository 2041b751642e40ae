use diesel::prelude::*;

use survey_sync_core::metadata::{
    Localization, PageLayoutItem, PageLayoutSection, PicklistValue, RecordTypeDescriptor,
};
use survey_sync_core::schema::RemoteFieldType;

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::record_types)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecordTypeDB {
    pub name: String,
    pub label: String,
    pub record_type_id: String,
    pub layout_id: String,
    pub title_field_name: Option<String>,
    pub title_field_type: Option<String>,
    pub title_field_updateable: bool,
}

impl From<RecordTypeDB> for RecordTypeDescriptor {
    fn from(db: RecordTypeDB) -> Self {
        Self {
            name: db.name,
            label: db.label,
            record_type_id: db.record_type_id,
            layout_id: db.layout_id,
            title_field_name: db.title_field_name,
            title_field_type: db.title_field_type.as_deref().map(RemoteFieldType::parse),
            title_field_updateable: db.title_field_updateable,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::page_layout_sections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PageLayoutSectionDB {
    pub id: String,
    pub layout_id: String,
    pub section_label: String,
}

impl From<PageLayoutSectionDB> for PageLayoutSection {
    fn from(db: PageLayoutSectionDB) -> Self {
        Self {
            id: db.id,
            layout_id: db.layout_id,
            section_label: db.section_label,
        }
    }
}

impl From<PageLayoutSection> for PageLayoutSectionDB {
    fn from(section: PageLayoutSection) -> Self {
        Self {
            id: section.id,
            layout_id: section.layout_id,
            section_label: section.section_label,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::page_layout_items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PageLayoutItemDB {
    pub section_id: String,
    pub field_name: String,
    pub field_label: String,
    pub field_type: String,
}

impl From<PageLayoutItemDB> for PageLayoutItem {
    fn from(db: PageLayoutItemDB) -> Self {
        Self {
            section_id: db.section_id,
            field_name: db.field_name,
            field_label: db.field_label,
            field_type: RemoteFieldType::parse(&db.field_type),
        }
    }
}

impl From<PageLayoutItem> for PageLayoutItemDB {
    fn from(item: PageLayoutItem) -> Self {
        Self {
            section_id: item.section_id,
            field_name: item.field_name,
            field_label: item.field_label,
            field_type: item.field_type.as_str().to_string(),
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::picklist_values)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PicklistValueDB {
    pub field_name: String,
    pub label: String,
    pub value: String,
}

impl From<PicklistValueDB> for PicklistValue {
    fn from(db: PicklistValueDB) -> Self {
        Self {
            field_name: db.field_name,
            label: db.label,
            value: db.value,
        }
    }
}

impl From<PicklistValue> for PicklistValueDB {
    fn from(value: PicklistValue) -> Self {
        Self {
            field_name: value.field_name,
            label: value.label,
            value: value.value,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::localizations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LocalizationDB {
    pub locale: String,
    pub kind: String,
    pub name: String,
    pub label: String,
}

impl From<LocalizationDB> for Localization {
    fn from(db: LocalizationDB) -> Self {
        Self {
            locale: db.locale,
            kind: db.kind,
            name: db.name,
            label: db.label,
        }
    }
}

impl From<Localization> for LocalizationDB {
    fn from(row: Localization) -> Self {
        Self {
            locale: row.locale,
            kind: row.kind,
            name: row.name,
            label: row.label,
        }
    }
}
