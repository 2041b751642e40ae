// Static tables from `migrations/`. The survey table is built at runtime
// from the layout and has no entry here.

diesel::table! {
    #[sql_name = "RecordType"]
    record_types (name) {
        name -> Text,
        label -> Text,
        record_type_id -> Text,
        layout_id -> Text,
        title_field_name -> Nullable<Text>,
        title_field_type -> Nullable<Text>,
        title_field_updateable -> Bool,
    }
}

diesel::table! {
    #[sql_name = "PageLayoutSection"]
    page_layout_sections (id) {
        id -> Text,
        layout_id -> Text,
        section_label -> Text,
    }
}

diesel::table! {
    #[sql_name = "PageLayoutItem"]
    page_layout_items (section_id, field_name) {
        section_id -> Text,
        field_name -> Text,
        field_label -> Text,
        field_type -> Text,
    }
}

diesel::table! {
    #[sql_name = "PicklistValue"]
    picklist_values (field_name, value) {
        field_name -> Text,
        label -> Text,
        value -> Text,
    }
}

diesel::table! {
    #[sql_name = "Localization"]
    localizations (locale, kind, name) {
        locale -> Text,
        #[sql_name = "type"]
        kind -> Text,
        name -> Text,
        label -> Text,
    }
}

diesel::table! {
    #[sql_name = "_schema_state"]
    schema_state (key) {
        key -> Text,
        value -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    record_types,
    page_layout_sections,
    page_layout_items,
    picklist_values,
    localizations,
    schema_state,
);
