//! Dynamic SQL for the survey table.

use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Double, Nullable, Text};
use diesel::sqlite::Sqlite;
use serde_json::Value;
use std::collections::BTreeMap;

use survey_sync_core::schema::{LocalType, SurveySchema};
use survey_sync_core::sync::{LOCAL_ID_FIELD, SYNC_STATUS_FIELD};
use survey_sync_core::Result;

use crate::errors::StorageError;

pub const SURVEY_TABLE: &str = "Survey";
/// `_schema_state` key holding the fingerprint the survey table was built from.
pub const SURVEY_FINGERPRINT_KEY: &str = "survey_fingerprint";

/// Column pairs per `json_object` call. SQLite caps function arguments at 127
/// by default; the last pair of each call carries the remaining columns.
const PAIRS_PER_OBJECT: usize = 50;

pub(crate) type SurveyQuery = BoxedSqlQuery<'static, Sqlite, SqlQuery>;

pub(crate) fn escape_sqlite_str(value: &str) -> String {
    value.replace('\'', "''")
}

pub(crate) fn quote_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

/// `CREATE TABLE` for the survey table: bookkeeping columns first, then one
/// column per schema field typed by its local type.
pub(crate) fn create_table_sql(schema: &SurveySchema) -> String {
    let mut columns = vec![
        format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote_identifier(LOCAL_ID_FIELD)
        ),
        format!(
            "{} TEXT NOT NULL DEFAULT 'Unsynced'",
            quote_identifier(SYNC_STATUS_FIELD)
        ),
    ];
    columns.extend(schema.fields().iter().map(|field| {
        format!(
            "{} {}",
            quote_identifier(&field.name),
            field.local_type.sql_type()
        )
    }));
    format!(
        "CREATE TABLE {} ({})",
        quote_identifier(SURVEY_TABLE),
        columns.join(", ")
    )
}

#[derive(diesel::QueryableByName)]
struct PragmaTableInfoRow {
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    declared_type: String,
}

/// Column names and declared types, in table order.
pub(crate) fn load_table_columns(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<(String, String)>> {
    let sql = format!(
        "SELECT name, type AS declared_type FROM pragma_table_info('{}') ORDER BY cid",
        escape_sqlite_str(table)
    );
    let columns = diesel::sql_query(sql)
        .load::<PragmaTableInfoRow>(conn)
        .map_err(StorageError::from)?
        .into_iter()
        .map(|row| (row.name, row.declared_type))
        .collect();
    Ok(columns)
}

/// Local type of a declared column type. Anything not integer is text.
pub(crate) fn local_type_of(declared: &str) -> LocalType {
    if declared.eq_ignore_ascii_case("integer") {
        LocalType::Integer
    } else {
        LocalType::Text
    }
}

/// SQL expression rendering the named columns of `qualifier` as one JSON
/// object. Wide tables nest the overflow under the empty key.
pub(crate) fn row_object_sql(columns: &[String], qualifier: &str) -> String {
    let mut object: Option<String> = None;
    for chunk in columns.chunks(PAIRS_PER_OBJECT).rev() {
        let mut args: Vec<String> = chunk
            .iter()
            .map(|column| {
                format!(
                    "'{}', {}.{}",
                    escape_sqlite_str(column),
                    qualifier,
                    quote_identifier(column)
                )
            })
            .collect();
        if let Some(rest) = object.take() {
            args.push(format!("'', {}", rest));
        }
        object = Some(format!("json_object({})", args.join(", ")));
    }
    object.unwrap_or_else(|| "json_object()".to_string())
}

/// Column map from a [`row_object_sql`] result.
pub(crate) fn parse_row_object(text: &str) -> Result<BTreeMap<String, Value>> {
    let mut row = BTreeMap::new();
    flatten_into(serde_json::from_str(text)?, &mut row);
    Ok(row)
}

fn flatten_into(value: Value, row: &mut BTreeMap<String, Value>) {
    if let Value::Object(map) = value {
        for (key, value) in map {
            if key.is_empty() {
                flatten_into(value, row);
            } else {
                row.insert(key, value);
            }
        }
    }
}

/// Bind a JSON value with the SQLite storage class it maps to.
pub(crate) fn bind_json(query: SurveyQuery, value: &Value) -> SurveyQuery {
    match value {
        Value::Null => query.bind::<Nullable<Text>, _>(None::<String>),
        Value::Bool(v) => query.bind::<BigInt, _>(i64::from(*v)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => query.bind::<BigInt, _>(i),
            (None, Some(f)) => query.bind::<Double, _>(f),
            (None, None) => query.bind::<Nullable<Text>, _>(None::<String>),
        },
        Value::String(v) => query.bind::<Text, _>(v.clone()),
        Value::Array(_) | Value::Object(_) => query.bind::<Text, _>(value.to_string()),
    }
}
