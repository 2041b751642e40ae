use async_trait::async_trait;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::sqlite::Sqlite;
use log::debug;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use survey_sync_core::errors::{DatabaseError, Error, ValidationError};
use survey_sync_core::schema::{LocalType, SurveySchema};
use survey_sync_core::surveys::{
    to_local_value, SurveyListItem, SurveyRecord, SurveyRepositoryTrait,
};
use survey_sync_core::sync::{
    SyncStatus, SyncedRecordAssignment, LOCAL_ID_FIELD, REMOTE_ID_FIELD, SYNC_STATUS_FIELD,
};
use survey_sync_core::Result;

use super::table::{
    bind_json, create_table_sql, load_table_columns, local_type_of, parse_row_object,
    quote_identifier, row_object_sql, SURVEY_FINGERPRINT_KEY, SURVEY_TABLE,
};
use crate::db::{get_connection, read_state, table_exists, write_state, DbPool, WriteHandle};
use crate::errors::StorageError;

/// Survey column joined against `RecordType.record_type_id` for list screens.
const RECORD_TYPE_FIELD: &str = "RecordTypeId";

type Row = BTreeMap<String, Value>;

#[derive(diesel::QueryableByName)]
struct SurveyRow {
    #[diesel(sql_type = Text)]
    row_json: String,
}

#[derive(diesel::QueryableByName)]
struct ListedSurveyRow {
    #[diesel(sql_type = Text)]
    row_json: String,
    #[diesel(sql_type = Nullable<Text>)]
    record_type_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    record_type_label: Option<String>,
}

fn survey_columns(conn: &mut SqliteConnection) -> Result<Vec<(String, LocalType)>> {
    if !table_exists(conn, SURVEY_TABLE)? {
        return Err(Error::Database(DatabaseError::NotFound(format!(
            "Table {} has not been created",
            SURVEY_TABLE
        ))));
    }
    Ok(load_table_columns(conn, SURVEY_TABLE)?
        .into_iter()
        .map(|(name, declared)| {
            let local_type = local_type_of(&declared);
            (name, local_type)
        })
        .collect())
}

/// Columns of `row` that exist in the table, with values normalized for storage.
fn bind_columns(row: &Row, columns: &HashMap<String, LocalType>) -> (Vec<String>, Vec<Value>) {
    let mut names = Vec::new();
    let mut values = Vec::new();
    for (name, value) in row {
        let Some(local_type) = columns.get(name) else {
            debug!("Skipping column {} not present in survey table", name);
            continue;
        };
        names.push(quote_identifier(name));
        values.push(to_local_value(value, *local_type));
    }
    (names, values)
}

fn insert_rows(
    conn: &mut SqliteConnection,
    columns: &HashMap<String, LocalType>,
    records: &[SurveyRecord],
) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        let mut row = record.to_row();
        row.remove(LOCAL_ID_FIELD);
        let (names, values) = bind_columns(&row, columns);
        let statement = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(SURVEY_TABLE))
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(SURVEY_TABLE),
                names.join(", "),
                vec!["?"; values.len()].join(", ")
            )
        };
        values
            .iter()
            .fold(
                diesel::sql_query(statement).into_boxed::<Sqlite>(),
                bind_json,
            )
            .execute(conn)
            .map_err(StorageError::from)?;
        let id = diesel::select(sql::<BigInt>("last_insert_rowid()"))
            .get_result::<i64>(conn)
            .map_err(StorageError::from)?;
        ids.push(id);
    }
    Ok(ids)
}

fn column_names(columns: &[(String, LocalType)]) -> Vec<String> {
    columns.iter().map(|(name, _)| name.clone()).collect()
}

pub struct SurveyRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SurveyRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        SurveyRepository { pool, writer }
    }

    /// Surveys whose `column` equals `value`, in local id order.
    fn load_surveys_where(&self, column: &str, value: Value) -> Result<Vec<SurveyRecord>> {
        let mut conn = get_connection(&self.pool)?;
        if !table_exists(&mut conn, SURVEY_TABLE)? {
            return Ok(Vec::new());
        }
        let columns = column_names(&survey_columns(&mut conn)?);
        let statement = format!(
            "SELECT {} AS row_json FROM {} s WHERE s.{} = ? ORDER BY s.{}",
            row_object_sql(&columns, "s"),
            quote_identifier(SURVEY_TABLE),
            quote_identifier(column),
            quote_identifier(LOCAL_ID_FIELD)
        );
        let rows = bind_json(diesel::sql_query(statement).into_boxed::<Sqlite>(), &value)
            .load::<SurveyRow>(&mut conn)
            .map_err(StorageError::from)?;
        rows.iter()
            .map(|row| parse_row_object(&row.row_json).map(SurveyRecord::from_row))
            .collect()
    }
}

#[async_trait]
impl SurveyRepositoryTrait for SurveyRepository {
    fn schema_fingerprint(&self) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        if !table_exists(&mut conn, SURVEY_TABLE)? {
            return Ok(None);
        }
        read_state(&mut conn, SURVEY_FINGERPRINT_KEY)
    }

    async fn replace_surveys(
        &self,
        schema: Option<SurveySchema>,
        records: Vec<SurveyRecord>,
    ) -> Result<usize> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                if let Some(schema) = &schema {
                    diesel::sql_query(format!(
                        "DROP TABLE IF EXISTS {}",
                        quote_identifier(SURVEY_TABLE)
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                    diesel::sql_query(create_table_sql(schema))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                    write_state(conn, SURVEY_FINGERPRINT_KEY, &schema.fingerprint())?;
                    debug!("Rebuilt survey table with {} columns", schema.len());
                }

                let columns: HashMap<String, LocalType> =
                    survey_columns(conn)?.into_iter().collect();
                if schema.is_none() {
                    let removed =
                        diesel::sql_query(format!("DELETE FROM {}", quote_identifier(SURVEY_TABLE)))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    debug!("Cleared {} surveys", removed);
                }
                Ok(insert_rows(conn, &columns, &records)?.len())
            })
            .await
    }

    async fn insert_surveys(&self, records: Vec<SurveyRecord>) -> Result<Vec<i64>> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Vec<i64>> {
                let columns: HashMap<String, LocalType> =
                    survey_columns(conn)?.into_iter().collect();
                insert_rows(conn, &columns, &records)
            })
            .await
    }

    async fn update_survey(&self, record: SurveyRecord) -> Result<()> {
        let local_id = record.local_id.ok_or_else(|| {
            ValidationError::InvalidInput("Survey update requires a local id".to_string())
        })?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let columns: HashMap<String, LocalType> =
                    survey_columns(conn)?.into_iter().collect();
                let mut row = record.to_row();
                row.remove(LOCAL_ID_FIELD);
                row.remove(SYNC_STATUS_FIELD);
                let (names, values) = bind_columns(&row, &columns);
                if names.is_empty() {
                    return Ok(());
                }

                let assignments = names
                    .iter()
                    .map(|name| format!("{} = ?", name))
                    .collect::<Vec<_>>()
                    .join(", ");
                let statement = format!(
                    "UPDATE {} SET {} WHERE {} = ?",
                    quote_identifier(SURVEY_TABLE),
                    assignments,
                    quote_identifier(LOCAL_ID_FIELD)
                );
                let changed = values
                    .iter()
                    .fold(
                        diesel::sql_query(statement).into_boxed::<Sqlite>(),
                        bind_json,
                    )
                    .bind::<BigInt, _>(local_id)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if changed == 0 {
                    return Err(Error::Database(DatabaseError::NotFound(format!(
                        "Survey {}",
                        local_id
                    ))));
                }
                Ok(())
            })
            .await
    }

    async fn mark_synced(&self, assignments: Vec<SyncedRecordAssignment>) -> Result<usize> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let statement = format!(
                    "UPDATE {table} SET {status} = ?, {id} = COALESCE(?, {id}) WHERE {local} = ?",
                    table = quote_identifier(SURVEY_TABLE),
                    status = quote_identifier(SYNC_STATUS_FIELD),
                    id = quote_identifier(REMOTE_ID_FIELD),
                    local = quote_identifier(LOCAL_ID_FIELD),
                );
                let mut changed = 0;
                for assignment in &assignments {
                    changed += diesel::sql_query(statement.as_str())
                        .bind::<Text, _>(SyncStatus::Synced.as_str())
                        .bind::<Nullable<Text>, _>(assignment.remote_id.as_deref())
                        .bind::<BigInt, _>(assignment.local_id)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(changed)
            })
            .await
    }

    fn get_survey(&self, local_id: i64) -> Result<Option<SurveyRecord>> {
        Ok(self
            .load_surveys_where(LOCAL_ID_FIELD, Value::from(local_id))?
            .into_iter()
            .next())
    }

    fn list_surveys_by_status(&self, status: SyncStatus) -> Result<Vec<SurveyRecord>> {
        self.load_surveys_where(SYNC_STATUS_FIELD, Value::from(status.as_str()))
    }

    fn list_surveys_with_record_types(&self) -> Result<Vec<SurveyListItem>> {
        let mut conn = get_connection(&self.pool)?;
        if !table_exists(&mut conn, SURVEY_TABLE)? {
            return Ok(Vec::new());
        }
        let columns = column_names(&survey_columns(&mut conn)?);
        let object = row_object_sql(&columns, "s");

        let statement = if columns.iter().any(|name| name == RECORD_TYPE_FIELD) {
            format!(
                "SELECT {object} AS row_json, rt.name AS record_type_name, \
                 rt.label AS record_type_label
                 FROM {table} s
                 LEFT JOIN RecordType rt ON s.{rt_field} = rt.record_type_id
                 ORDER BY s.{local}",
                table = quote_identifier(SURVEY_TABLE),
                rt_field = quote_identifier(RECORD_TYPE_FIELD),
                local = quote_identifier(LOCAL_ID_FIELD),
            )
        } else {
            format!(
                "SELECT {object} AS row_json, NULL AS record_type_name, \
                 NULL AS record_type_label
                 FROM {table} s ORDER BY s.{local}",
                table = quote_identifier(SURVEY_TABLE),
                local = quote_identifier(LOCAL_ID_FIELD),
            )
        };

        let rows = diesel::sql_query(statement)
            .load::<ListedSurveyRow>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| {
                Ok(SurveyListItem {
                    survey: SurveyRecord::from_row(parse_row_object(&row.row_json)?),
                    record_type_name: row.record_type_name,
                    record_type_label: row.record_type_label,
                })
            })
            .collect()
    }
}
