//! RecordStorage implementation for SQLite.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::core::{Precondition, RecordEvent, RecordStorage};
use crate::error::{BackendError, StorageError, StorageResult};
use crate::types::{FilterOp, ListOptions, StoredRecord};

use super::SqliteBackend;

const SELECT_COLUMNS: &str = "id, generation, data, created_at, last_modified";

fn internal_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

fn serialization_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SerializationError { message })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| serialization_error(format!("Invalid timestamp {:?}: {}", raw, e)))
}

/// Raw row as selected by [`SELECT_COLUMNS`].
type RecordRow = (String, i64, String, String, String);

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_record(type_name: &str, row: RecordRow) -> StorageResult<StoredRecord> {
    let (id, generation, data, created_at, last_modified) = row;

    let content: Value = serde_json::from_str(&data)
        .map_err(|e| serialization_error(format!("Failed to deserialize record {}: {}", id, e)))?;

    Ok(StoredRecord::from_storage(
        type_name,
        id,
        generation as u64,
        content,
        parse_timestamp(&created_at)?,
        parse_timestamp(&last_modified)?,
    ))
}

fn read_record(conn: &Connection, type_name: &str, id: &str) -> StorageResult<Option<StoredRecord>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM records WHERE type_name = ?1 AND id = ?2",
                SELECT_COLUMNS
            ),
            params![type_name, id],
            map_row,
        )
        .optional()
        .map_err(|e| internal_error(format!("Failed to read record: {}", e)))?;

    row.map(|row| into_record(type_name, row)).transpose()
}

/// Converts a filter operand into a bound SQL value.
///
/// `json_extract` yields booleans as 0/1 integers, so booleans bind the same way.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        _ => SqlValue::Null,
    }
}

/// Builds a SELECT for `list`, with every operand bound as a parameter.
struct ListSql {
    sql: String,
    params: Vec<SqlValue>,
}

impl ListSql {
    fn new(type_name: &str) -> Self {
        Self {
            sql: format!(
                "SELECT {} FROM records WHERE type_name = ?1",
                SELECT_COLUMNS
            ),
            params: vec![SqlValue::Text(type_name.to_string())],
        }
    }

    /// Binds a value and returns its placeholder.
    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    /// SQL expression for a field.
    fn column(&mut self, field: &str) -> String {
        match field {
            "id" | "generation" => field.to_string(),
            _ => {
                let path = self.bind(SqlValue::Text(format!("$.\"{}\"", field)));
                format!("json_extract(data, {})", path)
            }
        }
    }

    fn build(type_name: &str, options: &ListOptions) -> Self {
        let mut query = Self::new(type_name);

        for filter in &options.filters {
            let column = query.column(&filter.field);
            let clause = match filter.op {
                FilterOp::In if filter.values.is_empty() => "0".to_string(),
                FilterOp::In => {
                    let placeholders: Vec<String> = filter
                        .values
                        .iter()
                        .map(|v| query.bind(to_sql_value(v)))
                        .collect();
                    format!("{} IN ({})", column, placeholders.join(", "))
                }
                FilterOp::HasPrefix => {
                    let p = query.bind(first_operand(&filter.values));
                    format!("substr({}, 1, length({})) = {}", column, p, p)
                }
                op => {
                    let p = query.bind(first_operand(&filter.values));
                    let operator = match op {
                        FilterOp::Gt => ">",
                        FilterOp::Gte => ">=",
                        FilterOp::Lt => "<",
                        FilterOp::Lte => "<=",
                        _ => "=",
                    };
                    format!("{} {} {}", column, operator, p)
                }
            };
            query.sql.push_str(" AND ");
            query.sql.push_str(&clause);
        }

        let mut order_by: Vec<String> = Vec::new();
        for key in &options.sort {
            let column = query.column(&key.field);
            let direction = if key.descending { "DESC" } else { "ASC" };
            order_by.push(format!("{} {}", column, direction));
        }
        order_by.push("id ASC".to_string());
        query.sql.push_str(" ORDER BY ");
        query.sql.push_str(&order_by.join(", "));

        let limit = options.limit.map(|l| l as i64).unwrap_or(-1);
        let limit = query.bind(SqlValue::Integer(limit));
        let offset = query.bind(SqlValue::Integer(options.offset as i64));
        query.sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

        query
    }
}

fn first_operand(values: &[Value]) -> SqlValue {
    values.first().map(to_sql_value).unwrap_or(SqlValue::Null)
}

#[async_trait]
impl RecordStorage for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn create(&self, type_name: &str, data: Value) -> StorageResult<StoredRecord> {
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let id = uuid::Uuid::new_v4().to_string();
        let record = StoredRecord::new(type_name, id.as_str(), data);

        let data = serde_json::to_string(record.content())
            .map_err(|e| serialization_error(format!("Failed to serialize record: {}", e)))?;

        tx.execute(
            "INSERT INTO records (type_name, id, generation, data, created_at, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                type_name,
                id,
                record.generation() as i64,
                data,
                format_timestamp(record.created_at()),
                format_timestamp(record.last_modified()),
            ],
        )
        .map_err(|e| internal_error(format!("Failed to insert record: {}", e)))?;

        self.commit_and_publish(tx, RecordEvent::Created(record.clone()))?;

        debug!(type_name = %type_name, id = %id, "Created record");
        Ok(record)
    }

    async fn read(&self, type_name: &str, id: &str) -> StorageResult<Option<StoredRecord>> {
        let conn = self.get_connection()?;
        read_record(&conn, type_name, id)
    }

    async fn replace(
        &self,
        type_name: &str,
        id: &str,
        data: Value,
        precondition: Option<&Precondition>,
    ) -> StorageResult<StoredRecord> {
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let current = read_record(&tx, type_name, id)?
            .ok_or_else(|| StorageError::not_found(type_name, id))?;

        if let Some(precondition) = precondition {
            precondition.check(&current)?;
        }

        let replaced = current.replaced(data);
        let data = serde_json::to_string(replaced.content())
            .map_err(|e| serialization_error(format!("Failed to serialize record: {}", e)))?;

        tx.execute(
            "UPDATE records SET generation = ?1, data = ?2, last_modified = ?3
             WHERE type_name = ?4 AND id = ?5",
            params![
                replaced.generation() as i64,
                data,
                format_timestamp(replaced.last_modified()),
                type_name,
                id,
            ],
        )
        .map_err(|e| internal_error(format!("Failed to update record: {}", e)))?;

        self.commit_and_publish(tx, RecordEvent::Replaced(replaced.clone()))?;

        debug!(
            type_name = %type_name,
            id = %id,
            generation = replaced.generation(),
            "Replaced record"
        );
        Ok(replaced)
    }

    async fn delete(
        &self,
        type_name: &str,
        id: &str,
        precondition: Option<&Precondition>,
    ) -> StorageResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let current = read_record(&tx, type_name, id)?
            .ok_or_else(|| StorageError::not_found(type_name, id))?;

        if let Some(precondition) = precondition {
            precondition.check(&current)?;
        }

        tx.execute(
            "DELETE FROM records WHERE type_name = ?1 AND id = ?2",
            params![type_name, id],
        )
        .map_err(|e| internal_error(format!("Failed to delete record: {}", e)))?;

        self.commit_and_publish(
            tx,
            RecordEvent::Deleted {
                type_name: type_name.to_string(),
                id: id.to_string(),
            },
        )?;

        debug!(type_name = %type_name, id = %id, "Deleted record");
        Ok(())
    }

    async fn list(
        &self,
        type_name: &str,
        options: &ListOptions,
    ) -> StorageResult<Vec<StoredRecord>> {
        let conn = self.get_connection()?;
        let query = ListSql::build(type_name, options);

        let mut stmt = conn
            .prepare(&query.sql)
            .map_err(|e| internal_error(format!("Failed to prepare list query: {}", e)))?;

        let rows = stmt
            .query_map(params_from_iter(query.params.iter()), map_row)
            .map_err(|e| internal_error(format!("Failed to list records: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(format!("Failed to read list row: {}", e)))?;

        rows.into_iter()
            .map(|row| into_record(type_name, row))
            .collect()
    }

    async fn count(&self, type_name: &str) -> StorageResult<u64> {
        let conn = self.get_connection()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE type_name = ?1",
                params![type_name],
                |row| row.get(0),
            )
            .map_err(|e| internal_error(format!("Failed to count records: {}", e)))?;
        Ok(count as u64)
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.changes().subscribe()
    }
}
