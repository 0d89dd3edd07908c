use super::schema::{self, Column, ColumnKind};
use super::{Query, Table, TableStore};
use anyhow::{Context, Result, anyhow, bail};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Local stand-in for the hosted tables: one SQLite table per remote table,
/// columns named exactly like the remote fields.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite DB")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        schema::schema_statements()
            .iter()
            .try_for_each(|statement| {
                conn.execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }
}

impl TableStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>> {
        let conn = self.connection()?;
        select_with(&conn, table, query)
    }

    fn insert(&self, table: Table, record: &Value) -> Result<Value> {
        let (names, mut params) = assignments(table, record)?;
        if names.is_empty() {
            bail!("Refusing to insert an empty {} record", table.name());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quoted(table.name()),
            names.join(", ")
        );

        let conn = self.connection()?;
        conn.execute(&sql, params_from_iter(params.drain(..)))
            .with_context(|| format!("Failed to insert into {}", table.name()))?;
        let id = conn.last_insert_rowid();
        debug!(table = table.name(), id, "sqlite insert");

        select_with(&conn, table, &Query::new().eq("id", id))?
            .into_iter()
            .next()
            .with_context(|| format!("Inserted {} record {id} not found", table.name()))
    }

    fn update(&self, table: Table, patch: &Value, filters: &Query) -> Result<Vec<Value>> {
        require_filters(table, filters)?;

        let (names, set_params) = assignments(table, patch)?;
        if names.is_empty() {
            bail!("Refusing to apply an empty {} patch", table.name());
        }

        let mut conn = self.connection()?;
        let transaction = conn
            .transaction()
            .context("Failed to start transaction")?;

        let matched = Query {
            filters: filters.filters.clone(),
            order: None,
        };
        let ids = select_with(&transaction, table, &matched)?
            .iter()
            .filter_map(|record| record.get("id").and_then(Value::as_i64))
            .collect::<Vec<_>>();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut params = set_params;
        let where_sql = where_clause(table, &filters.filters, &mut params)?;
        let set_sql = names
            .iter()
            .map(|name| format!("{name} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {set_sql}{where_sql}",
            quoted(table.name())
        );

        transaction
            .execute(&sql, params_from_iter(params.drain(..)))
            .with_context(|| format!("Failed to update {}", table.name()))?;

        let updated = ids
            .iter()
            .map(|id| select_with(&transaction, table, &Query::new().eq("id", *id)))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        transaction
            .commit()
            .with_context(|| format!("Failed to commit {} update", table.name()))?;
        debug!(table = table.name(), count = updated.len(), "sqlite update");

        Ok(updated)
    }

    fn delete(&self, table: Table, filters: &Query) -> Result<()> {
        require_filters(table, filters)?;

        let mut params = Vec::new();
        let where_sql = where_clause(table, &filters.filters, &mut params)?;
        let sql = format!("DELETE FROM {}{where_sql}", quoted(table.name()));

        let conn = self.connection()?;
        let deleted = conn
            .execute(&sql, params_from_iter(params.drain(..)))
            .with_context(|| format!("Failed to delete from {}", table.name()))?;
        debug!(table = table.name(), deleted, "sqlite delete");

        Ok(())
    }
}

fn select_with(conn: &Connection, table: Table, query: &Query) -> Result<Vec<Value>> {
    let columns = schema::columns(table);
    let mut params = Vec::new();
    let where_sql = where_clause(table, &query.filters, &mut params)?;

    let order_sql = match &query.order {
        Some(order) => {
            let column = known_column(table, &order.column)?;
            let direction = if order.ascending { "ASC" } else { "DESC" };
            format!(" ORDER BY {} {direction}, \"id\" {direction}", sort_key(column))
        }
        None => " ORDER BY \"id\" ASC".to_string(),
    };

    let column_sql = columns
        .iter()
        .map(|column| quoted(column.name))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {column_sql} FROM {}{where_sql}{order_sql}",
        quoted(table.name())
    );

    let mut statement = conn
        .prepare(&sql)
        .with_context(|| format!("Failed to prepare {} query", table.name()))?;

    let rows = statement
        .query_map(params_from_iter(params.drain(..)), |row| {
            columns
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    let raw = row.get::<_, SqlValue>(index)?;
                    Ok((column.name.to_string(), to_json(*column, raw)))
                })
                .collect::<rusqlite::Result<Map<String, Value>>>()
                .map(Value::Object)
        })?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to query {}", table.name()))?;

    Ok(rows)
}

fn where_clause(
    table: Table,
    filters: &[(String, Value)],
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let predicates = filters
        .iter()
        .map(|(name, value)| {
            let column = known_column(table, name)?;
            if value.is_null() {
                return Ok(format!("{} IS NULL", quoted(name)));
            }

            params.push(to_sql(column, value)?);
            Ok(format!("{} = ?", quoted(name)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(" WHERE {}", predicates.join(" AND ")))
}

fn assignments(table: Table, record: &Value) -> Result<(Vec<String>, Vec<SqlValue>)> {
    let object = record
        .as_object()
        .with_context(|| format!("{} record must be a JSON object", table.name()))?;

    let mut names = Vec::new();
    let mut params = Vec::new();

    for (name, value) in object.iter().filter(|(name, _)| name.as_str() != "id") {
        let column = known_column(table, name)?;
        names.push(quoted(name));
        params.push(to_sql(column, value)?);
    }

    Ok((names, params))
}

fn require_filters(table: Table, query: &Query) -> Result<()> {
    if query.filters.is_empty() {
        bail!("{} writes require at least one filter", table.name());
    }

    Ok(())
}

fn known_column(table: Table, name: &str) -> Result<Column> {
    schema::column(table, name)
        .with_context(|| format!("Unknown column {name} for table {}", table.name()))
}

fn to_sql(column: Column, value: &Value) -> Result<SqlValue> {
    let converted = match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => number
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| number.as_f64().map(SqlValue::Real))
            .with_context(|| format!("Unsupported number for {}: {number}", column.name))?,
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => {
            bail!("Unsupported value for {}: {value}", column.name)
        }
    };

    Ok(converted)
}

fn to_json(column: Column, raw: SqlValue) -> Value {
    match (column.kind, raw) {
        (_, SqlValue::Null) => Value::Null,
        (ColumnKind::Bool, SqlValue::Integer(flag)) => Value::Bool(flag != 0),
        (_, SqlValue::Integer(number)) => Value::from(number),
        (_, SqlValue::Real(number)) => Value::from(number),
        (_, SqlValue::Text(text)) => Value::String(text),
        (_, SqlValue::Blob(_)) => Value::Null,
    }
}

/// chrono drops trailing zero fractions, so timestamp text is not ordered
/// lexicographically.
fn sort_key(column: Column) -> String {
    match column.kind {
        ColumnKind::Timestamp => format!("julianday({})", quoted(column.name)),
        _ => quoted(column.name),
    }
}

fn quoted(name: &str) -> String {
    format!("\"{name}\"")
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::store::{Query, Table, TableStore};
    use serde_json::json;

    fn dump(content: &str, created_at: &str) -> serde_json::Value {
        json!({ "content": content, "createdAt": created_at, "userId": "single-user" })
    }

    #[test]
    fn insert_assigns_ids_and_select_orders() {
        let store = SqliteStore::open_in_memory().expect("store");

        let first = store
            .insert(Table::BrainDumps, &dump("first", "2026-02-01T08:00:00Z"))
            .expect("insert");
        let second = store
            .insert(Table::BrainDumps, &dump("second", "2026-02-02T08:00:00Z"))
            .expect("insert");
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);

        let newest_first = store
            .select(
                Table::BrainDumps,
                &Query::new()
                    .eq("userId", "single-user")
                    .order_by("createdAt", false),
            )
            .expect("select");
        let contents = newest_first
            .iter()
            .map(|record| record["content"].as_str().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["second", "first"]);
    }

    #[test]
    fn timestamps_order_by_instant_not_text() {
        let store = SqliteStore::open_in_memory().expect("store");
        for (content, created_at) in [
            ("half-second", "2026-02-18T10:00:00.500Z"),
            ("on-the-second", "2026-02-18T10:00:00Z"),
            ("offset-form", "2026-02-18T10:00:01+00:00"),
        ] {
            store
                .insert(Table::BrainDumps, &dump(content, created_at))
                .expect("insert");
        }

        let newest_first = store
            .select(
                Table::BrainDumps,
                &Query::new()
                    .eq("userId", "single-user")
                    .order_by("createdAt", false),
            )
            .expect("select");
        let contents = newest_first
            .iter()
            .map(|record| record["content"].as_str().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["offset-form", "half-second", "on-the-second"]);
    }

    #[test]
    fn booleans_survive_storage() {
        let store = SqliteStore::open_in_memory().expect("store");
        let step = store
            .insert(
                Table::TaskBreakdowns,
                &json!({ "taskId": 4, "stepTitle": "Outline", "stepDescription": null, "isCompleted": false }),
            )
            .expect("insert");
        assert_eq!(step["isCompleted"], json!(false));

        let updated = store
            .update(
                Table::TaskBreakdowns,
                &json!({ "isCompleted": true }),
                &Query::new().eq("id", step["id"].clone()),
            )
            .expect("update");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["isCompleted"], json!(true));

        let done = store
            .select(Table::TaskBreakdowns, &Query::new().eq("isCompleted", true))
            .expect("select");
        assert_eq!(done.len(), 1);
    }

    #[test]
    fn update_returns_rows_even_when_filter_column_changes() {
        let store = SqliteStore::open_in_memory().expect("store");
        store
            .insert(Table::BrainDumps, &dump("draft", "2026-02-01T08:00:00Z"))
            .expect("insert");

        let updated = store
            .update(
                Table::BrainDumps,
                &json!({ "content": "final" }),
                &Query::new().eq("content", "draft"),
            )
            .expect("update");
        assert_eq!(updated[0]["content"], "final");

        let none = store
            .update(
                Table::BrainDumps,
                &json!({ "content": "again" }),
                &Query::new().eq("content", "draft"),
            )
            .expect("update");
        assert!(none.is_empty());
    }

    #[test]
    fn rejects_unknown_columns_and_unfiltered_writes() {
        let store = SqliteStore::open_in_memory().expect("store");

        assert!(
            store
                .insert(Table::BrainDumps, &json!({ "content": "x", "mood": "happy" }))
                .is_err()
        );
        assert!(store.delete(Table::BrainDumps, &Query::new()).is_err());
        assert!(
            store
                .update(Table::BrainDumps, &json!({ "content": "y" }), &Query::new())
                .is_err()
        );
    }

    #[test]
    fn null_filters_match_missing_values() {
        let store = SqliteStore::open_in_memory().expect("store");
        store
            .insert(
                Table::TaskBreakdowns,
                &json!({ "taskId": 1, "stepTitle": "a", "stepDescription": null, "isCompleted": false }),
            )
            .expect("insert");
        store
            .insert(
                Table::TaskBreakdowns,
                &json!({ "taskId": 1, "stepTitle": "b", "stepDescription": "details", "isCompleted": false }),
            )
            .expect("insert");

        let bare = store
            .select(
                Table::TaskBreakdowns,
                &Query::new().eq("stepDescription", serde_json::Value::Null),
            )
            .expect("select");
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0]["stepTitle"], "a");
    }

    #[test]
    fn opens_database_file_in_nested_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("db").join("taskpulse.db");

        let store = SqliteStore::open(&path).expect("open");
        store
            .delete(Table::Tasks, &Query::new().eq("userId", "nobody"))
            .expect("delete");
        assert!(path.exists());
    }
}
