//! SQLite-backed local store.
//!
//! One table per mapping. Besides the mapped columns every table carries
//! `id`, `remote_id`, `updated_at` and `synchronized_at` (epoch millis).
//! rusqlite is blocking, so each call runs on the blocking pool while holding
//! the shared connection.
#![allow(
    clippy::cast_possible_wrap,
    clippy::as_conversions,
    reason = "row ids and millisecond timestamps fit in i64"
)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use recordsync_types::{Attributes, LocalStoreError};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Error as SqliteError, ErrorCode, Row};
use std::path::Path;
use std::sync::Arc;

use super::repository::{LocalRecord, LocalResult, LocalStore, ScanCursor, SyncLink};
use crate::error::AppResult;
use recordsync_types::ConfigError;

const BOOKKEEPING_COLUMNS: [&str; 4] = ["id", "remote_id", "updated_at", "synchronized_at"];

/// Shared SQLite connection; hand out one [`SqliteLocalStore`] per table.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Ok(Self { conn: Arc::new(Mutex::new(Connection::open_in_memory()?)) })
    }

    /// Store for `table`; call [`SqliteLocalStore::ensure_table`] before use
    /// if the table may not exist yet.
    pub fn table(&self, table: LocalTable) -> SqliteLocalStore {
        SqliteLocalStore { conn: Arc::clone(&self.conn), table: Arc::new(table) }
    }
}

/// Validated table name and mapped column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTable {
    name: String,
    columns: Vec<String>,
}

impl LocalTable {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        validate_identifier("local_table", &name)?;

        let mut seen = Vec::new();
        for column in columns {
            let column = column.into();
            validate_identifier("fields.local", &column)?;
            if BOOKKEEPING_COLUMNS.contains(&column.as_str()) {
                return Err(ConfigError::invalid(
                    "fields.local",
                    format!("{column} is reserved for synchronization bookkeeping"),
                ));
            }
            if !seen.contains(&column) {
                seen.push(column);
            }
        }

        Ok(Self { name, columns: seen })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn select_sql(&self) -> String {
        let mut columns: Vec<String> = BOOKKEEPING_COLUMNS.iter().map(|c| quote(c)).collect();
        columns.extend(self.columns.iter().map(|c| quote(c)));
        format!("SELECT {} FROM {}", columns.join(", "), quote(&self.name))
    }

    fn check_columns(&self, attributes: &Attributes) -> LocalResult<()> {
        match attributes.keys().find(|k| !self.columns.contains(k)) {
            Some(unknown) => Err(LocalStoreError::Database {
                message: format!("table {} has no column {unknown}", self.name),
            }),
            None => Ok(()),
        }
    }
}

fn validate_identifier(field: &str, ident: &str) -> Result<(), ConfigError> {
    let mut chars = ident.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{ident:?} is not a valid SQL identifier")))
    }
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(column: &str, ms: i64) -> LocalResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single().ok_or_else(|| LocalStoreError::Decode {
        column: column.to_string(),
        message: format!("{ms} is out of range"),
    })
}

fn map_sqlite_err(err: SqliteError) -> LocalStoreError {
    match &err {
        SqliteError::SqliteFailure(e, message) if e.code == ErrorCode::ConstraintViolation => {
            LocalStoreError::Conflict {
                message: message.clone().unwrap_or_else(|| err.to_string()),
            }
        },
        _ => LocalStoreError::Database { message: err.to_string() },
    }
}

fn to_sql_value(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(column: &str, value: ValueRef<'_>) -> LocalResult<serde_json::Value> {
    match value {
        ValueRef::Null => Ok(serde_json::Value::Null),
        ValueRef::Integer(i) => Ok(serde_json::Value::from(i)),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| LocalStoreError::Decode {
                column: column.to_string(),
                message: format!("{f} is not finite"),
            }),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(serde_json::Value::String)
            .map_err(|e| LocalStoreError::Decode {
                column: column.to_string(),
                message: e.to_string(),
            }),
        ValueRef::Blob(_) => Err(LocalStoreError::Decode {
            column: column.to_string(),
            message: "binary values are not supported".to_string(),
        }),
    }
}

fn read_record(table: &LocalTable, row: &Row<'_>) -> LocalResult<LocalRecord> {
    let get_err = |e: SqliteError| LocalStoreError::Database { message: e.to_string() };
    let id: i64 = row.get(0).map_err(get_err)?;
    let remote_id: Option<String> = row.get(1).map_err(get_err)?;
    let updated_at: i64 = row.get(2).map_err(get_err)?;
    let synchronized_at: Option<i64> = row.get(3).map_err(get_err)?;

    let mut attributes = Attributes::new();
    for (offset, column) in table.columns.iter().enumerate() {
        let value = row.get_ref(BOOKKEEPING_COLUMNS.len() + offset).map_err(get_err)?;
        attributes.insert(column.clone(), from_sql_value(column, value)?);
    }

    Ok(LocalRecord {
        id,
        attributes,
        remote_id,
        updated_at: from_millis("updated_at", updated_at)?,
        synchronized_at: synchronized_at.map(|ms| from_millis("synchronized_at", ms)).transpose()?,
    })
}

fn query_records(
    conn: &Connection,
    table: &LocalTable,
    sql: &str,
    params: Vec<SqlValue>,
) -> LocalResult<Vec<LocalRecord>> {
    let mut stmt = conn.prepare(sql).map_err(map_sqlite_err)?;
    let mut rows = stmt.query(params_from_iter(params)).map_err(map_sqlite_err)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(map_sqlite_err)? {
        records.push(read_record(table, row)?);
    }
    Ok(records)
}

fn load(conn: &Connection, table: &LocalTable, id: i64) -> LocalResult<Option<LocalRecord>> {
    let sql = format!("{} WHERE \"id\" = ?1", table.select_sql());
    Ok(query_records(conn, table, &sql, vec![SqlValue::Integer(id)])?.into_iter().next())
}

fn load_existing(conn: &Connection, table: &LocalTable, id: i64) -> LocalResult<LocalRecord> {
    load(conn, table, id)?.ok_or(LocalStoreError::NotFound { id: id.to_string() })
}

fn add_column_if_missing(conn: &Connection, statement: &str) -> LocalResult<()> {
    match conn.execute(statement, []) {
        Ok(_) => Ok(()),
        Err(SqliteError::SqliteFailure(_, Some(message)))
            if message.contains("duplicate column name") =>
        {
            Ok(())
        },
        Err(err) => Err(map_sqlite_err(err)),
    }
}

/// Local store for one table of a [`SqliteDatabase`].
#[derive(Clone)]
pub struct SqliteLocalStore {
    conn: Arc<Mutex<Connection>>,
    table: Arc<LocalTable>,
}

impl SqliteLocalStore {
    pub fn table(&self) -> &LocalTable {
        &self.table
    }

    async fn with_connection<T, F>(&self, f: F) -> LocalResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &LocalTable) -> LocalResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = Arc::clone(&self.table);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard, &table)
        })
        .await
        .map_err(|e| LocalStoreError::Database { message: format!("blocking task failed: {e}") })?
    }

    /// Create the table and its scan index if missing; add mapped columns the
    /// table does not have yet.
    pub async fn ensure_table(&self) -> LocalResult<()> {
        self.with_connection(|conn, table| {
            let name = quote(&table.name);
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {name} (
                        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,
                        \"remote_id\" TEXT UNIQUE,
                        \"updated_at\" INTEGER NOT NULL,
                        \"synchronized_at\" INTEGER
                    )"
                ),
                [],
            )
            .map_err(map_sqlite_err)?;

            for column in &table.columns {
                add_column_if_missing(
                    conn,
                    &format!("ALTER TABLE {name} ADD COLUMN {}", quote(column)),
                )?;
            }

            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {name} (\"updated_at\", \"id\")",
                    quote(&format!("idx_{}_updated_at", table.name))
                ),
                [],
            )
            .map_err(map_sqlite_err)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn find(&self, id: i64) -> LocalResult<Option<LocalRecord>> {
        self.with_connection(move |conn, table| load(conn, table, id)).await
    }

    async fn find_linked(&self, remote_id: &str) -> LocalResult<Option<LocalRecord>> {
        let remote_id = remote_id.to_string();
        self.with_connection(move |conn, table| {
            let sql = format!("{} WHERE \"remote_id\" = ?1", table.select_sql());
            Ok(query_records(conn, table, &sql, vec![SqlValue::Text(remote_id)])?
                .into_iter()
                .next())
        })
        .await
    }

    async fn create(
        &self,
        attributes: &Attributes,
        link: Option<SyncLink>,
    ) -> LocalResult<LocalRecord> {
        self.table.check_columns(attributes)?;
        let attributes = attributes.clone();
        self.with_connection(move |conn, table| {
            let (updated_at, remote_id, synchronized_at) = match link {
                Some(link) => {
                    let at = to_millis(link.synchronized_at);
                    (at, Some(link.remote_id), Some(at))
                },
                None => (to_millis(Utc::now()), None, None),
            };

            let mut columns: Vec<String> = attributes.keys().map(|c| quote(c)).collect();
            let mut params: Vec<SqlValue> = attributes.values().map(to_sql_value).collect();
            columns.extend(["\"remote_id\"", "\"updated_at\"", "\"synchronized_at\""].map(String::from));
            params.push(remote_id.map_or(SqlValue::Null, SqlValue::Text));
            params.push(SqlValue::Integer(updated_at));
            params.push(synchronized_at.map_or(SqlValue::Null, SqlValue::Integer));

            let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(&table.name),
                columns.join(", "),
                placeholders.join(", ")
            );
            conn.execute(&sql, params_from_iter(params)).map_err(map_sqlite_err)?;

            load_existing(conn, table, conn.last_insert_rowid())
        })
        .await
    }

    async fn update(
        &self,
        id: i64,
        attributes: &Attributes,
        synchronized_at: DateTime<Utc>,
    ) -> LocalResult<LocalRecord> {
        self.table.check_columns(attributes)?;
        let attributes = attributes.clone();
        self.with_connection(move |conn, table| {
            let at = to_millis(synchronized_at);
            let mut assignments: Vec<String> = attributes
                .keys()
                .enumerate()
                .map(|(i, c)| format!("{} = ?{}", quote(c), i + 1))
                .collect();
            let mut params: Vec<SqlValue> = attributes.values().map(to_sql_value).collect();
            let n = params.len();
            assignments.push(format!("\"updated_at\" = ?{}", n + 1));
            assignments.push(format!("\"synchronized_at\" = ?{}", n + 1));
            params.push(SqlValue::Integer(at));
            params.push(SqlValue::Integer(id));

            let sql = format!(
                "UPDATE {} SET {} WHERE \"id\" = ?{}",
                quote(&table.name),
                assignments.join(", "),
                n + 2
            );
            let changed = conn.execute(&sql, params_from_iter(params)).map_err(map_sqlite_err)?;
            if changed == 0 {
                return Err(LocalStoreError::NotFound { id: id.to_string() });
            }
            load_existing(conn, table, id)
        })
        .await
    }

    async fn link(
        &self,
        id: i64,
        remote_id: &str,
        synchronized_at: DateTime<Utc>,
    ) -> LocalResult<LocalRecord> {
        let remote_id = remote_id.to_string();
        self.with_connection(move |conn, table| {
            let sql = format!(
                "UPDATE {} SET \"remote_id\" = ?1, \"synchronized_at\" = ?2 WHERE \"id\" = ?3",
                quote(&table.name)
            );
            let changed = conn
                .execute(
                    &sql,
                    params_from_iter([
                        SqlValue::Text(remote_id),
                        SqlValue::Integer(to_millis(synchronized_at)),
                        SqlValue::Integer(id),
                    ]),
                )
                .map_err(map_sqlite_err)?;
            if changed == 0 {
                return Err(LocalStoreError::NotFound { id: id.to_string() });
            }
            load_existing(conn, table, id)
        })
        .await
    }

    async fn mark_synchronized(
        &self,
        id: i64,
        synchronized_at: DateTime<Utc>,
    ) -> LocalResult<LocalRecord> {
        self.with_connection(move |conn, table| {
            let sql = format!(
                "UPDATE {} SET \"synchronized_at\" = ?1 WHERE \"id\" = ?2",
                quote(&table.name)
            );
            let changed = conn
                .execute(
                    &sql,
                    params_from_iter([
                        SqlValue::Integer(to_millis(synchronized_at)),
                        SqlValue::Integer(id),
                    ]),
                )
                .map_err(map_sqlite_err)?;
            if changed == 0 {
                return Err(LocalStoreError::NotFound { id: id.to_string() });
            }
            load_existing(conn, table, id)
        })
        .await
    }

    async fn query_recent(
        &self,
        cursor: &ScanCursor<i64>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> LocalResult<Vec<LocalRecord>> {
        let cursor = cursor.clone();
        self.with_connection(move |conn, table| {
            let mut params = vec![SqlValue::Integer(to_millis(until))];
            let lower = match cursor {
                ScanCursor::Start(None) => String::new(),
                ScanCursor::Start(Some(since)) => {
                    params.push(SqlValue::Integer(to_millis(since)));
                    " AND \"updated_at\" >= ?2".to_string()
                },
                ScanCursor::After { timestamp, id } => {
                    params.push(SqlValue::Integer(to_millis(timestamp)));
                    params.push(SqlValue::Integer(id));
                    " AND (\"updated_at\" > ?2 OR (\"updated_at\" = ?2 AND \"id\" > ?3))".to_string()
                },
            };
            params.push(SqlValue::Integer(limit as i64));
            let sql = format!(
                "{} WHERE \"updated_at\" < ?1{lower} ORDER BY \"updated_at\" ASC, \"id\" ASC LIMIT ?{}",
                table.select_sql(),
                params.len()
            );
            query_records(conn, table, &sql, params)
        })
        .await
    }
}
