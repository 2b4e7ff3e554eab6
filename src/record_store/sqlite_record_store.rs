//! SQLite-backed record store.
//!
//! All writes that belong to one user action (a record insert or update plus
//! the genre and store recency bumps) run in a single `BEGIN IMMEDIATE`
//! transaction.

use super::months;
use super::schema::RECORD_VERSIONED_SCHEMAS;
use super::{
    ChoiceCategory, ChoiceEntry, Record, RecordFields, RecordStore, RecordStoreError,
    RecordStoreResult, SearchFilters,
};
use crate::sqlite_persistence::{read_schema_version, BASE_DB_VERSION};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{
    params, params_from_iter, types::Type, Connection, OptionalExtension, Row,
    TransactionBehavior,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Source of "now" for creation timestamps, recency bumps and the month range.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RECORD_COLUMNS: &str = "id, artist, album, genre, year, store, filename, created_at";

#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
    clock: Clock,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let Some(latest_schema) = RECORD_VERSIONED_SCHEMAS.last() else {
        bail!("No record database schema defined");
    };

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;
    if table_count == 0 {
        info!(
            "Creating record db schema at version {}",
            latest_schema.version
        );
        latest_schema.create(conn)?;
        return Ok(());
    }

    let current_version = match read_schema_version(conn)? {
        Some(version) => version,
        None => {
            let has_records = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='table' AND name='records'",
                    [],
                    |r| r.get::<_, i32>(0),
                )
                .optional()?
                .is_some();
            if !has_records {
                bail!("Database is not a record catalog: no version stamp and no records table");
            }
            0
        }
    };

    if current_version > latest_schema.version {
        bail!(
            "Record database version {} is newer than the supported version {}",
            current_version,
            latest_schema.version
        );
    }

    if current_version > 0 {
        let schema = RECORD_VERSIONED_SCHEMAS
            .iter()
            .find(|s| s.version == current_version)
            .with_context(|| format!("Unknown record database version {}", current_version))?;
        schema.validate(conn).with_context(|| {
            format!(
                "Record database schema validation failed for version {}",
                current_version
            )
        })?;
    }

    if current_version == latest_schema.version {
        return Ok(());
    }

    let tx = conn.transaction()?;
    let mut version = current_version;
    for schema in RECORD_VERSIONED_SCHEMAS
        .iter()
        .filter(|s| s.version > current_version)
    {
        info!(
            "Migrating record db from version {} to {}",
            version, schema.version
        );
        if let Some(migration_fn) = schema.migration {
            migration_fn(&tx)
                .with_context(|| format!("Failed to run migration to version {}", schema.version))?;
        }
        version = schema.version;
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + version)?;
    tx.commit()?;

    latest_schema.validate(conn)?;
    Ok(())
}

fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

impl SqliteRecordStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::with_clock(db_path, Arc::new(Utc::now))
    }

    pub fn with_clock<P: AsRef<Path>>(db_path: P, clock: Clock) -> Result<Self> {
        let path = db_path.as_ref();
        let mut conn = Connection::open(path)
            .with_context(|| format!("Failed to open record database at {:?}", path))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrate_if_needed(&mut conn)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let record_count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
        info!(
            "Opened record database at {:?}: {} records",
            path, record_count
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<Record> {
        let created_at: String = row.get(7)?;
        Ok(Record {
            id: row.get(0)?,
            artist: row.get(1)?,
            album: row.get(2)?,
            genre: row.get(3)?,
            year: row.get(4)?,
            store: row.get(5)?,
            filename: row.get(6)?,
            created_at: parse_timestamp(7, &created_at)?,
        })
    }

    fn select_record(conn: &Connection, id: i64) -> rusqlite::Result<Option<Record>> {
        conn.query_row(
            &format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS),
            params![id],
            Self::row_to_record,
        )
        .optional()
    }

    /// Inserts the name or bumps its `last_used`.
    ///
    /// The stored value is `max(now, table maximum + 1)`, so the latest use
    /// always sorts first even when the clock does not advance between calls.
    /// Two writers racing on a new name meet the `UNIQUE(name)` constraint and
    /// the second one turns into an update.
    fn touch_choice(
        conn: &Connection,
        category: ChoiceCategory,
        name: &str,
        now_ms: i64,
    ) -> rusqlite::Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        let table = category.table_name();
        conn.execute(
            &format!(
                "INSERT INTO {table} (name, last_used)
                 VALUES (?1, MAX(?2, (SELECT COALESCE(MAX(last_used), 0) + 1 FROM {table})))
                 ON CONFLICT(name) DO UPDATE SET last_used = excluded.last_used"
            ),
            params![name, now_ms],
        )?;
        debug!("Recorded use of {} '{}'", category, name);
        Ok(())
    }

    fn touch_record_choices(
        conn: &Connection,
        fields: &RecordFields,
        now_ms: i64,
    ) -> rusqlite::Result<()> {
        if let Some(genre) = fields.genre.as_deref() {
            Self::touch_choice(conn, ChoiceCategory::Genre, genre, now_ms)?;
        }
        if let Some(store) = fields.store.as_deref() {
            Self::touch_choice(conn, ChoiceCategory::Store, store, now_ms)?;
        }
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore {
    fn search(&self, filters: &SearchFilters) -> RecordStoreResult<Vec<Record>> {
        let sql_filter = filters.clone().normalized().to_filter_expr().to_sql();
        let sql = format!(
            "SELECT {} FROM records{} ORDER BY created_at DESC, id DESC",
            RECORD_COLUMNS, sql_filter.where_clause
        );
        debug!("Searching records: {} {:?}", sql, sql_filter.params);

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(sql_filter.params.iter()), Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn month_range(&self) -> RecordStoreResult<Vec<String>> {
        let earliest: Option<String> = {
            let conn = self.lock();
            conn.query_row("SELECT MIN(created_at) FROM records", [], |r| r.get(0))?
        };
        let earliest = earliest
            .map(|value| parse_timestamp(0, &value))
            .transpose()?;
        Ok(months::month_range(earliest, self.now()))
    }

    fn get_record(&self, id: i64) -> RecordStoreResult<Option<Record>> {
        let conn = self.lock();
        Ok(Self::select_record(&conn, id)?)
    }

    fn get_records_count(&self) -> RecordStoreResult<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn create_record(&self, fields: &RecordFields) -> RecordStoreResult<Record> {
        let now = self.now();
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO records (artist, album, genre, year, store, filename, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &fields.artist,
                &fields.album,
                &fields.genre,
                &fields.year,
                &fields.store,
                &fields.filename,
                format_timestamp(&now),
            ],
        )?;
        let id = tx.last_insert_rowid();
        Self::touch_record_choices(&tx, fields, now.timestamp_millis())?;
        let record = Self::select_record(&tx, id)?.ok_or(RecordStoreError::NotFound(id))?;
        tx.commit()?;

        info!("Created record {}: {} - {}", id, record.artist, record.album);
        Ok(record)
    }

    fn update_record(&self, id: i64, fields: &RecordFields) -> RecordStoreResult<Record> {
        let now = self.now();
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE records
             SET artist = ?1, album = ?2, genre = ?3, year = ?4, store = ?5,
                 filename = COALESCE(?6, filename)
             WHERE id = ?7",
            params![
                &fields.artist,
                &fields.album,
                &fields.genre,
                &fields.year,
                &fields.store,
                &fields.filename,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(RecordStoreError::NotFound(id));
        }
        Self::touch_record_choices(&tx, fields, now.timestamp_millis())?;
        let record = Self::select_record(&tx, id)?.ok_or(RecordStoreError::NotFound(id))?;
        tx.commit()?;

        info!("Updated record {}", id);
        Ok(record)
    }

    fn delete_record(&self, id: i64) -> RecordStoreResult<bool> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM records WHERE id = ?1", params![id])?;
        if deleted > 0 {
            info!("Deleted record {}", id);
        }
        Ok(deleted > 0)
    }

    fn record_use(&self, category: ChoiceCategory, name: &str) -> RecordStoreResult<()> {
        if name.trim().is_empty() {
            return Ok(());
        }
        let now_ms = self.now().timestamp_millis();
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Self::touch_choice(&tx, category, name, now_ms)?;
        tx.commit()?;
        Ok(())
    }

    fn list_choices(&self, category: ChoiceCategory) -> RecordStoreResult<Vec<String>> {
        Ok(self
            .list_choice_entries(category)?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    fn list_choice_entries(&self, category: ChoiceCategory) -> RecordStoreResult<Vec<ChoiceEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT name, last_used FROM {} ORDER BY last_used DESC, id DESC",
            category.table_name()
        ))?;
        let entries = stmt
            .query_map([], |row| {
                Ok(ChoiceEntry {
                    name: row.get(0)?,
                    last_used: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
