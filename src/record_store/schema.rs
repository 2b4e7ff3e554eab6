//! SQLite schema definitions for the record database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Records and recency-tracked choices
// =============================================================================

const RECORDS_TABLE_V1: Table = Table {
    name: "records",
    columns: &[
        // Ids of deleted records are never handed out again
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_autoincrement = true
        ),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("album", &SqlType::Text, non_null = true),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("year", &SqlType::Text),
        sqlite_column!("store", &SqlType::Text),
        sqlite_column!("filename", &SqlType::Text),
        // Fixed-width UTC, e.g. 2024-02-01T09:30:00.000000Z
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_records_created_at", "created_at"),
        ("idx_records_genre", "genre"),
        ("idx_records_store", "store"),
    ],
};

const GENRES_TABLE_V1: Table = Table {
    name: "genres",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
        // Epoch milliseconds
        sqlite_column!("last_used", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_genres_last_used", "last_used")],
};

const STORES_TABLE_V1: Table = Table {
    name: "stores",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("last_used", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_stores_last_used", "last_used")],
};

/// Migration from the unversioned layout written by the first release of the
/// catalog: `TIMESTAMP` columns holding SQLite `CURRENT_TIMESTAMP` text for
/// records and ISO-8601 text for choices, nullable choice names.
fn migrate_legacy_to_v1(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "ALTER TABLE records RENAME TO legacy_records;
         ALTER TABLE genres RENAME TO legacy_genres;
         ALTER TABLE stores RENAME TO legacy_stores;",
    )?;

    for table in [&RECORDS_TABLE_V1, &GENRES_TABLE_V1, &STORES_TABLE_V1] {
        table.create(conn)?;
    }

    conn.execute(
        "INSERT INTO records (id, artist, album, genre, year, store, filename, created_at)
         SELECT id, artist, album,
                NULLIF(TRIM(genre), ''), NULLIF(TRIM(year), ''), NULLIF(TRIM(store), ''),
                filename,
                strftime('%Y-%m-%dT%H:%M:%f', COALESCE(created_at, 'now')) || '000Z'
         FROM legacy_records",
        [],
    )?;
    // Keep the id sequence past every id the legacy table ever handed out,
    // including ids of records deleted before the migration.
    conn.execute_batch(
        "DELETE FROM sqlite_sequence WHERE name = 'records';
         INSERT INTO sqlite_sequence (name, seq)
         SELECT 'records', MAX(
             COALESCE((SELECT MAX(id) FROM legacy_records), 0),
             COALESCE((SELECT MAX(seq) FROM sqlite_sequence WHERE name = 'legacy_records'), 0)
         );",
    )?;
    for (legacy, current) in [("legacy_genres", "genres"), ("legacy_stores", "stores")] {
        conn.execute(
            &format!(
                "INSERT INTO {current} (name, last_used)
                 SELECT name, COALESCE(CAST(ROUND((julianday(last_used) - 2440587.5) * 86400000) AS INTEGER), 0)
                 FROM {legacy}
                 WHERE name IS NOT NULL AND TRIM(name) != ''
                 ORDER BY id"
            ),
            [],
        )?;
    }

    conn.execute_batch(
        "DROP TABLE legacy_records;
         DROP TABLE legacy_genres;
         DROP TABLE legacy_stores;",
    )?;
    Ok(())
}

// =============================================================================
// Versioned Schema Definition
// =============================================================================

/// All versioned schemas for the record database.
///
/// Databases without a version stamp but with a `records` table are treated as
/// version 0 and migrated forward.
///
/// Version 1: records, genres and stores tables
pub const RECORD_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[RECORDS_TABLE_V1, GENRES_TABLE_V1, STORES_TABLE_V1],
    migration: Some(migrate_legacy_to_v1),
}];
