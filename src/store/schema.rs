//! MBTiles 1.3 schema and migrations.

use rusqlite::Connection;

use super::error::StoreError;

/// Current schema version, kept in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// `MPBX`, the MBTiles application id.
const MBTILES_APPLICATION_ID: i32 = 0x4d50_4258;

/// Schema DDL for version 1. Every statement is idempotent so files created
/// by other MBTiles writers (which leave `user_version` at 0) are adopted.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    name TEXT NOT NULL,
    value TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS metadata_name ON metadata(name);

CREATE TABLE IF NOT EXISTS tiles (
    zoom_level INTEGER NOT NULL,
    tile_column INTEGER NOT NULL,
    tile_row INTEGER NOT NULL,
    tile_data BLOB
);

CREATE UNIQUE INDEX IF NOT EXISTS tile_index ON tiles(zoom_level, tile_column, tile_row);
"#;

pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Initialize or adopt the schema. Safe to call on every open.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "application_id", MBTILES_APPLICATION_ID)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tracing::debug!("Initialized tile store schema at version {}", SCHEMA_VERSION);
    }

    Ok(())
}
