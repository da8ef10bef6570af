//! SQLite-backed MBTiles implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::error::StoreError;
use super::schema;
use super::{Tile, TileSink};

/// Fixed and per-source values of the MBTiles `metadata` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMetadata {
    pub name: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// `min_lat,min_lon,max_lat,max_lon`.
    pub bounds: String,
}

impl StoreMetadata {
    fn entries(&self) -> [(&'static str, String); 6] {
        [
            ("name", self.name.clone()),
            ("format", "pbf".to_string()),
            ("crs", "EPSG:3857".to_string()),
            ("minzoom", self.min_zoom.to_string()),
            ("maxzoom", self.max_zoom.to_string()),
            ("bounds", self.bounds.clone()),
        ]
    }
}

/// Handle to one MBTiles file. Holds only the path; every operation opens
/// its own connection in create-or-append mode and closes it when done.
#[derive(Debug, Clone)]
pub struct MbtilesStore {
    path: PathBuf,
}

/// Path of the archive copy for `pass`: the pass number goes in front of the
/// extension (`alps.mbtiles` -> `alps3.mbtiles`).
pub fn archive_path(path: &Path, pass: u64) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, pass, ext.to_string_lossy()),
        None => format!("{}{}", stem, pass),
    };
    path.with_file_name(file_name)
}

fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path).map_err(|e| StoreError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    schema::migrate(&conn)?;
    Ok(conn)
}

impl MbtilesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against a fresh connection on the blocking pool.
    async fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&path)?;
            let result = op(&mut conn);
            drop(conn);
            result
        })
        .await?
    }

    /// Create the file if needed and (re)write the metadata table.
    pub async fn write_metadata(&self, meta: &StoreMetadata) -> Result<(), StoreError> {
        let entries = meta.entries();
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("INSERT OR REPLACE INTO metadata (name, value) VALUES (?1, ?2)")?;
                for (name, value) in &entries {
                    stmt.execute(params![name, value])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Read a single metadata value.
    pub async fn metadata_value(&self, name: &str) -> Result<Option<String>, StoreError> {
        let name = name.to_string();
        self.with_connection(move |conn| {
            let value: Option<Option<String>> = conn
                .query_row("SELECT value FROM metadata WHERE name = ?1", [name], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value.flatten())
        })
        .await
    }

    pub async fn tile_count(&self) -> Result<u64, StoreError> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    /// Fetch the stored payload at (zoom, column, TMS row).
    #[cfg(test)]
    pub async fn read_tile(
        &self,
        zoom: u8,
        column: u32,
        tms_row: u32,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_connection(move |conn| {
            let data = conn
                .query_row(
                    "SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
                    params![zoom, column, tms_row],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(data)
        })
        .await
    }

    /// Copy the store file to its pass-numbered archive path.
    pub async fn archive(&self, pass: u64) -> Result<PathBuf, StoreError> {
        let from = self.path.clone();
        let to = archive_path(&from, pass);
        let target = to.clone();
        tokio::fs::copy(&from, &target)
            .await
            .map_err(|e| StoreError::Archive {
                from,
                to: target,
                source: e,
            })?;
        Ok(to)
    }
}

#[async_trait]
impl TileSink for MbtilesStore {
    async fn write_tiles(&self, tiles: Vec<Tile>) -> Result<usize, StoreError> {
        if tiles.is_empty() {
            return Ok(0);
        }
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for tile in &tiles {
                    stmt.execute(params![
                        tile.coord.zoom,
                        tile.coord.x,
                        tile.coord.tms_row(),
                        &tile.data,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(tiles.len())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileCoord;
    use std::fs;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("tilecrawl")
            .join("store_tests")
            .join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn tile(zoom: u8, x: u32, y: u32, data: &[u8]) -> Tile {
        Tile {
            coord: TileCoord::new(zoom, x, y),
            data: data.to_vec(),
        }
    }

    fn metadata() -> StoreMetadata {
        StoreMetadata {
            name: "Alps".into(),
            min_zoom: 0,
            max_zoom: 14,
            bounds: "45.8,5.9,47.8,10.5".into(),
        }
    }

    #[test]
    fn test_archive_path_inserts_pass_before_extension() {
        assert_eq!(
            archive_path(Path::new("/data/alps.mbtiles"), 3),
            PathBuf::from("/data/alps3.mbtiles")
        );
        assert_eq!(
            archive_path(Path::new("maps/world"), 12),
            PathBuf::from("maps/world12")
        );
    }

    #[tokio::test]
    async fn test_metadata_written_and_replaced() {
        let dir = test_dir("metadata");
        let store = MbtilesStore::new(dir.join("alps.mbtiles"));

        store.write_metadata(&metadata()).await.unwrap();
        let mut updated = metadata();
        updated.max_zoom = 12;
        store.write_metadata(&updated).await.unwrap();

        assert!(store.path().exists());
        assert_eq!(store.metadata_value("format").await.unwrap().as_deref(), Some("pbf"));
        assert_eq!(store.metadata_value("crs").await.unwrap().as_deref(), Some("EPSG:3857"));
        assert_eq!(store.metadata_value("maxzoom").await.unwrap().as_deref(), Some("12"));
        assert_eq!(
            store.metadata_value("bounds").await.unwrap().as_deref(),
            Some("45.8,5.9,47.8,10.5")
        );
        assert_eq!(store.metadata_value("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_tiles_uses_tms_rows() {
        let dir = test_dir("tms_rows");
        let store = MbtilesStore::new(dir.join("t.mbtiles"));

        let written = store
            .write_tiles(vec![tile(3, 4, 1, b"a"), tile(3, 5, 1, b"b")])
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.read_tile(3, 4, 6).await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.read_tile(3, 5, 6).await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.read_tile(3, 4, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rewriting_a_tile_is_an_upsert() {
        let dir = test_dir("upsert");
        let store = MbtilesStore::new(dir.join("t.mbtiles"));

        store.write_tiles(vec![tile(2, 1, 1, b"old")]).await.unwrap();
        store.write_tiles(vec![tile(2, 1, 1, b"new")]).await.unwrap();

        assert_eq!(store.tile_count().await.unwrap(), 1);
        assert_eq!(store.read_tile(2, 1, 2).await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_empty_batch_does_not_create_file() {
        let dir = test_dir("empty_batch");
        let store = MbtilesStore::new(dir.join("t.mbtiles"));
        assert_eq!(store.write_tiles(Vec::new()).await.unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_archive_copies_contents() {
        let dir = test_dir("archive");
        let store = MbtilesStore::new(dir.join("alps.mbtiles"));
        store.write_metadata(&metadata()).await.unwrap();
        store.write_tiles(vec![tile(1, 0, 0, b"x")]).await.unwrap();

        let copy = store.archive(1).await.unwrap();

        assert_eq!(copy, dir.join("alps1.mbtiles"));
        let archived = MbtilesStore::new(&copy);
        assert_eq!(archived.tile_count().await.unwrap(), 1);
        assert_eq!(archived.metadata_value("name").await.unwrap().as_deref(), Some("Alps"));
    }

    #[tokio::test]
    async fn test_archive_missing_store_fails() {
        let dir = test_dir("archive_missing");
        let store = MbtilesStore::new(dir.join("never_written.mbtiles"));
        assert!(matches!(
            store.archive(1).await,
            Err(StoreError::Archive { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_in_missing_directory_fails() {
        let store = MbtilesStore::new("/nonexistent/tilecrawl/dir/t.mbtiles");
        assert!(matches!(
            store.write_metadata(&metadata()).await,
            Err(StoreError::Open { .. })
        ));
    }
}
