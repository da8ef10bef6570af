//! Map source definitions loaded from the JSON source list.
//!
//! The file is an object keyed by a freely chosen source key; key order is
//! the crawl order and is preserved on load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::grid::{BoundingBox, MAX_ZOOM};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read source list {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse source list {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Source list {0} contains no sources")]
    Empty(PathBuf),

    #[error("Source '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

/// One entry of the source list as written in the file.
#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(rename = "DownloadURL")]
    download_url: String,
    #[serde(rename = "BoundingBox")]
    bounding_box: Vec<f64>,
    #[serde(rename = "ServerParts", default)]
    server_parts: Vec<String>,
    #[serde(rename = "MBtilesDB")]
    mbtiles_db: PathBuf,
    #[serde(rename = "Name")]
    name: String,
    min_z: u8,
    max_z: u8,
    #[serde(rename = "ReadSpacing")]
    read_spacing: f64,
    #[serde(rename = "Headers", default)]
    headers: BTreeMap<String, String>,
}

/// A validated tile source. Immutable for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct MapSource {
    /// Key of the entry in the source list; names the per-source status file.
    pub key: String,
    pub url_template: String,
    pub bbox: BoundingBox,
    pub server_parts: Vec<String>,
    pub store_path: PathBuf,
    pub display_name: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub delay: Duration,
    /// Static headers sent with every request in addition to the User-Agent.
    pub headers: Vec<(String, String)>,
}

impl MapSource {
    /// Substitute mirror and tile coordinates into the URL template.
    pub fn tile_url(&self, server: &str, zoom: u8, x: u32, y: u32) -> String {
        self.url_template
            .replace("{server}", server)
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
            .replace("{z}", &zoom.to_string())
    }

    fn from_raw(key: String, raw: RawSource) -> Result<Self, SourceError> {
        let invalid = |reason: String| SourceError::Invalid {
            key: key.clone(),
            reason,
        };

        let [min_lon, min_lat, max_lon, max_lat] = <[f64; 4]>::try_from(raw.bounding_box.as_slice())
            .map_err(|_| {
                invalid(format!(
                    "BoundingBox needs 4 values (min_lon, min_lat, max_lon, max_lat), got {}",
                    raw.bounding_box.len()
                ))
            })?;
        for lon in [min_lon, max_lon] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(invalid(format!("longitude {} out of range", lon)));
            }
        }
        for lat in [min_lat, max_lat] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(invalid(format!("latitude {} out of range", lat)));
            }
        }

        if raw.min_z > raw.max_z {
            return Err(invalid(format!(
                "min_z {} is greater than max_z {}",
                raw.min_z, raw.max_z
            )));
        }
        if raw.max_z > MAX_ZOOM {
            return Err(invalid(format!(
                "max_z {} exceeds the supported maximum {}",
                raw.max_z, MAX_ZOOM
            )));
        }

        let delay = Duration::try_from_secs_f64(raw.read_spacing).map_err(|_| {
            invalid(format!(
                "ReadSpacing must be a non-negative number of seconds, got {}",
                raw.read_spacing
            ))
        })?;

        if raw.download_url.is_empty() {
            return Err(invalid("DownloadURL is empty".to_string()));
        }

        let server_parts = if raw.server_parts.is_empty() {
            vec![String::new()]
        } else {
            raw.server_parts
        };

        Ok(Self {
            key,
            url_template: raw.download_url,
            bbox: BoundingBox::new(min_lon, min_lat, max_lon, max_lat),
            server_parts,
            store_path: raw.mbtiles_db,
            display_name: raw.name,
            min_zoom: raw.min_z,
            max_zoom: raw.max_z,
            delay,
            headers: raw.headers.into_iter().collect(),
        })
    }
}

/// Parse a source list from JSON text, keeping file order.
pub fn parse_sources(json: &str, origin: &Path) -> Result<Vec<MapSource>, SourceError> {
    let raw: IndexMap<String, RawSource> =
        serde_json::from_str(json).map_err(|e| SourceError::Parse {
            path: origin.to_path_buf(),
            source: e,
        })?;

    if raw.is_empty() {
        return Err(SourceError::Empty(origin.to_path_buf()));
    }

    raw.into_iter()
        .map(|(key, raw)| MapSource::from_raw(key, raw))
        .collect()
}

/// Load and validate the source list at `path`.
pub fn load_sources(path: &Path) -> Result<Vec<MapSource>, SourceError> {
    let json = std::fs::read_to_string(path).map_err(|e| SourceError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let sources = parse_sources(&json, path)?;
    tracing::debug!(count = sources.len(), path = %path.display(), "Loaded map sources");
    Ok(sources)
}
