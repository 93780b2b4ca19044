//! Zone list loading

use nws_client::ZoneId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("Failed to read zone file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid zone id {value:?} on line {line}")]
    Invalid { line: usize, value: String },

    #[error("Zone list is empty")]
    Empty,
}

/// Forecast (`ILZ014`) or county (`ILC031`) zone id
static ZONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[CZ][0-9]{3}$").unwrap_or_else(|_| unreachable!()));

/// Whether `zone` looks like an NWS zone id
pub fn is_valid_zone(zone: &str) -> bool {
    ZONE_REGEX.is_match(zone)
}

/// Parse a zone list: one id per line, `#` starts a comment.
///
/// Ids are uppercased and deduplicated, keeping first-seen order.
pub fn parse_zones(text: &str) -> Result<Vec<ZoneId>, ZoneError> {
    let mut seen = HashSet::new();
    let mut zones = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let zone = line.to_ascii_uppercase();
        if !is_valid_zone(&zone) {
            return Err(ZoneError::Invalid {
                line: index + 1,
                value: line.to_string(),
            });
        }

        if seen.insert(zone.clone()) {
            zones.push(zone);
        } else {
            warn!("Duplicate zone {} on line {}", zone, index + 1);
        }
    }

    if zones.is_empty() {
        return Err(ZoneError::Empty);
    }
    Ok(zones)
}

/// Read and parse the zone file at `path`
pub fn load_zones(path: &Path) -> Result<Vec<ZoneId>, ZoneError> {
    let text = std::fs::read_to_string(path).map_err(|source| ZoneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let zones = parse_zones(&text)?;
    info!("Loaded {} zones from {}", zones.len(), path.display());
    Ok(zones)
}
