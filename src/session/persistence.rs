//! On-disk copy of the persisted player map.
//!
//! The file is a bincode-encoded map from certificate hash to player data. Each
//! write goes to its own uniquely named temp file in the same directory and is
//! renamed into place, so a crash mid-write leaves the previous file intact and
//! concurrent writers never share a temp file.

use crate::error::{ProtocolError, Result};
use crate::session::player::{CertHash, PlayerData};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

pub type PersistedMap = HashMap<CertHash, PlayerData>;

pub fn save_to_file<P: AsRef<Path>>(path: P, players: &PersistedMap) -> Result<()> {
    let path = path.as_ref();
    let bytes = bincode::serialize(players)
        .map_err(|e| ProtocolError::PersistenceError(format!("Failed to encode players: {e}")))?;

    let write_failed = |e: std::io::Error| {
        ProtocolError::PersistenceError(format!("Failed to write {}: {e}", path.display()))
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(&bytes).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| {
        ProtocolError::PersistenceError(format!("Failed to replace {}: {}", path.display(), e.error))
    })?;

    debug!(path = %path.display(), players = players.len(), "Persisted players saved");
    Ok(())
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<PersistedMap> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| {
        ProtocolError::PersistenceError(format!("Failed to read {}: {e}", path.display()))
    })?;
    bincode::deserialize(&bytes).map_err(|e| {
        ProtocolError::PersistenceError(format!("Corrupt player file {}: {e}", path.display()))
    })
}

/// Like [`load_from_file`], but a missing file is an empty map
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<PersistedMap> {
    if path.as_ref().exists() {
        load_from_file(path)
    } else {
        Ok(PersistedMap::new())
    }
}
