//! File-backed header cache, one file per mailbox.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::format::{self, CacheHeader, HEADER_SIZE};
use super::{CachedMessage, HeaderCache};
use crate::error::{Result, ScanError};
use crate::model::Message;

/// Header cache loaded into memory and written back by [`flush`](Self::flush)
/// or [`close`](Self::close).
#[derive(Debug)]
pub struct FileHeaderCache {
    path: PathBuf,
    entries: HashMap<String, Vec<u8>>,
    dirty: bool,
}

impl FileHeaderCache {
    /// Open the cache for `mailbox` under `location`.
    ///
    /// A missing, unreadable or corrupt file gives an empty cache.
    pub fn open(location: &Path, mailbox: &Path) -> Self {
        let path = cache_file_for(location, mailbox);
        let entries = match load_entries(&path) {
            Ok(Some(entries)) => {
                debug!(path = %path.display(), entries = entries.len(), "Loaded header cache");
                entries
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable header cache");
                HashMap::new()
            }
        };
        Self {
            path,
            entries,
            dirty: false,
        }
    }

    /// The cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache to disk if anything was stored since the last write.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        write_entries(&self.path, &self.entries)?;
        self.dirty = false;
        info!(path = %self.path.display(), entries = self.entries.len(), "Header cache written");
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

impl HeaderCache for FileHeaderCache {
    fn fetch(&mut self, key: &str) -> Option<CachedMessage> {
        let bytes = self.entries.get(key)?;
        match format::decode_record(bytes) {
            Some((validity, message)) => Some(CachedMessage { message, validity }),
            None => {
                debug!(key = key, "Dropping undecodable cache record");
                None
            }
        }
    }

    fn store(&mut self, key: &str, message: &Message) -> Result<()> {
        let record = format::encode_record(now_secs(), message).map_err(|e| {
            ScanError::CacheFormat {
                path: self.path.clone(),
                reason: format!("Record serialization failed: {e}"),
            }
        })?;
        self.entries.insert(key.to_string(), record);
        self.dirty = true;
        Ok(())
    }
}

/// Resolve the cache file of `mailbox`.
///
/// If `location` is a directory (it exists as one, or ends in `/`), the
/// file inside it is named by the SHA-256 of the canonical mailbox path.
/// Otherwise `location` itself is the file.
pub fn cache_file_for(location: &Path, mailbox: &Path) -> PathBuf {
    let is_dir = location.is_dir() || location.to_string_lossy().ends_with('/');
    if !is_dir {
        return location.to_path_buf();
    }

    let canonical = mailbox
        .canonicalize()
        .unwrap_or_else(|_| mailbox.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(b"maildex|");
    hasher.update(canonical.to_string_lossy().as_bytes());
    location.join(format!("{:x}", hasher.finalize()))
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Load and validate a cache file. `None` if it is missing or from another
/// format version.
fn load_entries(path: &Path) -> Result<Option<HashMap<String, Vec<u8>>>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ScanError::io(path, e)),
    };

    if data.len() < HEADER_SIZE {
        debug!("Header cache file too small");
        return Ok(None);
    }

    let header: CacheHeader =
        bincode::deserialize(&data[..HEADER_SIZE]).map_err(|e| ScanError::CacheFormat {
            path: path.to_path_buf(),
            reason: format!("Header deserialization failed: {e}"),
        })?;

    if let Err(reason) = header.validate() {
        debug!(reason = %reason, "Header cache header invalid");
        return Ok(None);
    }

    let entries: HashMap<String, Vec<u8>> =
        bincode::deserialize(&data[HEADER_SIZE..]).map_err(|e| ScanError::CacheFormat {
            path: path.to_path_buf(),
            reason: format!("Entry deserialization failed: {e}"),
        })?;

    if entries.len() as u64 != header.entry_count {
        debug!("Header cache entry count mismatch");
        return Ok(None);
    }

    Ok(Some(entries))
}

fn write_entries(path: &Path, entries: &HashMap<String, Vec<u8>>) -> Result<()> {
    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let header = CacheHeader::new(entries.len() as u64, created);

    let serialize_err = |e: bincode::Error| ScanError::CacheFormat {
        path: path.to_path_buf(),
        reason: format!("Serialization failed: {e}"),
    };
    let header_bytes = bincode::serialize(&header).map_err(serialize_err)?;
    let entries_bytes = bincode::serialize(entries).map_err(serialize_err)?;

    // Pad header to HEADER_SIZE
    let mut padded_header = vec![0u8; HEADER_SIZE];
    let copy_len = header_bytes.len().min(HEADER_SIZE);
    padded_header[..copy_len].copy_from_slice(&header_bytes[..copy_len]);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ScanError::io(parent, e))?;
    }
    let mut file = File::create(path).map_err(|e| ScanError::io(path, e))?;
    file.write_all(&padded_header)
        .map_err(|e| ScanError::io(path, e))?;
    file.write_all(&entries_bytes)
        .map_err(|e| ScanError::io(path, e))?;
    file.flush().map_err(|e| ScanError::io(path, e))?;
    Ok(())
}
