// src/store.rs
//! Raw payload cache.
//!
//! Layout under the cache root:
//! ```text
//! <root>/<partition>/teams/page-1.json          entity list pages
//! <root>/<partition>/team/<id>.json             single entities
//! <root>/<partition>/<season>/schedules/<id>.json
//! <root>/<partition>/<season>/games/<id>.json
//! ```
//! Presence of a file is the only "already fetched" signal. Files are
//! published with write-temp-then-rename, so a visible `.json` is always a
//! complete write.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::{Partition, Season};
use crate::error::CacheError;

const TMP_MARKER: &str = ".tmp-";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    EntityList,
    Entity,
    Schedule,
    Contest,
}

impl PayloadKind {
    fn dir_name(&self) -> &'static str {
        match self {
            PayloadKind::EntityList => "teams",
            PayloadKind::Entity => "team",
            PayloadKind::Schedule => "schedules",
            PayloadKind::Contest => "games",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub partition: Partition,
    pub kind: PayloadKind,
    pub season: Option<Season>,
    pub id: String,
}

impl CacheKey {
    pub fn entity_list_page(partition: Partition, page: u32) -> Self {
        Self { partition, kind: PayloadKind::EntityList, season: None, id: format!("page-{page}") }
    }
    pub fn entity(partition: Partition, id: &str) -> Self {
        Self { partition, kind: PayloadKind::Entity, season: None, id: s!(id) }
    }
    pub fn schedule(partition: Partition, season: Season, entity_id: &str) -> Self {
        Self { partition, kind: PayloadKind::Schedule, season: Some(season), id: s!(entity_id) }
    }
    pub fn contest(partition: Partition, season: Season, contest_id: &str) -> Self {
        Self { partition, kind: PayloadKind::Contest, season: Some(season), id: s!(contest_id) }
    }

    /// Path relative to the cache root. Rejects ids that could escape it.
    pub fn relative_path(&self) -> Result<PathBuf, CacheError> {
        let valid = !self.id.is_empty()
            && self.id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CacheError::InvalidKey(self.id.clone()));
        }

        let mut p = PathBuf::from(self.partition.as_str());
        if let Some(season) = self.season {
            p.push(season.to_string());
        }
        p.push(self.kind.dir_name());
        p.push(join!(&self.id, ".json"));
        Ok(p)
    }
}

/// Durable, idempotent store of raw payloads. Safe to share across threads:
/// concurrent writers to distinct keys need no coordination.
pub struct PayloadCache {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl PayloadCache {
    /// Open (creating if needed) a cache rooted at `root`, and sweep temp
    /// files left behind by interrupted writes.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CacheError::io(&root, e))?;
        let cache = Self { root, tmp_seq: AtomicU64::new(0) };
        let swept = cache.sweep_temp()?;
        if swept > 0 {
            warn!(swept, root = %cache.root.display(), "removed orphaned cache temp files");
        }
        Ok(cache)
    }

    pub fn path_for(&self, key: &CacheKey) -> Result<PathBuf, CacheError> {
        Ok(self.root.join(key.relative_path()?))
    }

    pub fn has(&self, key: &CacheKey) -> bool {
        self.path_for(key).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Raw bytes, or `None` when the key was never published.
    pub fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Like `get`, but also checks the entry still parses as JSON.
    pub fn get_checked(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let Some(bytes) = self.get(key)? else { return Ok(None) };
        if let Err(e) = serde_json::from_slice::<serde::de::IgnoredAny>(&bytes) {
            return Err(CacheError::Corrupt { path: self.path_for(key)?, reason: e.to_string() });
        }
        Ok(Some(bytes))
    }

    /// Publish `bytes` under `key`. Writing to a key that already exists is a
    /// no-op; returns whether this call published.
    pub fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<bool, CacheError> {
        let path = self.path_for(key)?;
        if path.is_file() {
            return Ok(false);
        }
        let tmp = self.write_temp(&path, bytes)?;
        if path.is_file() {
            // Lost a race with an identical write.
            let _ = fs::remove_file(&tmp);
            return Ok(false);
        }
        fs::rename(&tmp, &path).map_err(|e| CacheError::io(&path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "cache put");
        Ok(true)
    }

    /// Publish `bytes`, atomically replacing whatever was there.
    pub fn replace(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        let tmp = self.write_temp(&path, bytes)?;
        fs::rename(&tmp, &path).map_err(|e| CacheError::io(&path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "cache replace");
        Ok(())
    }

    /// Drop an entry (used when it turned out to be corrupt).
    pub fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Ids cached for one (partition, kind, season) bucket, sorted.
    pub fn list(&self, partition: Partition, kind: PayloadKind, season: Option<Season>) -> Result<Vec<String>, CacheError> {
        let mut dir = self.root.join(partition.as_str());
        if let Some(season) = season {
            dir.push(season.to_string());
        }
        dir.push(kind.dir_name());

        let entries = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(dir, e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CacheError::io(&dir, e))?.path();
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else { continue };
            if name.contains(TMP_MARKER) { continue; }
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(s!(id));
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn write_temp(&self, final_path: &Path, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let parent = final_path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let file_name = final_path.file_name().and_then(|s| s.to_str()).unwrap_or("entry");
        let tmp = parent.join(format!("{file_name}{TMP_MARKER}{}-{seq}", std::process::id()));

        let mut f = fs::File::create(&tmp).map_err(|e| CacheError::io(&tmp, e))?;
        f.write_all(bytes).map_err(|e| CacheError::io(&tmp, e))?;
        f.sync_all().map_err(|e| CacheError::io(&tmp, e))?;
        Ok(tmp)
    }

    fn sweep_temp(&self) -> Result<usize, CacheError> {
        let mut removed = 0usize;
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| CacheError::io(&dir, e))?;
            for entry in entries {
                let path = entry.map_err(|e| CacheError::io(&dir, e))?.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.file_name().and_then(|s| s.to_str()).is_some_and(|n| n.contains(TMP_MARKER)) {
                    fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
