// src/file.rs
//! Record sinks: where canonical records go once normalized.
//!
//! `JsonlSink` lays records out under the output root as:
//! ```text
//! <out>/<partition>/entities/<entity>.jsonl
//! <out>/<partition>/<season>/schedules/<entity>.jsonl
//! <out>/<partition>/<season>/games/<contest>/contest.jsonl
//!                                           /player_stats.jsonl
//!                                           /team_stats.jsonl
//!                                           /plays.jsonl
//!                                           /officials.jsonl
//!                                           /warnings.jsonl
//! ```
//! Every file is written whole to a temp name and renamed into place, so a
//! re-normalized contest replaces its previous output rather than merging.
//! Entities and schedules get one file per entity, so a run narrowed to a
//! few entities leaves everyone else's output alone.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use serde::Serialize;
use tracing::debug;

use crate::data::{ContestRecords, Entity, Partition, ScheduleEntry, Season};
use crate::error::Result;

/// Receives canonical records. Called from fetch workers, so it must be `Sync`.
pub trait RecordSink: Send + Sync {
    fn entities(&self, partition: Partition, entities: &[Entity]) -> Result<()>;
    fn schedule(&self, partition: Partition, season: Season, entries: &[ScheduleEntry]) -> Result<()>;
    fn contest(&self, records: &ContestRecords) -> Result<()>;
}

/* ---------------- In-memory ---------------- */

/// Keeps everything; for library callers and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<Collected>,
}

#[derive(Clone, Debug, Default)]
pub struct Collected {
    pub entities: Vec<Entity>,
    pub schedule: Vec<ScheduleEntry>,
    pub contests: Vec<ContestRecords>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Collected {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn into_inner(self) -> Collected {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordSink for MemorySink {
    fn entities(&self, partition: Partition, entities: &[Entity]) -> Result<()> {
        let mut c = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        c.entities
            .retain(|old| old.partition != Some(partition) || !entities.iter().any(|e| e.id == old.id));
        c.entities.extend_from_slice(entities);
        Ok(())
    }

    fn schedule(&self, partition: Partition, season: Season, entries: &[ScheduleEntry]) -> Result<()> {
        let mut c = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        c.schedule.retain(|old| {
            old.partition != partition
                || old.season != season
                || !entries.iter().any(|e| e.entity_id == old.entity_id)
        });
        c.schedule.extend_from_slice(entries);
        Ok(())
    }

    fn contest(&self, records: &ContestRecords) -> Result<()> {
        let mut c = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Replace, never merge.
        c.contests.retain(|r| r.contest.id != records.contest.id || r.contest.partition != records.contest.partition);
        c.contests.push(records.clone());
        Ok(())
    }
}

/* ---------------- JSON lines ---------------- */

pub struct JsonlSink {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl JsonlSink {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_directory(&root)?;
        Ok(Self { root, tmp_seq: AtomicU64::new(0) })
    }

    pub fn contest_dir(&self, partition: Partition, season: Season, contest_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(partition.as_str())
            .join(season.to_string())
            .join("games")
            .join(safe_component(contest_id)?))
    }

    /// Serialize `rows` one per line into `path`, atomically.
    fn write_jsonl<T: Serialize>(&self, path: &Path, rows: &[T]) -> Result<()> {
        if let Some(parent) = path.parent() {
            ensure_directory(parent)?;
        }
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("out");
        let tmp = path.with_file_name(format!(".{name}.tmp-{}-{seq}", std::process::id()));

        let written = (|| -> Result<()> {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for row in rows {
                serde_json::to_writer(&mut out, row)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
            Ok(())
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), rows = rows.len(), "wrote");
        Ok(())
    }
}

impl RecordSink for JsonlSink {
    fn entities(&self, partition: Partition, entities: &[Entity]) -> Result<()> {
        let dir = self.root.join(partition.as_str()).join("entities");
        for e in entities {
            let path = dir.join(format!("{}.jsonl", safe_component(&e.id)?));
            self.write_jsonl(&path, std::slice::from_ref(e))?;
        }
        Ok(())
    }

    fn schedule(&self, partition: Partition, season: Season, entries: &[ScheduleEntry]) -> Result<()> {
        let dir = self
            .root
            .join(partition.as_str())
            .join(season.to_string())
            .join("schedules");
        let mut by_entity: BTreeMap<&str, Vec<&ScheduleEntry>> = BTreeMap::new();
        for entry in entries {
            by_entity.entry(entry.entity_id.as_str()).or_default().push(entry);
        }
        for (entity, rows) in by_entity {
            let path = dir.join(format!("{}.jsonl", safe_component(entity)?));
            self.write_jsonl(&path, &rows)?;
        }
        Ok(())
    }

    fn contest(&self, records: &ContestRecords) -> Result<()> {
        let c = &records.contest;
        let dir = self.contest_dir(c.partition, c.season, &c.id)?;
        self.write_jsonl(&dir.join("contest.jsonl"), std::slice::from_ref(c))?;
        self.write_jsonl(&dir.join("player_stats.jsonl"), &records.player_stats)?;
        self.write_jsonl(&dir.join("team_stats.jsonl"), &records.team_stats)?;
        self.write_jsonl(&dir.join("plays.jsonl"), &records.plays)?;
        self.write_jsonl(&dir.join("officials.jsonl"), &records.officials)?;
        self.write_jsonl(&dir.join("warnings.jsonl"), &records.warnings)?;
        Ok(())
    }
}

/* ---------------- Helpers ---------------- */

pub fn ensure_directory(dir: &Path) -> io::Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("path exists but is not a directory: {}", dir.display()),
        ));
    }
    fs::create_dir_all(dir)
}

/// Write any serializable value as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Ids become directory names; refuse anything that could leave the tree.
fn safe_component(id: &str) -> io::Result<&str> {
    let ok = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(id)
    } else {
        Err(io::Error::new(io::ErrorKind::InvalidInput, format!("unsafe id for a path: {id:?}")))
    }
}
