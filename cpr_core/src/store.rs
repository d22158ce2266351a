//! Durable storage for the live session snapshot and finished-code history.
//!
//! The snapshot is a single JSON document replaced atomically on every save;
//! history is an append-only JSON Lines file. Both use `fs2` advisory locks so
//! a console and a read-only `status` invocation never see a torn write.

use crate::{Error, Result, SavedRecord, Session};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Persistence port used by the tracker
pub trait SessionStore {
    /// Stored snapshot, or `None` if there is none or it is unreadable
    fn load_snapshot(&self) -> Result<Option<Session>>;
    fn save_snapshot(&mut self, session: &Session) -> Result<()>;
    fn clear_snapshot(&mut self) -> Result<()>;
    fn append_history(&mut self, record: &SavedRecord) -> Result<()>;
    /// All records, oldest first
    fn load_history(&self) -> Result<Vec<SavedRecord>>;
}

/// File-backed store rooted at a data directory
#[derive(Clone, Debug)]
pub struct FileStore {
    snapshot_path: PathBuf,
    history_path: PathBuf,
}

impl FileStore {
    /// Store using `<data_dir>/state/session.json` and `<data_dir>/history.jsonl`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            snapshot_path: data_dir.join("state").join("session.json"),
            history_path: data_dir.join("history.jsonl"),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl SessionStore for FileStore {
    fn load_snapshot(&self) -> Result<Option<Session>> {
        let path = &self.snapshot_path;
        if !path.exists() {
            tracing::debug!("No snapshot at {:?}", path);
            return Ok(None);
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open snapshot {:?}: {}. Starting fresh.", path, e);
                return Ok(None);
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock snapshot {:?}: {}. Starting fresh.", path, e);
            return Ok(None);
        }

        let mut contents = String::new();
        let read = BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        if let Err(e) = read {
            tracing::warn!("Failed to read snapshot {:?}: {}. Starting fresh.", path, e);
            return Ok(None);
        }

        match serde_json::from_str::<Session>(&contents) {
            Ok(session) => {
                tracing::debug!("Loaded snapshot from {:?}", path);
                Ok(Some(session))
            }
            Err(e) => {
                tracing::warn!("Failed to parse snapshot {:?}: {}. Starting fresh.", path, e);
                Ok(None)
            }
        }
    }

    fn save_snapshot(&mut self, session: &Session) -> Result<()> {
        let path = &self.snapshot_path;
        ensure_parent_dir(path)?;

        // Same directory so the final rename stays on one filesystem
        let parent = path
            .parent()
            .ok_or_else(|| Error::Store(format!("snapshot path {:?} has no parent", path)))?;
        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(&session.to_snapshot())?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved snapshot to {:?}", path);
        Ok(())
    }

    fn clear_snapshot(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.snapshot_path) {
            Ok(()) => {
                tracing::debug!("Cleared snapshot {:?}", self.snapshot_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn append_history(&mut self, record: &SavedRecord) -> Result<()> {
        ensure_parent_dir(&self.history_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)?;
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;
        tracing::debug!("Appended record {} to history", record.id);
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<SavedRecord>> {
        if !self.history_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.history_path)?;
        file.lock_shared()?;

        let mut records = Vec::new();
        for (line_num, line) in BufReader::new(&file).split(b'\n').enumerate() {
            let line = line?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<SavedRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping history line {}: {}", line_num + 1, e);
                }
            }
        }

        file.unlock()?;
        tracing::debug!("Read {} history records", records.len());
        Ok(records)
    }
}

/// In-process store, mostly for tests
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    pub snapshot: Option<Session>,
    pub history: Vec<SavedRecord>,
    /// Number of snapshot writes, for asserting persistence behaviour
    pub saves: usize,
}

impl SessionStore for MemoryStore {
    fn load_snapshot(&self) -> Result<Option<Session>> {
        Ok(self.snapshot.clone())
    }

    fn save_snapshot(&mut self, session: &Session) -> Result<()> {
        self.snapshot = Some(session.to_snapshot());
        self.saves += 1;
        Ok(())
    }

    fn clear_snapshot(&mut self) -> Result<()> {
        self.snapshot = None;
        Ok(())
    }

    fn append_history(&mut self, record: &SavedRecord) -> Result<()> {
        self.history.push(record.clone());
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<SavedRecord>> {
        Ok(self.history.clone())
    }
}
