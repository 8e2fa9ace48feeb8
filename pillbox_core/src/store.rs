//! Regimen store persistence with file locking.
//!
//! The store keeps a schedulable view of the regimen list in memory. Every
//! mutation goes through [`RegimenStorage::update`], which reloads the stored
//! list, applies the change and writes it back while holding an exclusive
//! lock, so a CLI invocation and a long-running tray never overwrite each
//! other's regimens or taken doses.

use crate::{Error, Regimen, Result};
use fs2::FileExt;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::NamedTempFile;

/// Storage collaborator for the regimen list
pub trait RegimenStorage {
    /// Load all readable regimens; empty when nothing has been saved yet
    fn load(&self) -> Result<Vec<Regimen>>;

    /// Reload the stored list, apply `change` and write it back as one step
    ///
    /// `change` returns whether it modified the list; nothing is written when
    /// it did not. Returns the list as it now stands.
    fn update(&self, change: &mut dyn FnMut(&mut Vec<Regimen>) -> bool) -> Result<Vec<Regimen>>;
}

/// Regimens read from a store file, plus records that did not deserialize
///
/// Unreadable records are written back untouched.
#[derive(Default)]
struct Records {
    regimens: Vec<Regimen>,
    unreadable: Vec<Value>,
}

/// JSON file storage with a lock file around every read-modify-write
pub struct JsonFileStorage {
    path: PathBuf,
    unreadable: Cell<usize>,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            unreadable: Cell::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file whose exclusive lock serializes writers
    pub fn lock_path(&self) -> PathBuf {
        with_suffix(&self.path, ".lock")
    }

    /// Where a store file that is not a JSON list is moved before rewriting
    pub fn quarantine_path(&self) -> PathBuf {
        with_suffix(&self.path, ".corrupt")
    }

    fn parse(&self, contents: &[u8]) -> serde_json::Result<Records> {
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(Records::default());
        }

        let values: Vec<Value> = serde_json::from_slice(contents)?;
        let mut records = Records::default();
        for value in values {
            match serde_json::from_value::<Regimen>(value.clone()) {
                Ok(regimen) => records.regimens.push(regimen),
                Err(e) => {
                    tracing::debug!("Unreadable regimen record in {:?}: {}", self.path, e);
                    records.unreadable.push(value);
                }
            }
        }

        let count = records.unreadable.len();
        if count > 0 && count != self.unreadable.get() {
            tracing::warn!(
                "Skipping {} unreadable regimen records in {:?}; they stay on disk",
                count,
                self.path
            );
        }
        self.unreadable.set(count);

        Ok(records)
    }

    fn read_for_update(&self) -> Result<Records> {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Records::default()),
            Err(e) => return Err(e.into()),
        };

        match self.parse(&contents) {
            Ok(records) => Ok(records),
            Err(e) => {
                let quarantine = self.quarantine_path();
                tracing::warn!(
                    "Regimen store {:?} is not a regimen list ({}); moving it to {:?}",
                    self.path,
                    e,
                    quarantine
                );
                std::fs::rename(&self.path, &quarantine)?;
                Ok(Records::default())
            }
        }
    }

    /// Writes to a temp file in the same directory, syncs it, then renames it
    /// over the store file.
    fn write(&self, records: &Records) -> Result<()> {
        let path = &self.path;
        let parent = path
            .parent()
            .ok_or_else(|| Error::Storage(format!("store path {:?} has no parent", path)))?;

        let mut values = records
            .regimens
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<Value>>>()?;
        values.extend(records.unreadable.iter().cloned());

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(&values)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} regimens to {:?}", values.len(), path);
        Ok(())
    }
}

impl RegimenStorage for JsonFileStorage {
    /// Returns an empty list if the file doesn't exist.
    /// If the file is unreadable or not a JSON list, logs a warning and
    /// returns an empty list. Individual bad records are skipped.
    fn load(&self) -> Result<Vec<Regimen>> {
        let path = &self.path;
        if !path.exists() {
            tracing::debug!("No regimen store found at {:?}, starting empty", path);
            return Ok(Vec::new());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open regimen store {:?}: {}. Starting empty.", path, e);
                return Ok(Vec::new());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock regimen store {:?}: {}. Starting empty.", path, e);
            return Ok(Vec::new());
        }

        let mut contents = Vec::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_end(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read regimen store {:?}: {}. Starting empty.", path, e);
            return Ok(Vec::new());
        }

        file.unlock()?;

        match self.parse(&contents) {
            Ok(records) => {
                tracing::debug!("Loaded {} regimens from {:?}", records.regimens.len(), path);
                Ok(records.regimens)
            }
            Err(e) => {
                tracing::warn!("Failed to parse regimen store {:?}: {}. Starting empty.", path, e);
                Ok(Vec::new())
            }
        }
    }

    fn update(&self, change: &mut dyn FnMut(&mut Vec<Regimen>) -> bool) -> Result<Vec<Regimen>> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Storage(format!("store path {:?} has no parent", self.path)))?;
        std::fs::create_dir_all(parent)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = self.read_for_update().and_then(|mut records| {
            if change(&mut records.regimens) {
                self.write(&records)?;
            }
            Ok(records.regimens)
        });

        let _ = lock.unlock();
        result
    }
}

/// In-memory storage, shareable between stores and the code observing them
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    regimens: Vec<Regimen>,
    saves: usize,
    unavailable: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_regimens(regimens: Vec<Regimen>) -> Self {
        let storage = Self::default();
        storage.inner.borrow_mut().regimens = regimens;
        storage
    }

    /// Make every subsequent load/update fail
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.borrow_mut().unavailable = unavailable;
    }

    /// Number of successful writes so far
    pub fn save_count(&self) -> usize {
        self.inner.borrow().saves
    }

    /// Snapshot of the stored list
    pub fn saved(&self) -> Vec<Regimen> {
        self.inner.borrow().regimens.clone()
    }
}

impl RegimenStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<Regimen>> {
        let inner = self.inner.borrow();
        if inner.unavailable {
            return Err(Error::Storage("memory storage unavailable".into()));
        }
        Ok(inner.regimens.clone())
    }

    fn update(&self, change: &mut dyn FnMut(&mut Vec<Regimen>) -> bool) -> Result<Vec<Regimen>> {
        let mut inner = self.inner.borrow_mut();
        if inner.unavailable {
            return Err(Error::Storage("memory storage unavailable".into()));
        }
        let mut regimens = inner.regimens.clone();
        if change(&mut regimens) {
            inner.regimens = regimens.clone();
            inner.saves += 1;
        }
        Ok(regimens)
    }
}

/// Schedulable regimens backed by a storage collaborator
///
/// Stored regimens with a zero frequency are kept in storage but hidden
/// here, so they never reach the schedule generator.
pub struct RegimenStore {
    regimens: Vec<Regimen>,
    storage: Box<dyn RegimenStorage>,
    hidden: usize,
}

impl RegimenStore {
    /// Load the store from its storage collaborator
    ///
    /// A storage failure is logged and the store starts empty.
    pub fn open(storage: Box<dyn RegimenStorage>) -> Self {
        let mut store = Self {
            regimens: Vec::new(),
            storage,
            hidden: 0,
        };
        store.reload();
        store
    }

    /// Open a store backed by a JSON file
    pub fn open_file(path: impl Into<PathBuf>) -> Self {
        Self::open(Box::new(JsonFileStorage::new(path)))
    }

    pub fn regimens(&self) -> &[Regimen] {
        &self.regimens
    }

    pub fn get(&self, regimen_id: &str) -> Option<&Regimen> {
        self.regimens.iter().find(|r| r.id == regimen_id)
    }

    /// Re-read storage to pick up changes made by other front ends
    ///
    /// On failure the in-memory list is kept and `false` is returned.
    pub fn reload(&mut self) -> bool {
        match self.storage.load() {
            Ok(regimens) => {
                self.regimens = self.schedulable(regimens);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Regimen storage unavailable: {}. Keeping {} regimens in memory.",
                    e,
                    self.regimens.len()
                );
                false
            }
        }
    }

    /// Append a validated regimen and persist
    pub fn push(&mut self, regimen: Regimen) -> Regimen {
        self.modify(|regimens| {
            regimens.push(regimen.clone());
            true
        });
        regimen
    }

    /// Apply `change` to the stored list in one locked reload-modify-save
    ///
    /// `change` reports whether it modified the list. When storage fails the
    /// change is applied to the in-memory list only; returns whether it was
    /// persisted.
    pub(crate) fn modify(&mut self, mut change: impl FnMut(&mut Vec<Regimen>) -> bool) -> bool {
        let updated = self.storage.update(&mut change);
        match updated {
            Ok(regimens) => {
                self.regimens = self.schedulable(regimens);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to persist regimens: {}. Keeping the change in memory.", e);
                change(&mut self.regimens);
                false
            }
        }
    }

    fn schedulable(&mut self, mut regimens: Vec<Regimen>) -> Vec<Regimen> {
        let before = regimens.len();
        regimens.retain(|r| r.freq_hours >= 1);

        let hidden = before - regimens.len();
        if hidden > 0 && hidden != self.hidden {
            tracing::warn!(
                "Ignoring {} stored regimens with a zero dosing frequency",
                hidden
            );
        }
        self.hidden = hidden;

        regimens
    }
}
