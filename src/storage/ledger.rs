//! Persisted address -> "is a contract" ledger.
//!
//! The ledger is the only source of dedup truth: once an address has an entry it is
//! never fetched or queued again, across restarts included. Every new entry rewrites
//! the whole JSON object before `record` returns. The type does no locking of its own;
//! callers serialize access (the coordinator holds it behind its stage lock).

use crate::error::LedgerError;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: HashMap<String, bool>,
}

fn canonical_key(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

impl Ledger {
    /// Read the ledger at `path`, creating an empty one when the file is absent.
    /// A zero-length file loads as empty; anything else that is not a JSON
    /// object of booleans is rejected.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let ledger = Self {
                path,
                entries: HashMap::new(),
            };
            ledger.persist()?;
            return Ok(ledger);
        }

        let raw = fs::read_to_string(&path).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                entries: HashMap::new(),
            });
        }

        let parsed: HashMap<String, bool> =
            serde_json::from_str(&raw).map_err(|e| LedgerError::Malformed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let entries = parsed
            .into_iter()
            .map(|(address, is_contract)| (canonical_key(&address), is_contract))
            .collect();
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(&canonical_key(address))
    }

    pub fn get(&self, address: &str) -> Option<bool> {
        self.entries.get(&canonical_key(address)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contract_count(&self) -> usize {
        self.entries.values().filter(|is_contract| **is_contract).count()
    }

    /// Sorted copy of every entry.
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.entries
            .iter()
            .map(|(address, is_contract)| (address.clone(), *is_contract))
            .collect()
    }

    /// Insert a new entry and flush the full ledger to disk.
    ///
    /// Entries are never updated: returns `Ok(false)` without touching disk when the
    /// address is already known.
    pub fn record(&mut self, address: &str, is_contract: bool) -> Result<bool, LedgerError> {
        let key = canonical_key(address);
        if self.entries.contains_key(&key) {
            return Ok(false);
        }
        self.entries.insert(key.clone(), is_contract);
        if let Err(err) = self.persist() {
            // Memory never claims an entry the disk does not have.
            self.entries.remove(&key);
            return Err(err);
        }
        Ok(true)
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let io_err = |source: std::io::Error| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let payload =
            serde_json::to_vec_pretty(&self.snapshot()).map_err(|e| LedgerError::Malformed {
                path: self.path.clone(),
                reason: format!("serialize failed: {e}"),
            })?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut file = fs::File::create(&tmp_path).map_err(io_err)?;
        file.write_all(&payload).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}
