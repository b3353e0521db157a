//! Credential store loader.
//!
//! Each file in the credential directory holds one `<passwordId> <password>`
//! record. The store is rebuilt from scratch every cycle; the directory is the
//! only source of truth. A bad record is reported and skipped, never fatal.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

#[derive(Debug, thiserror::Error)]
pub enum CredentialSkip {
    #[error("unreadable: {0}")]
    Unreadable(#[source] io::Error),
    #[error("not valid UTF-8")]
    NotUtf8,
    #[error("expected 2 whitespace-separated tokens, found {0}")]
    TokenCount(usize),
}

pub struct CredentialRecord {
    pub id: String,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What happened to a single record file.
#[derive(Debug)]
pub enum RecordOutcome {
    Loaded { file: PathBuf, id: String },
    Skipped { file: PathBuf, reason: CredentialSkip },
}

#[derive(Default)]
pub struct CredentialStore {
    entries: HashMap<String, Zeroizing<String>>,
}

impl CredentialStore {
    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|p| p.as_str())
    }

    /// Returns `true` when an existing identifier was overridden.
    pub fn insert(&mut self, record: CredentialRecord) -> bool {
        self.entries.insert(record.id, record.password).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.entries.keys().collect();
        ids.sort();
        f.debug_struct("CredentialStore").field("ids", &ids).finish()
    }
}

impl FromIterator<CredentialRecord> for CredentialStore {
    fn from_iter<I: IntoIterator<Item = CredentialRecord>>(iter: I) -> Self {
        let mut store = Self::default();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

#[derive(Debug)]
pub struct CredentialLoad {
    pub store: CredentialStore,
    pub outcomes: Vec<RecordOutcome>,
}

impl CredentialLoad {
    pub fn skipped(&self) -> impl Iterator<Item = (&Path, &CredentialSkip)> {
        self.outcomes.iter().filter_map(|o| match o {
            RecordOutcome::Skipped { file, reason } => Some((file.as_path(), reason)),
            RecordOutcome::Loaded { .. } => None,
        })
    }
}

pub fn parse_record(text: &str) -> Result<CredentialRecord, CredentialSkip> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [id, password] => Ok(CredentialRecord {
            id: id.to_string(),
            password: Zeroizing::new(password.to_string()),
        }),
        other => Err(CredentialSkip::TokenCount(other.len())),
    }
}

fn read_record(path: &Path) -> Result<CredentialRecord, CredentialSkip> {
    let bytes = Zeroizing::new(fs::read(path).map_err(CredentialSkip::Unreadable)?);
    let text = std::str::from_utf8(&bytes).map_err(|_| CredentialSkip::NotUtf8)?;
    parse_record(text)
}

/// Loads every record in `dir`. Files are processed in lexicographic name
/// order and a later record replaces an earlier one with the same identifier.
/// Only a failure to read the directory itself is an error.
pub fn load_credentials(dir: &Path) -> Result<CredentialLoad> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            debug!(path = %path.display(), "ignoring directory in credential store");
            continue;
        }
        files.push(path);
    }
    files.sort();

    let mut store = CredentialStore::default();
    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        match read_record(&file) {
            Ok(record) => {
                let id = record.id.clone();
                if store.insert(record) {
                    warn!(file = %file.display(), id = %id, "credential identifier redefined, later file wins");
                }
                outcomes.push(RecordOutcome::Loaded { file, id });
            }
            Err(reason) => {
                warn!(file = %file.display(), reason = %reason, "unable to parse password file");
                outcomes.push(RecordOutcome::Skipped { file, reason });
            }
        }
    }
    info!(loaded = store.len(), "credential store loaded");
    Ok(CredentialLoad { store, outcomes })
}
