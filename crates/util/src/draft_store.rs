//! Draft persistence for in-progress intake forms.
//!
//! This module exposes the [`DraftStore`] abstraction the wizard saves
//! through, along with a JSON-backed implementation mirroring the ergonomics
//! of the preferences file (env-var path override, tilde expansion, config
//! directory fallback). Draft persistence is a convenience, not a
//! correctness requirement: save failures are logged and swallowed, corrupt
//! files load as empty, and when the backing directory is unusable the
//! store degrades to memory only. The wizard must never crash, or even
//! stall, because of draft state.

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use dirs_next::config_dir;
use doorstep_types::FormRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

use crate::expand_tilde;

/// Environment variable controlling the drafts file location.
pub const DRAFTS_PATH_ENV: &str = "DOORSTEP_DRAFTS_PATH";

/// Default filename for the persisted drafts.
pub const DRAFTS_FILE_NAME: &str = "drafts.json";

/// Errors surfaced by draft store internals. Callers of the [`DraftStore`]
/// trait never see these; they exist for logging and for the CLI's explicit
/// `drafts` subcommands.
#[derive(Debug, Error)]
pub enum DraftStoreError {
    /// I/O failure while reading or writing the drafts file.
    #[error("draft I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization failure.
    #[error("draft serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identifies the draft slot for one logical form kind. Exactly one draft
/// exists per key; writes are last-write-wins snapshots.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftKey(String);

impl DraftKey {
    /// Builds a key from a form identifier such as `donation-form`.
    pub fn new(form_id: impl Into<String>) -> Self {
        Self(form_id.into())
    }

    /// The underlying form identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted draft snapshot plus its last-write timestamp.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredDraft {
    /// The captured field values.
    pub record: FormRecord,
    /// Last time the draft was written.
    #[serde(with = "ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

/// Listing entry returned by [`DraftStore::summaries`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftSummary {
    /// The draft slot.
    pub key: DraftKey,
    /// Last time the slot was written.
    pub updated_at: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct DraftFile {
    drafts: IndexMap<DraftKey, StoredDraft>,
}

/// Shared trait implemented by draft persistence backends.
///
/// All operations are infallible from the caller's perspective: the wizard
/// treats drafts as fire-and-forget snapshots of current state.
pub trait DraftStore: Send + Sync {
    /// Returns the last saved snapshot, or `None` when absent or corrupt.
    fn load(&self, key: &DraftKey) -> Option<FormRecord>;

    /// Persists a snapshot, overwriting any previous draft for the key.
    fn save(&self, key: &DraftKey, record: &FormRecord);

    /// Removes the draft for the key, if one exists.
    fn clear(&self, key: &DraftKey);

    /// Lists stored drafts, most recently written first.
    fn summaries(&self) -> Vec<DraftSummary>;
}

/// JSON-backed draft store persisted on disk.
pub struct JsonDraftStore {
    path: PathBuf,
    drafts: Mutex<DraftFile>,
    persist_to_disk: bool,
}

impl JsonDraftStore {
    /// Opens a store at the provided path (or the default path when omitted).
    ///
    /// A missing file starts empty; an unreadable or unparsable file is
    /// logged and also starts empty, so a bad draft can never prevent the
    /// wizard from opening.
    pub fn open<P: Into<Option<PathBuf>>>(path: P) -> Self {
        let resolved_path = match path.into() {
            Some(path) => expand_tilde(path),
            None => default_drafts_path(),
        };

        let drafts = load_draft_file(&resolved_path);
        Self {
            path: resolved_path,
            drafts: Mutex::new(drafts),
            persist_to_disk: true,
        }
    }

    /// Opens a store at the default location.
    pub fn with_defaults() -> Self {
        Self::open(None::<PathBuf>)
    }

    /// Builds an in-memory-only store used as a fallback when the config
    /// directory cannot be written.
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            drafts: Mutex::new(DraftFile::default()),
            persist_to_disk: false,
        }
    }

    /// Path to the underlying JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_locked(&self, drafts: &DraftFile) -> Result<(), DraftStoreError> {
        if !self.persist_to_disk {
            return Ok(());
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(drafts)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl DraftStore for JsonDraftStore {
    fn load(&self, key: &DraftKey) -> Option<FormRecord> {
        let drafts = self.drafts.lock().expect("draft lock poisoned");
        drafts.drafts.get(key).map(|stored| stored.record.clone())
    }

    fn save(&self, key: &DraftKey, record: &FormRecord) {
        let mut drafts = self.drafts.lock().expect("draft lock poisoned");
        drafts.drafts.insert(
            key.clone(),
            StoredDraft {
                record: record.clone(),
                updated_at: Utc::now(),
            },
        );
        if let Err(error) = self.save_locked(&drafts) {
            warn!(path = %self.path.display(), key = %key, error = %error, "Failed to persist draft; continuing without it");
        }
    }

    fn clear(&self, key: &DraftKey) {
        let mut drafts = self.drafts.lock().expect("draft lock poisoned");
        if drafts.drafts.shift_remove(key).is_some()
            && let Err(error) = self.save_locked(&drafts)
        {
            warn!(path = %self.path.display(), key = %key, error = %error, "Failed to remove persisted draft");
        }
    }

    fn summaries(&self) -> Vec<DraftSummary> {
        let drafts = self.drafts.lock().expect("draft lock poisoned");
        let mut entries: Vec<DraftSummary> = drafts
            .drafts
            .iter()
            .map(|(key, stored)| DraftSummary {
                key: key.clone(),
                updated_at: stored.updated_at,
            })
            .collect();
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        entries
    }
}

/// In-memory draft store used by tests and as an explicit ephemeral backend.
#[derive(Default)]
pub struct InMemoryDraftStore {
    drafts: Mutex<DraftFile>,
}

impl InMemoryDraftStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for InMemoryDraftStore {
    fn load(&self, key: &DraftKey) -> Option<FormRecord> {
        let drafts = self.drafts.lock().expect("draft lock poisoned");
        drafts.drafts.get(key).map(|stored| stored.record.clone())
    }

    fn save(&self, key: &DraftKey, record: &FormRecord) {
        let mut drafts = self.drafts.lock().expect("draft lock poisoned");
        drafts.drafts.insert(
            key.clone(),
            StoredDraft {
                record: record.clone(),
                updated_at: Utc::now(),
            },
        );
    }

    fn clear(&self, key: &DraftKey) {
        let mut drafts = self.drafts.lock().expect("draft lock poisoned");
        drafts.drafts.shift_remove(key);
    }

    fn summaries(&self) -> Vec<DraftSummary> {
        let drafts = self.drafts.lock().expect("draft lock poisoned");
        drafts
            .drafts
            .iter()
            .map(|(key, stored)| DraftSummary {
                key: key.clone(),
                updated_at: stored.updated_at,
            })
            .collect()
    }
}

fn default_drafts_path() -> PathBuf {
    if let Ok(path) = env::var(DRAFTS_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(PathBuf::from(path));
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("doorstep")
        .join(DRAFTS_FILE_NAME)
}

fn load_draft_file(path: &Path) -> DraftFile {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<DraftFile>(&content) {
            Ok(file) => file,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Failed to parse drafts file; starting empty");
                DraftFile::default()
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => DraftFile::default(),
        Err(error) => {
            warn!(path = %path.display(), error = %error, "Failed to read drafts file; starting empty");
            DraftFile::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_record() -> FormRecord {
        let mut record = FormRecord::new();
        record.set("name", json!("Jane Doe"));
        record.set("items", json!([{"category": "jacket", "quantity": 2}]));
        record
    }

    #[test]
    fn in_memory_round_trip() {
        let store = InMemoryDraftStore::new();
        let key = DraftKey::new("donation-form");
        assert!(store.load(&key).is_none());

        let record = sample_record();
        store.save(&key, &record);
        assert_eq!(store.load(&key), Some(record));

        store.clear(&key);
        assert!(store.load(&key).is_none());
    }

    #[test]
    fn json_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drafts.json");
        let key = DraftKey::new("donation-form");
        let record = sample_record();

        let store = JsonDraftStore::open(Some(path.clone()));
        store.save(&key, &record);
        drop(store);

        let reopened = JsonDraftStore::open(Some(path));
        assert_eq!(reopened.load(&key), Some(record));
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drafts.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonDraftStore::open(Some(path));
        assert!(store.load(&DraftKey::new("donation-form")).is_none());
    }

    #[test]
    fn save_into_unwritable_location_is_swallowed() {
        // Point the file at a path whose parent is a file, so create_dir_all fails.
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let path = blocker.join("drafts.json");

        let store = JsonDraftStore::open(Some(path));
        let key = DraftKey::new("donation-form");
        store.save(&key, &sample_record());

        // The in-memory copy still serves reads for this session.
        assert!(store.load(&key).is_some());
    }

    #[test]
    fn ephemeral_store_never_touches_disk() {
        let store = JsonDraftStore::ephemeral();
        let key = DraftKey::new("volunteer-form");
        store.save(&key, &sample_record());
        assert!(store.load(&key).is_some());
        assert_eq!(store.path(), Path::new(""));
    }

    #[test]
    fn last_write_wins_per_key() {
        let store = InMemoryDraftStore::new();
        let key = DraftKey::new("donation-form");

        let mut first = FormRecord::new();
        first.set("name", json!("A"));
        let mut second = FormRecord::new();
        second.set("name", json!("B"));

        store.save(&key, &first);
        store.save(&key, &second);
        assert_eq!(store.load(&key).unwrap().get_str("name"), Some("B"));
    }

    #[test]
    fn summaries_report_most_recent_first() {
        let dir = tempdir().unwrap();
        let store = JsonDraftStore::open(Some(dir.path().join("drafts.json")));
        store.save(&DraftKey::new("donation-form"), &sample_record());
        store.save(&DraftKey::new("volunteer-form"), &sample_record());

        let summaries = store.summaries();
        assert_eq!(summaries.len(), 2);
    }

    #[test]
    fn default_path_honors_env_override() {
        let override_path = "~/custom/drafts.json";
        temp_env::with_var(DRAFTS_PATH_ENV, Some(override_path), || {
            let path = default_drafts_path();
            let expected = expand_tilde(PathBuf::from(override_path));
            assert_eq!(path, expected);
        });
    }
}
