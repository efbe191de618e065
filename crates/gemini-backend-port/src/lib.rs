//! # gemini-backend-port
//!
//! **Tier 3 (Backend Port)**
//!
//! A host-abstracted trait for the wide-column hashtable index (spec §4.F),
//! so `gemini-core` never depends on a concrete store client, plus
//! `MemoryIndex`, a `BTreeMap`-backed reference implementation that is
//! faithful to the port's ordering guarantees and is used by tests and
//! single-host runs. It is not a production backend.
//!
//! ## What belongs here
//! * `BandIndex` — the `upsert_bands`/`lookup`/`scan_all`/
//!   `find_by_content_hash` port plus the `meta`/persisted-vocabulary
//!   accessors (spec §4.F, §6 "Persisted vocabulary")
//! * `MemoryIndex`
//!
//! ## What does NOT belong here
//! * Retry/backoff around a flaky backend (`gemini-core`)
//! * Computing bands in the first place (`gemini-wmh`)

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use gemini_errors::GeminiError;
use gemini_types::{Band, DocFreq, Mode, RepoFile};

/// The four hashtable-index operations from spec §4.F, plus accessors for
/// the `meta` table and the `features_docs`/`features_freq` persisted
/// vocabulary channel (spec §6 "Persisted vocabulary", channel (b)).
pub trait BandIndex {
    /// Insert `(hashtable_id, band.bytes, sha)` for every band (spec §4.F
    /// `upsert_bands`). Idempotent on identical input.
    fn upsert_bands(&mut self, sha: &str, bands: &[Band], mode: Mode) -> Result<(), GeminiError>;

    /// Exact-equality collision lookup for one `(hashtable_id, value)` pair
    /// (spec §4.F `lookup`). Returns every colliding sha.
    fn lookup(&self, hashtable_id: u32, value: &[u8], mode: Mode) -> Result<Vec<String>, GeminiError>;

    /// A full scan of `hashtables_{mode}`, ordered by `(hashtable_id, value)`
    /// so consecutive equal keys form a collision bucket (spec §4.F
    /// `scan_all`, §4.H "Grouped" strategy).
    fn scan_all(&self, mode: Mode) -> Result<Vec<(u32, Vec<u8>, String)>, GeminiError>;

    /// Every `RepoFile` sharing `sha` (spec §4.F `find_by_content_hash`,
    /// used for exact-duplicate reporting).
    fn find_by_content_hash(&self, sha: &str) -> Result<Vec<RepoFile>, GeminiError>;

    /// Register a `meta` row for a content hash (spec §4.F `meta` table).
    fn put_meta(&mut self, file: RepoFile) -> Result<(), GeminiError>;

    /// A full scan of the `meta` table, ordered by `sha1` (spec §4.H
    /// "Exact-duplicate reporting ... a separate pass over `meta` grouped
    /// by `sha`"). Grouping consecutive equal-`sha1` runs yields the exact
    /// duplicate clusters.
    fn scan_meta(&self) -> Result<Vec<RepoFile>, GeminiError>;

    /// Load the persisted vocabulary for `mode` from the
    /// `features_docs`/`features_freq` tables, if present (spec §6 channel
    /// (b)). Returns `None` when no vocabulary has been persisted for this
    /// mode yet.
    fn load_vocabulary(&self, mode: Mode) -> Result<Option<DocFreq>, GeminiError>;

    /// Persist `doc_freq` into the `features_docs`/`features_freq` tables
    /// for `mode`, overwriting any previous value.
    fn put_vocabulary(&mut self, mode: Mode, doc_freq: &DocFreq) -> Result<(), GeminiError>;
}

/// An in-memory, single-process `BandIndex` backed by `BTreeMap`s, so
/// `scan_all`'s `(hashtable_id, value)` ordering guarantee holds for free
/// from key ordering rather than an explicit sort.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    hashtables: BTreeMap<ModeKey, BTreeMap<(u32, Vec<u8>), Vec<String>>>,
    meta: BTreeMap<String, Vec<RepoFile>>,
    vocabularies: BTreeMap<ModeKey, DocFreq>,
}

/// `Mode` isn't `Ord`; key both maps on its string form instead of adding
/// an ordering impl the rest of the crate doesn't need.
type ModeKey = &'static str;

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mode_key(mode: Mode) -> ModeKey {
        mode.as_str()
    }

    fn mode_key_from_str(s: &str) -> Option<ModeKey> {
        match s {
            "file" => Some(Mode::File.as_str()),
            "func" => Some(Mode::Func.as_str()),
            _ => None,
        }
    }

    /// Write a JSON snapshot of this index (SPEC_FULL §4.Backend port: the
    /// single-host reference implementation persists itself between CLI
    /// invocations the same way the real backend persists between
    /// connections). Not part of the wide-column wire contract — purely a
    /// convenience for `gemini-cli` running without a real store.
    pub fn save_to_path(&self, path: &Path) -> Result<(), GeminiError> {
        let snapshot = Snapshot::from(self);
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| GeminiError::BackendUnavailable { detail: e.to_string(), attempts: 0 })?;
        fs::write(path, json).map_err(|e| GeminiError::BackendUnavailable { detail: e.to_string(), attempts: 0 })
    }

    /// Load a snapshot written by `save_to_path`. Returns an empty index
    /// when `path` does not exist yet, so a first `hash`/`query`/`report`
    /// invocation against a fresh keyspace just works.
    pub fn load_from_path(path: &Path) -> Result<Self, GeminiError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let json =
            fs::read_to_string(path).map_err(|e| GeminiError::BackendUnavailable { detail: e.to_string(), attempts: 0 })?;
        let snapshot: Snapshot = serde_json::from_str(&json)
            .map_err(|e| GeminiError::BackendUnavailable { detail: e.to_string(), attempts: 0 })?;
        Ok(snapshot.into())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BandRow {
    hashtable_id: u32,
    value: Vec<u8>,
    shas: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    hashtables: Vec<(String, Vec<BandRow>)>,
    meta: Vec<(String, Vec<RepoFile>)>,
    vocabularies: Vec<(String, DocFreq)>,
}

impl From<&MemoryIndex> for Snapshot {
    fn from(index: &MemoryIndex) -> Self {
        Snapshot {
            hashtables: index
                .hashtables
                .iter()
                .map(|(mode, table)| {
                    let rows = table
                        .iter()
                        .map(|((hashtable_id, value), shas)| BandRow {
                            hashtable_id: *hashtable_id,
                            value: value.clone(),
                            shas: shas.clone(),
                        })
                        .collect();
                    (mode.to_string(), rows)
                })
                .collect(),
            meta: index.meta.iter().map(|(sha, files)| (sha.clone(), files.clone())).collect(),
            vocabularies: index
                .vocabularies
                .iter()
                .map(|(mode, doc_freq)| (mode.to_string(), doc_freq.clone()))
                .collect(),
        }
    }
}

impl From<Snapshot> for MemoryIndex {
    fn from(snapshot: Snapshot) -> Self {
        let mut index = MemoryIndex::new();
        for (mode, rows) in snapshot.hashtables {
            let Some(mode_key) = MemoryIndex::mode_key_from_str(&mode) else { continue };
            let table = index.hashtables.entry(mode_key).or_default();
            for row in rows {
                table.insert((row.hashtable_id, row.value), row.shas);
            }
        }
        for (sha, files) in snapshot.meta {
            index.meta.insert(sha, files);
        }
        for (mode, doc_freq) in snapshot.vocabularies {
            let Some(mode_key) = MemoryIndex::mode_key_from_str(&mode) else { continue };
            index.vocabularies.insert(mode_key, doc_freq);
        }
        index
    }
}

impl BandIndex for MemoryIndex {
    fn upsert_bands(&mut self, sha: &str, bands: &[Band], mode: Mode) -> Result<(), GeminiError> {
        let table = self.hashtables.entry(Self::mode_key(mode)).or_default();
        for band in bands {
            let key = (band.hashtable_id, band.bytes.clone());
            let shas = table.entry(key).or_default();
            if !shas.iter().any(|s| s == sha) {
                shas.push(sha.to_string());
            }
        }
        Ok(())
    }

    fn lookup(&self, hashtable_id: u32, value: &[u8], mode: Mode) -> Result<Vec<String>, GeminiError> {
        let Some(table) = self.hashtables.get(Self::mode_key(mode)) else {
            return Ok(Vec::new());
        };
        Ok(table
            .get(&(hashtable_id, value.to_vec()))
            .cloned()
            .unwrap_or_default())
    }

    fn scan_all(&self, mode: Mode) -> Result<Vec<(u32, Vec<u8>, String)>, GeminiError> {
        let Some(table) = self.hashtables.get(Self::mode_key(mode)) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for ((hashtable_id, value), shas) in table {
            for sha in shas {
                out.push((*hashtable_id, value.clone(), sha.clone()));
            }
        }
        Ok(out)
    }

    fn find_by_content_hash(&self, sha: &str) -> Result<Vec<RepoFile>, GeminiError> {
        Ok(self.meta.get(sha).cloned().unwrap_or_default())
    }

    fn put_meta(&mut self, file: RepoFile) -> Result<(), GeminiError> {
        let rows = self.meta.entry(file.sha1.clone()).or_default();
        if !rows.contains(&file) {
            rows.push(file);
        }
        Ok(())
    }

    fn scan_meta(&self) -> Result<Vec<RepoFile>, GeminiError> {
        Ok(self.meta.values().flat_map(|rows| rows.iter().cloned()).collect())
    }

    fn load_vocabulary(&self, mode: Mode) -> Result<Option<DocFreq>, GeminiError> {
        Ok(self.vocabularies.get(Self::mode_key(mode)).cloned())
    }

    fn put_vocabulary(&mut self, mode: Mode, doc_freq: &DocFreq) -> Result<(), GeminiError> {
        self.vocabularies.insert(Self::mode_key(mode), doc_freq.clone());
        Ok(())
    }
}
