//! # gemini-types
//!
//! **Tier 1 (Core Types)**
//!
//! Pure, serde-friendly data types shared across the similarity engine:
//! the vocabulary shape, feature bags, Weighted MinHash parameters and
//! sketches, band/hashtable keys, and repo provenance. No I/O, no business
//! logic — just the contracts other crates build on.
//!
//! ## What belongs here
//! * `DocFreq`, `Feature`, `FeatureBag`
//! * `WmhParams`, `Sketch`, `SketchRow`, `Band`
//! * `HashtableEntry`, `RepoFile`, `Mode`, `SimilarityParams`
//!
//! ## What does NOT belong here
//! * Vocabulary loading/validation (`gemini-vocab`)
//! * Sketching/banding algorithms (`gemini-wmh`)
//! * Backend I/O (`gemini-index`, `gemini-backend-port`)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `file` or `func` similarity granularity (spec §3 "Similarity mode").
///
/// Selects both the WMH parameter set (`SimilarityParams::for_mode`) and the
/// feature-extraction profile (`gemini-features`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    File,
    Func,
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::File => "file",
            Mode::Func => "func",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed WMH/LSH configuration constants baked into the parameter generator
/// (spec §3 "Similarity mode"). Altering these invalidates an existing index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityParams {
    pub sample_size: usize,
    pub htnum: usize,
    pub band_size: usize,
}

/// file-level: `{sample_size=128, htnum=64, band_size=2}`.
pub const FILE_PARAMS: SimilarityParams = SimilarityParams {
    sample_size: 128,
    htnum: 64,
    band_size: 2,
};

/// function-level: `{sample_size=96, htnum=48, band_size=2}`.
pub const FUNC_PARAMS: SimilarityParams = SimilarityParams {
    sample_size: 96,
    htnum: 48,
    band_size: 2,
};

impl SimilarityParams {
    #[must_use]
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::File => FILE_PARAMS,
            Mode::Func => FUNC_PARAMS,
        }
    }
}

/// The ordered document-frequency vocabulary (spec §3 "DocFreq").
///
/// Invariant (enforced by `gemini-vocab::load`, not by construction here):
/// `tokens.len() == df.len()`, every `tokens[i]` is a key of `df`, and every
/// count in `df` lies in `[1, docs]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocFreq {
    pub docs: u64,
    pub tokens: Vec<String>,
    pub df: BTreeMap<String, u64>,
}

/// A single weighted feature as returned by the feature-extraction service
/// (spec §6): `Feature{name, weight}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub weight: u32,
}

/// A dense bag of weighted vocabulary indices (spec §3 "FeatureBag").
///
/// `weights[i]` is the accumulated weight for `vocab.tokens[i]`; the vector
/// length always equals the vocabulary size, and indices for absent tokens
/// are simply never touched (they stay `0`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureBag {
    pub weights: Vec<u32>,
}

impl FeatureBag {
    #[must_use]
    pub fn zeroed(vocab_size: usize) -> Self {
        Self {
            weights: vec![0; vocab_size],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.iter().all(|&w| w == 0)
    }

    /// Iterate over `(index, weight)` for every non-zero entry, in index
    /// order — the only entries that participate in sketching (spec 4.D).
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.weights
            .iter()
            .enumerate()
            .filter_map(|(i, &w)| (w > 0).then_some((i, w)))
    }
}

/// A `sample_size x k` row-major table of `f64`, used for the WMH
/// parameter tables (`rs`, `ln_cs`, `betas`). Row-major layout keeps the
/// hot inner loop over `i` (spec §9 "Sketch table storage") cache-local.
#[derive(Debug, Clone)]
pub struct RowMajorTable {
    k: usize,
    data: Vec<f64>,
}

impl RowMajorTable {
    #[must_use]
    pub fn filled_with<F: FnMut(usize, usize) -> f64>(sample_size: usize, k: usize, mut f: F) -> Self {
        let mut data = Vec::with_capacity(sample_size * k);
        for s in 0..sample_size {
            for i in 0..k {
                data.push(f(s, i));
            }
        }
        Self { k, data }
    }

    #[inline]
    #[must_use]
    pub fn row(&self, s: usize) -> &[f64] {
        &self.data[s * self.k..(s + 1) * self.k]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, s: usize, i: usize) -> f64 {
        self.data[s * self.k + i]
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }
}

/// The static randomness behind Consistent Weighted Sampling (spec §3 "WMH
/// Parameters"): three `sample_size x k` tables drawn once per `(k,
/// sample_size, seed)` and shared read-only afterwards.
pub struct WmhParams {
    pub sample_size: usize,
    pub k: usize,
    pub rs: RowMajorTable,
    pub ln_cs: RowMajorTable,
    pub betas: RowMajorTable,
}

/// One row of a sketch: `(k*, t*)` — the winning token index and its scaled
/// "time" component, `t*` already reinterpreted as `u64` bit pattern.
pub type SketchRow = (u64, u64);

/// A `sample_size x 2` matrix of `u64` (spec §3 "Sketch").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sketch {
    pub rows: Vec<SketchRow>,
}

impl Sketch {
    #[must_use]
    pub fn is_empty_bag_sketch(&self) -> bool {
        self.rows.iter().all(|&(k, t)| k == 0 && t == 0)
    }
}

/// One LSH band: the byte-concatenation of `band_size` consecutive sketch
/// rows (spec §3 "Band"). Identity is `(hashtable_id, bytes)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Band {
    pub hashtable_id: u32,
    pub bytes: Vec<u8>,
}

/// A persisted hashtable row (spec §3 "HashtableEntry" / §4.F).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashtableEntry {
    pub hashtable_id: u32,
    pub band_bytes: Vec<u8>,
    /// For `Mode::Func`, encoded as `path@content_sha1` (spec §6).
    pub sha: String,
    pub mode: Mode,
}

/// Provenance of a content hash (spec §3 "RepoFile").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub repo: String,
    pub commit: String,
    pub path: String,
    pub sha1: String,
}

/// One member of a duplicate group or similarity community, resolved down
/// to the shape the CLI's JSON contract fixes (spec §6 "JSON report shape").
///
/// `File` covers `Mode::File` members one-for-one. `Function` covers
/// `Mode::Func` members; `name`/`line` are `None` when the index has no
/// function-level metadata to offer beyond the file it came from (the
/// hashtable only ever stores `path@content_sha1`, never a function name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    File {
        repo: String,
        commit: String,
        path: String,
        sha: String,
    },
    Function {
        file: RepoFile,
        name: Option<String>,
        line: Option<u32>,
    },
}

impl MemberRef {
    #[must_use]
    pub fn file(file: &RepoFile) -> Self {
        MemberRef::File {
            repo: file.repo.clone(),
            commit: file.commit.clone(),
            path: file.path.clone(),
            sha: file.sha1.clone(),
        }
    }

    #[must_use]
    pub fn function(file: RepoFile, name: Option<String>, line: Option<u32>) -> Self {
        MemberRef::Function { file, name, line }
    }
}
