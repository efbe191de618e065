//! # gemini-core
//!
//! **Tier 4 (Orchestration Facade)**
//!
//! The library entry point for embedding the similarity engine: wires
//! components B through F into the two workflows a caller actually drives
//! — building the index for a new unit, and querying it (spec §4.G) — plus
//! the `BackendUnavailable` retry boundary spec §7 places between the core
//! and the backend port.
//!
//! ## What belongs here
//! * `build_and_upsert` — the index-build data flow (spec §2: feature
//!   stream → bag → sketch → bands → upsert)
//! * `query` — component G exactly as specified
//! * `with_backend_retry` — exponential backoff around `BandIndex` calls
//!
//! ## What does NOT belong here
//! * CLI argument parsing and exit codes (`gemini-cli`)
//! * Community detection over a full index scan (`gemini-report`)

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sha1::{Digest, Sha1};

use gemini_backend_port::BandIndex;
use gemini_errors::{ErrorClass, GeminiError, SkippedFiles};
use gemini_extract::{enumerate_functions, AstService, ExtractOutcome, FeatureSource, Uast, FEATURE_EXTRACTION_TIMEOUT};
use gemini_features::{build_feature_bag, ExtractionProfile};
use gemini_types::{Mode, RepoFile, SimilarityParams};
use gemini_vocab::Vocabulary;
use gemini_wmh::REFERENCE_SEED;

/// Retry `f` up to 3 total attempts with exponential backoff when it fails
/// with `BackendUnavailable` (spec §7 / SPEC_FULL §4.Errors). Any other
/// error, or success, returns immediately.
pub fn with_backend_retry<T>(mut f: impl FnMut() -> Result<T, GeminiError>) -> Result<T, GeminiError> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut delay = Duration::from_millis(50);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f() {
            Ok(value) => return Ok(value),
            Err(GeminiError::BackendUnavailable { .. }) if attempt < MAX_ATTEMPTS => {
                thread::sleep(delay);
                delay *= 2;
            }
            Err(GeminiError::BackendUnavailable { detail, .. }) => {
                return Err(GeminiError::BackendUnavailable {
                    detail,
                    attempts: attempt,
                });
            }
            Err(other) => return Err(other),
        }
    }
}

/// Content SHA-1 of raw bytes, hex-encoded (spec §4.G step 1).
#[must_use]
pub fn content_sha1(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// One extractable unit within a file: the whole file in `Mode::File`, or
/// a single function node in `Mode::Func`.
struct Unit<'a> {
    uast: &'a Uast,
}

fn units_for<'a>(mode: Mode, root: &'a Uast, filter: Option<&FunctionFilter>) -> Vec<Unit<'a>> {
    match mode {
        Mode::File => vec![Unit { uast: root }],
        Mode::Func => enumerate_functions(root)
            .into_iter()
            .filter(|node| match filter {
                None => true,
                Some(f) => node.name.as_deref() == Some(f.name.as_str()) && node.start_line == Some(f.start_line),
            })
            .map(|node| Unit { uast: node })
            .collect(),
    }
}

/// The optional `(function_name, start_line)` filter query accepts in
/// function mode (spec §4.G inputs).
#[derive(Debug, Clone)]
pub struct FunctionFilter {
    pub name: String,
    pub start_line: u32,
}

/// Run a single unit through bag → sketch → bands (components C, D, E),
/// given its already-extracted features.
fn bag_sketch_bands(
    features: Vec<gemini_types::Feature>,
    vocab: &Vocabulary,
    params: &SimilarityParams,
) -> Vec<gemini_types::Band> {
    let bag = build_feature_bag(features, vocab);
    let wmh_params = gemini_wmh::generate_params(REFERENCE_SEED, params.sample_size, vocab.len());
    let sketch = gemini_wmh::sketch(&bag, &wmh_params);
    gemini_wmh::bands(&sketch, params.htnum, params.band_size)
}

/// Extract features for `unit`, honoring the 30s timeout → skip-and-count
/// policy (spec §5), returning an empty feature list on timeout or
/// failure.
fn extract_unit_features(
    feature_source: &Arc<dyn FeatureSource + Send + Sync>,
    unit: &Unit<'_>,
    profile: &ExtractionProfile,
    skipped: &mut SkippedFiles,
) -> Vec<gemini_types::Feature> {
    let outcome = gemini_extract::extract_with_timeout(
        Arc::clone(feature_source),
        unit.uast.clone(),
        profile.clone(),
        FEATURE_EXTRACTION_TIMEOUT,
    );
    match outcome {
        ExtractOutcome::Ready(features) => features,
        ExtractOutcome::TimedOut => {
            skipped.record(ErrorClass::ExtractionTimeout);
            Vec::new()
        }
        ExtractOutcome::Failed(_) => {
            skipped.record(ErrorClass::ExtractionFailure);
            Vec::new()
        }
    }
}

/// Build the index entries for one input file (spec §2 "index build" data
/// flow: feature stream → bag → sketch → bands → upsert), and register its
/// provenance in `meta`.
///
/// In `Mode::Func`, every top-level function becomes its own hashtable
/// entry keyed `path@function_name` (spec §6 sha encoding note).
pub fn build_and_upsert<B: BandIndex>(
    index: &mut B,
    ast_service: &dyn AstService,
    feature_source: Arc<dyn FeatureSource + Send + Sync>,
    vocab: &Vocabulary,
    repo: &RepoFile,
    content: &[u8],
    mode: Mode,
) -> Result<SkippedFiles, GeminiError> {
    let mut skipped = SkippedFiles::new();
    let sha = content_sha1(content);

    let ast_result = ast_service.parse(&repo.path, content);
    let Some(root) = ast_result.uast else {
        skipped.record(ErrorClass::AstUnavailable);
        return Ok(skipped);
    };

    let profile = ExtractionProfile::for_mode(mode);
    let params = SimilarityParams::for_mode(mode);

    for unit in units_for(mode, &root, None) {
        let features = extract_unit_features(&feature_source, &unit, &profile, &mut skipped);
        let bands = bag_sketch_bands(features, vocab, &params);
        // Func mode keys each entry `path@content_sha1`, where the sha1
        // half is the whole file's content hash so the key resolves back
        // through `meta` (which is only ever registered per-file, not
        // per-function span) — spec §3 "HashtableEntry".
        let entry_sha = match mode {
            Mode::File => sha.clone(),
            Mode::Func => format!("{}@{}", repo.path, sha),
        };
        with_backend_retry(|| index.upsert_bands(&entry_sha, &bands, mode))?;
    }

    with_backend_retry(|| index.put_meta(repo.clone()))?;
    Ok(skipped)
}

/// The result of a file/function query (spec §4.G step 6).
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub duplicates: Vec<RepoFile>,
    pub similar: Vec<RepoFile>,
}

/// Component G: orchestrate C→D→E→F for a new input and merge with the
/// duplicate-hash lookup (spec §4.G).
#[allow(clippy::too_many_arguments)]
pub fn query<B: BandIndex>(
    index: &B,
    ast_service: &dyn AstService,
    feature_source: Arc<dyn FeatureSource + Send + Sync>,
    vocab: &Vocabulary,
    path: &str,
    content: &[u8],
    mode: Mode,
    function_filter: Option<FunctionFilter>,
) -> Result<QueryResult, GeminiError> {
    let mut skipped = SkippedFiles::new();

    // Step 1: duplicates via content hash.
    let sha = content_sha1(content);
    let duplicates = with_backend_retry(|| index.find_by_content_hash(&sha))?;
    let duplicate_shas: std::collections::HashSet<String> =
        duplicates.iter().map(|f| f.sha1.clone()).collect();

    // Step 2: AST; on failure, empty similar set.
    let ast_result = ast_service.parse(path, content);
    let Some(root) = ast_result.uast else {
        return Ok(QueryResult {
            duplicates,
            similar: Vec::new(),
        });
    };

    // Steps 3-4: per-unit features → bag → sketch → bands.
    let profile = ExtractionProfile::for_mode(mode);
    let params = SimilarityParams::for_mode(mode);
    let units = units_for(mode, &root, function_filter.as_ref());

    let mut candidate_shas: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for unit in &units {
        let features = extract_unit_features(&feature_source, unit, &profile, &mut skipped);
        let bands = bag_sketch_bands(features, vocab, &params);

        // Step 5: band lookup, union, minus duplicates.
        for band in &bands {
            let hits = with_backend_retry(|| index.lookup(band.hashtable_id, &band.bytes, mode))?;
            for sha in hits {
                if !duplicate_shas.contains(&sha) {
                    candidate_shas.insert(sha);
                }
            }
        }
    }

    // Step 6: resolve through meta. In `Mode::Func` the candidate key is
    // `path@content_sha1` (spec §6 sha encoding), so the content sha1 has
    // to be split back out before it means anything to `meta`.
    let mut similar = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for key in candidate_shas {
        let content_sha = match mode {
            Mode::File => key.as_str(),
            Mode::Func => key.rsplit_once('@').map_or(key.as_str(), |(_, sha)| sha),
        };
        for file in with_backend_retry(|| index.find_by_content_hash(content_sha))? {
            if seen.insert((file.path.clone(), file.sha1.clone())) {
                similar.push(file);
            }
        }
    }

    Ok(QueryResult { duplicates, similar })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_backend_port::MemoryIndex;
    use gemini_extract::{FakeAstService, FakeFeatureSource};
    use std::collections::BTreeMap;

    fn vocab_for(tokens: &[&str]) -> Vocabulary {
        let mut df = BTreeMap::new();
        for t in tokens {
            df.insert(t.to_string(), 1u64);
        }
        let doc_freq = gemini_types::DocFreq {
            docs: 2,
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            df,
        };
        Vocabulary::from_doc_freq(doc_freq).unwrap()
    }

    fn repo_file(path: &str, sha1: &str) -> RepoFile {
        RepoFile {
            repo: "r".into(),
            commit: "c".into(),
            path: path.into(),
            sha1: sha1.into(),
        }
    }

    #[test]
    fn with_backend_retry_succeeds_without_retry_on_ok() {
        let mut calls = 0;
        let result = with_backend_retry(|| {
            calls += 1;
            Ok::<_, GeminiError>(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn with_backend_retry_retries_then_succeeds() {
        let mut calls = 0;
        let result = with_backend_retry(|| {
            calls += 1;
            if calls < 2 {
                Err(GeminiError::BackendUnavailable {
                    detail: "flaky".into(),
                    attempts: 0,
                })
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 2);
    }

    #[test]
    fn with_backend_retry_gives_up_after_three_attempts() {
        let mut calls = 0;
        let result: Result<(), GeminiError> = with_backend_retry(|| {
            calls += 1;
            Err(GeminiError::BackendUnavailable {
                detail: "down".into(),
                attempts: 0,
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn with_backend_retry_does_not_retry_other_errors() {
        let mut calls = 0;
        let result: Result<(), GeminiError> = with_backend_retry(|| {
            calls += 1;
            Err(GeminiError::ArgumentError("bad".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn content_sha1_is_stable_and_hex_encoded() {
        let a = content_sha1(b"hello world");
        let b = content_sha1(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn build_and_upsert_registers_meta_and_bands_in_file_mode() {
        let mut index = MemoryIndex::new();
        let vocab = vocab_for(&["let", "x", "=", "1;"]);
        let repo = repo_file("a.rs", &content_sha1(b"let x = 1;"));

        let skipped = build_and_upsert(
            &mut index,
            &FakeAstService,
            Arc::new(FakeFeatureSource),
            &vocab,
            &repo,
            b"let x = 1;",
            Mode::File,
        )
        .unwrap();

        assert_eq!(skipped.total(), 0);
        let found = index.find_by_content_hash(&repo.sha1).unwrap();
        assert_eq!(found, vec![repo]);
    }

    #[test]
    fn query_finds_itself_as_exact_duplicate_after_build() {
        let mut index = MemoryIndex::new();
        let vocab = vocab_for(&["let", "x", "=", "1;"]);
        let content = b"let x = 1;";
        let repo = repo_file("a.rs", &content_sha1(content));

        build_and_upsert(
            &mut index,
            &FakeAstService,
            Arc::new(FakeFeatureSource),
            &vocab,
            &repo,
            content,
            Mode::File,
        )
        .unwrap();

        let result = query(
            &index,
            &FakeAstService,
            Arc::new(FakeFeatureSource),
            &vocab,
            "a.rs",
            content,
            Mode::File,
            None,
        )
        .unwrap();

        assert_eq!(result.duplicates, vec![repo]);
        assert!(result.similar.is_empty());
    }

    #[test]
    fn query_ast_failure_yields_empty_similar_set() {
        struct NullAstService;
        impl AstService for NullAstService {
            fn parse(&self, _filename: &str, _content: &[u8]) -> gemini_extract::AstResult {
                gemini_extract::AstResult {
                    uast: None,
                    errors: vec!["no parser".into()],
                }
            }
        }

        let index = MemoryIndex::new();
        let vocab = vocab_for(&["x"]);
        let result = query(
            &index,
            &NullAstService,
            Arc::new(FakeFeatureSource),
            &vocab,
            "a.rs",
            b"x",
            Mode::File,
            None,
        )
        .unwrap();
        assert!(result.similar.is_empty());
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn build_and_upsert_in_func_mode_keys_entries_by_path_and_name() {
        let mut index = MemoryIndex::new();
        let vocab = vocab_for(&["fn", "foo()", "{", "x", "}"]);
        let content = b"fn foo() {\n  x\n}\n";
        let repo = repo_file("a.rs", &content_sha1(content));

        build_and_upsert(
            &mut index,
            &FakeAstService,
            Arc::new(FakeFeatureSource),
            &vocab,
            &repo,
            content,
            Mode::Func,
        )
        .unwrap();

        // Func mode keys each entry `path@content_sha1` of the function's
        // own span (spec §3 "HashtableEntry"), not the whole file.
        let rows = index.scan_all(Mode::Func).unwrap();
        assert!(!rows.is_empty());
        assert!(rows.iter().any(|(_, _, sha)| {
            sha.starts_with("a.rs@") && sha.len() == "a.rs@".len() + 40
        }));
    }

    #[test]
    fn query_in_func_mode_resolves_composite_keys_back_to_meta() {
        let mut index = MemoryIndex::new();
        let vocab = vocab_for(&["fn", "foo()", "{", "x", "}"]);
        let content = b"fn foo() {\n  x\n}\n";
        let repo = repo_file("a.rs", &content_sha1(content));

        build_and_upsert(
            &mut index,
            &FakeAstService,
            Arc::new(FakeFeatureSource),
            &vocab,
            &repo,
            content,
            Mode::Func,
        )
        .unwrap();

        let result = query(
            &index,
            &FakeAstService,
            Arc::new(FakeFeatureSource),
            &vocab,
            "a.rs",
            content,
            Mode::Func,
            None,
        )
        .unwrap();

        assert!(result.similar.contains(&repo));
    }
}
