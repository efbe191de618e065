//! # gemini-errors
//!
//! **Tier 0 (Error Taxonomy)**
//!
//! The five error kinds from spec §7, plus the `skipped_files` accumulator
//! that makes local recovery (§7 "Local recovery policy") observable to
//! whatever harness drives a build.
//!
//! ## What belongs here
//! * `GeminiError` — the fatal/propagated error enum
//! * `ErrorClass` / `SkippedFiles` — the non-fatal skip-and-count path
//!
//! ## What does NOT belong here
//! * Retry policy (lives at the call boundary in `gemini-core`)
//! * Exit-code mapping (lives in `gemini-cli`)

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// The five error kinds from spec §7. `BackendUnavailable` and
/// `ScanInterrupted` are always fatal to the operation that raised them;
/// `ExternalServiceError` is recovered locally by callers that can skip a
/// unit (see `ErrorClass`/`SkippedFiles`) and only escalated here when no
/// such recovery is possible (e.g. a CLI command with nothing left to do).
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("malformed vocabulary: {0}")]
    MalformedVocabulary(String),

    #[error("backend unavailable after {attempts} attempt(s): {detail}")]
    BackendUnavailable { detail: String, attempts: u32 },

    #[error("external service error ({service}): {detail}")]
    ExternalServiceError { service: ServiceKind, detail: String },

    #[error("scan interrupted: {0}")]
    ScanInterrupted(String),

    #[error("argument error: {0}")]
    ArgumentError(String),
}

impl GeminiError {
    /// The CLI exit code this error maps to (spec §6).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            GeminiError::ArgumentError(_) => 2,
            GeminiError::MalformedVocabulary(_)
            | GeminiError::BackendUnavailable { .. }
            | GeminiError::ExternalServiceError { .. }
            | GeminiError::ScanInterrupted(_) => 142,
        }
    }
}

/// Which external collaborator raised an `ExternalServiceError` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceKind {
    AstService,
    FeatureExtraction,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceKind::AstService => "ast-service",
            ServiceKind::FeatureExtraction => "feature-extraction",
        })
    }
}

/// A recoverable-skip class: the reason a single unit was dropped from a
/// build without aborting it (spec §7 "Local recovery policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorClass {
    /// The AST service returned no usable UAST (null UAST + errors).
    AstUnavailable,
    /// The 30s per-call feature-extraction budget (spec §5) was exceeded.
    ExtractionTimeout,
    /// The feature-extraction service returned an error for an available UAST.
    ExtractionFailure,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorClass::AstUnavailable => "ast_unavailable",
            ErrorClass::ExtractionTimeout => "extraction_timeout",
            ErrorClass::ExtractionFailure => "extraction_failure",
        })
    }
}

/// Per-error-class skip counter, threaded through a build and emitted in
/// the final report footer (spec §7).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkippedFiles {
    counts: BTreeMap<ErrorClass, u64>,
}

impl SkippedFiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, class: ErrorClass) {
        *self.counts.entry(class).or_insert(0) += 1;
    }

    #[must_use]
    pub fn count(&self, class: ErrorClass) -> u64 {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Merge another counter in, summing per-class counts. Used to combine
    /// per-row counters gathered in parallel by the data-parallel harness
    /// (spec §5).
    pub fn merge(&mut self, other: &SkippedFiles) {
        for (class, count) in &other.counts {
            *self.counts.entry(*class).or_insert(0) += count;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ErrorClass, u64)> + '_ {
        self.counts.iter().map(|(&c, &n)| (c, n))
    }
}
