//! # gemini-extract
//!
//! **Tier 3 (Extract Client)**
//!
//! Client ports for the two external collaborators named in spec §6: the
//! AST service (`(filename, content) -> (uast, errors)`) and the
//! feature-extraction service's batched `extract` RPC. `gemini-core` calls
//! only the batched form with the two fixed profiles baked in as constants
//! in `gemini-features`.
//!
//! ## What belongs here
//! * `AstService`, `FeatureSource` traits and their deterministic fakes
//! * The `UastNode` shape and `enumerate_functions`, the language-agnostic
//!   function-node walk spec §4.G step 3 needs
//! * `extract_with_timeout` — the 30s-timeout → skip-and-count boundary
//!   (spec §5 "Suspension points")
//!
//! ## What does NOT belong here
//! * The fixed extraction profiles themselves (`gemini-features`)
//! * Deciding what to do with a timeout (`gemini-core` owns the
//!   `SkippedFiles` counter)

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gemini_features::ExtractionProfile;
use gemini_types::Feature;

/// The per-call budget feature extraction is bounded by (spec §5).
pub const FEATURE_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// One UAST node (spec §6 "AST service"). The AST service's wire format is
/// language-specific; this is the minimal shape the core needs — a type
/// token to recognize function nodes by, an optional name/start line for
/// the function-mode filter (spec §4.G), and the node's own source text
/// for feature extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UastNode {
    pub type_token: String,
    pub name: Option<String>,
    pub start_line: Option<u32>,
    pub text: String,
    pub children: Vec<UastNode>,
}

/// A UAST is just its root node.
pub type Uast = UastNode;

/// The AST service's result shape (spec §6 "AST service"): a UAST root
/// plus a list of error strings. A non-empty error list does not by itself
/// mean the file should be skipped — only a `None` root does (spec §6: "a
/// null UAST on a non-empty error list is treated as skip file").
#[derive(Debug, Clone, Default)]
pub struct AstResult {
    pub uast: Option<Uast>,
    pub errors: Vec<String>,
}

/// `(filename, content_bytes) -> AstResult` (spec §6 "AST service").
pub trait AstService {
    fn parse(&self, filename: &str, content: &[u8]) -> AstResult;
}

/// The feature-extraction service's batched `extract` RPC (spec §6
/// "Feature-extraction service"). The core only ever calls the batched
/// form — the four individual RPCs (`identifiers`, `literals`,
/// `uast2seq`, `graphlet`) exist on the wire but have no Rust-side port.
pub trait FeatureSource {
    fn extract(&self, uast: &Uast, profile: &ExtractionProfile) -> Result<Vec<Feature>, String>;
}

/// True for a node whose type token names a function, independent of which
/// language's grammar produced it (spec §4.G step 3 "language-agnostic:
/// nodes whose type token names a function").
#[must_use]
pub fn is_function_node(node: &UastNode) -> bool {
    let token = node.type_token.to_ascii_lowercase();
    token.contains("function") || token.contains("func") || token.contains("method")
}

/// Enumerate the *top-level* function nodes in a UAST (spec §4.G step 3):
/// a depth-first walk that stops descending as soon as it matches a
/// function node, so a closure or nested `fn` defined inside another
/// function is not double-counted as a sibling top-level function.
#[must_use]
pub fn enumerate_functions(root: &UastNode) -> Vec<&UastNode> {
    let mut out = Vec::new();
    collect_functions(root, &mut out);
    out
}

fn collect_functions<'a>(node: &'a UastNode, out: &mut Vec<&'a UastNode>) {
    if is_function_node(node) {
        out.push(node);
        return;
    }
    for child in &node.children {
        collect_functions(child, out);
    }
}

/// What happened when a `FeatureSource::extract` call was given a time
/// budget (spec §5 "Feature extraction is bounded by a per-call timeout of
/// 30s").
#[derive(Debug)]
pub enum ExtractOutcome {
    Ready(Vec<Feature>),
    TimedOut,
    Failed(String),
}

/// Run `source.extract(uast, profile)` on a worker thread and wait at most
/// `timeout`. A timeout or a call failure both resolve to an empty feature
/// set at the caller (spec §5) — the distinction is only for the
/// `SkippedFiles` class `gemini-core` records.
pub fn extract_with_timeout(
    source: Arc<dyn FeatureSource + Send + Sync>,
    uast: Uast,
    profile: ExtractionProfile,
    timeout: Duration,
) -> ExtractOutcome {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = source.extract(&uast, &profile);
        // The receiver may already be gone if we timed out; ignore.
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(features)) => ExtractOutcome::Ready(features),
        Ok(Err(detail)) => ExtractOutcome::Failed(detail),
        Err(_) => ExtractOutcome::TimedOut,
    }
}

/// A deterministic in-memory `AstService` for tests. Splits content into
/// lines and treats any line starting with `fn ` as a function node (a
/// Rust-flavored but otherwise arbitrary convention — real grammars are
/// the AST service's problem, not this fake's).
#[derive(Debug, Default)]
pub struct FakeAstService;

impl AstService for FakeAstService {
    fn parse(&self, _filename: &str, content: &[u8]) -> AstResult {
        let text = String::from_utf8_lossy(content).into_owned();
        let mut children = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("fn ") {
                let name = rest.split(['(', ' ']).next().unwrap_or("").to_string();
                children.push(UastNode {
                    type_token: "function".to_string(),
                    name: Some(name),
                    start_line: Some(line_no as u32 + 1),
                    text: line.to_string(),
                    children: Vec::new(),
                });
            }
        }
        AstResult {
            uast: Some(UastNode {
                type_token: "file".to_string(),
                name: None,
                start_line: None,
                text,
                children,
            }),
            errors: Vec::new(),
        }
    }
}

/// A deterministic in-memory `FeatureSource` for tests: tokenizes the
/// node's own source text on whitespace and emits one `Feature{weight: 1}`
/// per token, ignoring the profile's weights entirely (callers that need
/// weighted output should fake `FeatureSource` themselves).
#[derive(Debug, Default)]
pub struct FakeFeatureSource;

impl FeatureSource for FakeFeatureSource {
    fn extract(&self, uast: &Uast, _profile: &ExtractionProfile) -> Result<Vec<Feature>, String> {
        Ok(uast
            .text
            .split_whitespace()
            .map(|token| Feature {
                name: token.to_string(),
                weight: 1,
            })
            .collect())
    }
}
