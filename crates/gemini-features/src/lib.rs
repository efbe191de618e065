//! # gemini-features
//!
//! **Tier 2 (Feature Bag Builder)**
//!
//! Maps raw `(token, weight)` features onto vocabulary indices (spec
//! §4.C), and carries the two fixed batched-extraction profiles the
//! feature-extraction service is called with (spec §6).
//!
//! ## What belongs here
//! * `build_feature_bag`
//! * `ExtractionProfile`, `file_profile`, `func_profile`
//!
//! ## What does NOT belong here
//! * The RPC client itself (`gemini-extract`)
//! * Sketching the resulting bag (`gemini-wmh`)

use gemini_types::{Feature, FeatureBag, Mode};
use gemini_vocab::Vocabulary;

/// Build a `FeatureBag` from raw extracted features (spec §4.C).
///
/// `bag[i] += raw_weight * idf_weight(token[i])` for every feature whose
/// token is in the vocabulary; features on unknown tokens are dropped.
/// The bag is always dense over the full vocabulary size.
#[must_use]
pub fn build_feature_bag<I>(features: I, vocab: &Vocabulary) -> FeatureBag
where
    I: IntoIterator<Item = Feature>,
{
    let mut bag = FeatureBag::zeroed(vocab.len());
    for feature in features {
        let Some(index) = vocab.token_index(&feature.name) else {
            continue;
        };
        let Some(idf) = vocab.weight(&feature.name) else {
            continue;
        };
        let scaled = (f64::from(feature.weight) * idf).round();
        let scaled = if scaled.is_finite() && scaled >= 0.0 {
            scaled as u32
        } else {
            0
        };
        bag.weights[index] = bag.weights[index].saturating_add(scaled);
    }
    bag
}

/// `identifiers{weight, split}` option (spec §6 calls this `split_stem` at
/// file level and `split` at function level — same knob, one field here).
#[derive(Debug, Clone, Copy)]
pub struct IdentifierOptions {
    pub weight: u32,
    pub split: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct GraphletOptions {
    pub weight: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct LiteralOptions {
    pub weight: u32,
}

#[derive(Debug, Clone)]
pub struct Uast2SeqOptions {
    pub weight: u32,
    pub seq_len: Vec<u32>,
    pub stride: u32,
}

/// The batched `extract` request shape (spec §6): a record of optional
/// option structs, one per extractor kind, plus the shared
/// `docfreq_threshold` used when building the corpus vocabulary.
#[derive(Debug, Clone, Default)]
pub struct ExtractionProfile {
    pub identifiers: Option<IdentifierOptions>,
    pub graphlet: Option<GraphletOptions>,
    pub literals: Option<LiteralOptions>,
    pub uast2seq: Option<Uast2SeqOptions>,
    pub docfreq_threshold: u32,
}

impl ExtractionProfile {
    #[must_use]
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::File => file_profile(),
            Mode::Func => func_profile(),
        }
    }
}

/// file-level extraction profile (spec §6): identifiers{weight=194,
/// split_stem=true}, graphlet{weight=548}, literals{weight=264},
/// uast2seq absent, docfreq_threshold=5.
pub fn file_profile() -> ExtractionProfile {
    ExtractionProfile {
        identifiers: Some(IdentifierOptions {
            weight: 194,
            split: true,
        }),
        graphlet: Some(GraphletOptions { weight: 548 }),
        literals: Some(LiteralOptions { weight: 264 }),
        uast2seq: None,
        docfreq_threshold: 5,
    }
}

/// function-level extraction profile (spec §6): identifiers{weight=535,
/// split=true}, graphlet{weight=5707}, uast2seq{weight=369, seq_len=[3],
/// stride=1}, literals absent, docfreq_threshold=5.
pub fn func_profile() -> ExtractionProfile {
    ExtractionProfile {
        identifiers: Some(IdentifierOptions {
            weight: 535,
            split: true,
        }),
        graphlet: Some(GraphletOptions { weight: 5707 }),
        literals: None,
        uast2seq: Some(Uast2SeqOptions {
            weight: 369,
            seq_len: vec![3],
            stride: 1,
        }),
        docfreq_threshold: 5,
    }
}
