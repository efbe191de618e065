//! # gemini-vocab
//!
//! **Tier 2 (Vocabulary)**
//!
//! Loads and validates the ordered document-frequency vocabulary (spec
//! §3/§4.B) and answers the two queries the rest of the pipeline needs:
//! a token's position in the vocabulary, and its IDF weight.
//!
//! ## What belongs here
//! * JSON parsing + the `MalformedVocabulary` invariant checks
//! * `token_index`, `weight`, canonical JSON dump
//!
//! ## What does NOT belong here
//! * Turning raw features into a `FeatureBag` (`gemini-features`)
//! * The `DocFreq` data shape itself (`gemini-types`)

use std::collections::HashMap;

use gemini_errors::GeminiError;
use gemini_types::DocFreq;

/// A loaded, validated vocabulary with an `O(1)` token → index lookup.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    doc_freq: DocFreq,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Parse and validate `{docs, tokens, df}` JSON (spec §4.B `load`).
    ///
    /// Fails with `MalformedVocabulary` if any token in `tokens` is missing
    /// from `df` or vice versa, or any count falls outside `[1, docs]`.
    pub fn load(json: &str) -> Result<Self, GeminiError> {
        let doc_freq: DocFreq = serde_json::from_str(json)
            .map_err(|e| GeminiError::MalformedVocabulary(format!("invalid JSON: {e}")))?;
        Self::from_doc_freq(doc_freq)
    }

    /// Validate an already-parsed `DocFreq` and build the lookup index.
    pub fn from_doc_freq(doc_freq: DocFreq) -> Result<Self, GeminiError> {
        if doc_freq.tokens.len() != doc_freq.df.len() {
            return Err(GeminiError::MalformedVocabulary(format!(
                "tokens/df size mismatch: {} tokens, {} df entries",
                doc_freq.tokens.len(),
                doc_freq.df.len()
            )));
        }

        let mut index = HashMap::with_capacity(doc_freq.tokens.len());
        for (i, token) in doc_freq.tokens.iter().enumerate() {
            let count = doc_freq.df.get(token).ok_or_else(|| {
                GeminiError::MalformedVocabulary(format!("token '{token}' missing from df"))
            })?;
            if *count < 1 || *count > doc_freq.docs {
                return Err(GeminiError::MalformedVocabulary(format!(
                    "df['{token}'] = {count} outside [1, {}]",
                    doc_freq.docs
                )));
            }
            index.insert(token.clone(), i);
        }
        // Every df key must also appear in tokens (the inverse direction of
        // the `tokens/df` bijection spec §4.B requires).
        for token in doc_freq.df.keys() {
            if !index.contains_key(token) {
                return Err(GeminiError::MalformedVocabulary(format!(
                    "df key '{token}' missing from tokens"
                )));
            }
        }

        Ok(Self { doc_freq, index })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.doc_freq.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc_freq.tokens.is_empty()
    }

    #[must_use]
    pub fn docs(&self) -> u64 {
        self.doc_freq.docs
    }

    /// `O(1)` lookup of a token's position in the vocabulary.
    #[must_use]
    pub fn token_index(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    /// `log(docs / df[token])`, the IDF weight used to scale raw feature
    /// weights (spec §4.B `weight`). `None` for tokens outside the
    /// vocabulary.
    #[must_use]
    pub fn weight(&self, token: &str) -> Option<f64> {
        let count = *self.doc_freq.df.get(token)?;
        Some((self.doc_freq.docs as f64 / count as f64).ln())
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.doc_freq.tokens
    }

    /// Canonical JSON dump (sorted `df` keys via `BTreeMap`) — `load`
    /// round-trips this exactly (spec §8 "Round-trip").
    pub fn dump(&self) -> Result<String, GeminiError> {
        serde_json::to_string(&self.doc_freq)
            .map_err(|e| GeminiError::MalformedVocabulary(format!("dump failed: {e}")))
    }
}
