//! Model response validation
//!
//! Turns raw model output into a label that is guaranteed to be either the
//! "no match" sentinel `""` or an exact member of the vocabulary. Near
//! misses ("groceries", "Grocerys") are mapped onto the vocabulary through
//! a normalised Levenshtein similarity.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ClassifierError, Result};
use crate::models::{ValidatedLabel, Vocabulary};

/// Minimum similarity for a fuzzy match
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static pattern is valid"));

/// What an empty model response means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyResponsePolicy {
    /// The model found no suitable label; `""` is a valid answer
    NoMatch,

    /// The model failed to answer
    Reject,
}

/// Lowercase and strip everything but letters and digits
pub fn normalize(value: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&value.to_lowercase(), "")
        .into_owned()
}

/// `1 - levenshtein(a, b) / max(len(a), len(b))`, counted in chars
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(a, b) as f64 / longest as f64
}

/// Validates model output against a closed vocabulary
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidator {
    threshold: f64,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl ResponseValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different fuzzy-match threshold, clamped to `0.0..=1.0`
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Map one raw response onto the vocabulary
    pub fn validate_one(
        &self,
        raw: &str,
        vocabulary: &Vocabulary,
        policy: EmptyResponsePolicy,
    ) -> Result<ValidatedLabel> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return match policy {
                EmptyResponsePolicy::NoMatch => Ok(String::new()),
                EmptyResponsePolicy::Reject => {
                    Err(ClassifierError::invalid_label(raw, vocabulary.as_slice()))
                }
            };
        }

        if vocabulary.contains(trimmed) {
            return Ok(trimmed.to_string());
        }

        let normalized = normalize(trimmed);
        if !normalized.is_empty() {
            if let Some(label) = vocabulary
                .iter()
                .find(|label| similarity(&normalized, &normalize(label)) >= self.threshold)
            {
                debug!("Fuzzy matched {:?} to {:?}", trimmed, label);
                return Ok(label.clone());
            }
        }

        Err(ClassifierError::invalid_label(trimmed, vocabulary.as_slice()))
    }

    /// Apply `validate` to every response; the first failure aborts the batch
    pub fn validate_batch<F>(&self, raws: &[String], mut validate: F) -> Result<Vec<ValidatedLabel>>
    where
        F: FnMut(&str) -> Result<ValidatedLabel>,
    {
        raws.iter()
            .enumerate()
            .map(|(index, raw)| validate(raw).map_err(|e| ClassifierError::batch_item(index, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary() -> Vocabulary {
        Vocabulary::new(["Groceries", "Rent", "Dining Out"])
    }

    #[test]
    fn test_exact_and_trimmed_match() {
        let validator = ResponseValidator::new();
        let vocabulary = vocabulary();

        assert_eq!(
            validator
                .validate_one("Rent", &vocabulary, EmptyResponsePolicy::Reject)
                .unwrap(),
            "Rent"
        );
        assert_eq!(
            validator
                .validate_one("  Rent\n", &vocabulary, EmptyResponsePolicy::Reject)
                .unwrap(),
            "Rent"
        );
    }

    #[test]
    fn test_fuzzy_match() {
        let validator = ResponseValidator::new();
        let vocabulary = vocabulary();

        for raw in [" groceries ", "Grocerys", "GROCERIES!", "dining-out"] {
            let label = validator
                .validate_one(raw, &vocabulary, EmptyResponsePolicy::Reject)
                .unwrap();
            assert!(vocabulary.contains(&label), "{raw:?} -> {label:?}");
        }

        assert_eq!(
            validator
                .validate_one("Grocerys", &vocabulary, EmptyResponsePolicy::Reject)
                .unwrap(),
            "Groceries"
        );
    }

    #[test]
    fn test_unknown_label_is_rejected_with_vocabulary() {
        let err = ResponseValidator::new()
            .validate_one("Utilities", &vocabulary(), EmptyResponsePolicy::NoMatch)
            .unwrap_err();

        match err {
            ClassifierError::InvalidLabel { value, allowed } => {
                assert_eq!(value, "Utilities");
                assert_eq!(allowed, vocabulary().as_slice());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_response_follows_policy() {
        let validator = ResponseValidator::new();
        let vocabulary = vocabulary();

        assert_eq!(
            validator
                .validate_one("   ", &vocabulary, EmptyResponsePolicy::NoMatch)
                .unwrap(),
            ""
        );
        assert!(validator
            .validate_one("", &vocabulary, EmptyResponsePolicy::Reject)
            .is_err());
    }

    #[test]
    fn test_punctuation_only_is_not_fuzzy_matched() {
        let err = ResponseValidator::new()
            .validate_one("???", &vocabulary(), EmptyResponsePolicy::NoMatch)
            .unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidLabel { .. }));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let strict = ResponseValidator::new().with_threshold(1.0);
        assert!(strict
            .validate_one("Grocerys", &vocabulary(), EmptyResponsePolicy::Reject)
            .is_err());
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("rent", "rent"), 1.0);
        assert!((similarity("grocerys", "groceries") - 7.0 / 9.0).abs() < 1e-9);
        // "Grocry" is four edits from "groceries" (0.56), so it is not a near miss at 0.7
        assert!(similarity("grocry", "groceries") < DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_batch_reports_failing_index() {
        let validator = ResponseValidator::new();
        let vocabulary = vocabulary();
        let raws = vec!["Rent".to_string(), "Utilities".to_string(), "Groceries".to_string()];

        let err = validator
            .validate_batch(&raws, |raw| {
                validator.validate_one(raw, &vocabulary, EmptyResponsePolicy::NoMatch)
            })
            .unwrap_err();

        assert!(matches!(err, ClassifierError::BatchItem { index: 1, .. }));

        let ok = validator
            .validate_batch(&raws[..1], |raw| {
                validator.validate_one(raw, &vocabulary, EmptyResponsePolicy::NoMatch)
            })
            .unwrap();
        assert_eq!(ok, vec!["Rent"]);
    }
}
