//! Transient-error classification
//!
//! Upstream providers fail in ways that are retryable without changing inputs
//! (overload, rate limiting, transport hiccups). What counts as transient is
//! provider-specific, so the classifier is a pluggable trait; the default is
//! a small case-insensitive substring allowlist.

/// Decide whether an upstream error is retryable without changing inputs
pub trait TransientErrorClassifier: Send + Sync {
    /// Check whether the error text indicates a transient failure
    fn is_transient(&self, error: &str) -> bool;
}

/// Substring-allowlist classifier
pub struct SubstringClassifier {
    patterns: Vec<String>,
}

impl SubstringClassifier {
    /// Create a classifier with custom patterns (matched case-insensitively)
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// The default allowlist, observed from upstream providers
    pub fn default_patterns() -> Vec<String> {
        [
            "overloaded",
            "rate limit",
            "rate_limit",
            "429",
            "503",
            "529",
            "timed out",
            "connection reset",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self::new(Self::default_patterns())
    }
}

impl TransientErrorClassifier for SubstringClassifier {
    fn is_transient(&self, error: &str) -> bool {
        let lower = error.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_match() {
        let classifier = SubstringClassifier::default();

        assert!(classifier.is_transient("API error: Overloaded"));
        assert!(classifier.is_transient("upstream returned 529"));
        assert!(classifier.is_transient("request timed out after 60s"));
        assert!(classifier.is_transient("Rate limit exceeded"));
    }

    #[test]
    fn test_non_transient_errors() {
        let classifier = SubstringClassifier::default();

        assert!(!classifier.is_transient("invalid API key"));
        assert!(!classifier.is_transient("prompt too long"));
        assert!(!classifier.is_transient(""));
    }

    #[test]
    fn test_custom_patterns() {
        let classifier = SubstringClassifier::new(vec!["flaky".into()]);

        assert!(classifier.is_transient("known FLAKY backend"));
        assert!(!classifier.is_transient("Overloaded"));
    }
}
