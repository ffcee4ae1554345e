//! Shareholder-name canonicalization.
//!
//! Disclosure pages spell the same entity many ways ("ACME Corp",
//! "ACME CORP", "Acme"). Clustering works on a normalized key that is
//! case-, punctuation- and legal-suffix-insensitive. The key is only
//! used for clustering, never displayed.

use std::collections::HashSet;

/// Corporate-suffix tokens dropped during canonicalization.
const SUFFIX_STOPWORDS: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "ltd",
    "ltda",
    "plc",
    "llc",
    "lp",
    "l.p",
    "sa",
    "s/a",
    "holding",
    "holdings",
];

/// Normalizes raw shareholder names into comparison keys.
///
/// The stopword set is held as explicit state so callers can supply
/// their own; `Default` uses the built-in corporate-suffix list.
#[derive(Debug, Clone)]
pub struct NameCanonicalizer {
    stopwords: HashSet<String>,
}

impl Default for NameCanonicalizer {
    fn default() -> Self {
        Self::with_stopwords(SUFFIX_STOPWORDS.iter().map(|s| s.to_string()))
    }
}

impl NameCanonicalizer {
    pub fn with_stopwords(stopwords: impl IntoIterator<Item = String>) -> Self {
        Self {
            stopwords: stopwords.into_iter().collect(),
        }
    }

    /// Produce the canonical key for a raw name. Empty input (or input
    /// with no tokenizable content) yields an empty key, which callers
    /// must skip.
    pub fn canonicalize(&self, raw: &str) -> String {
        let lowered = raw.trim().to_lowercase();
        if lowered.is_empty() {
            return String::new();
        }

        let mut cleaned = String::with_capacity(lowered.len());
        for ch in lowered.chars() {
            match ch {
                '"' | '\'' | '`' | '\u{00b4}' => {}
                c if c.is_ascii_lowercase() || c.is_ascii_digit() => cleaned.push(c),
                _ => cleaned.push(' '),
            }
        }

        let tokens: Vec<&str> = cleaned.split_whitespace().collect();
        if tokens.is_empty() {
            return String::new();
        }

        let filtered: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|t| !self.stopwords.contains(*t))
            .collect();

        // A name made entirely of suffixes still has to cluster under
        // something; fall back to the first original token.
        if filtered.is_empty() {
            return tokens[0].to_string();
        }

        filtered.join(" ")
    }
}
