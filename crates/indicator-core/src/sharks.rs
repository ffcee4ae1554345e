//! Cross-ticker shareholder ("shark") resolution.
//!
//! A second pass over the persisted shareholder artifacts: cluster raw
//! names by canonical key, pick a display spelling, count per-shark
//! ticker reach and rank the result. Built fresh on every run; no
//! clustering state survives between runs.

use crate::canonical::NameCanonicalizer;
use crate::types::Shark;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

const SHAREHOLDER_SUFFIX: &str = ".acionistas.json";

#[derive(Debug, Default)]
struct Cluster {
    tickers: BTreeSet<String>,
    spellings: HashMap<String, u64>,
}

/// Accumulates (ticker, raw name) observations and resolves them into
/// a ranked shark list.
pub struct SharkResolver {
    canonicalizer: NameCanonicalizer,
    clusters: HashMap<String, Cluster>,
}

impl SharkResolver {
    pub fn new(canonicalizer: NameCanonicalizer) -> Self {
        Self {
            canonicalizer,
            clusters: HashMap::new(),
        }
    }

    /// Record one shareholder row. Rows with an empty name, an empty
    /// canonical key or an empty ticker do not form sharks.
    pub fn observe(&mut self, ticker: &str, raw_name: &str) {
        let name = raw_name.trim();
        if name.is_empty() {
            return;
        }

        let key = self.canonicalizer.canonicalize(name);
        if key.is_empty() {
            return;
        }

        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return;
        }

        let cluster = self.clusters.entry(key).or_default();
        cluster.tickers.insert(ticker);
        *cluster.spellings.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Emit one shark per cluster: tickers sorted, display name = most
    /// frequent spelling (ties to the lexicographically smallest), list
    /// ranked by reach descending then name ascending.
    pub fn finish(self) -> Vec<Shark> {
        let mut sharks: Vec<Shark> = self
            .clusters
            .into_iter()
            .map(|(key, cluster)| {
                let shark_name = cluster
                    .spellings
                    .iter()
                    .max_by(|(name_a, count_a), (name_b, count_b)| {
                        count_a.cmp(count_b).then_with(|| name_b.cmp(name_a))
                    })
                    .map(|(name, _)| name.clone())
                    .unwrap_or(key);

                let items: Vec<String> = cluster.tickers.into_iter().collect();
                Shark {
                    shark_name,
                    quantity: items.len(),
                    items,
                }
            })
            .collect();

        sharks.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then_with(|| a.shark_name.cmp(&b.shark_name))
        });
        sharks
    }
}

/// Scan every persisted shareholder artifact under `out_dir` and
/// resolve the global shark list. Unreadable or misshapen artifacts
/// are skipped individually; one bad file never aborts the resolution.
pub fn build_sharks(out_dir: &Path, canonicalizer: NameCanonicalizer) -> Vec<Shark> {
    let mut resolver = SharkResolver::new(canonicalizer);
    let ticker_pattern =
        Regex::new(r"(?i)^([a-z0-9]+)\.acionistas\.json$").expect("hard-coded pattern");

    let mut paths: Vec<PathBuf> = match fs::read_dir(out_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(SHAREHOLDER_SUFFIX))
            })
            .collect(),
        Err(e) => {
            tracing::warn!("cannot read artifact directory {}: {}", out_dir.display(), e);
            return Vec::new();
        }
    };
    paths.sort();

    for path in paths {
        let payload: Value = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("skipping malformed artifact {}: {}", path.display(), e);
                    continue;
                }
            },
            Err(e) => {
                tracing::warn!("skipping unreadable artifact {}: {}", path.display(), e);
                continue;
            }
        };

        // Ticker comes from the payload, falling back to the file name.
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let ticker = payload
            .get("ticker")
            .and_then(Value::as_str)
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .or_else(|| {
                ticker_pattern
                    .captures(file_name)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().trim().to_uppercase())
            });

        let (Some(ticker), Some(items)) = (ticker, payload.get("items").and_then(Value::as_array))
        else {
            continue;
        };

        for item in items {
            let Some(obj) = item.as_object() else { continue };
            if let Some(name) = obj.get("acionista").and_then(Value::as_str) {
                resolver.observe(&ticker, name);
            }
        }
    }

    resolver.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(rows: &[(&str, &str)]) -> Vec<Shark> {
        let mut resolver = SharkResolver::new(NameCanonicalizer::default());
        for (ticker, name) in rows {
            resolver.observe(ticker, name);
        }
        resolver.finish()
    }

    #[test]
    fn clusters_rank_by_reach_then_name() {
        let sharks = resolve(&[
            ("A", "ACME Corp"),
            ("B", "ACME Corp"),
            ("A", "ACME"),
            ("C", "Beta Ltd"),
        ]);

        assert_eq!(sharks.len(), 2);
        assert_eq!(sharks[0].shark_name, "ACME Corp");
        assert_eq!(sharks[0].quantity, 2);
        assert_eq!(sharks[0].items, ["A", "B"]);
        assert_eq!(sharks[1].shark_name, "Beta Ltd");
        assert_eq!(sharks[1].quantity, 1);
        assert_eq!(sharks[1].items, ["C"]);
    }

    #[test]
    fn same_ticker_repeats_count_once_for_reach() {
        let sharks = resolve(&[("A", "Acme"), ("A", "Acme"), ("A", "ACME Corp")]);
        assert_eq!(sharks.len(), 1);
        assert_eq!(sharks[0].quantity, 1);
        // All spelling occurrences still count for the display name.
        assert_eq!(sharks[0].shark_name, "Acme");
    }

    #[test]
    fn display_name_tie_breaks_to_smallest_spelling() {
        let sharks = resolve(&[("A", "Acme Inc"), ("B", "ACME INC")]);
        assert_eq!(sharks.len(), 1);
        assert_eq!(sharks[0].shark_name, "ACME INC");
    }

    #[test]
    fn equal_reach_ranks_by_name_ascending() {
        let sharks = resolve(&[("A", "Zeta"), ("A", "Alpha")]);
        assert_eq!(sharks[0].shark_name, "Alpha");
        assert_eq!(sharks[1].shark_name, "Zeta");
    }

    #[test]
    fn empty_names_and_tickers_are_skipped() {
        let sharks = resolve(&[("A", ""), ("A", "   "), ("", "Acme"), ("A", "!!!")]);
        assert!(sharks.is_empty());
    }

    #[test]
    fn builds_from_artifact_directory_with_filename_fallback() {
        let dir = tempfile::tempdir().unwrap();

        // Regular artifact with an explicit ticker field.
        std::fs::write(
            dir.path().join("petr4.acionistas.json"),
            json!({
                "ticker": "PETR4",
                "source": "acionistas",
                "items": [
                    {"acionista": "Acme Corp", "participacao": 10.0},
                    {"acionista": "Beta", "participacao": 5.0}
                ]
            })
            .to_string(),
        )
        .unwrap();

        // No ticker field: recovered from the file name.
        std::fs::write(
            dir.path().join("vale3.acionistas.json"),
            json!({"items": [{"acionista": "Acme Corp"}]}).to_string(),
        )
        .unwrap();

        // Malformed JSON must not abort the scan.
        std::fs::write(dir.path().join("bad.acionistas.json"), "{not json").unwrap();
        // Other sources are ignored.
        std::fs::write(
            dir.path().join("petr4.insiders.json"),
            json!({"ticker": "PETR4", "items": [{"acionista": "Ghost"}]}).to_string(),
        )
        .unwrap();
        // Zero rows contribute nothing.
        std::fs::write(
            dir.path().join("wege3.acionistas.json"),
            json!({"ticker": "WEGE3", "items": []}).to_string(),
        )
        .unwrap();

        let sharks = build_sharks(dir.path(), NameCanonicalizer::default());
        assert_eq!(sharks.len(), 2);
        assert_eq!(sharks[0].shark_name, "Acme Corp");
        assert_eq!(sharks[0].quantity, 2);
        assert_eq!(sharks[0].items, ["PETR4", "VALE3"]);
        assert_eq!(sharks[1].shark_name, "Beta");
        assert_eq!(sharks[1].items, ["PETR4"]);
    }

    #[test]
    fn missing_directory_resolves_to_empty() {
        let sharks = build_sharks(
            Path::new("/definitely/not/here"),
            NameCanonicalizer::default(),
        );
        assert!(sharks.is_empty());
    }
}
