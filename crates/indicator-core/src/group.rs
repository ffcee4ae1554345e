//! Partitioning of provider records into per-(ticker, source) buckets
//! and the two ticker-keyed wide maps.

use crate::types::{ArtifactPayload, Grouped, Record};
use std::collections::BTreeMap;

/// Sources that are cross-ticker summaries and therefore grouped by
/// ticker only, never written as per-ticker artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WideSource {
    Volume,
    MagicFormula,
}

impl WideSource {
    /// Capability check on a normalized source name.
    pub fn classify(source: &str) -> Option<Self> {
        match source {
            "volume" => Some(WideSource::Volume),
            "magic_formula" => Some(WideSource::MagicFormula),
            _ => None,
        }
    }
}

/// Partition a record batch. Envelope fields are normalized for keying
/// only (records themselves are kept as produced), insertion order is
/// preserved inside each bucket, and no record is ever dropped.
pub fn group_records(records: Vec<Record>) -> Grouped {
    let mut buckets: BTreeMap<(String, String), Vec<Record>> = BTreeMap::new();

    for record in records {
        let key = (record.normalized_ticker(), record.normalized_source());
        buckets.entry(key).or_default().push(record);
    }

    let mut grouped = Grouped::default();
    for ((ticker, source), bucket) in buckets {
        let payload = ArtifactPayload::from_records(bucket);
        match WideSource::classify(&source) {
            Some(WideSource::Volume) => {
                grouped.volume.insert(ticker, payload);
            }
            Some(WideSource::MagicFormula) => {
                grouped.magic_formula.insert(ticker, payload);
            }
            None => {
                grouped.per_ticker.insert((ticker, source), payload);
            }
        }
    }

    grouped
}
