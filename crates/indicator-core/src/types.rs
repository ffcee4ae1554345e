use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Sentinel ticker for records that arrive without one.
pub const UNKNOWN_TICKER: &str = "UNKNOWN";
/// Sentinel source for records that arrive without one.
pub const DEFAULT_SOURCE: &str = "data";

/// One flat row produced by a site provider: a common envelope
/// (site, source, ticker) plus a source-specific payload that
/// serializes inline with the envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub site: String,
    pub source: String,
    pub ticker: String,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Record {
    /// Ticker normalized for grouping: uppercase-trimmed, `UNKNOWN` when empty.
    pub fn normalized_ticker(&self) -> String {
        let t = self.ticker.trim().to_uppercase();
        if t.is_empty() {
            UNKNOWN_TICKER.to_string()
        } else {
            t
        }
    }

    /// Source normalized for grouping: lowercase-trimmed, `data` when empty.
    pub fn normalized_source(&self) -> String {
        let s = self.source.trim().to_lowercase();
        if s.is_empty() {
            DEFAULT_SOURCE.to_string()
        } else {
            s
        }
    }
}

/// Source-specific record payload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Insider(InsiderTrade),
    Shareholder(ShareholderRow),
    Volume(VolumeSnapshot),
    MagicFormula(MagicFormulaRow),
    Valuation(ValuationSnapshot),
    /// Schema-free fallback for sources without a dedicated shape.
    Other(Map<String, Value>),
}

/// One insider-trade disclosure row.
#[derive(Debug, Clone, Serialize)]
pub struct InsiderTrade {
    pub tipo: i64,
    pub date: Option<String>,
    pub quantidade: Option<i64>,
    pub valor: Option<f64>,
    pub preco_medio: Option<f64>,
    pub formulario_url: Option<String>,
}

/// One principal-shareholder row.
#[derive(Debug, Clone, Serialize)]
pub struct ShareholderRow {
    pub tipo: i64,
    pub acionista: Option<String>,
    pub participacao: Option<f64>,
}

/// Per-ticker trading-volume snapshot from the scanner.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeSnapshot {
    pub tipo: String,
    pub description: Option<String>,
    pub exchange: Option<String>,
    pub close: Option<f64>,
    pub change: Option<f64>,
    pub volume: Option<i64>,
    pub volume_change: Option<f64>,
    pub volume_change_ratio: Option<f64>,
    pub average_volume_30d: Option<i64>,
    pub average_volume_10d: Option<i64>,
    pub recommendation_mark: Option<f64>,
    pub net_margin_fy: Option<f64>,
    pub dividends_yield_current: Option<f64>,
}

/// Magic-formula ranking row; the webhook's column set is open-ended,
/// so everything rides along as-is.
#[derive(Debug, Clone, Serialize)]
pub struct MagicFormulaRow {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Valuation metrics scraped from a ticker page.
#[derive(Debug, Clone, Serialize)]
pub struct ValuationSnapshot {
    pub url: String,
    pub valor_atual: Option<f64>,
    pub max_52_semanas: Option<f64>,
    pub dy: Option<f64>,
    pub pl: Option<f64>,
    pub m_liquida: Option<f64>,
    pub pl_historico: Option<PlHistory>,
}

/// Historical P/L aggregate (5-year window).
#[derive(Debug, Clone, Serialize)]
pub struct PlHistory {
    pub media: Option<f64>,
    pub atual: Option<f64>,
    pub menor_valor: Option<f64>,
    pub maior_valor: Option<f64>,
}

/// Payload of one grouped bucket: a single record unwrapped, or the
/// full ordered list under `items`. Downstream consumers branch on the
/// shape, so the asymmetry is load-bearing.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ArtifactPayload {
    Single(Record),
    Many { items: Vec<Record> },
}

impl ArtifactPayload {
    pub fn from_records(mut records: Vec<Record>) -> Self {
        if records.len() == 1 {
            ArtifactPayload::Single(records.remove(0))
        } else {
            ArtifactPayload::Many { items: records }
        }
    }

    /// The bucket's records in original insertion order.
    pub fn records(&self) -> &[Record] {
        match self {
            ArtifactPayload::Single(record) => std::slice::from_ref(record),
            ArtifactPayload::Many { items } => items,
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output of the grouper. BTreeMap keys give the ascending iteration
/// order required for reproducible artifact writes.
#[derive(Debug, Default)]
pub struct Grouped {
    /// Buckets keyed by (ticker, source), wide sources excluded.
    pub per_ticker: BTreeMap<(String, String), ArtifactPayload>,
    /// Volume buckets keyed by ticker only.
    pub volume: BTreeMap<String, ArtifactPayload>,
    /// Magic-formula buckets keyed by ticker only.
    pub magic_formula: BTreeMap<String, ArtifactPayload>,
}

impl Grouped {
    /// Total record count across all buckets.
    pub fn total_records(&self) -> usize {
        self.per_ticker.values().map(ArtifactPayload::len).sum::<usize>()
            + self.volume.values().map(ArtifactPayload::len).sum::<usize>()
            + self.magic_formula.values().map(ArtifactPayload::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.per_ticker.is_empty() && self.volume.is_empty() && self.magic_formula.is_empty()
    }
}

/// A resolved shareholder entity, ranked by cross-ticker reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shark {
    /// Most frequent raw spelling among the clustered names.
    pub shark_name: String,
    /// Number of distinct tickers this shareholder appears in.
    pub quantity: usize,
    /// The distinct tickers, sorted.
    pub items: Vec<String>,
}
