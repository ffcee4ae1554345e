//! BestChoice providers: per-ticker volume snapshots through the
//! scanner proxy, and the magic-formula ranking webhook.

use async_trait::async_trait;
use indicator_core::{
    IndicatorError, MagicFormulaRow, Payload, Record, RecordProvider, VolumeSnapshot,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;

const PROXY_URL: &str = "https://bestchoice-serverless.netlify.app/.netlify/functions/post";
const SCANNER_URL: &str = "https://scanner.tradingview.com/brazil/scan";
const MAGIC_FORMULA_URL: &str = "https://n8n.semalo.com.br/webhook/magic";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    data: Vec<ScanRow>,
}

#[derive(Debug, Deserialize)]
struct ScanRow {
    #[serde(default)]
    d: Vec<Value>,
}

/// Shared HTTP layer for the BestChoice endpoints.
#[derive(Clone)]
pub struct BestChoiceClient {
    client: Client,
}

impl Default for BestChoiceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BestChoiceClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// POST a scanner query through the proxy; the real target is
    /// carried in the `x-target-url` header.
    async fn scan(&self, payload: &Value) -> Result<ScanResponse, IndicatorError> {
        let response = self
            .client
            .post(PROXY_URL)
            .header("x-target-url", SCANNER_URL)
            .header("User-Agent", USER_AGENT)
            .json(payload)
            .send()
            .await
            .map_err(|e| IndicatorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IndicatorError::Http(format!(
                "HTTP {} from scanner proxy",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| IndicatorError::Http(e.to_string()))
    }

    async fn magic_formula(&self) -> Result<Value, IndicatorError> {
        let response = self
            .client
            .get(MAGIC_FORMULA_URL)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| IndicatorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IndicatorError::Http(format!(
                "HTTP {} from magic-formula webhook",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| IndicatorError::Http(e.to_string()))
    }
}

fn to_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_int(v: &Value) -> Option<i64> {
    to_float(v).map(|f| f.round() as i64)
}

/// Per-ticker volume snapshots. Each ticker is queried individually to
/// sidestep the strong UI filters that can exclude it from bulk scans.
pub struct VolumeProvider {
    client: BestChoiceClient,
    tickers: Vec<String>,
    tipo: String,
}

impl VolumeProvider {
    pub fn new(tickers: Vec<String>, tipo: impl Into<String>) -> Self {
        Self {
            client: BestChoiceClient::new(),
            tickers,
            tipo: tipo.into(),
        }
    }

    fn payload_for_ticker(&self, ticker: &str) -> Value {
        json!({
            "columns": [
                "name",
                "description",
                "type",
                "exchange",
                "close",
                "change",
                "volume",
                "volume_change",
                "average_volume_30d_calc",
                "average_volume_10d_calc",
                "recommendation_mark",
                "net_margin_fy",
                "dividends_yield_current",
            ],
            "filter": [
                {"left": "type", "operation": "equal", "right": self.tipo},
                {"left": "name", "operation": "equal", "right": ticker},
            ],
            "options": {"lang": "pt"},
            "range": [0, 1],
            "sort": {"sortBy": "name", "sortOrder": "asc"},
            "symbols": {},
            "markets": ["brazil"],
        })
    }
}

/// Decode one scanner row (the 13 columns requested above). Rejects
/// short rows and responses for a different ticker.
pub fn decode_volume_row(d: &[Value], ticker: &str, tipo: &str) -> Option<Record> {
    if d.len() < 13 {
        return None;
    }

    let name = d[0].as_str().unwrap_or("").trim().to_uppercase();
    if name != ticker {
        return None;
    }

    let volume = to_int(&d[6]);
    let average_volume_30d = to_int(&d[8]);
    let average_volume_10d = to_int(&d[9]);
    let volume_change_ratio = match (volume, average_volume_30d) {
        (Some(v), Some(avg)) if v != 0 && avg != 0 => Some(v as f64 / avg as f64),
        _ => None,
    };

    Some(Record {
        site: "bestchoice".to_string(),
        source: "volume".to_string(),
        ticker: name,
        payload: Payload::Volume(VolumeSnapshot {
            tipo: tipo.to_string(),
            description: d[1].as_str().map(str::to_string),
            exchange: d[3].as_str().map(str::to_string),
            close: to_float(&d[4]),
            change: to_float(&d[5]),
            volume,
            volume_change: to_float(&d[7]),
            volume_change_ratio,
            average_volume_30d,
            average_volume_10d,
            recommendation_mark: to_float(&d[10]),
            net_margin_fy: to_float(&d[11]),
            dividends_yield_current: to_float(&d[12]),
        }),
    })
}

#[async_trait]
impl RecordProvider for VolumeProvider {
    fn name(&self) -> &'static str {
        "bestchoice_volume"
    }

    async fn collect(&self) -> Result<Vec<Record>, IndicatorError> {
        let wanted: BTreeSet<String> = self
            .tickers
            .iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut records = Vec::new();
        for ticker in wanted {
            let response = self.client.scan(&self.payload_for_ticker(&ticker)).await?;
            let Some(row) = response.data.first() else {
                continue;
            };

            if let Some(record) = decode_volume_row(&row.d, &ticker, &self.tipo) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// The magic-formula ranking webhook; the whole batch comes back in
/// one JSON array with an open-ended column set.
pub struct MagicFormulaProvider {
    client: BestChoiceClient,
}

impl Default for MagicFormulaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MagicFormulaProvider {
    pub fn new() -> Self {
        Self {
            client: BestChoiceClient::new(),
        }
    }
}

/// Decode the webhook response: one record per object row with a
/// non-empty `simbolo`, every column carried through as-is.
pub fn decode_magic_rows(value: &Value) -> Vec<Record> {
    let Some(rows) = value.as_array() else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for row in rows {
        let Some(obj) = row.as_object() else { continue };

        let ticker = obj
            .get("simbolo")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_uppercase();
        if ticker.is_empty() {
            continue;
        }

        records.push(Record {
            site: "bestchoice".to_string(),
            source: "magic_formula".to_string(),
            ticker,
            payload: Payload::MagicFormula(MagicFormulaRow { extra: obj.clone() }),
        });
    }
    records
}

#[async_trait]
impl RecordProvider for MagicFormulaProvider {
    fn name(&self) -> &'static str {
        "bestchoice_magic_formula"
    }

    async fn collect(&self) -> Result<Vec<Record>, IndicatorError> {
        let value = self.client.magic_formula().await?;
        Ok(decode_magic_rows(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner_row() -> Vec<Value> {
        json!([
            "PETR4",
            "Petrobras PN",
            "stock",
            "BMFBOVESPA",
            38.5,
            1.2,
            55_000_000,
            10.0,
            50_000_000,
            48_000_000,
            2.5,
            18.0,
            7.5
        ])
        .as_array()
        .unwrap()
        .clone()
    }

    #[test]
    fn decodes_a_full_scanner_row() {
        let record = decode_volume_row(&scanner_row(), "PETR4", "stock").unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["site"], "bestchoice");
        assert_eq!(json["source"], "volume");
        assert_eq!(json["ticker"], "PETR4");
        assert_eq!(json["close"], 38.5);
        assert_eq!(json["volume"], 55_000_000_i64);
        assert_eq!(json["average_volume_30d"], 50_000_000_i64);
        assert_eq!(json["volume_change_ratio"], 1.1);
        assert_eq!(json["dividends_yield_current"], 7.5);
    }

    #[test]
    fn rejects_ticker_mismatch_and_short_rows() {
        assert!(decode_volume_row(&scanner_row(), "VALE3", "stock").is_none());
        assert!(decode_volume_row(&scanner_row()[..5], "PETR4", "stock").is_none());
    }

    #[test]
    fn ratio_needs_both_volume_and_average() {
        let mut row = scanner_row();
        row[8] = Value::Null;
        let record = decode_volume_row(&row, "PETR4", "stock").unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["volume_change_ratio"].is_null());
        assert!(json["average_volume_30d"].is_null());
    }

    #[test]
    fn numeric_strings_are_tolerated() {
        let mut row = scanner_row();
        row[6] = json!("55000000");
        let record = decode_volume_row(&row, "PETR4", "stock").unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["volume"], 55_000_000_i64);
    }

    #[test]
    fn magic_rows_keep_every_column() {
        let value = json!([
            {"simbolo": "petr4", "posicao": 1, "roic": 21.5},
            {"simbolo": "  "},
            "not an object",
            {"outra": "coluna"}
        ]);

        let records = decode_magic_rows(&value);
        assert_eq!(records.len(), 1);

        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["ticker"], "PETR4");
        assert_eq!(json["source"], "magic_formula");
        assert_eq!(json["simbolo"], "petr4");
        assert_eq!(json["posicao"], 1);
        assert_eq!(json["roic"], 21.5);
    }

    #[test]
    fn non_array_webhook_payload_yields_nothing() {
        assert!(decode_magic_rows(&json!({"error": "oops"})).is_empty());
    }
}
