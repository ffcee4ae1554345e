//! StatusInvest valuation provider: headline metrics from the ticker
//! page plus the historical P/L aggregate from the indicator-history
//! endpoint.

use async_trait::async_trait;
use indicator_core::parse::parse_decimal_pt;
use indicator_core::{
    IndicatorError, Payload, PlHistory, Record, RecordProvider, ValuationSnapshot,
};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::time::Duration;

const BASE_URL: &str = "https://statusinvest.com.br";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7";

/// Titles of the headline metric blocks on the ticker page.
const TITLE_VALOR_ATUAL: &str = "Valor atual";
const TITLE_MAX_52: &str = "Máx. 52 semanas";
const TITLE_DY: &str = "D.Y";
const TITLE_PL: &str = "P/L";
const TITLE_M_LIQUIDA: &str = "M. Líquida";

/// Valuation snapshots for a ticker list. Tickers whose page is
/// missing (404) or unparseable are skipped, never fatal.
pub struct PricesProvider {
    client: Client,
    tickers: Vec<String>,
    cookie: Option<String>,
}

impl PricesProvider {
    pub fn new(tickers: Vec<String>, cookie: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            tickers,
            cookie,
        }
    }

    fn page_url(ticker: &str) -> String {
        format!("{BASE_URL}/acoes/{}", ticker.to_lowercase())
    }

    async fn fetch_page(&self, url: &str) -> Result<String, IndicatorError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(|e| IndicatorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IndicatorError::Http(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| IndicatorError::Http(e.to_string()))
    }

    /// POST the indicator-history form and pull out the P/L row. The
    /// endpoint is picky about the code casing, so both are tried.
    async fn fetch_pl_history(&self, ticker: &str) -> Option<PlHistory> {
        let url = format!("{BASE_URL}/acao/indicatorhistoricallist");
        let referer = Self::page_url(ticker);

        for code in [ticker.to_uppercase(), ticker.to_lowercase()] {
            let form = [
                ("codes[]", code.as_str()),
                ("time", "5"),
                ("byQuarter", "false"),
                ("futureData", "false"),
            ];

            let mut request = self
                .client
                .post(&url)
                .header("User-Agent", USER_AGENT)
                .header("Accept", "*/*")
                .header("Accept-Language", ACCEPT_LANGUAGE)
                .header("Cache-Control", "no-cache")
                .header("Origin", BASE_URL)
                .header("Pragma", "no-cache")
                .header("Referer", &referer)
                .header("X-Requested-With", "XMLHttpRequest")
                .form(&form);
            if let Some(cookie) = &self.cookie {
                request = request.header("Cookie", cookie);
            }

            let Ok(response) = request.send().await else {
                continue;
            };
            if response.status().as_u16() != 200 {
                continue;
            }
            let Ok(payload) = response.json::<Value>().await else {
                continue;
            };

            return parse_pl_history(&payload, ticker);
        }

        None
    }
}

fn element_text(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find the `strong.value` that belongs to the titled block: locate
/// the `h3` with the given title, then search it and up to eight
/// enclosing levels for the value element.
fn find_value_by_title(doc: &Html, title: &str) -> Option<String> {
    let sel_h3 = Selector::parse("h3").ok()?;
    let sel_value = Selector::parse("strong.value").ok()?;

    let wanted = title.trim().to_lowercase();
    let h3 = doc
        .select(&sel_h3)
        .find(|h3| element_text(h3).to_lowercase() == wanted)?;

    let mut node = Some(h3);
    for _ in 0..8 {
        let el = node?;
        if let Some(value) = el.select(&sel_value).next() {
            return Some(element_text(&value));
        }
        node = el.parent().and_then(ElementRef::wrap);
    }

    None
}

/// Extract the headline metrics from a ticker page. `None` when no
/// titled block is present at all (wrong or empty page).
pub fn parse_valuation_page(html: &str, ticker: &str, url: &str) -> Option<Record> {
    let doc = Html::parse_document(html);

    let valor_atual = find_value_by_title(&doc, TITLE_VALOR_ATUAL);
    let max_52 = find_value_by_title(&doc, TITLE_MAX_52);
    let dy = find_value_by_title(&doc, TITLE_DY);
    let pl = find_value_by_title(&doc, TITLE_PL);
    let m_liquida = find_value_by_title(&doc, TITLE_M_LIQUIDA);

    if valor_atual.is_none() && max_52.is_none() && dy.is_none() && pl.is_none() && m_liquida.is_none() {
        return None;
    }

    let parsed = |v: Option<String>| v.as_deref().and_then(parse_decimal_pt);

    Some(Record {
        site: "statusinvest".to_string(),
        source: "statusinvest".to_string(),
        ticker: ticker.to_string(),
        payload: Payload::Valuation(ValuationSnapshot {
            url: url.to_string(),
            valor_atual: parsed(valor_atual),
            max_52_semanas: parsed(max_52),
            dy: parsed(dy),
            pl: parsed(pl),
            m_liquida: parsed(m_liquida),
            pl_historico: None,
        }),
    })
}

/// Python-style truthiness for the formatted/raw field fallback.
fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn coerce_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn historical_value(row: &Map<String, Value>, formatted: &str, raw: &str) -> Option<f64> {
    let value = [formatted, raw]
        .iter()
        .filter_map(|k| row.get(*k))
        .find(|v| truthy(v))?;
    parse_decimal_pt(&coerce_text(value))
}

/// Pull the P/L aggregate out of the indicator-history response for
/// the given ticker (the data map's key casing varies).
pub fn parse_pl_history(payload: &Value, ticker: &str) -> Option<PlHistory> {
    let data = payload.get("data")?.as_object()?;
    let rows = data
        .iter()
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(ticker))
        .and_then(|(_, v)| v.as_array())?;

    let pl_row = rows.iter().filter_map(Value::as_object).find(|row| {
        row.get("key")
            .and_then(Value::as_str)
            .is_some_and(|k| k.eq_ignore_ascii_case("p_l"))
    })?;

    Some(PlHistory {
        media: historical_value(pl_row, "avg_F", "avg"),
        atual: historical_value(pl_row, "actual_F", "actual"),
        menor_valor: historical_value(pl_row, "minValue_F", "minValue"),
        maior_valor: historical_value(pl_row, "maxValue_F", "maxValue"),
    })
}

#[async_trait]
impl RecordProvider for PricesProvider {
    fn name(&self) -> &'static str {
        "statusinvest_prices"
    }

    async fn collect(&self) -> Result<Vec<Record>, IndicatorError> {
        let mut records = Vec::new();

        for ticker in &self.tickers {
            let t = ticker.trim().to_uppercase();
            if t.is_empty() {
                continue;
            }

            let url = Self::page_url(&t);
            let html = match self.fetch_page(&url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("statusinvest: skipping {}: {}", t, e);
                    continue;
                }
            };

            let Some(mut record) = parse_valuation_page(&html, &t, &url) else {
                continue;
            };

            if let Payload::Valuation(snapshot) = &mut record.payload {
                snapshot.pl_historico = self.fetch_pl_history(&t).await;
            }
            records.push(record);
        }

        Ok(records)
    }
}
