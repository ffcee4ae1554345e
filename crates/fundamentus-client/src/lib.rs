//! Fundamentus providers: insider-trade disclosures and
//! principal-shareholder lists, scraped from the public pages.

use async_trait::async_trait;
use indicator_core::parse::{parse_decimal_pt, parse_int_pt};
use indicator_core::{
    IndicatorError, InsiderTrade, Payload, Record, RecordProvider, ShareholderRow,
};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

const BASE_URL: &str = "https://www.fundamentus.com.br";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7";

/// Shared HTTP layer for the Fundamentus pages.
#[derive(Clone)]
pub struct FundamentusClient {
    client: Client,
}

impl Default for FundamentusClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FundamentusClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
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
}

fn selector(css: &str) -> Result<Selector, IndicatorError> {
    Selector::parse(css).map_err(|e| IndicatorError::Parse(format!("selector {css}: {e}")))
}

fn cell_text(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Insider-trade disclosures for a ticker list.
pub struct InsidersProvider {
    client: FundamentusClient,
    tickers: Vec<String>,
    tipo: i64,
}

impl InsidersProvider {
    pub fn new(tickers: Vec<String>, tipo: i64) -> Self {
        Self {
            client: FundamentusClient::new(),
            tickers,
            tipo,
        }
    }

    fn build_url(&self, ticker: &str) -> String {
        format!("{BASE_URL}/insiders.php?papel={ticker}&tipo={}", self.tipo)
    }
}

/// Extract insider rows from the page's first table. Columns are
/// positional: Data | Quantidade | Valor (R$) | Preço Médio | Formulário.
pub fn parse_insiders_table(
    html: &str,
    ticker: &str,
    tipo: i64,
) -> Result<Vec<Record>, IndicatorError> {
    let sel_table = selector("table")?;
    let sel_tr = selector("tr")?;
    let sel_td = selector("td")?;
    let sel_a = selector("a")?;

    let doc = Html::parse_document(html);
    let Some(table) = doc.select(&sel_table).next() else {
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for tr in table.select(&sel_tr).skip(1) {
        let tds: Vec<ElementRef> = tr.select(&sel_td).collect();
        if tds.len() < 4 {
            continue;
        }

        let date = cell_text(&tds[0]);
        let quantidade = cell_text(&tds[1]);
        let valor = cell_text(&tds[2]);
        let preco_medio = cell_text(&tds[3]);

        let formulario_url = tds
            .get(4)
            .and_then(|td| td.select(&sel_a).next())
            .and_then(|a| a.value().attr("href"))
            .filter(|href| !href.is_empty())
            .map(|href| {
                if href.starts_with('/') {
                    format!("{BASE_URL}{href}")
                } else {
                    href.to_string()
                }
            });

        records.push(Record {
            site: "fundamentus".to_string(),
            source: "insiders".to_string(),
            ticker: ticker.to_string(),
            payload: Payload::Insider(InsiderTrade {
                tipo,
                date: Some(date).filter(|d| !d.is_empty()),
                quantidade: parse_int_pt(&quantidade),
                valor: parse_decimal_pt(&valor),
                preco_medio: parse_decimal_pt(&preco_medio),
                formulario_url,
            }),
        });
    }

    Ok(records)
}

#[async_trait]
impl RecordProvider for InsidersProvider {
    fn name(&self) -> &'static str {
        "fundamentus_insiders"
    }

    async fn collect(&self) -> Result<Vec<Record>, IndicatorError> {
        let mut records = Vec::new();
        for ticker in &self.tickers {
            let t = ticker.trim().to_uppercase();
            if t.is_empty() {
                continue;
            }

            let html = self.client.fetch_page(&self.build_url(&t)).await?;
            records.extend(parse_insiders_table(&html, &t, self.tipo)?);
        }
        Ok(records)
    }
}

/// Principal-shareholder lists for a ticker list.
pub struct AcionistasProvider {
    client: FundamentusClient,
    tickers: Vec<String>,
    tipo: i64,
}

impl AcionistasProvider {
    pub fn new(tickers: Vec<String>, tipo: i64) -> Self {
        Self {
            client: FundamentusClient::new(),
            tickers,
            tipo,
        }
    }

    fn build_url(&self, ticker: &str) -> String {
        format!(
            "{BASE_URL}/principais_acionistas.php?papel={ticker}&tipo={}",
            self.tipo
        )
    }
}

fn is_target_table(table: &ElementRef, sel_th: &Selector) -> bool {
    let headers: Vec<String> = table
        .select(sel_th)
        .map(|th| cell_text(&th).to_lowercase())
        .collect();
    if headers.is_empty() {
        return false;
    }

    let has_acionista = headers.iter().any(|h| h.contains("acionista"));
    let has_participacao = headers.iter().any(|h| h.contains("particip"));
    has_acionista && has_participacao
}

/// Extract shareholder rows. The page carries several tables; the
/// target is the one whose headers mention both the shareholder and
/// the participation column.
pub fn parse_acionistas_table(
    html: &str,
    ticker: &str,
    tipo: i64,
) -> Result<Vec<Record>, IndicatorError> {
    let sel_table = selector("table")?;
    let sel_tr = selector("tr")?;
    let sel_th = selector("th")?;
    let sel_td = selector("td")?;

    let doc = Html::parse_document(html);
    let Some(table) = doc
        .select(&sel_table)
        .find(|t| is_target_table(t, &sel_th))
    else {
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for tr in table.select(&sel_tr).skip(1) {
        let tds: Vec<ElementRef> = tr.select(&sel_td).collect();
        if tds.len() < 2 {
            continue;
        }

        let acionista = cell_text(&tds[0]);
        let participacao = cell_text(&tds[1]);

        records.push(Record {
            site: "fundamentus".to_string(),
            source: "acionistas".to_string(),
            ticker: ticker.to_string(),
            payload: Payload::Shareholder(ShareholderRow {
                tipo,
                acionista: Some(acionista).filter(|a| !a.is_empty()),
                participacao: parse_decimal_pt(&participacao),
            }),
        });
    }

    Ok(records)
}

#[async_trait]
impl RecordProvider for AcionistasProvider {
    fn name(&self) -> &'static str {
        "fundamentus_acionistas"
    }

    async fn collect(&self) -> Result<Vec<Record>, IndicatorError> {
        let mut records = Vec::new();
        for ticker in &self.tickers {
            let t = ticker.trim().to_uppercase();
            if t.is_empty() {
                continue;
            }

            let html = self.client.fetch_page(&self.build_url(&t)).await?;
            records.extend(parse_acionistas_table(&html, &t, self.tipo)?);
        }
        Ok(records)
    }
}
