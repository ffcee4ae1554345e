//! indicator-uploader: push persisted artifacts into the Supabase
//! indicator tables.
//!
//! Usage:
//!   cargo run -p indicator-uploader -- --dry-run
//!   cargo run -p indicator-uploader -- --out outputs --ticker PETR4 --ticker VALE3
//!
//! Requires SUPABASE_URL and SUPABASE_KEY in the environment (or a
//! .env file next to the binary).

mod rows;

use anyhow::{bail, Context};
use rows::{build_common_row, build_ticker_row, infer_tickers_from_outputs};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const INDICATORS_TABLE: &str = "indicators";
const COMMON_TABLE: &str = "indicators_common";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UploadConfig {
    tickers: Option<Vec<String>>,
    output_dir: Option<String>,
    mt5_files_dir: Option<String>,
    indicators_common_id: Option<i64>,
}

impl UploadConfig {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => return Ok(Self::default()),
        };
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}

fn normalize_tickers(tickers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indicator_uploader=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let config_path = flag_value(&args, "--config").unwrap_or("config.yaml");
    let config = UploadConfig::load(Path::new(config_path))?;

    let outputs_dir = PathBuf::from(
        flag_value(&args, "--out")
            .map(str::to_string)
            .or_else(|| config.output_dir.clone())
            .unwrap_or_else(|| "outputs".to_string()),
    );

    let mt5_dir = flag_value(&args, "--mt5-dir")
        .map(str::to_string)
        .or_else(|| config.mt5_files_dir.clone())
        .map(PathBuf::from);

    let common_id = flag_value(&args, "--common-id")
        .and_then(|v| v.parse().ok())
        .or(config.indicators_common_id)
        .or_else(|| {
            std::env::var("INDICATORS_COMMON_ID")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(1);

    let supabase_url =
        std::env::var("SUPABASE_URL").context("Missing SUPABASE_URL env var")?;
    let supabase_key =
        std::env::var("SUPABASE_KEY").context("Missing SUPABASE_KEY env var")?;

    // Ticker precedence: --ticker flags, config list, artifact names.
    let flag_tickers: Vec<String> = flag_values(&args, "--ticker");
    let mut tickers = normalize_tickers(&flag_tickers);
    if tickers.is_empty() {
        if let Some(config_tickers) = &config.tickers {
            tickers = normalize_tickers(config_tickers);
        }
    }
    if tickers.is_empty() {
        tickers = infer_tickers_from_outputs(&outputs_dir);
    }
    if tickers.is_empty() {
        bail!(
            "No tickers found. Provide --ticker, set tickers in {}, or ensure {}/*.json exist",
            config_path,
            outputs_dir.display()
        );
    }

    let rows: Vec<_> = tickers
        .iter()
        .map(|t| build_ticker_row(&outputs_dir, mt5_dir.as_deref(), t))
        .collect();
    let common_row = build_common_row(&outputs_dir, common_id);

    if dry_run {
        println!(
            "DRY RUN: would upsert {} rows into {}",
            rows.len(),
            INDICATORS_TABLE
        );
        println!(
            "{}",
            serde_json::to_string_pretty(&rows[..rows.len().min(2)])?
        );
        println!("DRY RUN: would upsert 1 row into {COMMON_TABLE}");
        println!("{}", serde_json::to_string_pretty(&common_row)?);
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?;

    let upserted = upsert(
        &client,
        &supabase_url,
        &supabase_key,
        INDICATORS_TABLE,
        "ticker",
        &serde_json::to_value(&rows)?,
    )
    .await?;
    match upserted {
        Some(n) => tracing::info!("Upserted {} rows", n),
        None => tracing::info!("Upsert completed"),
    }

    upsert(
        &client,
        &supabase_url,
        &supabase_key,
        COMMON_TABLE,
        "id",
        &serde_json::to_value(vec![&common_row])?,
    )
    .await?;

    Ok(())
}

/// PostgREST upsert: POST with merge-duplicates resolution on the
/// conflict column. Returns the affected row count when the response
/// body is a JSON array.
async fn upsert(
    client: &reqwest::Client,
    base_url: &str,
    key: &str,
    table: &str,
    on_conflict: &str,
    rows: &Value,
) -> anyhow::Result<Option<usize>> {
    let url = format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table);

    let response = client
        .post(&url)
        .query(&[("on_conflict", on_conflict)])
        .header("apikey", key)
        .header("Authorization", format!("Bearer {key}"))
        .header("Prefer", "resolution=merge-duplicates,return=representation")
        .json(rows)
        .send()
        .await
        .with_context(|| format!("upsert into {table}"))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        bail!("upsert into {} failed: HTTP {}: {}", table, status, body);
    }

    let count = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.as_array().map(Vec::len));
    Ok(count)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn flag_values(args: &[String], flag: &str) -> Vec<String> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == flag)
        .filter_map(|(i, _)| args.get(i + 1).cloned())
        .collect()
}
