//! indicator-scraper: collect indicators from the configured sites,
//! write grouped artifacts and resolve the cross-ticker shark ranking.
//!
//! Usage:
//!   cargo run -p indicator-scraper
//!   cargo run -p indicator-scraper -- --config config.yaml --out outputs

mod config;

use bestchoice_client::{MagicFormulaProvider, VolumeProvider};
use chrono::Utc;
use config::Config;
use fundamentus_client::{AcionistasProvider, InsidersProvider};
use indicator_core::artifacts::ArtifactWriter;
use indicator_core::canonical::NameCanonicalizer;
use indicator_core::group::group_records;
use indicator_core::sharks::build_sharks;
use indicator_core::{Record, RecordProvider};
use statusinvest_client::PricesProvider;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indicator_scraper=info,indicator_core=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = flag_value(&args, "--config").unwrap_or("config.yaml");
    let out_override = flag_value(&args, "--out");

    let config = Config::load(Path::new(config_path))?;
    let out_dir = out_override
        .map(str::to_string)
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| "outputs".to_string());

    let generated_at = Utc::now();
    let records = run_providers(&config).await;
    let collected = records.len();

    let grouped = group_records(records);
    let writer =
        ArtifactWriter::new(&out_dir, generated_at).with_format(config.output_format());
    writer.write_grouped(&grouped)?;

    let sharks = build_sharks(Path::new(&out_dir), NameCanonicalizer::default());
    writer.write_sharks(&sharks)?;

    if collected == 0 {
        tracing::info!("No items collected");
    }

    Ok(())
}

/// Run every enabled provider in turn. One failing site is logged and
/// skipped; the batch always completes with whatever was collected.
async fn run_providers(config: &Config) -> Vec<Record> {
    let sites = &config.sites;
    let mut providers: Vec<Box<dyn RecordProvider>> = Vec::new();

    if sites.fundamentus_insiders.enabled {
        providers.push(Box::new(InsidersProvider::new(
            config.tickers_for(sites.fundamentus_insiders.tickers.as_deref()),
            sites.fundamentus_insiders.tipo,
        )));
    }
    if sites.fundamentus_acionistas.enabled {
        providers.push(Box::new(AcionistasProvider::new(
            config.tickers_for(sites.fundamentus_acionistas.tickers.as_deref()),
            sites.fundamentus_acionistas.tipo,
        )));
    }
    if sites.bestchoice_volume.enabled {
        providers.push(Box::new(VolumeProvider::new(
            config.tickers_for(sites.bestchoice_volume.tickers.as_deref()),
            sites.bestchoice_volume.tipo.clone(),
        )));
    }
    if sites.bestchoice_magic_formula.enabled {
        providers.push(Box::new(MagicFormulaProvider::new()));
    }
    if sites.statusinvest_prices.enabled {
        providers.push(Box::new(PricesProvider::new(
            config.tickers_for(sites.statusinvest_prices.tickers.as_deref()),
            sites.statusinvest_prices.cookie.clone(),
        )));
    }

    let mut records = Vec::new();
    for provider in providers {
        match provider.collect().await {
            Ok(batch) => {
                tracing::info!("{}: {} records", provider.name(), batch.len());
                records.extend(batch);
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", provider.name(), e);
            }
        }
    }
    records
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
