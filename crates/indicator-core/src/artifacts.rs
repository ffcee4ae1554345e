//! Artifact persistence: one file per (ticker, source) bucket, one per
//! wide map, one for the shark ranking.
//!
//! Writes are idempotent: identical input and generation timestamp
//! produce byte-identical files.

use crate::error::IndicatorError;
use crate::render;
use crate::types::{ArtifactPayload, Grouped, Record, Shark};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialization format for grouped artifacts. The shark ranking is
/// always JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

impl OutputFormat {
    /// Lenient parse: `md` selects Markdown, anything else JSON.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "md" => OutputFormat::Markdown,
            _ => OutputFormat::Json,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

#[derive(Serialize)]
struct TickerArtifact<'a> {
    generated_at: &'a str,
    ticker: &'a str,
    source: &'a str,
    items: &'a [Record],
}

#[derive(Serialize)]
struct WideArtifact<'a> {
    generated_at: &'a str,
    source: &'a str,
    items: &'a BTreeMap<String, ArtifactPayload>,
}

/// Writes grouped and resolved structures into the output directory.
pub struct ArtifactWriter {
    out_dir: PathBuf,
    generated_at: DateTime<Utc>,
    format: OutputFormat,
}

impl ArtifactWriter {
    pub fn new(out_dir: impl Into<PathBuf>, generated_at: DateTime<Utc>) -> Self {
        Self {
            out_dir: out_dir.into(),
            generated_at,
            format: OutputFormat::Json,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write every per-ticker bucket plus the non-empty wide maps, in
    /// ascending key order.
    pub fn write_grouped(&self, grouped: &Grouped) -> Result<(), IndicatorError> {
        fs::create_dir_all(&self.out_dir)?;
        let generated_at = self.generated_at.to_rfc3339();

        for ((ticker, source), payload) in &grouped.per_ticker {
            let artifact = TickerArtifact {
                generated_at: &generated_at,
                ticker,
                source,
                items: payload.records(),
            };
            let file_name = format!(
                "{}.{}.{}",
                ticker.to_lowercase(),
                source,
                self.format.extension()
            );
            let path = self.out_dir.join(file_name);
            self.write_file(&path, &artifact)?;
            tracing::info!("Wrote {} ({} items)", path.display(), payload.len());
        }

        if !grouped.volume.is_empty() {
            self.write_wide("volume", &grouped.volume, &generated_at)?;
        }
        if !grouped.magic_formula.is_empty() {
            self.write_wide("magic_formula", &grouped.magic_formula, &generated_at)?;
        }

        Ok(())
    }

    fn write_wide(
        &self,
        source: &str,
        items: &BTreeMap<String, ArtifactPayload>,
        generated_at: &str,
    ) -> Result<(), IndicatorError> {
        let artifact = WideArtifact {
            generated_at,
            source,
            items,
        };
        let path = self
            .out_dir
            .join(format!("{}.{}", source, self.format.extension()));
        self.write_file(&path, &artifact)?;
        tracing::info!("Wrote {} ({} tickers)", path.display(), items.len());
        Ok(())
    }

    /// Write the shark ranking, skipped entirely when empty. Returns
    /// the written path, if any.
    pub fn write_sharks(&self, sharks: &[Shark]) -> Result<Option<PathBuf>, IndicatorError> {
        if sharks.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join("sharks.json");
        fs::write(&path, serde_json::to_string_pretty(sharks)?)?;
        tracing::info!("Wrote {} ({} sharks)", path.display(), sharks.len());
        Ok(Some(path))
    }

    fn write_file<T: Serialize>(&self, path: &Path, artifact: &T) -> Result<(), IndicatorError> {
        let contents = match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(artifact)?,
            OutputFormat::Markdown => render::to_markdown(&serde_json::to_value(artifact)?),
        };
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::NameCanonicalizer;
    use crate::group::group_records;
    use crate::sharks::build_sharks;
    use crate::types::{Payload, ShareholderRow, VolumeSnapshot};
    use chrono::TimeZone;
    use serde_json::Value;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn shareholder(ticker: &str, name: &str) -> Record {
        Record {
            site: "fundamentus".to_string(),
            source: "acionistas".to_string(),
            ticker: ticker.to_string(),
            payload: Payload::Shareholder(ShareholderRow {
                tipo: 1,
                acionista: Some(name.to_string()),
                participacao: Some(12.3),
            }),
        }
    }

    fn volume(ticker: &str) -> Record {
        Record {
            site: "bestchoice".to_string(),
            source: "volume".to_string(),
            ticker: ticker.to_string(),
            payload: Payload::Volume(VolumeSnapshot {
                tipo: "stock".to_string(),
                description: Some("Test".to_string()),
                exchange: Some("BMFBOVESPA".to_string()),
                close: Some(30.0),
                change: Some(0.5),
                volume: Some(1_000_000),
                volume_change: Some(2.0),
                volume_change_ratio: Some(1.1),
                average_volume_30d: Some(900_000),
                average_volume_10d: Some(950_000),
                recommendation_mark: None,
                net_margin_fy: None,
                dividends_yield_current: None,
            }),
        }
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn writes_per_ticker_and_wide_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let grouped = group_records(vec![
            shareholder("PETR4", "Acme Corp"),
            shareholder("PETR4", "Beta"),
            volume("PETR4"),
            volume("VALE3"),
        ]);

        let writer = ArtifactWriter::new(dir.path(), timestamp());
        writer.write_grouped(&grouped).unwrap();

        let acionistas = read_json(&dir.path().join("petr4.acionistas.json"));
        assert_eq!(acionistas["ticker"], "PETR4");
        assert_eq!(acionistas["source"], "acionistas");
        assert_eq!(acionistas["items"].as_array().unwrap().len(), 2);
        assert!(acionistas["generated_at"].as_str().unwrap().starts_with("2024-05-01T12:00:00"));

        // Wide artifact: keyed by ticker, single records unwrapped.
        let volume_artifact = read_json(&dir.path().join("volume.json"));
        assert_eq!(volume_artifact["source"], "volume");
        assert_eq!(volume_artifact["items"]["PETR4"]["close"], 30.0);
        assert_eq!(volume_artifact["items"]["VALE3"]["ticker"], "VALE3");

        // Volume never shows up as a per-ticker artifact.
        assert!(!dir.path().join("petr4.volume.json").exists());
        assert!(!dir.path().join("magic_formula.json").exists());
    }

    #[test]
    fn rerun_with_same_timestamp_is_byte_identical() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();

        let records = || vec![shareholder("PETR4", "Acme Corp"), volume("PETR4")];

        ArtifactWriter::new(dir_a.path(), timestamp())
            .write_grouped(&group_records(records()))
            .unwrap();
        ArtifactWriter::new(dir_b.path(), timestamp())
            .write_grouped(&group_records(records()))
            .unwrap();

        for name in ["petr4.acionistas.json", "volume.json"] {
            let a = fs::read(dir_a.path().join(name)).unwrap();
            let b = fs::read(dir_b.path().join(name)).unwrap();
            assert_eq!(a, b, "artifact {name} differs between runs");
        }
    }

    #[test]
    fn markdown_format_renders_tables_but_sharks_stay_json() {
        let dir = tempfile::tempdir().unwrap();
        let grouped = group_records(vec![shareholder("PETR4", "Acme Corp")]);

        let writer =
            ArtifactWriter::new(dir.path(), timestamp()).with_format(OutputFormat::Markdown);
        writer.write_grouped(&grouped).unwrap();

        let md = fs::read_to_string(dir.path().join("petr4.acionistas.md")).unwrap();
        assert!(md.starts_with("# PETR4 (acionistas)"));
        assert!(md.contains("| site | source | ticker |"));

        let sharks = vec![Shark {
            shark_name: "Acme Corp".to_string(),
            quantity: 1,
            items: vec!["PETR4".to_string()],
        }];
        let path = writer.write_sharks(&sharks).unwrap().unwrap();
        assert_eq!(path.file_name().unwrap(), "sharks.json");
    }

    #[test]
    fn empty_shark_list_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path(), timestamp());
        assert!(writer.write_sharks(&[]).unwrap().is_none());
        assert!(!dir.path().join("sharks.json").exists());
    }

    #[test]
    fn shareholder_artifacts_round_trip_into_sharks() {
        let dir = tempfile::tempdir().unwrap();
        let grouped = group_records(vec![
            shareholder("PETR4", "ACME Corp"),
            shareholder("VALE3", "ACME Corp"),
            shareholder("PETR4", "ACME"),
            shareholder("WEGE3", "Beta Ltd"),
        ]);

        ArtifactWriter::new(dir.path(), timestamp())
            .write_grouped(&grouped)
            .unwrap();

        let sharks = build_sharks(dir.path(), NameCanonicalizer::default());
        assert_eq!(sharks.len(), 2);
        assert_eq!(sharks[0].shark_name, "ACME Corp");
        assert_eq!(sharks[0].quantity, 2);
        assert_eq!(sharks[0].items, ["PETR4", "VALE3"]);
        assert_eq!(sharks[1].shark_name, "Beta Ltd");
        assert_eq!(sharks[1].quantity, 1);
    }
}
