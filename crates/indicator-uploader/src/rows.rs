//! Database row assembly from the persisted artifact directory.
//!
//! Every field is best-effort: a missing or unreadable artifact turns
//! into a null column, never an error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One `indicators` table row.
#[derive(Debug, Serialize)]
pub struct TickerRow {
    pub ticker: String,
    pub update_at: String,
    pub data_insiders: Option<Value>,
    pub data_indicators: Option<Value>,
    pub data_shark: Option<Value>,
    pub data_obv: Option<Value>,
    pub data_adx: Option<Value>,
    pub data_peaks_valleys: Option<Value>,
    pub image_mt5: Option<String>,
}

/// The single `indicators_common` row holding the cross-ticker data.
#[derive(Debug, Serialize)]
pub struct CommonRow {
    pub id: i64,
    pub data_magic_formula: Option<Value>,
    pub data_volume: Option<Value>,
    pub data_sharks: Option<Value>,
}

fn read_json_opt(path: &Path) -> Option<Value> {
    let text = fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

fn read_from_dir(dir: Option<&Path>, file_name: &str) -> Option<Value> {
    read_json_opt(&dir?.join(file_name))
}

/// The MT5 export drops `<ticker>_d1.png` charts next to its JSON
/// sidecars; embed the first matching one as a base64 data URL.
fn find_mt5_image(dir: &Path, ticker: &str) -> Option<String> {
    if !dir.is_dir() {
        return None;
    }

    let prefix = ticker.trim().to_lowercase();
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_lowercase)
                    .is_some_and(|name| name.ends_with(".png") && name.starts_with(&prefix))
        })
        .collect();
    candidates.sort_by_key(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default()
    });

    for path in candidates {
        if let Ok(bytes) = fs::read(&path) {
            return Some(format!("data:image/png;base64,{}", BASE64.encode(bytes)));
        }
    }
    None
}

pub fn build_ticker_row(outputs_dir: &Path, mt5_dir: Option<&Path>, ticker: &str) -> TickerRow {
    let t = ticker.trim().to_uppercase();
    let lower = t.to_lowercase();

    TickerRow {
        update_at: Utc::now().date_naive().to_string(),
        data_insiders: read_json_opt(&outputs_dir.join(format!("{lower}.insiders.json"))),
        data_indicators: read_json_opt(&outputs_dir.join(format!("{lower}.statusinvest.json"))),
        data_shark: read_json_opt(&outputs_dir.join(format!("{lower}.acionistas.json"))),
        data_obv: read_from_dir(mt5_dir, &format!("{lower}.obv.json")),
        data_adx: read_from_dir(mt5_dir, &format!("{lower}.adx.json")),
        data_peaks_valleys: read_from_dir(mt5_dir, &format!("{lower}.pico_vale.json")),
        image_mt5: mt5_dir.and_then(|d| find_mt5_image(d, &t)),
        ticker: t,
    }
}

pub fn build_common_row(outputs_dir: &Path, common_id: i64) -> CommonRow {
    CommonRow {
        id: common_id,
        data_magic_formula: read_json_opt(&outputs_dir.join("magic_formula.json")),
        data_volume: read_json_opt(&outputs_dir.join("volume.json")),
        data_sharks: read_json_opt(&outputs_dir.join("sharks.json")),
    }
}

/// Recover the ticker universe from `<ticker>.<source>.json` artifact
/// names when neither flags nor config provide one.
pub fn infer_tickers_from_outputs(outputs_dir: &Path) -> Vec<String> {
    let pattern =
        Regex::new(r"(?i)^([a-z0-9]+)\.([a-z0-9_]+)\.json$").expect("hard-coded pattern");

    let mut names: Vec<String> = match fs::read_dir(outputs_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect(),
        Err(_) => return Vec::new(),
    };
    names.sort();

    let mut seen = HashSet::new();
    let mut tickers = Vec::new();
    for name in names {
        let Some(caps) = pattern.captures(&name) else {
            continue;
        };
        let ticker = caps[1].trim().to_uppercase();
        if !ticker.is_empty() && seen.insert(ticker.clone()) {
            tickers.push(ticker);
        }
    }
    tickers
}
