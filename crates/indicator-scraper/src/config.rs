//! YAML pipeline configuration: global ticker list, output location
//! and format, per-site enablement and overrides.

use indicator_core::artifacts::OutputFormat;
use indicator_core::IndicatorError;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tickers: Vec<String>,
    pub output_dir: Option<String>,
    pub output_format: Option<String>,
    pub sites: Sites,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Sites {
    pub fundamentus_insiders: FundamentusSite,
    pub fundamentus_acionistas: FundamentusSite,
    pub bestchoice_volume: VolumeSite,
    pub bestchoice_magic_formula: MagicFormulaSite,
    pub statusinvest_prices: StatusInvestSite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FundamentusSite {
    pub enabled: bool,
    pub tickers: Option<Vec<String>>,
    pub tipo: i64,
}

impl Default for FundamentusSite {
    fn default() -> Self {
        Self {
            enabled: true,
            tickers: None,
            tipo: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VolumeSite {
    pub enabled: bool,
    pub tickers: Option<Vec<String>>,
    /// Instrument type filter for the scanner: `stock` or `dr`.
    pub tipo: String,
}

impl Default for VolumeSite {
    fn default() -> Self {
        Self {
            enabled: true,
            tickers: None,
            tipo: "stock".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MagicFormulaSite {
    pub enabled: bool,
}

impl Default for MagicFormulaSite {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusInvestSite {
    pub enabled: bool,
    pub tickers: Option<Vec<String>>,
    pub cookie: Option<String>,
}

impl Default for StatusInvestSite {
    fn default() -> Self {
        Self {
            enabled: true,
            tickers: None,
            cookie: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, IndicatorError> {
        let text = fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(&text)
            .map_err(|e| IndicatorError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Ticker list for one site: its override when present, otherwise
    /// the global list, normalized either way.
    pub fn tickers_for(&self, site_tickers: Option<&[String]>) -> Vec<String> {
        normalize_tickers(site_tickers.unwrap_or(&self.tickers))
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::parse(self.output_format.as_deref().unwrap_or("json"))
    }
}

/// Uppercase-trim and deduplicate, keeping first-seen order.
pub fn normalize_tickers(tickers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let yaml = r#"
tickers: [petr4, VALE3, petr4, " "]
output_dir: out
output_format: md
sites:
  fundamentus_insiders:
    enabled: false
    tipo: 2
  bestchoice_volume:
    tipo: dr
    tickers: [bbas3]
  statusinvest_prices:
    cookie: "session=abc"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.tickers_for(None), ["PETR4", "VALE3"]);
        assert_eq!(config.output_dir.as_deref(), Some("out"));
        assert_eq!(config.output_format(), OutputFormat::Markdown);

        assert!(!config.sites.fundamentus_insiders.enabled);
        assert_eq!(config.sites.fundamentus_insiders.tipo, 2);
        // Unmentioned sites keep their defaults.
        assert!(config.sites.fundamentus_acionistas.enabled);
        assert_eq!(config.sites.fundamentus_acionistas.tipo, 1);

        assert_eq!(config.sites.bestchoice_volume.tipo, "dr");
        assert_eq!(
            config.tickers_for(config.sites.bestchoice_volume.tickers.as_deref()),
            ["BBAS3"]
        );
        assert_eq!(
            config.sites.statusinvest_prices.cookie.as_deref(),
            Some("session=abc")
        );
    }

    #[test]
    fn minimal_config_defaults_everything() {
        let config: Config = serde_yaml::from_str("tickers: [wege3]").unwrap();
        assert!(config.sites.bestchoice_magic_formula.enabled);
        assert_eq!(config.sites.bestchoice_volume.tipo, "stock");
        assert_eq!(config.output_format(), OutputFormat::Json);
        assert_eq!(config.tickers_for(None), ["WEGE3"]);
    }

    #[test]
    fn unknown_output_format_falls_back_to_json() {
        let config: Config = serde_yaml::from_str("output_format: xml").unwrap();
        assert_eq!(config.output_format(), OutputFormat::Json);
    }

    #[test]
    fn normalization_dedups_preserving_order() {
        let tickers = vec![
            " vale3 ".to_string(),
            "PETR4".to_string(),
            "vale3".to_string(),
            String::new(),
        ];
        assert_eq!(normalize_tickers(&tickers), ["VALE3", "PETR4"]);
    }
}
