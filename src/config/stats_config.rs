use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::api_config::ApiConfig;
use crate::config::nodepoint_config::{default_nodepoint_specs, validate_nodepoint_specs};
use crate::models::{NodepointSpec, Period};
use crate::processor::periods::{current_month, monthly_periods, parse_month};

/// Full configuration of a shop stats run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopStatsConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub shops: ShopFilter,
    #[serde(default)]
    pub periods: PeriodsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_nodepoint_specs")]
    pub nodepoints: Vec<NodepointSpec>,
}

/// Optional allow-lists restricting which discovered shops are processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopFilter {
    #[serde(default)]
    pub chain_ids: Vec<String>,
    #[serde(default)]
    pub shop_ids: Vec<String>,
}

impl ShopFilter {
    pub fn allows_chain(&self, chain_id: &str) -> bool {
        self.chain_ids.is_empty() || self.chain_ids.iter().any(|c| c == chain_id)
    }

    pub fn allows_shop(&self, shop_id: &str) -> bool {
        self.shop_ids.is_empty() || self.shop_ids.iter().any(|s| s == shop_id)
    }
}

/// Backfill window as `YYYY-MM` months; without `start` only the current month is queried.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodsConfig {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl PeriodsConfig {
    /// Ordered periods of the run relative to `today`.
    pub fn resolve(&self, today: NaiveDate) -> Result<Vec<Period>> {
        match &self.start {
            None => Ok(vec![current_month(today)]),
            Some(start) => {
                let first = parse_month(start)?;
                let last = match &self.end {
                    Some(end) => parse_month(end)?,
                    None => today,
                };
                monthly_periods(first, last)
            }
        }
    }
}

/// Where and under which names the reports are written.
///
/// Templates contain `{}`, replaced by the report month as `YYYYMM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_csv_template")]
    pub csv: String,
    #[serde(default = "default_malformed_template")]
    pub malformed_chart: String,
    #[serde(default = "default_billing_template")]
    pub billing_chart: String,
    #[serde(default = "default_distinct_template")]
    pub distinct_chart: String,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_csv_template() -> String {
    "shopstats_{}.csv".to_string()
}

fn default_malformed_template() -> String {
    "malformed_{}.png".to_string()
}

fn default_billing_template() -> String {
    "billing_{}.png".to_string()
}

fn default_distinct_template() -> String {
    "distinct_{}.png".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            csv: default_csv_template(),
            malformed_chart: default_malformed_template(),
            billing_chart: default_billing_template(),
            distinct_chart: default_distinct_template(),
        }
    }
}

impl ShopStatsConfig {
    pub fn new(api: ApiConfig) -> Self {
        ShopStatsConfig {
            api,
            shops: ShopFilter::default(),
            periods: PeriodsConfig::default(),
            output: OutputConfig::default(),
            nodepoints: default_nodepoint_specs(),
        }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read shop stats config file: {}", path))?;

        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse shop stats config file: {}", path))?;

        config.api.load_credentials();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        validate_nodepoint_specs(&self.nodepoints)?;
        if let Some(start) = &self.periods.start {
            let first = parse_month(start)?;
            if let Some(end) = &self.periods.end {
                monthly_periods(first, parse_month(end)?)?;
            }
        }
        Ok(())
    }
}
