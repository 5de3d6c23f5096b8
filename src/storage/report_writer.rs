use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use polars::prelude::*;
use regex::Regex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::OutputConfig;
use crate::processor::periods::{month_stamp, month_title};
use crate::processor::stats_table::ShopStatsTable;

/// Chart context used when a CSV name carries no report month.
pub const DEFAULT_CHART_CONTEXT: &str = "test";

/// Output paths of one report month.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFiles {
    pub csv: PathBuf,
    pub malformed_chart: PathBuf,
    pub billing_chart: PathBuf,
    pub distinct_chart: PathBuf,
}

impl ReportFiles {
    pub fn new(output: &OutputConfig, month: NaiveDate) -> Self {
        let stamp = month_stamp(month);
        let path = |template: &str| output.directory.join(template.replace("{}", &stamp));

        ReportFiles {
            csv: path(&output.csv),
            malformed_chart: path(&output.malformed_chart),
            billing_chart: path(&output.billing_chart),
            distinct_chart: path(&output.distinct_chart),
        }
    }
}

pub fn write_stats_csv(table: &ShopStatsTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let mut df = table.to_dataframe()?;
    let mut file =
        File::create(path).with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| anyhow!("Failed to write CSV {}: {}", path.display(), e))?;

    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Load a table written by [`write_stats_csv`].
///
/// Every column is read as text first so that identifiers keep their leading zeros.
pub fn read_stats_csv(path: &Path) -> Result<ShopStatsTable> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| anyhow!("Failed to read CSV {}: {}", path.display(), e))?;

    ShopStatsTable::from_dataframe(&df).with_context(|| format!("Invalid stats CSV: {}", path.display()))
}

/// `shopstats_201906.csv` gives `June 2019`; any other name gives [`DEFAULT_CHART_CONTEXT`].
pub fn chart_context_from_filename(name: &str) -> String {
    let Ok(pattern) = Regex::new(r".*_(\d{4})(\d{2})\.csv$") else {
        return DEFAULT_CHART_CONTEXT.to_string();
    };

    pattern
        .captures(name)
        .and_then(|caps| {
            let year = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, 1)
        })
        .map(month_title)
        .unwrap_or_else(|| DEFAULT_CHART_CONTEXT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Counters, DateRange, NodepointSpec, Period, Shop};
    use crate::processor::stats_table::CellGroup;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shop-stats-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_report_files_use_month_stamp() {
        let output = OutputConfig {
            directory: PathBuf::from("reports"),
            ..OutputConfig::default()
        };
        let files = ReportFiles::new(&output, NaiveDate::from_ymd_opt(2019, 6, 1).unwrap());

        assert_eq!(files.csv, PathBuf::from("reports/shopstats_201906.csv"));
        assert_eq!(files.malformed_chart, PathBuf::from("reports/malformed_201906.png"));
        assert_eq!(files.billing_chart, PathBuf::from("reports/billing_201906.png"));
        assert_eq!(files.distinct_chart, PathBuf::from("reports/distinct_201906.png"));
    }

    #[test]
    fn test_chart_context_from_filename() {
        assert_eq!(chart_context_from_filename("shopstats_201906.csv"), "June 2019");
        assert_eq!(chart_context_from_filename("out/shopstats_202001.csv"), "January 2020");
        assert_eq!(chart_context_from_filename("shopstats_201913.csv"), "test");
        assert_eq!(chart_context_from_filename("shopstats.csv"), "test");
        assert_eq!(chart_context_from_filename("shopstats_201906.png"), "test");
    }

    #[test]
    fn test_csv_round_trip() {
        let period = Period::new(
            NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 6, 30).unwrap(),
            DateRange::Monthly,
        );
        let specs = vec![
            NodepointSpec::raw("products", "originalId"),
            NodepointSpec::aggregation("sales", "billing", None),
        ];
        let shops = vec![Shop::new("0042", "007", "Main, North"), Shop::new("0042", "008", "Outlet")];

        let mut table = ShopStatsTable::new(&shops, std::slice::from_ref(&period), &specs);
        table.merge(&CellGroup::new("007", &period, &specs[0], Counters::new(4, 2.0, 1).into()));
        table.merge(&CellGroup::new("007", &period, &specs[1], Counters::new(2, 110.5, 1).into()));
        let table = table.with_sorted_columns();

        let dir = scratch_dir("csv");
        let path = dir.join("shopstats_201906.csv");
        write_stats_csv(&table, &path).unwrap();

        let restored = read_stats_csv(&path).unwrap();
        assert_eq!(restored.columns(), table.columns());
        assert_eq!(restored.height(), 2);

        let first = &restored.rows()[0];
        assert_eq!(first.chain_id, "0042");
        assert_eq!(first.shop_id, "007");
        assert_eq!(first.shop_name, "Main, North");
        assert_eq!(first.date, period.date_start);
        assert_eq!(restored.cell(first, "sales_billing"), Some(Cell::Value(110.5)));
        assert_eq!(restored.cell(first, "products_distinct"), Some(Cell::Value(2.0)));

        let second = &restored.rows()[1];
        assert_eq!(restored.cell(second, "products_count"), Some(Cell::Missing));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_read_missing_file_fails() {
        let path = scratch_dir("missing").join("shopstats_201906.csv");
        assert!(read_stats_csv(&path).is_err());
    }
}
