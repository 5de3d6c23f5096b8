use anyhow::{Context, Result};
use chrono::Local;
use shop_stats::config::ShopStatsConfig;
use shop_stats::fetcher::HttpFetcher;
use shop_stats::processor::{TableAssembler, month_title};
use shop_stats::storage::{ReportFiles, save_all_charts, write_stats_csv};
use std::env;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "src/configs/shopstats.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let log_to_file = args.iter().any(|arg| arg == "--log-file");
    init_logging(args.first().map(String::as_str).unwrap_or("shop-stats"), log_to_file)?;

    dotenv::dotenv().ok();

    let config_path = args
        .iter()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);

    info!("🚀 Starting shop stats run with {}", config_path);

    match run(config_path).await {
        Ok(files) => {
            println!("Output saved at {}", files.csv.display());
            println!(
                "Charts saved at {}, {} and {}",
                files.distinct_chart.display(),
                files.malformed_chart.display(),
                files.billing_chart.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Shop stats run failed: {:#}", e);
            Err(e)
        }
    }
}

async fn run(config_path: &str) -> Result<ReportFiles> {
    let config = ShopStatsConfig::from_file(config_path)?;

    let periods = config.periods.resolve(Local::now().date_naive())?;
    // the last period names the report files
    let report_month = periods
        .last()
        .map(|period| period.date_start)
        .context("No period to report on")?;

    info!(
        "Loaded config: {} nodepoints over {} periods from {}",
        config.nodepoints.len(),
        periods.len(),
        config.api.base_url
    );

    let fetcher = HttpFetcher::new(config.api.clone(), config.shops.clone())
        .context("Failed to initialize HTTP client")?;

    let table = TableAssembler::new(&fetcher, &fetcher, config.nodepoints.clone(), periods)
        .with_max_concurrent_requests(config.api.max_concurrent_requests)
        .generate_table()
        .await
        .with_sorted_columns();

    info!("📊 Stats table has {} rows and {} columns", table.height(), table.columns().len());

    let files = ReportFiles::new(&config.output, report_month);
    write_stats_csv(&table, &files.csv)?;
    save_all_charts(&table, &month_title(report_month), &files)?;

    info!("✅ Shop stats report for {} complete", month_title(report_month));
    Ok(files)
}

fn init_logging(program: &str, log_to_file: bool) -> Result<()> {
    if !log_to_file {
        tracing_subscriber::fmt::init();
        return Ok(());
    }

    let name = Path::new(program)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("shop-stats");
    let path = format!("{}.log", name);
    let file = File::create(&path).with_context(|| format!("Failed to create log file: {}", path))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
