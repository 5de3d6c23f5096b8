use anyhow::{Result, anyhow};
use shop_stats::storage::{
    billing_heatmap, chart_context_from_filename, distinct_heatmap, malformed_heatmap, read_stats_csv, render_heatmap,
};
use std::env;
use std::path::Path;
use tracing::info;

const USAGE: &str = "Usage: shop-charts <shopstats_YYYYMM.csv>";

/// The single CSV argument; anything else is a usage error.
fn csv_argument(args: &[String]) -> Result<&Path> {
    match args {
        [_, csv_path] => Ok(Path::new(csv_path)),
        _ => Err(anyhow!("{}", USAGE)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let path = csv_argument(&args)?;

    let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    let context = chart_context_from_filename(file_name);

    let table = read_stats_csv(path)?;
    info!("Loaded {} rows from {} ({})", table.height(), path.display(), context);

    render_heatmap(&distinct_heatmap(&table, &context), Path::new("distinct.png"))?;
    render_heatmap(&malformed_heatmap(&table, &context), Path::new("malformed.png"))?;
    render_heatmap(&billing_heatmap(&table, &context), Path::new("billing.png"))?;

    println!("Charts saved at distinct.png, malformed.png and billing.png");
    Ok(())
}
