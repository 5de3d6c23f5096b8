use anyhow::{Result, anyhow};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use tracing::info;

use crate::models::Cell;
use crate::processor::columns::{BILLING_SUFFIX, COUNT_SUFFIX, DISTINCT_SUFFIX, MALFORMED_SUFFIX, strip_column_suffix};
use crate::processor::stats_table::ShopStatsTable;
use crate::storage::report_writer::ReportFiles;

/// Nodepoint every other billing column is checked against.
pub const BILLING_REFERENCE: &str = "sales";
/// Billing nodepoints expected to match the reference.
pub const BILLING_EQUAL_TO_REFERENCE: [&str; 2] = ["products/sales", "sellers/sales"];
/// Billing nodepoints expected never to exceed the reference.
pub const BILLING_AT_MOST_REFERENCE: [&str; 2] = ["customers/sales", "product-categories/sales"];

const BILLING_TOLERANCE: f64 = 1e-6;

const ROW_LABEL_WIDTH: u32 = 280;
const COLUMN_WIDTH: u32 = 190;
const TITLE_HEIGHT: u32 = 50;
const HEADER_HEIGHT: u32 = 30;
const ROW_HEIGHT: u32 = 26;

const HIGHLIGHTED: RGBColor = RGBColor(230, 80, 70);
const NORMAL: RGBColor = RGBColor(190, 220, 245);
const BLANK: RGBColor = RGBColor(235, 235, 235);

/// One heatmap cell; `highlighted` is `None` for blank cells.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatCell {
    pub text: String,
    pub highlighted: Option<bool>,
}

impl HeatCell {
    fn blank() -> Self {
        HeatCell {
            text: String::new(),
            highlighted: None,
        }
    }

    fn new(text: String, highlighted: bool) -> Self {
        HeatCell {
            text,
            highlighted: Some(highlighted),
        }
    }
}

/// A labelled grid ready to be drawn, one row per table row.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub title: String,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub cells: Vec<Vec<HeatCell>>,
}

impl Heatmap {
    pub fn highlighted_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| cell.highlighted == Some(true))
            .count()
    }
}

/// `|a - b| <= atol + rtol * |b|`
fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

fn nodepoints_with_suffix<'a>(table: &'a ShopStatsTable, suffix: &str) -> Vec<&'a str> {
    table
        .columns()
        .iter()
        .filter_map(|column| strip_column_suffix(column, suffix))
        .collect()
}

fn value(table: &ShopStatsTable, row: usize, column: &str) -> Option<f64> {
    table
        .cell(&table.rows()[row], column)
        .and_then(|cell: Cell| cell.value())
}

fn row_labels(table: &ShopStatsTable) -> Vec<String> {
    table.rows().iter().map(|row| row.label()).collect()
}

pub fn malformed_heatmap(table: &ShopStatsTable, context: &str) -> Heatmap {
    let nodepoints = nodepoints_with_suffix(table, MALFORMED_SUFFIX);

    let cells = (0..table.height())
        .map(|row| {
            nodepoints
                .iter()
                .map(|nodepoint| {
                    match value(table, row, &format!("{}_{}", nodepoint, MALFORMED_SUFFIX)) {
                        Some(malformed) => HeatCell::new(format!("{}", malformed), malformed != 0.0),
                        None => HeatCell::blank(),
                    }
                })
                .collect()
        })
        .collect();

    Heatmap {
        title: format!("malformed entries - {}", context),
        row_labels: row_labels(table),
        column_labels: nodepoints.iter().map(|n| n.to_string()).collect(),
        cells,
    }
}

/// Billing sums side by side with the reference column.
///
/// Equal-to-reference columns light up when they drift from `sales`,
/// at-most-reference columns when they exceed it.
pub fn billing_heatmap(table: &ShopStatsTable, context: &str) -> Heatmap {
    let billing_column = |nodepoint: &str| format!("{}_{}", nodepoint, BILLING_SUFFIX);

    let nodepoints: Vec<&str> = std::iter::once(BILLING_REFERENCE)
        .chain(BILLING_EQUAL_TO_REFERENCE)
        .chain(BILLING_AT_MOST_REFERENCE)
        .filter(|nodepoint| table.has_column(&billing_column(nodepoint)))
        .collect();

    let cells = (0..table.height())
        .map(|row| {
            let reference = value(table, row, &billing_column(BILLING_REFERENCE));
            nodepoints
                .iter()
                .map(|&nodepoint| {
                    let Some(billing) = value(table, row, &billing_column(nodepoint)) else {
                        return HeatCell::blank();
                    };
                    let highlighted = match reference {
                        Some(sales) if BILLING_EQUAL_TO_REFERENCE.contains(&nodepoint) => !is_close(billing, sales),
                        Some(sales) if BILLING_AT_MOST_REFERENCE.contains(&nodepoint) => {
                            billing > sales + BILLING_TOLERANCE
                        }
                        _ => false,
                    };
                    HeatCell::new(format!("{:.2}", billing), highlighted)
                })
                .collect()
        })
        .collect();

    Heatmap {
        title: format!("billing entries - {}", context),
        row_labels: row_labels(table),
        column_labels: nodepoints.iter().map(|n| n.to_string()).collect(),
        cells,
    }
}

/// `distinct/count` of every raw nodepoint; duplicates light up.
pub fn distinct_heatmap(table: &ShopStatsTable, context: &str) -> Heatmap {
    let nodepoints = nodepoints_with_suffix(table, DISTINCT_SUFFIX);

    let cells = (0..table.height())
        .map(|row| {
            nodepoints
                .iter()
                .map(|nodepoint| {
                    let distinct = value(table, row, &format!("{}_{}", nodepoint, DISTINCT_SUFFIX));
                    let count = value(table, row, &format!("{}_{}", nodepoint, COUNT_SUFFIX));
                    match (distinct, count) {
                        (Some(distinct), Some(count)) => {
                            HeatCell::new(format!("{}/{}", distinct, count), distinct != count)
                        }
                        _ => HeatCell::blank(),
                    }
                })
                .collect()
        })
        .collect();

    Heatmap {
        title: format!("distinct entries - {}", context),
        row_labels: row_labels(table),
        column_labels: nodepoints.iter().map(|n| n.to_string()).collect(),
        cells,
    }
}

fn chart_error<E: std::fmt::Display>(path: &Path, error: E) -> anyhow::Error {
    anyhow!("Failed to draw chart {}: {}", path.display(), error)
}

pub fn render_heatmap(heatmap: &Heatmap, path: &Path) -> Result<()> {
    let columns = heatmap.column_labels.len() as u32;
    let rows = heatmap.row_labels.len() as u32;
    let width = (ROW_LABEL_WIDTH + columns * COLUMN_WIDTH).max(600);
    let height = TITLE_HEIGHT + HEADER_HEIGHT + rows.max(1) * ROW_HEIGHT + 10;

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    let draw_error = |e| chart_error(path, e);

    root.fill(&WHITE).map_err(draw_error)?;

    let centered = Pos::new(HPos::Center, VPos::Center);
    let title_style = TextStyle::from(("sans-serif", 24).into_font()).pos(centered);
    let label_style = TextStyle::from(("sans-serif", 14).into_font()).pos(centered);
    let row_style = TextStyle::from(("sans-serif", 14).into_font()).pos(Pos::new(HPos::Right, VPos::Center));

    root.draw(&Text::new(
        heatmap.title.clone(),
        ((width / 2) as i32, (TITLE_HEIGHT / 2) as i32),
        title_style,
    ))
    .map_err(draw_error)?;

    for (c, label) in heatmap.column_labels.iter().enumerate() {
        let x = ROW_LABEL_WIDTH + c as u32 * COLUMN_WIDTH + COLUMN_WIDTH / 2;
        let y = TITLE_HEIGHT + HEADER_HEIGHT / 2;
        root.draw(&Text::new(label.clone(), (x as i32, y as i32), label_style.clone()))
            .map_err(draw_error)?;
    }

    for (r, (label, row)) in heatmap.row_labels.iter().zip(&heatmap.cells).enumerate() {
        let top = TITLE_HEIGHT + HEADER_HEIGHT + r as u32 * ROW_HEIGHT;
        root.draw(&Text::new(
            label.clone(),
            ((ROW_LABEL_WIDTH - 10) as i32, (top + ROW_HEIGHT / 2) as i32),
            row_style.clone(),
        ))
        .map_err(draw_error)?;

        for (c, cell) in row.iter().enumerate() {
            let left = ROW_LABEL_WIDTH + c as u32 * COLUMN_WIDTH;
            let color = match cell.highlighted {
                Some(true) => HIGHLIGHTED,
                Some(false) => NORMAL,
                None => BLANK,
            };
            root.draw(&Rectangle::new(
                [(left as i32, top as i32), ((left + COLUMN_WIDTH) as i32, (top + ROW_HEIGHT) as i32)],
                color.filled(),
            ))
            .map_err(draw_error)?;
            root.draw(&Rectangle::new(
                [(left as i32, top as i32), ((left + COLUMN_WIDTH) as i32, (top + ROW_HEIGHT) as i32)],
                WHITE.stroke_width(1),
            ))
            .map_err(draw_error)?;
            if !cell.text.is_empty() {
                root.draw(&Text::new(
                    cell.text.clone(),
                    ((left + COLUMN_WIDTH / 2) as i32, (top + ROW_HEIGHT / 2) as i32),
                    label_style.clone(),
                ))
                .map_err(draw_error)?;
            }
        }
    }

    root.present().map_err(draw_error)?;
    info!(
        "Saved {} ({} highlighted cells) to {}",
        heatmap.title,
        heatmap.highlighted_count(),
        path.display()
    );
    Ok(())
}

/// Render the three diagnostic heatmaps of a table.
pub fn save_all_charts(table: &ShopStatsTable, context: &str, files: &ReportFiles) -> Result<()> {
    render_heatmap(&distinct_heatmap(table, context), &files.distinct_chart)?;
    render_heatmap(&malformed_heatmap(table, context), &files.malformed_chart)?;
    render_heatmap(&billing_heatmap(table, context), &files.billing_chart)?;
    Ok(())
}
