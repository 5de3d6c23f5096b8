use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::models::{Cell, NodepointCounters, NodepointSpec, Period, Shop};
use crate::processor::columns::{
    CHAIN_ID_COLUMN, DATE_COLUMN, ROW_COLUMNS, SHOP_ID_COLUMN, SHOP_NAME_COLUMN, compose_nodepoint_columns,
    compose_table_columns, sort_columns,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One (shop × period) row of the stats table.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub date: NaiveDate,
    pub chain_id: String,
    pub shop_id: String,
    pub shop_name: String,
    cells: Vec<Cell>,
}

impl StatsRow {
    /// Chart label of the row.
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.chain_id, self.shop_id, self.date.format(DATE_FORMAT))
    }
}

/// Counters written for one (shop, period, nodepoint) combination.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGroup {
    pub shop_id: String,
    pub date: NaiveDate,
    pub columns: [String; 3],
    pub counters: NodepointCounters,
}

impl CellGroup {
    pub fn new(shop_id: &str, period: &Period, spec: &NodepointSpec, counters: NodepointCounters) -> Self {
        CellGroup {
            shop_id: shop_id.to_string(),
            date: period.date_start,
            columns: compose_nodepoint_columns(spec),
            counters,
        }
    }
}

/// Dense table of counters keyed by `(shop_id, date)` rows and nodepoint columns.
///
/// Rows are fixed at construction; only counter cells change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopStatsTable {
    counter_columns: Vec<String>,
    column_index: HashMap<String, usize>,
    column_order: Vec<String>,
    rows: Vec<StatsRow>,
    row_index: HashMap<(String, NaiveDate), Vec<usize>>,
}

impl ShopStatsTable {
    /// Base table for every shop × period pair with all counters unset.
    pub fn new(shops: &[Shop], periods: &[Period], specs: &[NodepointSpec]) -> Self {
        let column_order = compose_table_columns(specs);
        let counter_columns: Vec<String> = column_order[ROW_COLUMNS.len()..].to_vec();

        let mut rows = Vec::with_capacity(shops.len() * periods.len());
        for shop in shops {
            for period in periods {
                rows.push(StatsRow {
                    date: period.date_start,
                    chain_id: shop.chain_id.clone(),
                    shop_id: shop.shop_id.clone(),
                    shop_name: shop.name.clone(),
                    cells: vec![Cell::Unset; counter_columns.len()],
                });
            }
        }

        Self::from_parts(counter_columns, column_order, rows)
    }

    fn from_parts(counter_columns: Vec<String>, column_order: Vec<String>, rows: Vec<StatsRow>) -> Self {
        let column_index = counter_columns
            .iter()
            .enumerate()
            .map(|(index, column)| (column.clone(), index))
            .collect();

        let mut row_index: HashMap<(String, NaiveDate), Vec<usize>> = HashMap::new();
        for (index, row) in rows.iter().enumerate() {
            row_index
                .entry((row.shop_id.clone(), row.date))
                .or_default()
                .push(index);
        }

        ShopStatsTable {
            counter_columns,
            column_index,
            column_order,
            rows,
            row_index,
        }
    }

    /// Positions of the rows keyed by `(shop_id, date)`; several chains may share a shop id.
    fn matching_rows(&self, shop_id: &str, date: NaiveDate) -> &[usize] {
        self.row_index
            .get(&(shop_id.to_string(), date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Column names in presentation order.
    pub fn columns(&self) -> &[String] {
        &self.column_order
    }

    pub fn counter_columns(&self) -> &[String] {
        &self.counter_columns
    }

    pub fn rows(&self) -> &[StatsRow] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index.contains_key(column)
    }

    /// Counter cell of `row` in `column`, `None` when the column is not a counter column.
    pub fn cell(&self, row: &StatsRow, column: &str) -> Option<Cell> {
        self.column_index.get(column).map(|&index| row.cells[index])
    }

    /// Merge a cell group into every row matching its `(shop_id, date)` key.
    ///
    /// Returns the number of rows touched; no match is a valid outcome.
    pub fn merge(&mut self, group: &CellGroup) -> usize {
        let indices: Vec<Option<usize>> = group
            .columns
            .iter()
            .map(|column| self.column_index.get(column).copied())
            .collect();
        let cells = group.counters.cells();

        let positions = self.matching_rows(&group.shop_id, group.date).to_vec();
        for &position in &positions {
            let row = &mut self.rows[position];
            for (index, cell) in indices.iter().zip(cells) {
                if let Some(index) = index {
                    row.cells[*index] = row.cells[*index].combine(cell);
                }
            }
        }
        let matched = positions.len();

        if matched == 0 {
            debug!(
                "No row for shop {} on {} while merging {:?}",
                group.shop_id, group.date, group.columns
            );
        }
        matched
    }

    /// Merge another table cell by cell into this one, `other` being the newer side.
    pub fn combine_first(&mut self, other: &ShopStatsTable) {
        let indices: Vec<Option<usize>> = other
            .counter_columns
            .iter()
            .map(|column| self.column_index.get(column).copied())
            .collect();

        for other_row in &other.rows {
            let positions = self.matching_rows(&other_row.shop_id, other_row.date).to_vec();
            for position in positions {
                let row = &mut self.rows[position];
                for (index, cell) in indices.iter().zip(&other_row.cells) {
                    if let Some(index) = index {
                        row.cells[*index] = row.cells[*index].combine(*cell);
                    }
                }
            }
        }
    }

    /// Same table with its columns in presentation order.
    pub fn with_sorted_columns(mut self) -> Self {
        self.column_order = sort_columns(&self.column_order);
        self
    }

    /// Render the table as a DataFrame; unset and missing cells become nulls.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.column_order.len());

        for name in &self.column_order {
            let series = match name.as_str() {
                DATE_COLUMN => Series::new(
                    name.as_str().into(),
                    self.rows
                        .iter()
                        .map(|row| row.date.format(DATE_FORMAT).to_string())
                        .collect::<Vec<_>>(),
                ),
                CHAIN_ID_COLUMN => Series::new(
                    name.as_str().into(),
                    self.rows.iter().map(|row| row.chain_id.clone()).collect::<Vec<_>>(),
                ),
                SHOP_ID_COLUMN => Series::new(
                    name.as_str().into(),
                    self.rows.iter().map(|row| row.shop_id.clone()).collect::<Vec<_>>(),
                ),
                SHOP_NAME_COLUMN => Series::new(
                    name.as_str().into(),
                    self.rows.iter().map(|row| row.shop_name.clone()).collect::<Vec<_>>(),
                ),
                counter => {
                    let index = self.column_index[counter];
                    Series::new(
                        name.as_str().into(),
                        self.rows
                            .iter()
                            .map(|row| row.cells[index].value())
                            .collect::<Vec<Option<f64>>>(),
                    )
                }
            };
            columns.push(series.into());
        }

        DataFrame::new(columns).map_err(|e| anyhow!("Failed to create DataFrame: {}", e))
    }

    /// Rebuild a table from a DataFrame produced by [`ShopStatsTable::to_dataframe`].
    ///
    /// Every non-row column is read as a counter column; nulls become missing cells.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let column_order: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();

        for required in ROW_COLUMNS {
            if !column_order.iter().any(|c| c == required) {
                return Err(anyhow!("Missing required column: {}", required));
            }
        }

        let strings = |name: &str| -> Result<Vec<String>> {
            let column = df.column(name)?.cast(&DataType::String)?;
            let values = column
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|value| value.unwrap_or_default().to_string())
                .collect();
            Ok(values)
        };

        let dates = strings(DATE_COLUMN)?
            .iter()
            .map(|value| {
                NaiveDate::parse_from_str(value, DATE_FORMAT)
                    .with_context(|| format!("Invalid date in stats table: '{}'", value))
            })
            .collect::<Result<Vec<_>>>()?;
        let chain_ids = strings(CHAIN_ID_COLUMN)?;
        let shop_ids = strings(SHOP_ID_COLUMN)?;
        let shop_names = strings(SHOP_NAME_COLUMN)?;

        let counter_columns: Vec<String> = column_order
            .iter()
            .filter(|c| !ROW_COLUMNS.contains(&c.as_str()))
            .cloned()
            .collect();

        let mut counter_values = Vec::with_capacity(counter_columns.len());
        for name in &counter_columns {
            let column = df
                .column(name)?
                .cast(&DataType::Float64)
                .with_context(|| format!("Column {} is not numeric", name))?;
            let values: Vec<Cell> = column
                .as_materialized_series()
                .f64()?
                .into_iter()
                .map(|value| value.map_or(Cell::Missing, Cell::Value))
                .collect();
            counter_values.push(values);
        }

        let rows = (0..df.height())
            .map(|i| StatsRow {
                date: dates[i],
                chain_id: chain_ids[i].clone(),
                shop_id: shop_ids[i].clone(),
                shop_name: shop_names[i].clone(),
                cells: counter_values.iter().map(|values| values[i]).collect(),
            })
            .collect();

        Ok(Self::from_parts(counter_columns, column_order, rows))
    }
}
