use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A shop reachable with the configured credentials.
///
/// Identity is `(chain_id, shop_id)`; the name is descriptive only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub chain_id: String,
    pub shop_id: String,
    pub name: String,
}

impl Shop {
    pub fn new(chain_id: impl Into<String>, shop_id: impl Into<String>, name: impl Into<String>) -> Self {
        Shop {
            chain_id: chain_id.into(),
            shop_id: shop_id.into(),
            name: name.into(),
        }
    }
}

/// Granularity of a period as understood by the analytics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Monthly,
}

impl DateRange {
    /// Value sent as the `dateRange` query parameter.
    pub fn api_code(self) -> &'static str {
        match self {
            DateRange::Monthly => "3",
        }
    }
}

/// A date range over which counters are computed.
///
/// `date_start` doubles as the period key of the output rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub date_range: DateRange,
}

impl Period {
    pub fn new(date_start: NaiveDate, date_end: NaiveDate, date_range: DateRange) -> Self {
        Period {
            date_start,
            date_end,
            date_range,
        }
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("dateStart", self.date_start.format("%Y-%m-%d").to_string()),
            ("dateEnd", self.date_end.format("%Y-%m-%d").to_string()),
            ("dateRange", self.date_range.api_code().to_string()),
        ]
    }

    /// Query string form of [`Period::query_params`], without the leading `?`.
    pub fn query_string(&self) -> String {
        self.query_params()
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// How the entries of a nodepoint are turned into counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodepointMode {
    /// Flat entity listing, measured by the number of distinct `equality_key` values.
    Raw { equality_key: String },
    /// Numeric values summed over `aggregation_key`, optionally nested under `subkey`.
    Aggregation {
        aggregation_key: String,
        #[serde(default)]
        subkey: Option<String>,
    },
}

/// Declarative description of one nodepoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodepointSpec {
    /// API path segment and output column prefix, e.g. `products/sales`.
    pub name: String,
    #[serde(flatten)]
    pub mode: NodepointMode,
    /// Label of the measure column (`distinct`, `billing`, ...).
    pub column_suffix: String,
}

impl NodepointSpec {
    pub fn raw(name: &str, equality_key: &str) -> Self {
        NodepointSpec {
            name: name.to_string(),
            mode: NodepointMode::Raw {
                equality_key: equality_key.to_string(),
            },
            column_suffix: "distinct".to_string(),
        }
    }

    pub fn aggregation(name: &str, aggregation_key: &str, subkey: Option<&str>) -> Self {
        NodepointSpec {
            name: name.to_string(),
            mode: NodepointMode::Aggregation {
                aggregation_key: aggregation_key.to_string(),
                subkey: subkey.map(str::to_string),
            },
            column_suffix: "billing".to_string(),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self.mode, NodepointMode::Raw { .. })
    }
}

/// Counters computed from one successfully fetched entry list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Counters {
    pub count: u64,
    /// Distinct count for raw nodepoints, aggregated sum otherwise.
    pub measure: f64,
    pub malformed: u64,
}

impl Counters {
    pub fn new(count: u64, measure: f64, malformed: u64) -> Self {
        Counters {
            count,
            measure,
            malformed,
        }
    }
}

/// Outcome of computing the counters of a nodepoint.
///
/// A failed fetch replaces the whole triple; partial success is not representable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodepointCounters {
    Computed(Counters),
    Missing,
}

impl NodepointCounters {
    /// Cells for the `count`, measure and `malformed` columns, in that order.
    pub fn cells(&self) -> [Cell; 3] {
        match self {
            NodepointCounters::Computed(counters) => [
                Cell::Value(counters.count as f64),
                Cell::Value(counters.measure),
                Cell::Value(counters.malformed as f64),
            ],
            NodepointCounters::Missing => [Cell::Missing; 3],
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, NodepointCounters::Missing)
    }
}

impl From<Counters> for NodepointCounters {
    fn from(counters: Counters) -> Self {
        NodepointCounters::Computed(counters)
    }
}

/// Result of asking the API for the entries of a nodepoint.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Ok(Vec<Value>),
    Error,
}

/// A counter cell of the output table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Cell {
    /// Never attempted.
    #[default]
    Unset,
    /// Attempted and failed.
    Missing,
    Value(f64),
}

impl Cell {
    pub fn is_unset(&self) -> bool {
        matches!(self, Cell::Unset)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Cell::Value(v) => Some(*v),
            Cell::Unset | Cell::Missing => None,
        }
    }

    /// Combine an existing cell with a newer candidate.
    ///
    /// An unset side never wins over a set one; between two set cells the newer wins.
    pub fn combine(self, newer: Cell) -> Cell {
        if newer.is_unset() { self } else { newer }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_never_overrides_a_set_cell() {
        let computed = Cell::Value(4.0);

        assert_eq!(Cell::Unset.combine(computed), computed);
        assert_eq!(computed.combine(Cell::Unset), computed);
        assert_eq!(Cell::Missing.combine(Cell::Unset), Cell::Missing);
        assert_eq!(Cell::Unset.combine(Cell::Unset), Cell::Unset);
    }

    #[test]
    fn test_newer_set_cell_wins() {
        assert_eq!(Cell::Value(1.0).combine(Cell::Value(2.0)), Cell::Value(2.0));
        assert_eq!(Cell::Value(1.0).combine(Cell::Missing), Cell::Missing);
        assert_eq!(Cell::Missing.combine(Cell::Value(3.0)), Cell::Value(3.0));
    }

    #[test]
    fn test_missing_counters_blank_all_three_cells() {
        assert_eq!(NodepointCounters::Missing.cells(), [Cell::Missing; 3]);

        let cells = NodepointCounters::from(Counters::new(4, 2.0, 1)).cells();
        assert_eq!(cells, [Cell::Value(4.0), Cell::Value(2.0), Cell::Value(1.0)]);
    }

    #[test]
    fn test_period_query_string() {
        let period = Period::new(
            NaiveDate::from_ymd_opt(2019, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 4, 30).unwrap(),
            DateRange::Monthly,
        );

        assert_eq!(
            period.query_string(),
            "dateStart=2019-04-01&dateEnd=2019-04-30&dateRange=3"
        );
    }

    #[test]
    fn test_nodepoint_spec_from_toml() {
        let raw: NodepointSpec = toml::from_str(
            r#"
            name = "products"
            type = "raw"
            equality_key = "originalId"
            column_suffix = "distinct"
            "#,
        )
        .unwrap();
        assert_eq!(raw, NodepointSpec::raw("products", "originalId"));

        let aggregation: NodepointSpec = toml::from_str(
            r#"
            name = "sales"
            type = "aggregation"
            aggregation_key = "billing"
            column_suffix = "billing"
            "#,
        )
        .unwrap();
        assert_eq!(aggregation, NodepointSpec::aggregation("sales", "billing", None));
    }
}
