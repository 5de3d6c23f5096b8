use crate::models::NodepointSpec;

pub const DATE_COLUMN: &str = "date";
pub const CHAIN_ID_COLUMN: &str = "chain_id";
pub const SHOP_ID_COLUMN: &str = "shop_id";
pub const SHOP_NAME_COLUMN: &str = "shop_name";

/// Columns describing the row rather than a counter, in table order.
pub const ROW_COLUMNS: [&str; 4] = [DATE_COLUMN, CHAIN_ID_COLUMN, SHOP_ID_COLUMN, SHOP_NAME_COLUMN];

/// Columns kept leftmost by [`sort_columns`].
pub const IDENTITY_COLUMNS: [&str; 3] = [CHAIN_ID_COLUMN, SHOP_ID_COLUMN, SHOP_NAME_COLUMN];

pub const COUNT_SUFFIX: &str = "count";
pub const BILLING_SUFFIX: &str = "billing";
pub const DISTINCT_SUFFIX: &str = "distinct";
pub const MALFORMED_SUFFIX: &str = "malformed";

/// The three columns of a nodepoint: `count`, its measure and `malformed`,
/// each prefixed by the nodepoint name.
pub fn compose_nodepoint_columns(spec: &NodepointSpec) -> [String; 3] {
    [COUNT_SUFFIX, spec.column_suffix.as_str(), MALFORMED_SUFFIX]
        .map(|suffix| format!("{}_{}", spec.name, suffix))
}

/// All table columns for the given registry: row columns, then three per nodepoint.
pub fn compose_table_columns(specs: &[NodepointSpec]) -> Vec<String> {
    let mut columns: Vec<String> = ROW_COLUMNS.iter().map(|c| c.to_string()).collect();
    for spec in specs {
        columns.extend(compose_nodepoint_columns(spec));
    }
    columns
}

/// Nodepoint name of a column carrying `suffix`, if any.
pub fn strip_column_suffix<'a>(column: &'a str, suffix: &str) -> Option<&'a str> {
    column
        .strip_suffix(suffix)
        .and_then(|prefix| prefix.strip_suffix('_'))
}

fn has_suffix(column: &str, suffix: &str) -> bool {
    strip_column_suffix(column, suffix).is_some()
}

/// Presentation order:
/// - chain_id, shop_id, shop_name
/// - *_billing
/// - the rest
/// - *_malformed
///
/// Relative order inside each group follows `columns`.
pub fn sort_columns(columns: &[String]) -> Vec<String> {
    let billing = columns
        .iter()
        .filter(|c| !IDENTITY_COLUMNS.contains(&c.as_str()) && has_suffix(c, BILLING_SUFFIX));
    let malformed = columns
        .iter()
        .filter(|c| !IDENTITY_COLUMNS.contains(&c.as_str()) && has_suffix(c, MALFORMED_SUFFIX));
    let rest = columns.iter().filter(|c| {
        !IDENTITY_COLUMNS.contains(&c.as_str())
            && !has_suffix(c, BILLING_SUFFIX)
            && !has_suffix(c, MALFORMED_SUFFIX)
    });

    IDENTITY_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(billing.cloned())
        .chain(rest.cloned())
        .chain(malformed.cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_nodepoint_columns() {
        let sellers = NodepointSpec::raw("sellers", "originalId");
        assert_eq!(
            compose_nodepoint_columns(&sellers),
            ["sellers_count", "sellers_distinct", "sellers_malformed"]
        );

        let mut sales = NodepointSpec::aggregation("products/sales", "billing", Some("productSales"));
        assert_eq!(
            compose_nodepoint_columns(&sales),
            ["products/sales_count", "products/sales_billing", "products/sales_malformed"]
        );

        sales.column_suffix = "amount".to_string();
        assert_eq!(compose_nodepoint_columns(&sales)[1], "products/sales_amount");
    }

    #[test]
    fn test_compose_table_columns() {
        let specs = vec![
            NodepointSpec::raw("products", "originalId"),
            NodepointSpec::aggregation("sales", "billing", None),
        ];

        assert_eq!(
            compose_table_columns(&specs),
            vec![
                "date",
                "chain_id",
                "shop_id",
                "shop_name",
                "products_count",
                "products_distinct",
                "products_malformed",
                "sales_count",
                "sales_billing",
                "sales_malformed",
            ]
        );
        assert_eq!(compose_table_columns(&[]).len(), ROW_COLUMNS.len());
    }

    #[test]
    fn test_sort_columns() {
        let specs = vec![
            NodepointSpec::raw("products", "originalId"),
            NodepointSpec::aggregation("customers/sales", "billing", Some("sales")),
            NodepointSpec::raw("tickets", "originalId"),
            NodepointSpec::aggregation("sales", "billing", None),
        ];

        let sorted = sort_columns(&compose_table_columns(&specs));
        assert_eq!(
            sorted,
            vec![
                "chain_id",
                "shop_id",
                "shop_name",
                "customers/sales_billing",
                "sales_billing",
                "date",
                "products_count",
                "products_distinct",
                "customers/sales_count",
                "tickets_count",
                "tickets_distinct",
                "sales_count",
                "products_malformed",
                "customers/sales_malformed",
                "tickets_malformed",
                "sales_malformed",
            ]
        );
    }

    #[test]
    fn test_strip_column_suffix() {
        assert_eq!(strip_column_suffix("products/sales_billing", BILLING_SUFFIX), Some("products/sales"));
        assert_eq!(strip_column_suffix("products_distinct", DISTINCT_SUFFIX), Some("products"));
        assert_eq!(strip_column_suffix("billing", BILLING_SUFFIX), None);
        assert_eq!(strip_column_suffix("rebilling", BILLING_SUFFIX), None);
    }
}
