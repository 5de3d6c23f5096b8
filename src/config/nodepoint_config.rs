use anyhow::{Result, anyhow};
use std::collections::HashSet;

use crate::models::{NodepointMode, NodepointSpec};
use crate::processor::columns::{COUNT_SUFFIX, MALFORMED_SUFFIX, ROW_COLUMNS, compose_nodepoint_columns};

/// Built-in nodepoint registry.
///
/// Raw nodepoints are measured by distinct `originalId`; sales nodepoints by
/// the sum of `billing`, nested under the listed subkey when there is one.
pub fn default_nodepoint_specs() -> Vec<NodepointSpec> {
    vec![
        NodepointSpec::raw("product-categories", "originalId"),
        NodepointSpec::raw("products", "originalId"),
        NodepointSpec::raw("sellers", "originalId"),
        NodepointSpec::raw("tickets", "originalId"),
        NodepointSpec::aggregation("customers/sales", "billing", Some("sales")),
        NodepointSpec::aggregation("product-categories/sales", "billing", Some("productCategorySales")),
        NodepointSpec::aggregation("products/sales", "billing", Some("productSales")),
        NodepointSpec::aggregation("sales", "billing", None),
        NodepointSpec::aggregation("sellers/sales", "billing", Some("sales")),
    ]
}

/// Reject registries that cannot produce a well-formed table.
pub fn validate_nodepoint_specs(specs: &[NodepointSpec]) -> Result<()> {
    if specs.is_empty() {
        return Err(anyhow!("At least one nodepoint must be configured"));
    }

    let mut names = HashSet::new();
    for spec in specs {
        if spec.name.trim().is_empty() {
            return Err(anyhow!("Nodepoint name cannot be empty"));
        }
        if !names.insert(spec.name.as_str()) {
            return Err(anyhow!("Duplicate nodepoint: {}", spec.name));
        }
        if spec.column_suffix.trim().is_empty() {
            return Err(anyhow!("Nodepoint {} has an empty column suffix", spec.name));
        }
        if spec.column_suffix == COUNT_SUFFIX || spec.column_suffix == MALFORMED_SUFFIX {
            return Err(anyhow!(
                "Nodepoint {} cannot use reserved column suffix {}",
                spec.name,
                spec.column_suffix
            ));
        }

        let key = match &spec.mode {
            NodepointMode::Raw { equality_key } => equality_key,
            NodepointMode::Aggregation { aggregation_key, .. } => aggregation_key,
        };
        if key.is_empty() {
            return Err(anyhow!("Nodepoint {} has an empty key", spec.name));
        }
    }

    let mut columns: HashSet<String> = ROW_COLUMNS.iter().map(|c| c.to_string()).collect();
    for spec in specs {
        for column in compose_nodepoint_columns(spec) {
            if !columns.insert(column.clone()) {
                return Err(anyhow!("Nodepoint {} produces duplicate column {}", spec.name, column));
            }
        }
    }

    Ok(())
}
