use tracing::warn;

use crate::fetcher::EntriesSource;
use crate::models::{FetchOutcome, NodepointCounters, NodepointSpec, Period, Shop};
use crate::processor::entry_processor::process_entries;

/// Fetch the entries of a nodepoint and compute its counters.
///
/// Any fetch error yields [`NodepointCounters::Missing`]; this never fails.
pub async fn get_nodepoint_counters<S>(
    source: &S,
    shop: &Shop,
    spec: &NodepointSpec,
    period: &Period,
) -> NodepointCounters
where
    S: EntriesSource + ?Sized,
{
    match source
        .fetch_entries(&shop.chain_id, &shop.shop_id, &spec.name, period)
        .await
    {
        FetchOutcome::Ok(entries) => process_entries(spec, &entries).into(),
        FetchOutcome::Error => {
            warn!(
                "Counters of nodepoint {} unavailable for chain {} shop {} from {}",
                spec.name, shop.chain_id, shop.shop_id, period.date_start
            );
            NodepointCounters::Missing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Counters, DateRange};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingSource {
        outcome: FetchOutcome,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EntriesSource for RecordingSource {
        async fn fetch_entries(&self, chain_id: &str, shop_id: &str, nodepoint: &str, period: &Period) -> FetchOutcome {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}/{}/{}?{}", chain_id, shop_id, nodepoint, period.query_string()));
            self.outcome.clone()
        }
    }

    fn period() -> Period {
        Period::new(
            NaiveDate::from_ymd_opt(2019, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 4, 30).unwrap(),
            DateRange::Monthly,
        )
    }

    #[tokio::test]
    async fn test_error_maps_to_missing() {
        let source = RecordingSource {
            outcome: FetchOutcome::Error,
            calls: Mutex::new(Vec::new()),
        };
        let shop = Shop::new("c1", "s1", "Shop");
        let spec = NodepointSpec::raw("products", "originalId");

        let counters = get_nodepoint_counters(&source, &shop, &spec, &period()).await;
        assert_eq!(counters, NodepointCounters::Missing);
        assert_eq!(
            source.calls.lock().unwrap().as_slice(),
            ["c1/s1/products?dateStart=2019-04-01&dateEnd=2019-04-30&dateRange=3"]
        );
    }

    #[tokio::test]
    async fn test_dispatches_on_mode() {
        let entries = json!([
            {"originalId": "a", "sales": [{"billing": 2}]},
            {"originalId": "a", "sales": [{"billing": 3}]}
        ])
        .as_array()
        .cloned()
        .unwrap();
        let source = RecordingSource {
            outcome: FetchOutcome::Ok(entries),
            calls: Mutex::new(Vec::new()),
        };
        let shop = Shop::new("c1", "s1", "Shop");

        let raw = NodepointSpec::raw("sellers", "originalId");
        assert_eq!(
            get_nodepoint_counters(&source, &shop, &raw, &period()).await,
            NodepointCounters::Computed(Counters::new(2, 1.0, 0))
        );

        let aggregation = NodepointSpec::aggregation("sellers/sales", "billing", Some("sales"));
        assert_eq!(
            get_nodepoint_counters(&source, &shop, &aggregation, &period()).await,
            NodepointCounters::Computed(Counters::new(2, 5.0, 0))
        );
    }
}
