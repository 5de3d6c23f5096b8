use futures::stream::{self, StreamExt};
use tracing::info;

use crate::fetcher::{EntriesSource, ShopDirectory, get_nodepoint_counters};
use crate::models::{NodepointSpec, Period, Shop};
use crate::processor::stats_table::{CellGroup, ShopStatsTable};

/// Builds the stats table of every accessible shop over the configured periods.
pub struct TableAssembler<'a> {
    directory: &'a dyn ShopDirectory,
    source: &'a dyn EntriesSource,
    specs: Vec<NodepointSpec>,
    periods: Vec<Period>,
    max_concurrent_requests: usize,
}

impl<'a> TableAssembler<'a> {
    pub fn new(
        directory: &'a dyn ShopDirectory,
        source: &'a dyn EntriesSource,
        specs: Vec<NodepointSpec>,
        periods: Vec<Period>,
    ) -> Self {
        TableAssembler {
            directory,
            source,
            specs,
            periods,
            max_concurrent_requests: 1,
        }
    }

    /// Allow up to `limit` nodepoint requests of the same shop in flight.
    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }

    /// One row per shop × period, three counter columns per nodepoint.
    ///
    /// Fetch failures leave the affected cells missing; nothing here fails.
    pub async fn generate_table(&self) -> ShopStatsTable {
        let shops = self.directory.list_accessible_shops().await;
        if shops.is_empty() {
            info!("No accessible shops found, the stats table will be empty");
        }

        let mut table = ShopStatsTable::new(&shops, &self.periods, &self.specs);

        for shop in &shops {
            let shop_table = self.populate_shop(shop).await;
            table.combine_first(&shop_table);
        }

        table
    }

    /// Counters of a single shop, in a table holding only that shop's rows.
    async fn populate_shop(&self, shop: &Shop) -> ShopStatsTable {
        info!("Populating counters of shop {} ({})", shop.shop_id, shop.name);

        let mut shop_table = ShopStatsTable::new(std::slice::from_ref(shop), &self.periods, &self.specs);

        let source = self.source;
        let specs = &self.specs;

        // period outer, nodepoint inner
        let requests = self
            .periods
            .iter()
            .flat_map(move |period| specs.iter().map(move |spec| (period, spec)));

        let groups: Vec<CellGroup> = stream::iter(requests)
            .map(move |(period, spec)| async move {
                let counters = get_nodepoint_counters(source, shop, spec, period).await;
                CellGroup::new(&shop.shop_id, period, spec, counters)
            })
            .buffered(self.max_concurrent_requests)
            .collect()
            .await;

        let missing = groups.iter().filter(|g| g.counters.is_missing()).count();
        for group in &groups {
            shop_table.merge(group);
        }

        info!(
            "Shop {}: {} nodepoint counters computed, {} unavailable",
            shop.shop_id,
            groups.len() - missing,
            missing
        );

        shop_table
    }
}
