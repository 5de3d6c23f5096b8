pub mod counter_fetcher;
pub mod http_fetcher;

pub use counter_fetcher::*;
pub use http_fetcher::*;

use async_trait::async_trait;

use crate::models::{FetchOutcome, Period, Shop};

/// Lists the shops reachable with the configured credentials.
#[async_trait]
pub trait ShopDirectory: Send + Sync {
    /// An empty list is a valid answer, including when the API could not be reached.
    async fn list_accessible_shops(&self) -> Vec<Shop>;
}

/// Retrieves the raw entries of one nodepoint for a shop and period.
#[async_trait]
pub trait EntriesSource: Send + Sync {
    async fn fetch_entries(&self, chain_id: &str, shop_id: &str, nodepoint: &str, period: &Period) -> FetchOutcome;
}
