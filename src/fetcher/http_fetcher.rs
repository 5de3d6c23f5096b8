use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};
use wreq::{Client, Response};
use wreq_util::Emulation;

use crate::config::{ApiConfig, ShopFilter};
use crate::fetcher::{EntriesSource, ShopDirectory};
use crate::models::{FetchOutcome, Period, Shop};

/// The only content type accepted from the analytics API.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// HTTP client of the retail analytics API.
pub struct HttpFetcher {
    client: Client,
    config: ApiConfig,
    filter: ShopFilter,
}

impl HttpFetcher {
    pub fn new(config: ApiConfig, filter: ShopFilter) -> Result<Self> {
        let client = Client::builder()
            .emulation(Emulation::Firefox136)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(HttpFetcher { client, config, filter })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        info!("Requesting: {}", url);

        let mut request = self.client.get(url);
        for (name, value) in self.config.request_headers() {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        check_response(&response)?;

        let body = response.text().await?;
        let value = serde_json::from_str(&body)?;
        Ok(value)
    }
}

fn check_response(response: &Response) -> Result<()> {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok());

    if response_is_ok(status, content_type) {
        Ok(())
    } else {
        Err(anyhow!(
            "Unexpected response: status {}, content type {:?}",
            status,
            content_type
        ))
    }
}

/// A response is usable when its status is 2xx and its body is UTF-8 JSON.
pub fn response_is_ok(status: u16, content_type: Option<&str>) -> bool {
    (200..300).contains(&status) && content_type == Some(JSON_CONTENT_TYPE)
}

/// Shops listed in an `accessible-resources` payload that pass the filter.
pub fn parse_accessible_shops(chains: &Value, filter: &ShopFilter) -> Vec<Shop> {
    let mut shops = Vec::new();

    let Some(chains) = chains.as_array() else {
        warn!("accessible-resources is not a list: {}", chains);
        return shops;
    };

    for chain in chains {
        let Some(chain_id) = chain.get("id").and_then(Value::as_str) else {
            warn!("chain_id not found in accessible-resources {}", chain);
            continue;
        };
        if !filter.allows_chain(chain_id) {
            continue;
        }

        let chain_shops = chain.get("shops").and_then(Value::as_array);
        for shop in chain_shops.into_iter().flatten() {
            let Some(shop_id) = shop.get("id").and_then(Value::as_str) else {
                warn!("shop_id not found in chain {}: {}", chain_id, shop);
                continue;
            };
            if !filter.allows_shop(shop_id) {
                continue;
            }
            let name = shop.get("name").and_then(Value::as_str).unwrap_or_default();
            shops.push(Shop::new(chain_id, shop_id, name));
        }
    }

    shops
}

#[async_trait]
impl ShopDirectory for HttpFetcher {
    async fn list_accessible_shops(&self) -> Vec<Shop> {
        let url = self.config.accessible_resources_url();
        info!("Loading shops from {}", url);

        match self.get_json(&url).await {
            Ok(chains) => {
                let shops = parse_accessible_shops(&chains, &self.filter);
                info!("Found {} accessible shops", shops.len());
                shops
            }
            Err(e) => {
                warn!("Failed to load accessible shops: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl EntriesSource for HttpFetcher {
    async fn fetch_entries(&self, chain_id: &str, shop_id: &str, nodepoint: &str, period: &Period) -> FetchOutcome {
        let url = self.config.nodepoint_url(chain_id, shop_id, nodepoint, period);

        match self.get_json(&url).await {
            Ok(Value::Array(entries)) => FetchOutcome::Ok(entries),
            Ok(other) => {
                warn!("Nodepoint {} did not return a list: {}", url, other);
                FetchOutcome::Error
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                FetchOutcome::Error
            }
        }
    }
}
