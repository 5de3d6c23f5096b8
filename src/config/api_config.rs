use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

use crate::models::Period;

const DEFAULT_TOKEN_VAR: &str = "SHOPSTATS_API_TOKEN";

/// Connection parameters of the analytics API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    /// Environment variable holding the token; overrides `auth_token` when set.
    pub env_auth_token: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_concurrent_requests() -> usize {
    1
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        ApiConfig {
            base_url: base_url.to_string(),
            auth_token: None,
            env_auth_token: None,
            headers: HashMap::new(),
            timeout_seconds: default_timeout_seconds(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }

    /// Pick up the token from the environment, if present.
    pub fn load_credentials(&mut self) {
        let token_var = self.env_auth_token.as_deref().unwrap_or(DEFAULT_TOKEN_VAR);
        if let Ok(token) = env::var(token_var) {
            if !token.trim().is_empty() {
                self.auth_token = Some(token);
            }
        }
    }

    /// Every header sent with API requests, including `Authorization` when a token is loaded.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.sort();
        if let Some(token) = &self.auth_token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        headers
    }

    pub fn accessible_resources_url(&self) -> String {
        format!("{}/user/accessible-resources", self.base_url.trim_end_matches('/'))
    }

    pub fn nodepoint_url(&self, chain_id: &str, shop_id: &str, nodepoint: &str, period: &Period) -> String {
        format!(
            "{}/chains/{}/shops/{}/{}?{}",
            self.base_url.trim_end_matches('/'),
            chain_id,
            shop_id,
            nodepoint,
            period.query_string()
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("API base_url cannot be empty"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow!("max_concurrent_requests must be at least 1"));
        }
        Ok(())
    }
}
