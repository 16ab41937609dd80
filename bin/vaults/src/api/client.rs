//! HTTP client for a running vaults API.

use super::types::InvalidateResponse;
use crate::cache::Refresher;
use async_trait::async_trait;
use eyre::{Context, Result};
use reqwest::Client;
use std::time::Duration;

pub struct VaultsApiClient {
    client: Client,
    base_url: String,
}

impl VaultsApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the server to drop its cached vault data
    pub async fn invalidate_cache(&self) -> Result<InvalidateResponse> {
        let url = format!("{}/cache/invalidate", self.base_url);
        tracing::debug!("POST {}", url);

        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            eyre::bail!("Cache invalidation returned {}", response.status());
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Refresher for VaultsApiClient {
    async fn refresh(&self) -> bool {
        match self.invalidate_cache().await {
            Ok(response) => response.success,
            Err(e) => {
                tracing::warn!("Failed to invalidate vault cache at {}: {:?}", self.base_url, e);
                false
            }
        }
    }
}
