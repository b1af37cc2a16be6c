//! Data API client
//!
//! Read-only access to the Polymarket Data API: per-wallet trade activity and
//! open positions. Requests carry a fixed timeout and a bounded linear-backoff
//! retry; a failed wallet fetch surfaces as an error the poll loop logs and
//! moves past.

use crate::config::DataApiConfig;
use crate::error::{MonitorError, Result};
use crate::types::{ApiPosition, TradeEvent};
use reqwest::Client;
use std::time::Duration;

/// Client for the public Data API
#[derive(Clone)]
pub struct DataClient {
    http: Client,
    base_url: String,
    max_retries: u32,
}

impl DataClient {
    pub fn new(config: &DataApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// Recent trade executions for a wallet, newest first.
    pub async fn recent_trades(&self, wallet: &str, limit: usize) -> Result<Vec<TradeEvent>> {
        let url = format!("{}/trades", self.base_url);
        let limit = limit.to_string();
        let params = [("user", wallet), ("limit", &limit)];
        self.get_with_retry(&url, &params).await
    }

    /// Open positions for a wallet.
    pub async fn positions(&self, wallet: &str) -> Result<Vec<ApiPosition>> {
        let url = format!("{}/positions", self.base_url);
        let params = [("user", wallet)];
        self.get_with_retry(&url, &params).await
    }

    /// Sum of the wallet's open position values. None for an empty portfolio;
    /// a zero sum is never treated as a real value.
    pub async fn portfolio_value(&self, wallet: &str) -> Result<Option<f64>> {
        let positions = self.positions(wallet).await?;
        let total: f64 = positions.iter().map(|p| p.current_value).sum();
        Ok((total > 0.0).then_some(total))
    }

    async fn get_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let mut last_err: Option<MonitorError> = None;

        for attempt in 1..=self.max_retries {
            match self.http.get(url).query(params).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.json::<T>().await?);
                    }
                    // Retry 429 and 5xx, fail fast on other statuses
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(MonitorError::DataApi(format!("HTTP {}", status)));
                    } else {
                        return Err(MonitorError::DataApi(format!("HTTP {} from {}", status, url)));
                    }
                }
                Err(e) => {
                    last_err = Some(e.into());
                }
            }

            if attempt < self.max_retries {
                tracing::debug!("Retrying {} (attempt {}/{})", url, attempt, self.max_retries);
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| MonitorError::DataApi("request failed".into())))
    }
}
