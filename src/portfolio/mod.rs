//! Portfolio value cache and conviction tiers
//!
//! Caches each wallet's aggregate open-position value with a TTL, invalidates
//! early when a single bet is large relative to the cached value, and buckets
//! bet size as a percentage of portfolio into conviction tiers with a
//! hysteresis deadband so labels don't flap at tier boundaries.


use crate::client::DataClient;
use crate::config::Thresholds;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const LABEL_EXTREME: &str = "EXTREME";
pub const LABEL_HIGH: &str = "HIGH";
pub const LABEL_MEDIUM: &str = "MEDIUM";
pub const LABEL_LOW: &str = "LOW";
pub const LABEL_MINIMAL: &str = "MINIMAL";
pub const LABEL_UNKNOWN: &str = "UNKNOWN";

/// Cached portfolio value for one wallet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: f64,
    /// Unix seconds at fetch time
    pub fetched_at: i64,
}

/// Conviction bucket for a single bet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conviction {
    pub label: &'static str,
    /// Bet size as % of portfolio (0.0 when the portfolio is unknown)
    pub pct: f64,
}

/// TTL-bounded portfolio value cache
///
/// The mutex only guards map access; network fetches happen outside it.
pub struct PortfolioCache {
    client: DataClient,
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl_secs: i64,
    invalidation_threshold: f64,
    extreme_pct: f64,
    high_pct: f64,
    medium_pct: f64,
    low_pct: f64,
    hysteresis_pct: f64,
}

impl PortfolioCache {
    pub fn new(client: DataClient, thresholds: &Thresholds) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
            ttl_secs: thresholds.cache_ttl_secs,
            invalidation_threshold: thresholds.invalidation_threshold,
            extreme_pct: thresholds.conviction_extreme_pct,
            high_pct: thresholds.conviction_high_pct,
            medium_pct: thresholds.conviction_medium_pct,
            low_pct: thresholds.conviction_low_pct,
            hysteresis_pct: thresholds.conviction_hysteresis_pct,
        }
    }

    /// Cached value if fresh, otherwise fetched from the positions endpoint.
    /// None on fetch failure or an empty portfolio; neither is cached, so the
    /// next trade retries.
    pub async fn get_value(&self, wallet: &str) -> Option<f64> {
        let now = Utc::now().timestamp();

        if let Some(entry) = self.cache.lock().get(wallet) {
            let age = now - entry.fetched_at;
            if age < self.ttl_secs {
                tracing::debug!(wallet, age, "portfolio cache hit");
                return Some(entry.value);
            }
        }

        let value = match self.client.portfolio_value(wallet).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(wallet, error = %e, "portfolio fetch failed");
                None
            }
        };

        if let Some(value) = value {
            self.cache
                .lock()
                .insert(wallet.to_string(), CacheEntry { value, fetched_at: now });
        }

        value
    }

    pub fn invalidate(&self, wallet: &str) {
        if self.cache.lock().remove(wallet).is_some() {
            tracing::debug!(wallet, "portfolio cache invalidated");
        }
    }

    /// True iff a cached entry exists and the bet exceeds the configured
    /// fraction of it. A bet that large means the cached estimate is suspect.
    pub fn should_invalidate_for_bet(&self, wallet: &str, bet_usdc: f64) -> bool {
        match self.cache.lock().get(wallet) {
            Some(entry) if entry.value > 0.0 => {
                bet_usdc / entry.value > self.invalidation_threshold
            }
            _ => false,
        }
    }

    /// Bucket a bet into a conviction tier. Entering a new tier requires
    /// clearing its threshold plus the hysteresis margin; a percentage that
    /// lands within the deadband of the previous label's own threshold keeps
    /// the previous label.
    pub fn calculate_conviction(
        &self,
        bet_usdc: f64,
        portfolio_value: f64,
        last_label: &str,
    ) -> Conviction {
        if portfolio_value <= 0.0 {
            return Conviction { label: LABEL_UNKNOWN, pct: 0.0 };
        }

        let pct = bet_usdc / portfolio_value * 100.0;

        let mut label = if pct >= self.extreme_pct + self.hysteresis_pct {
            LABEL_EXTREME
        } else if pct >= self.high_pct + self.hysteresis_pct {
            LABEL_HIGH
        } else if pct >= self.medium_pct + self.hysteresis_pct {
            LABEL_MEDIUM
        } else if pct >= self.low_pct + self.hysteresis_pct {
            LABEL_LOW
        } else {
            LABEL_MINIMAL
        };

        if !last_label.is_empty() && last_label != LABEL_UNKNOWN {
            let sticky = match last_label {
                LABEL_EXTREME => Some((LABEL_EXTREME, self.extreme_pct)),
                LABEL_HIGH => Some((LABEL_HIGH, self.high_pct)),
                LABEL_MEDIUM => Some((LABEL_MEDIUM, self.medium_pct)),
                LABEL_LOW => Some((LABEL_LOW, self.low_pct)),
                LABEL_MINIMAL => Some((LABEL_MINIMAL, 0.0)),
                _ => None,
            };
            if let Some((old_label, threshold)) = sticky {
                if (pct - threshold).abs() <= self.hysteresis_pct {
                    label = old_label;
                }
            }
        }

        Conviction { label, pct }
    }

    /// Entries still within TTL, keyed by wallet.
    pub fn export_for_persistence(&self) -> HashMap<String, CacheEntry> {
        let now = Utc::now().timestamp();
        self.cache
            .lock()
            .iter()
            .filter(|(_, e)| now - e.fetched_at < self.ttl_secs)
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Replace the cache with persisted entries, dropping any past TTL.
    pub fn load_from_persistence(&self, entries: &HashMap<String, CacheEntry>) {
        let now = Utc::now().timestamp();
        let mut cache = self.cache.lock();
        cache.clear();
        for (wallet, entry) in entries {
            if now - entry.fetched_at < self.ttl_secs {
                cache.insert(wallet.clone(), *entry);
            }
        }
        if !cache.is_empty() {
            tracing::info!("Loaded {} portfolio cache entries", cache.len());
        }
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, wallet: &str, value: f64, fetched_at: i64) {
        self.cache
            .lock()
            .insert(wallet.to_string(), CacheEntry { value, fetched_at });
    }

    #[cfg(test)]
    pub(crate) fn cached(&self, wallet: &str) -> Option<CacheEntry> {
        self.cache.lock().get(wallet).copied()
    }
}
