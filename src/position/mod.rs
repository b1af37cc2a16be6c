//! Net position tracking across BUY/SELL trades
//!
//! One accumulator per (wallet, market, outcome). BUY adds shares and USDC,
//! SELL subtracts both; the sign of the USDC accumulator on a closed position
//! tells profit (negative: more cash out than in) from loss.

mod tests;

use crate::types::{PositionKey, Side};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a tracked position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    /// Open with at least one share outstanding
    Active,
    /// Closed with profit (net USDC below -$1)
    ProfitTaken,
    /// Closed with loss (net USDC above $1)
    LossRealized,
    /// Closed near break-even (within $1)
    Closed,
}

/// Signed net position for one key
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetPosition {
    /// Net shares (BUY adds, SELL subtracts)
    #[serde(default)]
    pub shares: f64,
    /// Net USDC invested (BUY adds, SELL subtracts)
    #[serde(default)]
    pub usdc: f64,
}

impl NetPosition {
    /// Fewer than one share outstanding counts as closed.
    pub fn is_closed(&self) -> bool {
        self.shares.abs() < 1.0
    }

    pub fn is_long(&self) -> bool {
        self.shares > 0.0
    }

    pub fn status(&self) -> PositionStatus {
        if !self.is_closed() {
            return PositionStatus::Active;
        }
        if self.usdc < -1.0 {
            PositionStatus::ProfitTaken
        } else if self.usdc > 1.0 {
            PositionStatus::LossRealized
        } else {
            PositionStatus::Closed
        }
    }

    /// Stake to display in messages (always positive)
    pub fn display_amount(&self) -> f64 {
        self.usdc.abs()
    }

    /// Realized P&L for closed positions; positive is profit.
    pub fn pnl(&self) -> f64 {
        if self.is_closed() {
            -self.usdc
        } else {
            0.0
        }
    }
}

/// Manages net positions and min_shares threshold flags
#[derive(Debug, Default)]
pub struct PositionTracker {
    positions: HashMap<PositionKey, NetPosition>,
    threshold_crossed: HashMap<PositionKey, bool>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a trade's signed delta, creating the position on first contact.
    /// Returns the post-update accumulator.
    pub fn update(&mut self, key: &PositionKey, side: Side, shares: f64, usdc: f64) -> NetPosition {
        let pos = self.positions.entry(key.clone()).or_default();
        match side {
            Side::Buy => {
                pos.shares += shares;
                pos.usdc += usdc;
            }
            Side::Sell => {
                pos.shares -= shares;
                pos.usdc -= usdc;
            }
        }
        *pos
    }

    pub fn get(&self, key: &PositionKey) -> Option<&NetPosition> {
        self.positions.get(key)
    }

    pub fn mark_threshold_crossed(&mut self, key: &PositionKey) {
        self.threshold_crossed.insert(key.clone(), true);
    }

    pub fn has_crossed_threshold(&self, key: &PositionKey) -> bool {
        self.threshold_crossed.get(key).copied().unwrap_or(false)
    }

    pub fn reset_threshold(&mut self, key: &PositionKey) {
        self.threshold_crossed.remove(key);
    }

    /// Drop positions and threshold flags whose key has no outstanding
    /// notification. Positions neither tracked nor updated are eventually
    /// forgotten this way.
    pub fn cleanup(&mut self, tracked_keys: &std::collections::HashSet<PositionKey>) -> usize {
        let before = self.positions.len() + self.threshold_crossed.len();
        self.positions.retain(|k, _| tracked_keys.contains(k));
        self.threshold_crossed.retain(|k, _| tracked_keys.contains(k));
        let removed = before - self.positions.len() - self.threshold_crossed.len();
        if removed > 0 {
            tracing::debug!("Cleaned up {} orphaned position entries", removed);
        }
        removed
    }

    pub fn export_positions(&self) -> HashMap<String, NetPosition> {
        self.positions
            .iter()
            .map(|(k, v)| (k.encode(), *v))
            .collect()
    }

    pub fn export_threshold_flags(&self) -> HashMap<String, bool> {
        self.threshold_crossed
            .iter()
            .map(|(k, v)| (k.encode(), *v))
            .collect()
    }

    /// Load persisted state. Malformed keys are skipped with a warning,
    /// never failing the whole load.
    pub fn load_from_persistence(
        &mut self,
        positions: &HashMap<String, NetPosition>,
        threshold_flags: &HashMap<String, bool>,
    ) {
        for (raw, pos) in positions {
            match PositionKey::decode(raw) {
                Some(key) => {
                    self.positions.insert(key, *pos);
                }
                None => tracing::warn!("Skipping malformed position key: {}", raw),
            }
        }
        for (raw, crossed) in threshold_flags {
            match PositionKey::decode(raw) {
                Some(key) => {
                    self.threshold_crossed.insert(key, *crossed);
                }
                None => tracing::warn!("Skipping malformed threshold key: {}", raw),
            }
        }
        if !self.positions.is_empty() {
            tracing::info!("Loaded {} net positions", self.positions.len());
        }
    }

    /// Migrate the legacy cumulative-shares format: 4-tuple keys
    /// (wallet, market, outcome, side) mapping to share counts. Only shares
    /// carry over; USDC is reconstructed as live trades arrive.
    pub fn migrate_legacy(&mut self, legacy_cumulative: &HashMap<String, f64>) {
        if legacy_cumulative.is_empty() {
            return;
        }
        tracing::info!("Migrating legacy cumulative_shares to net positions");
        let mut migrated = 0;
        for (raw, shares) in legacy_cumulative {
            match PositionKey::decode_legacy_with_side(raw) {
                Some((key, side)) => {
                    let pos = self.positions.entry(key).or_default();
                    match side {
                        Side::Buy => pos.shares += shares,
                        Side::Sell => pos.shares -= shares,
                    }
                    migrated += 1;
                }
                None => tracing::warn!("Skipping malformed legacy key: {}", raw),
            }
        }
        if migrated > 0 {
            tracing::info!("Migrated {} legacy position entries", migrated);
        }
    }
}
