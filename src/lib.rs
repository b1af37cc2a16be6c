//! Copywatch — Polymarket copy-trading monitor
//!
//! Follows a set of wallets on Polymarket, folds their trades into net
//! positions, and mirrors the interesting ones into Telegram alerts.
//!
//! ## Architecture
//!
//! ```text
//! Data API poll → dedup → PositionTracker → MessageRouter → NotificationLedger
//!                                  ↑               ↓                ↓
//!                          PortfolioCache      format.rs       Telegram
//!                                  ↓
//!                             StateManager (debounced JSON persistence)
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod monitor;
pub mod notify;
pub mod portfolio;
pub mod position;
pub mod router;
pub mod state;
pub mod types;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod types_tests;
