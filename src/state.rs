//! Debounced, atomic persistence of monitor state
//!
//! All durable state lives in one JSON file. Writes go through a temp file
//! and a rename so a crash mid-write never leaves a truncated file, and are
//! debounced so a burst of trades costs at most one write per window. The
//! shutdown path bypasses the debounce.

use crate::error::Result;
use crate::notify::MessageState;
use crate::portfolio::CacheEntry;
use crate::position::NetPosition;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Everything that survives a restart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub telegram_messages: HashMap<String, MessageState>,
    #[serde(default)]
    pub portfolio_cache: HashMap<String, CacheEntry>,
    #[serde(default)]
    pub net_positions: HashMap<String, NetPosition>,
    #[serde(default)]
    pub threshold_crossed: HashMap<String, bool>,
    /// Per-wallet transaction hashes, oldest first
    #[serde(default)]
    pub seen_transactions: HashMap<String, Vec<String>>,
    /// Legacy per-(key,side) share totals; read once for migration, never
    /// written back.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cumulative_shares: HashMap<String, f64>,
}

struct SaveClock {
    last_save: Option<Instant>,
    dirty: bool,
}

/// Owns the state file path and the debounce window
pub struct StateManager {
    path: PathBuf,
    debounce: Duration,
    clock: Mutex<SaveClock>,
}

impl StateManager {
    pub fn new(path: impl Into<PathBuf>, debounce_secs: u64) -> Self {
        Self {
            path: path.into(),
            debounce: Duration::from_secs(debounce_secs),
            clock: Mutex::new(SaveClock {
                last_save: None,
                dirty: false,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted state. A missing or corrupt file is a fresh start,
    /// never an error.
    pub fn load(&self) -> PersistedState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No state file at {}; starting fresh", self.path.display());
                return PersistedState::default();
            }
            Err(e) => {
                tracing::warn!("Failed to read state file: {}; starting fresh", e);
                return PersistedState::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => {
                tracing::info!("Loaded state from {}", self.path.display());
                state
            }
            Err(e) => {
                tracing::warn!("State file corrupt ({}); starting fresh", e);
                PersistedState::default()
            }
        }
    }

    /// Write state if forced or the debounce window has elapsed. Returns
    /// whether a write happened; a suppressed write leaves the state dirty
    /// so a later `should_save` picks it up.
    pub fn save(&self, state: &PersistedState, force: bool) -> Result<bool> {
        {
            let mut clock = self.clock.lock();
            let elapsed_ok = clock
                .last_save
                .map(|t| t.elapsed() >= self.debounce)
                .unwrap_or(true);
            if !force && !elapsed_ok {
                clock.dirty = true;
                return Ok(false);
            }
        }

        self.write_atomic(state)?;

        let mut clock = self.clock.lock();
        clock.last_save = Some(Instant::now());
        clock.dirty = false;
        tracing::debug!("State saved to {}", self.path.display());
        Ok(true)
    }

    /// Unconditional write, for the shutdown path.
    pub fn force_save(&self, state: &PersistedState) -> Result<()> {
        self.save(state, true).map(|_| ())
    }

    pub fn mark_dirty(&self) {
        self.clock.lock().dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.clock.lock().dirty
    }

    /// Dirty and out of the debounce window
    pub fn should_save(&self) -> bool {
        let clock = self.clock.lock();
        clock.dirty
            && clock
                .last_save
                .map(|t| t.elapsed() >= self.debounce)
                .unwrap_or(true)
    }

    fn write_atomic(&self, state: &PersistedState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
