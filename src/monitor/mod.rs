//! Poll loop orchestrator
//!
//! Fetches recent trades for every followed wallet, deduplicates them against
//! a bounded per-wallet seen-set, folds them into net positions, and routes
//! the result through the alert pipeline. Fetches run concurrently; all state
//! mutation happens sequentially afterwards, on trades sorted by timestamp,
//! so interleaved fills across wallets are applied in market order.


use crate::client::DataClient;
use crate::config::Config;
use crate::error::Result;
use crate::format;
use crate::notify::{NotificationLedger, NotifyTransport, TelegramNotifier};
use crate::portfolio::PortfolioCache;
use crate::position::PositionTracker;
use crate::router::{MessageRouter, RouteAction};
use crate::state::{PersistedState, StateManager};
use crate::types::{Bet, TradeEvent};
use chrono::Utc;
use futures_util::{stream, StreamExt};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

const BASELINE_TRADE_LIMIT: usize = 100;
const POLL_TRADE_LIMIT: usize = 30;
const MAX_CONCURRENT_FETCHES: usize = 8;
const SEEN_CAPACITY: usize = 1000;
const CLEANUP_INTERVAL_SECS: u64 = 24 * 3600;
const LEDGER_MAX_AGE_SECS: i64 = 7 * 24 * 3600;

/// Per-wallet bounded FIFO of seen transaction hashes.
///
/// The feed is at-least-once; this makes processing at-most-once. The deque
/// preserves insertion order for eviction, the set makes lookups O(1).
#[derive(Debug, Default)]
pub struct SeenTransactions {
    capacity: usize,
    order: HashMap<String, VecDeque<String>>,
    index: HashMap<String, HashSet<String>>,
}

impl SeenTransactions {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: HashMap::new(),
            index: HashMap::new(),
        }
    }

    /// Record a hash. Returns false if it was already present. At capacity
    /// the oldest hash is evicted.
    pub fn insert(&mut self, wallet: &str, hash: &str) -> bool {
        let set = self.index.entry(wallet.to_string()).or_default();
        if !set.insert(hash.to_string()) {
            return false;
        }
        let queue = self.order.entry(wallet.to_string()).or_default();
        queue.push_back(hash.to_string());
        if queue.len() > self.capacity {
            if let Some(oldest) = queue.pop_front() {
                set.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, wallet: &str, hash: &str) -> bool {
        self.index
            .get(wallet)
            .map(|set| set.contains(hash))
            .unwrap_or(false)
    }

    pub fn len(&self, wallet: &str) -> usize {
        self.order.get(wallet).map(|q| q.len()).unwrap_or(0)
    }

    /// Oldest-first per wallet, matching the insert order expected by `load`.
    pub fn export(&self) -> HashMap<String, Vec<String>> {
        self.order
            .iter()
            .map(|(wallet, queue)| (wallet.clone(), queue.iter().cloned().collect()))
            .collect()
    }

    pub fn load(&mut self, persisted: &HashMap<String, Vec<String>>) {
        for (wallet, hashes) in persisted {
            for hash in hashes {
                self.insert(wallet, hash);
            }
        }
    }
}

/// The monitor process: owns every stateful component and drives the loop
pub struct Monitor {
    config: Config,
    client: DataClient,
    router: MessageRouter,
    tracker: PositionTracker,
    portfolio: PortfolioCache,
    ledger: NotificationLedger,
    state: StateManager,
    seen: SeenTransactions,
    alerts_sent: u64,
    started: Instant,
    last_cleanup: Instant,
}

impl Monitor {
    pub fn new(config: Config) -> Result<Self> {
        let transport: Option<Arc<dyn NotifyTransport>> = match &config.telegram {
            Some(tg) => Some(Arc::new(TelegramNotifier::new(tg)?)),
            None => None,
        };
        Self::with_transport(config, transport)
    }

    /// Build with an explicit transport; the seam tests use.
    pub fn with_transport(
        config: Config,
        transport: Option<Arc<dyn NotifyTransport>>,
    ) -> Result<Self> {
        let client = DataClient::new(&config.data_api)?;
        let router = MessageRouter::new(
            config.thresholds.min_update_pct,
            config.thresholds.min_update_abs,
            config.thresholds.stale_threshold_secs,
        );
        let portfolio = PortfolioCache::new(client.clone(), &config.thresholds);
        let ledger = NotificationLedger::new(transport);
        let state = StateManager::new(
            config.state_file.clone(),
            config.thresholds.debounce_secs.max(0) as u64,
        );

        let mut monitor = Self {
            config,
            client,
            router,
            tracker: PositionTracker::new(),
            portfolio,
            ledger,
            state,
            seen: SeenTransactions::new(SEEN_CAPACITY),
            alerts_sent: 0,
            started: Instant::now(),
            last_cleanup: Instant::now(),
        };
        monitor.restore();
        Ok(monitor)
    }

    /// Load persisted state into each component, migrating legacy formats.
    fn restore(&mut self) {
        let persisted = self.state.load();
        if !persisted.cumulative_shares.is_empty() {
            self.tracker.migrate_legacy(&persisted.cumulative_shares);
            self.state.mark_dirty();
        }
        self.tracker
            .load_from_persistence(&persisted.net_positions, &persisted.threshold_crossed);
        self.ledger
            .load_from_persistence(&persisted.telegram_messages);
        self.portfolio
            .load_from_persistence(&persisted.portfolio_cache);
        self.seen.load(&persisted.seen_transactions);
    }

    /// Run until ctrl-c or SIGTERM.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            wallets = self.config.wallets.len(),
            interval = self.config.poll_interval_secs,
            "monitor starting"
        );
        self.ledger
            .send_plain(&format::format_startup(
                &self.config.wallets,
                self.config.poll_interval_secs,
            ))
            .await;

        self.seed_baseline().await;

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        #[cfg(unix)]
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        loop {
            #[cfg(unix)]
            let terminate = sigterm.recv();
            #[cfg(not(unix))]
            let terminate = std::future::pending::<Option<()>>();

            tokio::select! {
                _ = interval.tick() => {
                    self.poll_cycle().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("ctrl-c received; shutting down");
                    break;
                }
                _ = terminate => {
                    tracing::info!("SIGTERM received; shutting down");
                    break;
                }
            }
        }

        self.shutdown().await
    }

    /// Seed the seen-set with each wallet's recent history so a restart does
    /// not replay old trades as fresh alerts.
    async fn seed_baseline(&mut self) {
        let fetched = self.fetch_all(BASELINE_TRADE_LIMIT).await;
        let mut seeded = 0usize;
        for (wallet, result) in fetched {
            match result {
                Ok(events) => {
                    for event in &events {
                        if self.seen.insert(&wallet, &event.transaction_hash) {
                            seeded += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(wallet = %wallet, error = %e, "baseline fetch failed");
                }
            }
        }
        tracing::info!(seeded, "baseline seeding complete");
    }

    /// One full cycle: fetch, order, process, housekeeping.
    pub async fn poll_cycle(&mut self) {
        let fetched = self.fetch_all(POLL_TRADE_LIMIT).await;

        let mut bets: Vec<Bet> = Vec::new();
        for (wallet, result) in fetched {
            let events = match result {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(wallet = %wallet, error = %e, "trade fetch failed");
                    continue;
                }
            };
            let Some(wallet_cfg) = self
                .config
                .wallets
                .iter()
                .find(|w| w.address.eq_ignore_ascii_case(&wallet))
            else {
                continue;
            };
            for event in events {
                if self.seen.contains(&wallet, &event.transaction_hash) {
                    continue;
                }
                bets.push(Bet::from_event(
                    event,
                    &wallet_cfg.address,
                    &wallet_cfg.name,
                    wallet_cfg.profile_url.clone(),
                ));
            }
        }

        // Global market order across wallets
        bets.sort_by_key(|b| b.timestamp);

        for bet in bets {
            self.process_bet(&bet).await;
        }

        self.housekeeping();

        if self.state.should_save() {
            if let Err(e) = self.state.save(&self.snapshot(), false) {
                tracing::error!(error = %e, "state save failed");
            }
        }
    }

    /// Concurrent fetch-only phase; no shared state is touched.
    async fn fetch_all(&self, limit: usize) -> Vec<(String, Result<Vec<TradeEvent>>)> {
        let wallets: Vec<String> = self
            .config
            .wallets
            .iter()
            .map(|w| w.address.clone())
            .collect();
        let concurrency = MAX_CONCURRENT_FETCHES.min(wallets.len().max(1));
        let client = &self.client;

        stream::iter(wallets)
            .map(|wallet| async move {
                let result = client.recent_trades(&wallet, limit).await;
                (wallet, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    /// The sequential pipeline for one new trade.
    async fn process_bet(&mut self, bet: &Bet) {
        if !self.seen.insert(&bet.wallet_address, &bet.transaction_hash) {
            return;
        }
        self.state.mark_dirty();

        let key = bet.position_key();
        let net = self.tracker.update(&key, bet.side, bet.shares, bet.usdc);
        tracing::debug!(
            %key, side = %bet.side, shares = bet.shares, usdc = bet.usdc,
            net_shares = net.shares, net_usdc = net.usdc, "trade applied"
        );

        let is_tracked = self.ledger.is_tracked(&key);
        let min_shares = self.config.min_shares_for(&bet.wallet_address);
        let has_crossed = self.tracker.has_crossed_threshold(&key);

        let (should_alert, gate_reason) =
            self.router
                .should_alert_position(&net, min_shares, is_tracked, has_crossed);
        if gate_reason == "threshold_crossed" {
            tracing::info!(%key, min_shares = ?min_shares, "share threshold crossed");
            self.tracker.mark_threshold_crossed(&key);
        }
        if !should_alert {
            tracing::debug!(%key, reason = gate_reason, "alert suppressed");
            return;
        }

        // A bet this large relative to the cached portfolio means the cached
        // value is probably stale
        if self
            .portfolio
            .should_invalidate_for_bet(&bet.wallet_address, bet.usdc)
        {
            self.portfolio.invalidate(&bet.wallet_address);
        }

        let prior = self.ledger.get_state(&key);
        let decision = self.router.decide(&net, prior.as_ref(), bet.time());
        tracing::debug!(%key, action = ?decision.action, reason = decision.reason, "routed");

        let conviction = if decision.skip_portfolio_fetch {
            None
        } else {
            let last_label = prior
                .as_ref()
                .map(|s| s.conviction_label.clone())
                .unwrap_or_default();
            self.portfolio
                .get_value(&bet.wallet_address)
                .await
                .map(|value| {
                    self.portfolio
                        .calculate_conviction(net.display_amount(), value, &last_label)
                })
        };
        // A failed portfolio fetch must not erase the hysteresis anchor:
        // keep the last stored label when there is no fresh conviction
        let label = match conviction {
            Some(c) => c.label.to_string(),
            None => prior
                .as_ref()
                .map(|s| s.conviction_label.clone())
                .unwrap_or_default(),
        };

        let outcome = match decision.action {
            RouteAction::Skip => Ok(()),
            RouteAction::New => {
                let text = format::format_new_position(bet, &net, conviction.as_ref());
                self.alerts_sent += 1;
                self.ledger
                    .send_and_track(&key, &text, net.display_amount(), bet.time(), &label)
                    .await
            }
            RouteAction::Update => match prior.as_ref() {
                Some(prior) => {
                    let text = format::format_position_update(
                        bet,
                        &net,
                        prior.first_time,
                        prior.update_count + 1,
                        conviction.as_ref(),
                    );
                    self.alerts_sent += 1;
                    self.ledger
                        .update_and_track(&key, &text, net.display_amount(), bet.time(), &label)
                        .await
                }
                None => Ok(()),
            },
            RouteAction::StaleAddition => match prior.as_ref() {
                Some(prior) => {
                    let text = format::format_stale_addition(
                        bet,
                        &net,
                        prior.first_time,
                        prior.total_usdc,
                        conviction.as_ref(),
                        Utc::now(),
                    );
                    self.alerts_sent += 1;
                    // Fresh message, fresh staleness clock
                    self.ledger
                        .send_and_track(&key, &text, net.display_amount(), bet.time(), &label)
                        .await
                }
                None => Ok(()),
            },
            RouteAction::Close => match prior.as_ref() {
                Some(prior) => {
                    let text = format::format_position_close(bet, &net, prior.total_usdc);
                    self.alerts_sent += 1;
                    let result = self.ledger.close_and_untrack(&key, &text).await;
                    self.tracker.reset_threshold(&key);
                    result
                }
                None => Ok(()),
            },
        };

        if let Err(e) = outcome {
            tracing::error!(%key, error = %e, "alert delivery failed");
        }
    }

    /// Periodic GC: expire old ledger entries, then drop positions with no
    /// outstanding message.
    fn housekeeping(&mut self) {
        if self.last_cleanup.elapsed() < Duration::from_secs(CLEANUP_INTERVAL_SECS) {
            return;
        }
        self.last_cleanup = Instant::now();
        let expired = self.ledger.cleanup_older_than(LEDGER_MAX_AGE_SECS);
        let removed = self.tracker.cleanup(&self.ledger.tracked_keys());
        if expired > 0 || removed > 0 {
            self.state.mark_dirty();
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        let uptime = self.started.elapsed().as_secs() as i64;
        self.ledger
            .send_plain(&format::format_shutdown(uptime, self.alerts_sent))
            .await;
        self.state.force_save(&self.snapshot())?;
        tracing::info!(uptime, alerts = self.alerts_sent, "monitor stopped");
        Ok(())
    }

    fn snapshot(&self) -> PersistedState {
        PersistedState {
            telegram_messages: self.ledger.export_for_persistence(),
            portfolio_cache: self.portfolio.export_for_persistence(),
            net_positions: self.tracker.export_positions(),
            threshold_crossed: self.tracker.export_threshold_flags(),
            seen_transactions: self.seen.export(),
            cumulative_shares: HashMap::new(),
        }
    }

    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent
    }
}
