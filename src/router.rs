//! Alert routing: decides what, if anything, to send for each trade
//!
//! Two gates run in order. `should_alert_position` is the coarse filter
//! (min_shares thresholds, closed-and-untracked suppression); `decide` is the
//! per-message state machine (NEW / UPDATE / STALE_ADDITION / CLOSE / SKIP).

use crate::notify::MessageState;
use crate::position::{NetPosition, PositionStatus};
use chrono::{DateTime, Utc};

/// Action to take for a trade alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// Don't send anything
    Skip,
    /// Send a new message
    New,
    /// Edit the existing message
    Update,
    /// Position grew but the message is too old to edit; send a fresh one
    StaleAddition,
    /// Position closed; send a close notification
    Close,
}

/// Routing decision with its reason code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    pub action: RouteAction,
    pub reason: &'static str,
    /// The portfolio fetch can be skipped when the decision cannot use it
    pub skip_portfolio_fetch: bool,
}

impl RouteDecision {
    fn new(action: RouteAction, reason: &'static str, skip_portfolio_fetch: bool) -> Self {
        Self {
            action,
            reason,
            skip_portfolio_fetch,
        }
    }
}

/// Stateless routing rules, configured once at startup
#[derive(Debug, Clone)]
pub struct MessageRouter {
    /// Minimum % stake change to warrant an update
    pub min_update_pct: f64,
    /// Minimum absolute $ change to warrant an update
    pub min_update_abs: f64,
    /// Message age beyond which edits become fresh messages
    pub stale_threshold_secs: i64,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self {
            min_update_pct: 5.0,
            min_update_abs: 100.0,
            stale_threshold_secs: 1800,
        }
    }
}

impl MessageRouter {
    pub fn new(min_update_pct: f64, min_update_abs: f64, stale_threshold_secs: i64) -> Self {
        Self {
            min_update_pct,
            min_update_abs,
            stale_threshold_secs,
        }
    }

    /// Coarse gate: should this trade reach `decide` at all?
    ///
    /// Tracked positions always pass (updates and closes must get through).
    /// Untracked closed positions never pass. A configured min_shares
    /// threshold suppresses until the net position first crosses it; the
    /// crossing itself is reported once as "threshold_crossed".
    pub fn should_alert_position(
        &self,
        net_pos: &NetPosition,
        min_shares: Option<i64>,
        is_tracked: bool,
        has_crossed_threshold: bool,
    ) -> (bool, &'static str) {
        if is_tracked {
            if net_pos.status() != PositionStatus::Active {
                return (true, "position_closed");
            }
            return (true, "position_update");
        }

        if net_pos.is_closed() {
            return (false, "closed_untracked");
        }

        if let Some(min) = min_shares {
            if net_pos.shares.abs() >= min as f64 {
                if !has_crossed_threshold {
                    return (true, "threshold_crossed");
                }
                return (true, "above_threshold");
            }
            return (false, "below_threshold");
        }

        (true, "no_threshold")
    }

    /// Decide what to do with a trade given the position and any prior
    /// notification state. Never returns Close without prior state: a close
    /// no one was told about is a skip.
    pub fn decide(
        &self,
        net_pos: &NetPosition,
        state: Option<&MessageState>,
        trade_time: DateTime<Utc>,
    ) -> RouteDecision {
        if net_pos.is_closed() {
            return match state {
                Some(_) => RouteDecision::new(RouteAction::Close, "position_closed", true),
                None => RouteDecision::new(RouteAction::Skip, "closed_untracked", true),
            };
        }

        let state = match state {
            Some(s) => s,
            None => return RouteDecision::new(RouteAction::New, "new_position", false),
        };

        let old_usdc = state.total_usdc;
        let new_usdc = net_pos.display_amount();

        if !self.is_significant_change(old_usdc, new_usdc) {
            return RouteDecision::new(RouteAction::Skip, "change_too_small", true);
        }

        let age = (trade_time - state.first_time).num_seconds();
        if age > self.stale_threshold_secs {
            return RouteDecision::new(RouteAction::StaleAddition, "stale_position", false);
        }

        RouteDecision::new(RouteAction::Update, "significant_change", false)
    }

    /// Either threshold firing triggers an update; both must fail to
    /// suppress. The OR guards both "large portfolio, tiny relative noise"
    /// and "small portfolio, large relative noise".
    fn is_significant_change(&self, old_usdc: f64, new_usdc: f64) -> bool {
        if old_usdc <= 0.0 {
            return true;
        }
        let change_abs = (new_usdc - old_usdc).abs();
        let change_pct = change_abs / old_usdc * 100.0;
        change_pct >= self.min_update_pct || change_abs >= self.min_update_abs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn state(total_usdc: f64, first_time: DateTime<Utc>) -> MessageState {
        MessageState {
            message_id: 42,
            total_usdc,
            first_time,
            update_count: 0,
            conviction_label: "MEDIUM".to_string(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_closed_untracked_skips() {
        let router = MessageRouter::default();
        let pos = NetPosition { shares: 0.0, usdc: -25.0 };
        let d = router.decide(&pos, None, t0());
        assert_eq!(d.action, RouteAction::Skip);
        assert_eq!(d.reason, "closed_untracked");
        assert!(d.skip_portfolio_fetch);
    }

    #[test]
    fn test_closed_tracked_closes() {
        let router = MessageRouter::default();
        let pos = NetPosition { shares: 0.3, usdc: 10.0 };
        let s = state(250.0, t0());
        let d = router.decide(&pos, Some(&s), t0());
        assert_eq!(d.action, RouteAction::Close);
    }

    #[test]
    fn test_new_exactly_once() {
        let router = MessageRouter::default();
        let pos = NetPosition { shares: 500.0, usdc: 250.0 };
        assert_eq!(router.decide(&pos, None, t0()).action, RouteAction::New);
        // Once state exists, New is never emitted again
        let s = state(250.0, t0());
        let d = router.decide(&pos, Some(&s), t0() + Duration::seconds(60));
        assert_ne!(d.action, RouteAction::New);
    }

    #[test]
    fn test_small_change_skipped_only_when_both_thresholds_fail() {
        let router = MessageRouter::default();
        let s = state(10_000.0, t0());

        // 1% and $100: absolute threshold fires even though pct does not
        let pos = NetPosition { shares: 5000.0, usdc: 10_100.0 };
        let d = router.decide(&pos, Some(&s), t0() + Duration::seconds(30));
        assert_eq!(d.action, RouteAction::Update);

        // 0.5% and $50: both fail
        let pos = NetPosition { shares: 5000.0, usdc: 10_050.0 };
        let d = router.decide(&pos, Some(&s), t0() + Duration::seconds(30));
        assert_eq!(d.action, RouteAction::Skip);
        assert_eq!(d.reason, "change_too_small");
    }

    #[test]
    fn test_pct_threshold_fires_on_small_portfolio() {
        let router = MessageRouter::default();
        let s = state(250.0, t0());
        // +$25 is 10% of $250: under $100 absolute but over 5% relative
        let pos = NetPosition { shares: 550.0, usdc: 275.0 };
        let d = router.decide(&pos, Some(&s), t0() + Duration::seconds(60));
        assert_eq!(d.action, RouteAction::Update);
        assert_eq!(d.reason, "significant_change");
    }

    #[test]
    fn test_stale_addition_after_threshold() {
        let router = MessageRouter::default();
        let s = state(250.0, t0());
        let pos = NetPosition { shares: 1100.0, usdc: 550.0 };

        let fresh = router.decide(&pos, Some(&s), t0() + Duration::seconds(1799));
        assert_eq!(fresh.action, RouteAction::Update);

        let stale = router.decide(&pos, Some(&s), t0() + Duration::seconds(1801));
        assert_eq!(stale.action, RouteAction::StaleAddition);
        assert_eq!(stale.reason, "stale_position");
    }

    #[test]
    fn test_should_alert_tracked_always_passes() {
        let router = MessageRouter::default();
        let open = NetPosition { shares: 500.0, usdc: 250.0 };
        assert_eq!(
            router.should_alert_position(&open, Some(1000), true, false),
            (true, "position_update")
        );
        let closed = NetPosition { shares: 0.0, usdc: -10.0 };
        assert_eq!(
            router.should_alert_position(&closed, None, true, false),
            (true, "position_closed")
        );
    }

    #[test]
    fn test_should_alert_threshold_sequence() {
        let router = MessageRouter::default();
        let min = Some(1000);

        let p1 = NetPosition { shares: 400.0, usdc: 200.0 };
        assert_eq!(
            router.should_alert_position(&p1, min, false, false),
            (false, "below_threshold")
        );

        let p2 = NetPosition { shares: 700.0, usdc: 350.0 };
        assert_eq!(
            router.should_alert_position(&p2, min, false, false),
            (false, "below_threshold")
        );

        let p3 = NetPosition { shares: 1200.0, usdc: 600.0 };
        assert_eq!(
            router.should_alert_position(&p3, min, false, false),
            (true, "threshold_crossed")
        );
        // Once the flag is persisted, later trades report above_threshold
        assert_eq!(
            router.should_alert_position(&p3, min, false, true),
            (true, "above_threshold")
        );
    }

    #[test]
    fn test_should_alert_no_threshold() {
        let router = MessageRouter::default();
        let pos = NetPosition { shares: 2.0, usdc: 1.0 };
        assert_eq!(
            router.should_alert_position(&pos, None, false, false),
            (true, "no_threshold")
        );
    }

    #[test]
    fn test_should_alert_closed_untracked() {
        let router = MessageRouter::default();
        let pos = NetPosition { shares: 0.5, usdc: 3.0 };
        assert_eq!(
            router.should_alert_position(&pos, None, false, false),
            (false, "closed_untracked")
        );
    }
}
