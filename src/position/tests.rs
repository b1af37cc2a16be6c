//! Tests for net position tracking

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::types::{PositionKey, Side};
    use std::collections::{HashMap, HashSet};

    fn key() -> PositionKey {
        PositionKey::new("0xABC", "election-2028", "yes")
    }

    #[test]
    fn test_key_normalization() {
        let k = key();
        assert_eq!(k.wallet, "0xabc");
        assert_eq!(k.market, "election-2028");
        assert_eq!(k.outcome, "YES");
    }

    #[test]
    fn test_update_accumulates_signed_deltas() {
        let mut tracker = PositionTracker::new();
        let k = key();
        tracker.update(&k, Side::Buy, 500.0, 250.0);
        tracker.update(&k, Side::Buy, 50.0, 25.0);
        let pos = tracker.update(&k, Side::Sell, 100.0, 60.0);
        assert_eq!(pos.shares, 450.0);
        assert_eq!(pos.usdc, 215.0);
    }

    #[test]
    fn test_sum_independent_of_interleaving() {
        let trades = [
            (Side::Buy, 300.0, 150.0),
            (Side::Sell, 100.0, 55.0),
            (Side::Buy, 200.0, 90.0),
        ];
        let mut forward = PositionTracker::new();
        let mut reversed = PositionTracker::new();
        for &(side, s, u) in &trades {
            forward.update(&key(), side, s, u);
        }
        for &(side, s, u) in trades.iter().rev() {
            reversed.update(&key(), side, s, u);
        }
        assert_eq!(forward.get(&key()), reversed.get(&key()));
    }

    #[test]
    fn test_closed_boundary() {
        let open = NetPosition { shares: 1.0, usdc: 10.0 };
        assert!(!open.is_closed());
        assert_eq!(open.status(), PositionStatus::Active);

        let closed = NetPosition { shares: 0.99, usdc: 0.0 };
        assert!(closed.is_closed());
        assert_ne!(closed.status(), PositionStatus::Active);

        let short = NetPosition { shares: -5.0, usdc: -3.0 };
        assert!(!short.is_closed());
        assert!(!short.is_long());
    }

    #[test]
    fn test_closed_status_classification() {
        let profit = NetPosition { shares: 0.0, usdc: -25.0 };
        assert_eq!(profit.status(), PositionStatus::ProfitTaken);
        assert_eq!(profit.pnl(), 25.0);

        let loss = NetPosition { shares: 0.2, usdc: 40.0 };
        assert_eq!(loss.status(), PositionStatus::LossRealized);
        assert_eq!(loss.pnl(), -40.0);

        let breakeven = NetPosition { shares: 0.0, usdc: 0.5 };
        assert_eq!(breakeven.status(), PositionStatus::Closed);
    }

    #[test]
    fn test_pnl_zero_while_open() {
        let open = NetPosition { shares: 100.0, usdc: 50.0 };
        assert_eq!(open.pnl(), 0.0);
        assert_eq!(open.display_amount(), 50.0);
    }

    #[test]
    fn test_threshold_flags() {
        let mut tracker = PositionTracker::new();
        let k = key();
        assert!(!tracker.has_crossed_threshold(&k));
        tracker.mark_threshold_crossed(&k);
        assert!(tracker.has_crossed_threshold(&k));
        tracker.reset_threshold(&k);
        assert!(!tracker.has_crossed_threshold(&k));
    }

    #[test]
    fn test_cleanup_removes_untracked_keys() {
        let mut tracker = PositionTracker::new();
        let kept = PositionKey::new("0x1", "m1", "YES");
        let dropped = PositionKey::new("0x2", "m2", "NO");
        tracker.update(&kept, Side::Buy, 10.0, 5.0);
        tracker.update(&dropped, Side::Buy, 20.0, 8.0);
        tracker.mark_threshold_crossed(&dropped);

        let tracked: HashSet<PositionKey> = [kept.clone()].into_iter().collect();
        let removed = tracker.cleanup(&tracked);

        assert_eq!(removed, 2);
        assert!(tracker.get(&kept).is_some());
        assert!(tracker.get(&dropped).is_none());
        assert!(!tracker.has_crossed_threshold(&dropped));
    }

    #[test]
    fn test_persistence_round_trip() {
        let mut tracker = PositionTracker::new();
        let k1 = PositionKey::new("0x1", "market-a", "YES");
        let k2 = PositionKey::new("0x2", "market-b", "NO");
        tracker.update(&k1, Side::Buy, 500.0, 250.0);
        tracker.update(&k2, Side::Sell, 30.0, 12.0);
        tracker.mark_threshold_crossed(&k1);

        let positions = tracker.export_positions();
        let flags = tracker.export_threshold_flags();

        let mut fresh = PositionTracker::new();
        fresh.load_from_persistence(&positions, &flags);

        assert_eq!(fresh.get(&k1), tracker.get(&k1));
        assert_eq!(fresh.get(&k2), tracker.get(&k2));
        assert!(fresh.has_crossed_threshold(&k1));
        assert!(!fresh.has_crossed_threshold(&k2));
        assert_eq!(fresh.export_positions(), positions);
        assert_eq!(fresh.export_threshold_flags(), flags);
    }

    #[test]
    fn test_load_skips_malformed_keys() {
        let mut positions = HashMap::new();
        positions.insert(
            PositionKey::new("0x1", "m", "YES").encode(),
            NetPosition { shares: 5.0, usdc: 2.0 },
        );
        positions.insert("not a key".to_string(), NetPosition::default());

        let mut tracker = PositionTracker::new();
        tracker.load_from_persistence(&positions, &HashMap::new());
        assert_eq!(tracker.export_positions().len(), 1);
    }

    #[test]
    fn test_legacy_tuple_repr_keys_load() {
        let mut positions = HashMap::new();
        positions.insert(
            "('0xabc', 'market-x', 'YES')".to_string(),
            NetPosition { shares: 100.0, usdc: 40.0 },
        );
        let mut tracker = PositionTracker::new();
        tracker.load_from_persistence(&positions, &HashMap::new());
        let pos = tracker.get(&PositionKey::new("0xabc", "market-x", "YES"));
        assert_eq!(pos.map(|p| p.shares), Some(100.0));
    }

    #[test]
    fn test_migrate_legacy_cumulative_shares() {
        let mut legacy = HashMap::new();
        legacy.insert("('0xabc', 'market-x', 'YES', 'BUY')".to_string(), 800.0);
        legacy.insert("('0xabc', 'market-x', 'YES', 'SELL')".to_string(), 300.0);
        legacy.insert("garbage".to_string(), 42.0);

        let mut tracker = PositionTracker::new();
        tracker.migrate_legacy(&legacy);

        let pos = tracker
            .get(&PositionKey::new("0xabc", "market-x", "YES"))
            .copied()
            .unwrap();
        assert_eq!(pos.shares, 500.0);
        // USDC is not reconstructible from the legacy format
        assert_eq!(pos.usdc, 0.0);
    }
}
