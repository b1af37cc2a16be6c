//! Tests for core types

#[cfg(test)]
mod tests {
    use super::super::types::*;

    #[test]
    fn test_side_serde_round_trip() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"SELL\"");
        let buy: Side = serde_json::from_str("\"BUY\"").unwrap();
        assert_eq!(buy, Side::Buy);
    }

    #[test]
    fn test_trade_event_accepts_string_numbers() {
        let json = r#"{
            "transactionHash": "0xdeadbeef",
            "timestamp": 1748779200,
            "side": "BUY",
            "size": "500.5",
            "usdcSize": 250.25,
            "price": "0.50",
            "title": "Some market",
            "slug": "some-market",
            "outcome": "Yes"
        }"#;
        let event: TradeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.transaction_hash, "0xdeadbeef");
        assert_eq!(event.size, 500.5);
        assert_eq!(event.usdc_size, 250.25);
        assert_eq!(event.price, 0.50);
    }

    #[test]
    fn test_trade_event_defaults_for_missing_fields() {
        let json = r#"{"transactionHash": "0x1", "side": "SELL"}"#;
        let event: TradeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.title, "Unknown");
        assert_eq!(event.outcome, "Unknown");
        assert_eq!(event.size, 0.0);
        assert_eq!(event.timestamp, 0);
    }

    #[test]
    fn test_api_position_current_value() {
        let json = r#"{"slug": "m", "outcome": "Yes", "size": 100, "currentValue": "55.5"}"#;
        let pos: ApiPosition = serde_json::from_str(json).unwrap();
        assert_eq!(pos.current_value, 55.5);
    }

    #[test]
    fn test_bet_from_event_normalizes_wallet() {
        let event = TradeEvent {
            transaction_hash: "0x1".to_string(),
            timestamp: 1748779200,
            side: Side::Buy,
            size: 100.0,
            usdc_size: 55.0,
            price: 0.55,
            title: "Market".to_string(),
            slug: "market".to_string(),
            outcome: "Yes".to_string(),
        };
        let bet = Bet::from_event(event, "0xABCDEF", "Whale", None);
        assert_eq!(bet.wallet_address, "0xabcdef");
        assert_eq!(bet.market_url(), "https://polymarket.com/event/market");
        assert_eq!(
            bet.position_key(),
            PositionKey::new("0xabcdef", "market", "YES")
        );
    }

    #[test]
    fn test_implied_odds() {
        let mut bet = Bet {
            transaction_hash: "0x1".to_string(),
            timestamp: 0,
            side: Side::Buy,
            shares: 100.0,
            usdc: 55.0,
            price: 0.25,
            market_title: "Market".to_string(),
            market_slug: "market".to_string(),
            outcome: "YES".to_string(),
            trader_name: "Whale".to_string(),
            wallet_address: "0xabc".to_string(),
            profile_url: None,
        };
        // Underdog prices map to positive American odds
        assert_eq!(bet.implied_odds(), "+300");
        bet.price = 0.80;
        assert_eq!(bet.implied_odds(), "-400");
        bet.price = 0.0;
        assert_eq!(bet.implied_odds(), "N/A");
        bet.price = 1.0;
        assert_eq!(bet.implied_odds(), "N/A");
    }

    #[test]
    fn test_position_key_encode_decode() {
        let key = PositionKey::new("0xABC", "Market-Slug", "yes");
        let encoded = key.encode();
        assert_eq!(encoded, r#"["0xabc","market-slug","YES"]"#);
        assert_eq!(PositionKey::decode(&encoded), Some(key));
    }

    #[test]
    fn test_position_key_decodes_python_tuple_repr() {
        let key = PositionKey::decode("('0xabc', 'market-slug', 'YES')").unwrap();
        assert_eq!(key, PositionKey::new("0xabc", "market-slug", "YES"));
        assert!(PositionKey::decode("('only', 'two')").is_none());
        assert!(PositionKey::decode("garbage").is_none());
        assert!(PositionKey::decode("('unterminated").is_none());
    }

    #[test]
    fn test_legacy_four_tuple_with_side() {
        let (key, side) =
            PositionKey::decode_legacy_with_side("('0xabc', 'market', 'YES', 'BUY')").unwrap();
        assert_eq!(key, PositionKey::new("0xabc", "market", "YES"));
        assert_eq!(side, Side::Buy);

        assert!(PositionKey::decode_legacy_with_side("('0xabc', 'market', 'YES')").is_none());
        assert!(
            PositionKey::decode_legacy_with_side("('0xabc', 'market', 'YES', 'HOLD')").is_none()
        );
    }
}
