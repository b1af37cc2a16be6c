//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;

    const ADDR: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn minimal_toml() -> String {
        format!(
            r#"
[[wallets]]
address = "{ADDR}"
name = "Whale"
"#
        )
    }

    #[test]
    fn test_thresholds_defaults() {
        let t: Thresholds = toml::from_str("").unwrap();
        assert_eq!(t.min_update_pct, 5.0);
        assert_eq!(t.min_update_abs, 100.0);
        assert_eq!(t.stale_threshold_secs, 1800);
        assert_eq!(t.cache_ttl_secs, 3600);
        assert_eq!(t.invalidation_threshold, 0.10);
        assert_eq!(t.conviction_extreme_pct, 10.0);
        assert_eq!(t.conviction_high_pct, 5.0);
        assert_eq!(t.conviction_medium_pct, 2.0);
        assert_eq!(t.conviction_low_pct, 0.5);
        assert_eq!(t.conviction_hysteresis_pct, 0.2);
        assert_eq!(t.debounce_secs, 10);
    }

    #[test]
    fn test_data_api_defaults() {
        let d: DataApiConfig = toml::from_str("").unwrap();
        assert_eq!(d.base_url, "https://data-api.polymarket.com");
        assert_eq!(d.timeout_secs, 10);
        assert_eq!(d.max_retries, 3);
    }

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(&minimal_toml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.wallets.len(), 1);
        assert_eq!(config.wallets[0].name, "Whale");
        assert!(config.wallets[0].min_shares.is_none());
        assert!(config.telegram.is_none());
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.state_file, "copywatch_state.json");
    }

    #[test]
    fn test_full_config_parses() {
        let toml_str = format!(
            r#"
poll_interval_secs = 15
state_file = "/tmp/state.json"

[[wallets]]
address = "{ADDR}"
name = "Whale"
min_shares = 1000
profile_url = "https://polymarket.com/profile/{ADDR}"

[telegram]
bot_token = "123:abc"
chat_id = "-100200300"

[thresholds]
min_update_pct = 10.0
stale_threshold_secs = 900
"#
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.wallets[0].min_shares, Some(1000));
        assert_eq!(config.telegram.as_ref().unwrap().chat_id, "-100200300");
        assert_eq!(config.thresholds.min_update_pct, 10.0);
        assert_eq!(config.thresholds.stale_threshold_secs, 900);
        // Untouched fields keep their defaults
        assert_eq!(config.thresholds.min_update_abs, 100.0);
        assert_eq!(config.poll_interval_secs, 15);
    }

    #[test]
    fn test_no_wallets_rejected() {
        let config: Config = toml::from_str("wallets = []").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_address_rejected() {
        let toml_str = r#"
[[wallets]]
address = "not-an-address"
name = "Whale"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());

        let short = r#"
[[wallets]]
address = "0x1234"
name = "Whale"
"#;
        let config: Config = toml::from_str(short).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_min_shares_rejected() {
        let toml_str = format!(
            r#"
[[wallets]]
address = "{ADDR}"
name = "Whale"
min_shares = -5
"#
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let toml_str = format!("poll_interval_secs = 0\n{}", minimal_toml());
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_shares_lookup_is_case_insensitive() {
        let toml_str = format!(
            r#"
[[wallets]]
address = "{}"
name = "Whale"
min_shares = 500
"#,
            ADDR.to_uppercase().replace("0X", "0x")
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.min_shares_for(ADDR), Some(500));
        assert_eq!(config.min_shares_for("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"), None);
    }
}
