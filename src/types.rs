//! Core types: trade sides, wire schemas for the Data API, and position keys

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept either a JSON number or a numeric string (the Data API mixes both)
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

fn default_title() -> String {
    "Unknown".to_string()
}

/// One trade execution as returned by the Data API activity feed
#[derive(Debug, Clone, Deserialize)]
pub struct TradeEvent {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(default)]
    pub timestamp: i64,
    pub side: Side,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub size: f64,
    #[serde(rename = "usdcSize", deserialize_with = "lenient_f64", default)]
    pub usdc_size: f64,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub price: f64,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default = "default_title")]
    pub outcome: String,
}

/// One open position as returned by the Data API positions endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPosition {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub size: f64,
    #[serde(rename = "currentValue", deserialize_with = "lenient_f64", default)]
    pub current_value: f64,
}

/// A trade attributed to a followed wallet, ready for alerting
#[derive(Debug, Clone)]
pub struct Bet {
    pub transaction_hash: String,
    pub timestamp: i64,
    pub side: Side,
    pub shares: f64,
    pub usdc: f64,
    pub price: f64,
    pub market_title: String,
    pub market_slug: String,
    pub outcome: String,
    pub trader_name: String,
    pub wallet_address: String,
    pub profile_url: Option<String>,
}

impl Bet {
    pub fn from_event(
        event: TradeEvent,
        wallet_address: &str,
        trader_name: &str,
        profile_url: Option<String>,
    ) -> Self {
        Self {
            transaction_hash: event.transaction_hash,
            timestamp: event.timestamp,
            side: event.side,
            shares: event.size,
            usdc: event.usdc_size,
            price: event.price,
            market_title: event.title,
            market_slug: event.slug,
            outcome: event.outcome,
            trader_name: trader_name.to_string(),
            wallet_address: wallet_address.to_lowercase(),
            profile_url,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.timestamp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn formatted_time(&self) -> String {
        self.time().format("%I:%M:%S %p").to_string()
    }

    /// Price as a percentage, e.g. "54.5%"
    pub fn formatted_price(&self) -> String {
        format!("{:.1}%", self.price * 100.0)
    }

    pub fn market_url(&self) -> String {
        format!("https://polymarket.com/event/{}", self.market_slug)
    }

    /// American odds implied by the price
    pub fn implied_odds(&self) -> String {
        let prob = self.price;
        if prob <= 0.0 || prob >= 1.0 {
            return "N/A".to_string();
        }
        if prob >= 0.5 {
            format!("{}", (-100.0 * prob / (1.0 - prob)) as i64)
        } else {
            format!("+{}", (100.0 * (1.0 - prob) / prob) as i64)
        }
    }

    pub fn position_key(&self) -> PositionKey {
        PositionKey::new(&self.wallet_address, &self.market_slug, &self.outcome)
    }
}

/// Identifies a tracked net position: (wallet, market, outcome), case-normalized.
///
/// Side is deliberately excluded so a BUY and a later SELL on the same outcome
/// net against each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    pub wallet: String,
    pub market: String,
    pub outcome: String,
}

impl PositionKey {
    pub fn new(wallet: &str, market: &str, outcome: &str) -> Self {
        Self {
            wallet: wallet.to_lowercase(),
            market: market.to_lowercase(),
            outcome: outcome.to_uppercase(),
        }
    }

    /// Canonical string encoding used in the persisted state file: a JSON
    /// array `["wallet","market","OUTCOME"]`.
    pub fn encode(&self) -> String {
        serde_json::to_string(&[&self.wallet, &self.market, &self.outcome])
            .unwrap_or_default()
    }

    /// Decode from the canonical JSON-array form, falling back to the legacy
    /// Python tuple repr `('wallet', 'market', 'OUTCOME')` found in state
    /// files written by the previous implementation.
    pub fn decode(s: &str) -> Option<Self> {
        if let Ok(parts) = serde_json::from_str::<Vec<String>>(s) {
            if parts.len() == 3 {
                return Some(Self::new(&parts[0], &parts[1], &parts[2]));
            }
            return None;
        }
        let parts = parse_tuple_repr(s)?;
        if parts.len() == 3 {
            Some(Self::new(&parts[0], &parts[1], &parts[2]))
        } else {
            None
        }
    }

    /// Decode a legacy 4-tuple `(wallet, market, outcome, side)` key, used
    /// only when migrating the old cumulative-shares format.
    pub fn decode_legacy_with_side(s: &str) -> Option<(Self, Side)> {
        let parts = if let Ok(p) = serde_json::from_str::<Vec<String>>(s) {
            p
        } else {
            parse_tuple_repr(s)?
        };
        if parts.len() != 4 {
            return None;
        }
        let side = match parts[3].to_uppercase().as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            _ => return None,
        };
        Some((Self::new(&parts[0], &parts[1], &parts[2]), side))
    }
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.wallet, self.market, self.outcome)
    }
}

/// Parse a Python tuple repr like `('a', 'b', 'c')` into its string elements.
fn parse_tuple_repr(s: &str) -> Option<Vec<String>> {
    let inner = s.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in inner.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                    parts.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                // commas and whitespace between quoted elements are skipped
            }
        }
    }
    if quote.is_some() || parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}
