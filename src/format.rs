//! Message rendering for Telegram alerts
//!
//! Pure text construction: routing decides *whether* to send, this module
//! decides what the message says. Telegram's basic Markdown mode is used, so
//! user-controlled text (trader names, market titles, outcomes) is escaped.

use crate::config::WalletConfig;
use crate::portfolio::Conviction;
use crate::position::{NetPosition, PositionStatus};
use crate::types::Bet;
use chrono::{DateTime, Utc};

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━";

/// Escape the characters Telegram's basic Markdown mode treats specially.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Circle marker for a conviction label.
pub fn conviction_marker(label: &str) -> &'static str {
    match label {
        "EXTREME" => "●●●●",
        "HIGH" => "●●●○",
        "MEDIUM" => "●●○○",
        "LOW" => "●○○○",
        "MINIMAL" => "○○○○",
        _ => "",
    }
}

/// Trader name as a hyperlink when a profile URL is configured, escaped
/// plain text otherwise.
fn trader_name(bet: &Bet) -> String {
    match &bet.profile_url {
        Some(url) => {
            let name = bet.trader_name.replace('[', "\\[").replace(']', "\\]");
            format!("[{}]({})", name, url)
        }
        None => escape_markdown(&bet.trader_name),
    }
}

/// Conviction line with marker, or empty when the portfolio is unknown.
fn conviction_line(conviction: Option<&Conviction>) -> String {
    match conviction {
        Some(c) if !conviction_marker(c.label).is_empty() => format!(
            "\n*Conviction:* {} {} ({:.1}% of positions)",
            conviction_marker(c.label),
            c.label,
            c.pct
        ),
        _ => String::new(),
    }
}

/// $1,234.56 with thousands separators
fn fmt_usd(value: f64) -> String {
    let negative = value < 0.0;
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));
    let grouped = group_thousands(int_part);
    if negative {
        format!("-${}.{}", grouped, frac_part)
    } else {
        format!("${}.{}", grouped, frac_part)
    }
}

/// 12,345 shares (rounded to whole shares)
fn fmt_shares(value: f64) -> String {
    group_thousands(&format!("{:.0}", value.abs()))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn position_side(pos: &NetPosition) -> &'static str {
    if pos.is_long() {
        "BUY"
    } else {
        "SELL"
    }
}

pub fn format_new_position(
    bet: &Bet,
    pos: &NetPosition,
    conviction: Option<&Conviction>,
) -> String {
    format!(
        "*{side} {outcome} @ {price}* (Implied: {odds})\n\
         *Trader:* {trader}\n\
         {DIVIDER}\n\
         {conviction}\n\
         *Total Stake:* {stake}\n\
         *Position Size:* {shares} shares\n\n\
         *Market:* {market}\n\
         *First Trade:* {time}\n\n\
         [Open Market]({url})",
        side = position_side(pos),
        outcome = escape_markdown(&bet.outcome),
        price = bet.formatted_price(),
        odds = bet.implied_odds(),
        trader = trader_name(bet),
        conviction = conviction_line(conviction),
        stake = fmt_usd(pos.display_amount()),
        shares = fmt_shares(pos.shares),
        market = escape_markdown(&bet.market_title),
        time = bet.formatted_time(),
        url = bet.market_url(),
    )
}

pub fn format_position_update(
    bet: &Bet,
    pos: &NetPosition,
    first_time: DateTime<Utc>,
    update_count: u32,
    conviction: Option<&Conviction>,
) -> String {
    format!(
        "*{side} {outcome} @ {price}* (Implied: {odds})\n\
         *Trader:* {trader}\n\
         {DIVIDER}\n\
         {conviction}\n\
         *Total Stake:* {stake}\n\
         *Position Size:* {shares} shares\n\n\
         *Market:* {market}\n\
         *First Trade:* {first}\n\
         *Latest:* {latest} *[UPDATED x{count}]*\n\n\
         [Open Market]({url})",
        side = position_side(pos),
        outcome = escape_markdown(&bet.outcome),
        price = bet.formatted_price(),
        odds = bet.implied_odds(),
        trader = trader_name(bet),
        conviction = conviction_line(conviction),
        stake = fmt_usd(pos.display_amount()),
        shares = fmt_shares(pos.shares),
        market = escape_markdown(&bet.market_title),
        first = first_time.format("%I:%M:%S %p"),
        latest = bet.formatted_time(),
        count = update_count,
        url = bet.market_url(),
    )
}

/// Fresh message for additions to a position whose original message is too
/// old to usefully edit. Cites the original stake and how long ago it was.
pub fn format_stale_addition(
    bet: &Bet,
    pos: &NetPosition,
    first_time: DateTime<Utc>,
    previous_total: f64,
    conviction: Option<&Conviction>,
    now: DateTime<Utc>,
) -> String {
    let hours = (now - first_time).num_seconds() as f64 / 3600.0;
    format!(
        "*[ADDING] {side} {outcome} @ {price}* (Implied: {odds})\n\
         *Trader:* {trader}\n\
         {DIVIDER}\n\n\
         *Original bet:* {hours:.1}h ago ({previous})\n\
         {conviction}\n\
         *Total Stake:* {stake}\n\
         *Position Size:* {shares} shares\n\n\
         *Market:* {market}\n\
         *First Trade:* {first}\n\
         *Latest:* {latest}\n\n\
         [Open Market]({url})",
        side = position_side(pos),
        outcome = escape_markdown(&bet.outcome),
        price = bet.formatted_price(),
        odds = bet.implied_odds(),
        trader = trader_name(bet),
        hours = hours,
        previous = fmt_usd(previous_total),
        conviction = conviction_line(conviction),
        stake = fmt_usd(pos.display_amount()),
        shares = fmt_shares(pos.shares),
        market = escape_markdown(&bet.market_title),
        first = first_time.format("%I:%M:%S %p"),
        latest = bet.formatted_time(),
        url = bet.market_url(),
    )
}

pub fn format_position_close(bet: &Bet, pos: &NetPosition, original_stake: f64) -> String {
    let pnl = pos.pnl();
    let pnl_display = if pnl > 0.0 {
        format!("+{}", fmt_usd(pnl))
    } else {
        format!("-{}", fmt_usd(pnl.abs()))
    };
    let pnl_pct = if original_stake > 0.0 {
        pnl / original_stake * 100.0
    } else {
        0.0
    };
    let status_label = match pos.status() {
        PositionStatus::ProfitTaken => "PROFIT TAKEN",
        PositionStatus::LossRealized => "LOSS REALIZED",
        _ => "CLOSED",
    };
    format!(
        "*[POSITION {status}] {outcome} @ {price}* (Implied: {odds})\n\
         *Trader:* {trader}\n\
         {DIVIDER}\n\n\
         *P&L:* {pnl} ({pct:+.1}%)\n\
         *Original Stake:* {stake}\n\
         *Close Time:* {time}\n\n\
         [Open Market]({url})",
        status = status_label,
        outcome = escape_markdown(&bet.outcome),
        price = bet.formatted_price(),
        odds = bet.implied_odds(),
        trader = trader_name(bet),
        pnl = pnl_display,
        pct = pnl_pct,
        stake = fmt_usd(original_stake),
        time = bet.formatted_time(),
        url = bet.market_url(),
    )
}

pub fn format_startup(wallets: &[WalletConfig], poll_interval_secs: u64) -> String {
    let trader_lines: Vec<String> = wallets
        .iter()
        .map(|w| {
            let name = escape_markdown(&w.name);
            match w.min_shares {
                Some(min) => format!("- {} (min: {} shares)", name, group_thousands(&min.to_string())),
                None => format!("- {}", name),
            }
        })
        .collect();

    format!(
        "*[MONITOR STARTED]*\n\n\
         *Status:* Online and monitoring\n\
         *Traders:* {}\n\
         *Poll Interval:* {}s\n\n\
         *Watching:*\n{}\n\n\
         Ready to alert on new trades!",
        wallets.len(),
        poll_interval_secs,
        trader_lines.join("\n"),
    )
}

pub fn format_shutdown(uptime_secs: i64, total_alerts: u64) -> String {
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime = if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else {
        format!("{}m {}s", minutes, seconds)
    };
    format!(
        "*[MONITOR STOPPED]*\n\n\
         *Status:* Offline\n\
         *Uptime:* {}\n\
         *Total Alerts:* {}\n\n\
         Bot has been stopped.",
        uptime, total_alerts,
    )
}
