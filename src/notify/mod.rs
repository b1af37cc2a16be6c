//! Telegram delivery and the per-position notification ledger
//!
//! The ledger owns the mapping from position key to outstanding message and
//! applies the edit-failure policy: a deleted message gets a fresh send, a
//! transient network failure gets bounded retries before falling back to a
//! fresh send, and "message is not modified" counts as success.


use crate::config::TelegramConfig;
use crate::error::{MonitorError, Result};
use crate::types::PositionKey;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

const EDIT_RETRIES: u32 = 3;

/// Outcome of an edit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Edit applied, or content already matched
    Success,
    /// The target message no longer exists
    MessageDeleted,
    /// Transient failure (timeout, 429, 5xx); worth retrying
    NetworkError,
    /// Anything else; retrying the edit is pointless
    UnknownError,
}

/// State of the outstanding message for one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageState {
    pub message_id: i64,
    /// Stake shown in the message, compared against for update significance
    pub total_usdc: f64,
    /// When the message was first sent; staleness is measured from here
    #[serde(deserialize_with = "datetime_utc_lenient")]
    pub first_time: DateTime<Utc>,
    #[serde(default)]
    pub update_count: u32,
    #[serde(default)]
    pub conviction_label: String,
}

/// Accept RFC 3339 or the naive ISO strings older state files carry;
/// naive times are taken as UTC.
fn datetime_utc_lenient<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(serde::de::Error::custom)
}

/// Message delivery seam; swapped for a scripted double in tests
#[async_trait]
pub trait NotifyTransport: Send + Sync {
    /// Send a new message, returning its message id.
    async fn send(&self, text: &str) -> Result<i64>;
    /// Edit an existing message in place.
    async fn edit(&self, message_id: i64, text: &str) -> UpdateStatus;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    chat_id: &'a str,
    message_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<SentMessage>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Telegram Bot API transport
pub struct TelegramNotifier {
    http: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }
}

#[async_trait]
impl NotifyTransport for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<i64> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let resp = self
            .http
            .post(self.api_url("sendMessage"))
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body: ApiResponse = resp.json().await?;
        match body.result {
            Some(sent) if body.ok => Ok(sent.message_id),
            _ => Err(MonitorError::Telegram(format!(
                "sendMessage failed ({}): {}",
                status,
                body.description.unwrap_or_default()
            ))),
        }
    }

    async fn edit(&self, message_id: i64, text: &str) -> UpdateStatus {
        let request = EditMessageRequest {
            chat_id: &self.chat_id,
            message_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let resp = match self
            .http
            .post(self.api_url("editMessageText"))
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(message_id, error = %e, "edit request failed");
                return UpdateStatus::NetworkError;
            }
        };

        let status = resp.status();
        if status.is_success() {
            return UpdateStatus::Success;
        }

        let description = resp
            .json::<ApiResponse>()
            .await
            .ok()
            .and_then(|b| b.description)
            .unwrap_or_default();

        classify_edit_failure(status.as_u16(), &description)
    }
}

/// Map a failed edit response to an UpdateStatus. Telegram reports "nothing
/// changed" as a 400; that is a success for our purposes.
fn classify_edit_failure(status: u16, description: &str) -> UpdateStatus {
    let description = description.to_lowercase();
    if description.contains("message is not modified") {
        return UpdateStatus::Success;
    }
    if description.contains("message to edit not found") || description.contains("message not found")
    {
        return UpdateStatus::MessageDeleted;
    }
    if status == 429 || status >= 500 {
        return UpdateStatus::NetworkError;
    }
    UpdateStatus::UnknownError
}

/// Tracks the outstanding message per position and routes sends/edits
/// through the transport. With no transport configured, messages are logged
/// and state is tracked with message id 0 so routing behaves identically.
pub struct NotificationLedger {
    transport: Option<Arc<dyn NotifyTransport>>,
    messages: Mutex<HashMap<PositionKey, MessageState>>,
}

impl NotificationLedger {
    pub fn new(transport: Option<Arc<dyn NotifyTransport>>) -> Self {
        if transport.is_none() {
            tracing::warn!("Telegram not configured; alerts will only be logged");
        }
        Self {
            transport,
            messages: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub fn get_state(&self, key: &PositionKey) -> Option<MessageState> {
        self.messages.lock().get(key).cloned()
    }

    pub fn is_tracked(&self, key: &PositionKey) -> bool {
        self.messages.lock().contains_key(key)
    }

    pub fn untrack(&self, key: &PositionKey) {
        self.messages.lock().remove(key);
    }

    pub fn tracked_keys(&self) -> HashSet<PositionKey> {
        self.messages.lock().keys().cloned().collect()
    }

    /// Send a standalone message that is not tied to any position
    /// (startup/shutdown announcements).
    pub async fn send_plain(&self, text: &str) {
        match &self.transport {
            Some(transport) => {
                if let Err(e) = transport.send(text).await {
                    tracing::error!(error = %e, "failed to send announcement");
                }
            }
            None => tracing::info!("[notify disabled] {}", text),
        }
    }

    /// Send a fresh message for a position and begin tracking it. Staleness
    /// for future edits is measured from `trade_time`.
    pub async fn send_and_track(
        &self,
        key: &PositionKey,
        text: &str,
        total_usdc: f64,
        trade_time: DateTime<Utc>,
        conviction_label: &str,
    ) -> Result<()> {
        let message_id = self.deliver(text).await?;
        self.messages.lock().insert(
            key.clone(),
            MessageState {
                message_id,
                total_usdc,
                first_time: trade_time,
                update_count: 0,
                conviction_label: conviction_label.to_string(),
            },
        );
        Ok(())
    }

    /// Edit the outstanding message for a position, applying the failure
    /// policy: deleted or unknown failures fall back to a fresh send at once,
    /// network failures get bounded linear-backoff retries first. A fallback
    /// send resets the staleness clock.
    pub async fn update_and_track(
        &self,
        key: &PositionKey,
        text: &str,
        total_usdc: f64,
        trade_time: DateTime<Utc>,
        conviction_label: &str,
    ) -> Result<()> {
        let state = match self.get_state(key) {
            Some(state) => state,
            None => {
                return self
                    .send_and_track(key, text, total_usdc, trade_time, conviction_label)
                    .await
            }
        };

        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => {
                tracing::info!("[notify disabled] (edit) {}", text);
                self.bump(key, total_usdc, conviction_label);
                return Ok(());
            }
        };

        let mut status = transport.edit(state.message_id, text).await;

        if status == UpdateStatus::NetworkError {
            for attempt in 1..=EDIT_RETRIES {
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                status = transport.edit(state.message_id, text).await;
                if status != UpdateStatus::NetworkError {
                    break;
                }
                tracing::debug!(%key, attempt, "edit retry failed");
            }
        }

        match status {
            UpdateStatus::Success => {
                self.bump(key, total_usdc, conviction_label);
                Ok(())
            }
            UpdateStatus::MessageDeleted | UpdateStatus::NetworkError | UpdateStatus::UnknownError => {
                tracing::warn!(%key, ?status, "edit failed; sending a fresh message");
                self.send_and_track(key, text, total_usdc, trade_time, conviction_label)
                    .await
            }
        }
    }

    /// Send a close notification and stop tracking the position.
    pub async fn close_and_untrack(&self, key: &PositionKey, text: &str) -> Result<()> {
        self.deliver(text).await?;
        self.untrack(key);
        Ok(())
    }

    /// Drop tracked messages older than `max_age_secs`, measured from
    /// first_time. Returns how many were removed.
    pub fn cleanup_older_than(&self, max_age_secs: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(max_age_secs);
        let mut messages = self.messages.lock();
        let before = messages.len();
        messages.retain(|_, state| state.first_time >= cutoff);
        let removed = before - messages.len();
        if removed > 0 {
            tracing::info!("Expired {} stale message entries", removed);
        }
        removed
    }

    pub fn export_for_persistence(&self) -> HashMap<String, MessageState> {
        self.messages
            .lock()
            .iter()
            .map(|(k, v)| (k.encode(), v.clone()))
            .collect()
    }

    /// Load persisted entries; malformed keys are skipped with a warning.
    pub fn load_from_persistence(&self, entries: &HashMap<String, MessageState>) {
        let mut messages = self.messages.lock();
        for (raw, state) in entries {
            match PositionKey::decode(raw) {
                Some(key) => {
                    messages.insert(key, state.clone());
                }
                None => tracing::warn!("Skipping malformed message key: {}", raw),
            }
        }
        if !messages.is_empty() {
            tracing::info!("Loaded {} tracked messages", messages.len());
        }
    }

    async fn deliver(&self, text: &str) -> Result<i64> {
        match &self.transport {
            Some(transport) => transport.send(text).await,
            None => {
                tracing::info!("[notify disabled] {}", text);
                Ok(0)
            }
        }
    }

    fn bump(&self, key: &PositionKey, total_usdc: f64, conviction_label: &str) {
        if let Some(state) = self.messages.lock().get_mut(key) {
            state.total_usdc = total_usdc;
            state.update_count += 1;
            state.conviction_label = conviction_label.to_string();
        }
    }
}
