//! Telegram Bot API client for operational alerts.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::NotifyError;

/// Default deadline for one Bot API request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Plain-text alert channel.
#[async_trait]
pub trait ChatAlerter: Send + Sync {
    /// Send `text` to the chat identified by `channel_id`.
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram bot client.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    timeout: Duration,
    base_url: String,
    bot_token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

impl TelegramClient {
    /// Create a new client for the given bot token.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_base_url("https://api.telegram.org", bot_token)
    }

    /// Create a client with custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
            base_url: base_url.into(),
            bot_token: bot_token.into(),
        }
    }

    /// Override the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.bot_token
        )
    }
}

#[async_trait]
impl ChatAlerter for TelegramClient {
    #[instrument(skip(self, text))]
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), NotifyError> {
        let payload = SendMessage {
            chat_id: channel_id,
            text,
        };

        let response = self
            .client
            .post(self.send_message_url())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            debug!("Telegram message sent");
            Ok(())
        } else {
            Err(NotifyError::from_response("telegram", response).await)
        }
    }
}
