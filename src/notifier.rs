//! Notification formatting and delivery
//!
//! [`Notifier`] fans one message out to every configured destination through
//! a [`MessageSender`]. Destinations are independent: a failed send is
//! reported and the next destination is still attempted. Nothing is retried
//! within a cycle.

use crate::feed::Disclosure;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outcome of one send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub destination: String,
    pub status: DeliveryStatus,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

/// Push channel: one text to one destination
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> Result<(), SendError>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Telegram Bot API sender (`sendMessage`, HTML parse mode)
#[derive(Debug, Clone)]
pub struct TelegramSender {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramSender {
    /// # Arguments
    /// * `api_base` - e.g. `https://api.telegram.org`
    /// * `token` - bot token
    /// * `timeout` - bound for each send
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
        })
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(&self, destination: &str, text: &str) -> Result<(), SendError> {
        let request = SendMessageRequest {
            chat_id: destination,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            // reqwest errors carry the URL, which contains the bot token
            .map_err(|e| SendError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body: String = response.text().await.unwrap_or_default().chars().take(300).collect();
            Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Delivers text to every configured destination
#[derive(Clone)]
pub struct Notifier {
    sender: Arc<dyn MessageSender>,
    destinations: Vec<String>,
}

impl Notifier {
    pub fn new(sender: Arc<dyn MessageSender>, destinations: Vec<String>) -> Self {
        Self { sender, destinations }
    }

    /// Send `text` to each destination in turn
    ///
    /// Returns one report per destination; an empty destination list is a
    /// logged no-op.
    pub async fn notify(&self, text: &str) -> Vec<DeliveryReport> {
        if self.destinations.is_empty() {
            log::warn!("⚠️  No destinations configured, message not sent");
            return Vec::new();
        }

        let mut reports = Vec::with_capacity(self.destinations.len());
        for destination in &self.destinations {
            let status = match self.sender.send(destination, text).await {
                Ok(()) => {
                    log::info!("📨 Delivered to {}", destination);
                    DeliveryStatus::Delivered
                }
                Err(e) => {
                    log::error!("❌ Delivery to {} failed: {}", destination, e);
                    DeliveryStatus::Failed(e.to_string())
                }
            };
            reports.push(DeliveryReport {
                destination: destination.clone(),
                status,
            });
        }
        reports
    }
}

/// Render a disclosure as an HTML chat message
pub fn format_disclosure(disclosure: &Disclosure, link_base: &str) -> String {
    let link = format!("{}/{}", link_base.trim_end_matches('/'), disclosure.id);
    format!(
        "📢 {}\n\n🔹 {}\n\n📄 {}\n\n🕒 {}\n\n🔗 <a href='{}'>Bildirimi Görüntüle</a>\n\n",
        escape_html(&disclosure.issuer_codes),
        escape_html(&disclosure.title),
        escape_html(&disclosure.body),
        escape_html(&disclosure.publish_date),
        escape_html(&link),
    )
}

/// Notice sent when the feed could not be read
pub fn fetch_failure_message(reason: &str) -> String {
    format!("⚠️ KAP verisi alınamadı! {}", escape_html(reason))
}

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
