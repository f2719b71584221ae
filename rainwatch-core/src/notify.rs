//! Message formatting and delivery.
//!
//! Messages use Telegram's legacy Markdown, so section titles are wrapped in `*`.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Timelike};
use reqwest::Client;
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;

use crate::{
    detector::{DayBucket, RainReport},
    model::{ALERT_HORIZON_MINUTES, NotificationMessage, RainEvent},
};

const TELEGRAM_API: &str = "https://api.telegram.org";

pub const DAILY_HEADER: &str = "☔ *Rain Forecast*";
pub const UNAVAILABLE_HEADER: &str = "⚠️ *Rain Forecast Unavailable*";
pub const NO_RAIN_LINE: &str = "No rain predicted ✅";

/// "2 PM", or "2:30 PM" when the minutes matter.
pub fn format_time(ts: NaiveDateTime) -> String {
    if ts.minute() == 0 {
        ts.format("%-I %p").to_string()
    } else {
        ts.format("%-I:%M %p").to_string()
    }
}

/// Backslash-escape the characters legacy Markdown treats as entity markers.
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

fn push_section(lines: &mut Vec<String>, title: &str, bucket: &DayBucket) {
    lines.push(String::new());
    lines.push(format!("*{title} ({})*", bucket.date.format("%Y-%m-%d")));

    if bucket.events.is_empty() {
        lines.push(NO_RAIN_LINE.to_string());
        return;
    }

    for event in &bucket.events {
        lines.push(format!(
            "• {} — {} {}",
            format_time(event.timestamp),
            escape_markdown(&event.label),
            event.icon
        ));
    }
}

/// Both sections are always present, empty ones say so.
pub fn format_daily(today: &DayBucket, tomorrow: &DayBucket) -> NotificationMessage {
    let mut lines = vec![DAILY_HEADER.to_string()];
    push_section(&mut lines, "Today", today);
    push_section(&mut lines, "Tomorrow", tomorrow);
    NotificationMessage::new(lines)
}

fn alert_fragment(event: &RainEvent) -> String {
    let label = escape_markdown(&event.label);
    match event.probability {
        Some(chance) => format!("{label} ({chance}%) {}", event.icon),
        None => format!("{label} {}", event.icon),
    }
}

/// `None` when there is nothing to alert about.
pub fn format_alert(events: &[RainEvent]) -> Option<NotificationMessage> {
    if events.is_empty() {
        return None;
    }

    let joined = events.iter().map(alert_fragment).collect::<Vec<String>>().join(" | ");

    Some(NotificationMessage::new(vec![
        format!("⚠️ *Rain Alert* (next {ALERT_HORIZON_MINUTES} min)"),
        joined,
    ]))
}

pub fn format_degraded(message: &str) -> NotificationMessage {
    NotificationMessage::new(vec![UNAVAILABLE_HEADER.to_string(), escape_markdown(message)])
}

/// Render a detector report; alert reports without events render nothing.
pub fn format_report(report: &RainReport) -> Option<NotificationMessage> {
    match report {
        RainReport::Daily { today, tomorrow } => Some(format_daily(today, tomorrow)),
        RainReport::Alert { events } => format_alert(events),
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("messaging endpoint is not configured: {0} is missing")]
    NotConfigured(&'static str),

    #[error("failed to reach messaging endpoint: {0}")]
    Request(#[source] reqwest::Error),

    #[error("messaging endpoint rejected the message with status {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError>;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Sends through the Telegram Bot API `sendMessage` method.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    bot_token: Option<String>,
    chat_id: Option<String>,
    http: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: Option<String>, chat_id: Option<String>, http: Client) -> Self {
        Self { bot_token, chat_id, http }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let token = self.bot_token.as_deref().ok_or(DeliveryError::NotConfigured("TELEGRAM_TOKEN"))?;
        let chat_id = self.chat_id.as_deref().ok_or(DeliveryError::NotConfigured("CHAT_ID"))?;

        let text = message.text();
        let payload = SendMessage { chat_id, text: &text, parse_mode: "Markdown" };

        let res = self
            .http
            .post(format!("{TELEGRAM_API}/bot{token}/sendMessage"))
            .json(&payload)
            .send()
            .await
            // The bot token is part of the URL path.
            .map_err(|e| DeliveryError::Request(e.without_url()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body: crate::provider::truncate_body(&body),
            });
        }

        tracing::info!(chat_id, "notification delivered via Telegram");
        Ok(())
    }
}

/// Prints messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        println!("{}", message.text());
        Ok(())
    }
}
