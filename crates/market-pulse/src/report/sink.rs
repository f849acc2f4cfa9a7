//! Destinations for rendered reports

use crate::error::{PulseError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Telegram rejects messages longer than this many characters
const TELEGRAM_MAX_CHARS: usize = 4096;

/// Where alarm and on-demand reports are delivered
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Prints reports to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

#[async_trait]
impl ReportSink for StdoutSink {
    async fn send(&self, text: &str) -> Result<()> {
        println!("{text}\n");
        Ok(())
    }
}

/// Keeps reports in memory
#[derive(Debug, Default)]
pub struct BufferSink {
    messages: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReportSink for BufferSink {
    async fn send(&self, text: &str) -> Result<()> {
        self.messages
            .lock()
            .map_err(|_| PulseError::Other("buffer sink poisoned".to_string()))?
            .push(text.to_string());
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Sends reports to one Telegram chat through the Bot API
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(token: &str, chat_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("https://api.telegram.org/bot{token}/sendMessage"),
            chat_id: chat_id.into(),
        })
    }

    async fn send_one(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await
            .map_err(|e| PulseError::Upstream(format!("telegram: {}", e.without_url())))?;

        let status = response.status();
        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| PulseError::Upstream(format!("telegram: HTTP {status}: {e}")))?;

        if body.ok {
            Ok(())
        } else {
            Err(PulseError::Upstream(format!(
                "telegram: {}",
                body.description.unwrap_or_else(|| status.to_string())
            )))
        }
    }
}

#[async_trait]
impl ReportSink for TelegramSink {
    async fn send(&self, text: &str) -> Result<()> {
        let parts = split_message(text, TELEGRAM_MAX_CHARS);
        debug!(chat_id = %self.chat_id, parts = parts.len(), "Sending report to Telegram");

        for part in &parts {
            if let Err(e) = self.send_one(part).await {
                warn!(error = %e, "Telegram delivery failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Split on line boundaries so each part stays within `max_chars`.
///
/// Blank lines are kept, including leading ones; parts holding nothing but
/// whitespace are dropped since the chat rejects them.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    fn flush(parts: &mut Vec<String>, current: &mut String) {
        let part = std::mem::take(current);
        if !part.trim().is_empty() {
            parts.push(part);
        }
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut has_lines = false;

    for line in text.lines() {
        let mut line: Vec<char> = line.chars().collect();

        // a single oversized line is hard-wrapped
        while line.len() > max_chars {
            if has_lines {
                flush(&mut parts, &mut current);
                current_len = 0;
                has_lines = false;
            }
            let rest = line.split_off(max_chars);
            parts.push(line.into_iter().collect());
            line = rest;
        }

        if has_lines && current_len + line.len() + 1 > max_chars {
            flush(&mut parts, &mut current);
            current_len = 0;
            has_lines = false;
        }
        if has_lines {
            current.push('\n');
            current_len += 1;
        }
        current.extend(line.iter());
        current_len += line.len();
        has_lines = true;
    }

    if has_lines {
        flush(&mut parts, &mut current);
    }
    if parts.is_empty() {
        parts.push(String::new());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_sink_keeps_order() {
        let sink = BufferSink::new();
        sink.send("first").await.unwrap();
        sink.send("second").await.unwrap();
        assert_eq!(sink.messages(), vec!["first", "second"]);
    }

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_message("a\nb", 10), vec!["a\nb"]);
        assert_eq!(split_message("", 10), vec![""]);
    }

    #[test]
    fn test_split_on_lines() {
        let parts = split_message("aaaa\nbbbb\ncccc", 9);
        assert_eq!(parts, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_split_keeps_leading_blank_lines() {
        assert_eq!(split_message("\n\nheader\nbody", 100), vec!["\n\nheader\nbody"]);
        // a blank line left alone at a boundary is not sent as an empty message
        assert_eq!(split_message("\naaaa\n\nbbbb", 4), vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn test_split_long_line() {
        let parts = split_message("xy\n0123456789", 4);
        assert_eq!(parts, vec!["xy", "0123", "4567", "89"]);
        assert!(parts.iter().all(|p| p.chars().count() <= 4));
    }
}
