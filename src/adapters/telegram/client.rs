//! Implements MessageSender and BotGateway over the Telegram Bot API (HTTPS + JSON).
//!
//! Handles flood control (HTTP 429 with `retry_after`) by sleeping and retrying.
//! Inbound updates are fetched with `getUpdates` long polling.

use crate::adapters::telegram::mapper::{self, Update};
use crate::domain::{DomainError, InboundEvent, MediaKind};
use crate::ports::{BotGateway, InlineButton, MessageSender};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const MAX_ATTEMPTS: u32 = 3;
/// Longest flood-control wait we are willing to sleep through.
const MAX_RETRY_AFTER_SECS: u64 = 60;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    username: Option<String>,
}

/// Telegram Bot API adapter.
pub struct BotApiGateway {
    client: reqwest::Client,
    /// `{api_url}/bot{token}`
    base_url: String,
    poll_timeout_secs: u64,
    /// Next `getUpdates` offset (last seen update_id + 1).
    offset: Mutex<i64>,
}

impl BotApiGateway {
    pub fn new(api_url: &str, bot_token: &str, poll_timeout_secs: u64) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DomainError::Transport(format!("build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
            poll_timeout_secs,
            offset: Mutex::new(0),
        })
    }

    /// Bot username, used at startup to check the token.
    pub async fn get_me(&self) -> Result<String, DomainError> {
        let me: BotUser = self.call("getMe", json!({}), None).await?;
        Ok(me.username.unwrap_or_default())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<T, DomainError> {
        let url = format!("{}/{}", self.base_url, method);
        for attempt in 1..=MAX_ATTEMPTS {
            let mut req = self.client.post(&url).json(&body);
            if let Some(t) = timeout {
                req = req.timeout(t);
            }
            // reqwest errors may embed the URL (and so the token); keep only the kind.
            let res = req.send().await.map_err(|e| {
                DomainError::Transport(format!("{} request failed: {}", method, e.without_url()))
            })?;
            let status = res.status();
            let parsed: ApiResponse<T> = res.json().await.map_err(|e| {
                DomainError::Transport(format!(
                    "{} invalid response (HTTP {}): {}",
                    method,
                    status,
                    e.without_url()
                ))
            })?;

            if parsed.ok {
                return parsed
                    .result
                    .ok_or_else(|| DomainError::Transport(format!("{} returned no result", method)));
            }

            let retry_after = parsed.parameters.as_ref().and_then(|p| p.retry_after);
            match (parsed.error_code, retry_after) {
                (Some(429), Some(secs)) if secs <= MAX_RETRY_AFTER_SECS && attempt < MAX_ATTEMPTS => {
                    warn!(method, attempt, retry_after = secs, "flood control, sleeping");
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                }
                _ => {
                    return Err(DomainError::Transport(format!(
                        "{} failed ({}): {}",
                        method,
                        parsed.error_code.unwrap_or(status.as_u16()),
                        parsed.description.unwrap_or_default()
                    )));
                }
            }
        }
        Err(DomainError::Transport(format!("{}: flood control max retries", method)))
    }

    async fn send(&self, method: &str, body: Value) -> Result<(), DomainError> {
        let _: Value = self.call(method, body, None).await?;
        debug!(method, "sent");
        Ok(())
    }
}

/// Numeric handles go out as integers, `@channel` handles as strings.
fn chat_id_value(destination: &str) -> Value {
    destination
        .trim()
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(destination.trim()))
}

fn keyboard_markup(rows: &[Vec<InlineButton>]) -> Value {
    let rows: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| json!({"text": b.label, "callback_data": b.action.encode()}))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

#[async_trait]
impl MessageSender for BotApiGateway {
    async fn send_text(&self, destination: &str, body: &str) -> Result<(), DomainError> {
        self.send(
            "sendMessage",
            json!({"chat_id": chat_id_value(destination), "text": body}),
        )
        .await
    }

    async fn send_media(
        &self,
        destination: &str,
        kind: MediaKind,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<(), DomainError> {
        let (method, field) = match kind {
            MediaKind::Photo => ("sendPhoto", "photo"),
            MediaKind::Video => ("sendVideo", "video"),
        };
        let mut body = json!({"chat_id": chat_id_value(destination)});
        body[field] = Value::from(file_id);
        if let Some(c) = caption {
            body["caption"] = Value::from(c);
        }
        self.send(method, body).await
    }
}

#[async_trait]
impl BotGateway for BotApiGateway {
    async fn next_events(&self) -> Result<Vec<InboundEvent>, DomainError> {
        let mut offset = self.offset.lock().await;
        let body = json!({
            "offset": *offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let wait = Duration::from_secs(self.poll_timeout_secs) + REQUEST_TIMEOUT;
        let raw: Vec<Value> = self.call("getUpdates", body, Some(wait)).await?;

        let mut events = Vec::with_capacity(raw.len());
        for value in raw {
            if let Some(id) = value.get("update_id").and_then(Value::as_i64) {
                *offset = (*offset).max(id + 1);
            }
            // One malformed update must not wedge the offset; skip it.
            match serde_json::from_value::<Update>(value) {
                Ok(update) => events.extend(mapper::update_to_event(&update)),
                Err(e) => warn!(error = %e, "skipping undecodable update"),
            }
        }
        Ok(events)
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), DomainError> {
        self.send("sendMessage", json!({"chat_id": chat_id, "text": text}))
            .await
    }

    async fn reply_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        rows: &[Vec<InlineButton>],
    ) -> Result<(), DomainError> {
        self.send(
            "sendMessage",
            json!({"chat_id": chat_id, "text": text, "reply_markup": keyboard_markup(rows)}),
        )
        .await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), DomainError> {
        self.send(
            "answerCallbackQuery",
            json!({"callback_query_id": callback_id}),
        )
        .await
    }
}
