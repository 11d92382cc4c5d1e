//! Telegram channel: long-polls the Bot API for updates.
//!
//! Messages become text, command, or attachment events; inline-keyboard
//! presses become action events. Menus answering a button press edit that message in place.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{
    Attachment, Channel, EventKind, IncomingMessage, MessageStream, OutgoingMessage,
};
use crate::error::ChannelError;
use crate::menu::{Control, ControlTarget};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Maximum caption length for sendDocument.
const TELEGRAM_MAX_CAPTION_LENGTH: usize = 1024;

/// Long-poll timeout passed to getUpdates.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Back-off after a failed poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

fn api_url(token: &SecretString, method: &str) -> String {
    format!("https://api.telegram.org/bot{}/{method}", token.expose_secret())
}

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// POST a Bot API method and fail on a non-success status.
    async fn call(&self, method: &str, body: &Value) -> Result<(), ApiFailure> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiFailure {
                method: method.to_string(),
                status: None,
                description: e.to_string(),
            })?;

        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status().as_u16();
        let raw = resp.text().await.unwrap_or_default();
        Err(ApiFailure {
            method: method.to_string(),
            status: Some(status),
            description: error_description(&raw),
        })
    }

    /// Try Markdown first. Only a Markdown parse rejection is retried, once,
    /// without `parse_mode`; any other failure is returned as is.
    async fn call_markdown_first(&self, method: &str, mut body: Value) -> Result<(), ChannelError> {
        body["parse_mode"] = json!("Markdown");
        let failure = match self.call(method, &body).await {
            Ok(()) => return Ok(()),
            Err(f) => f,
        };

        match classify_failure(failure.status, &failure.description) {
            FailureKind::NotModified => return Ok(()),
            FailureKind::Other => return Err(failure.into()),
            FailureKind::MarkdownParse => {}
        }

        tracing::warn!(
            error = %failure.description,
            "Telegram {method} rejected Markdown; retrying without parse_mode"
        );

        if let Some(obj) = body.as_object_mut() {
            obj.remove("parse_mode");
        }
        match self.call(method, &body).await {
            Ok(()) => Ok(()),
            Err(f) if classify_failure(f.status, &f.description) == FailureKind::NotModified => {
                Ok(())
            }
            Err(f) => Err(f.into()),
        }
    }

    /// Send text, split at Telegram's limit. The keyboard rides on the last chunk.
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        markup: Option<&Value>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if let (true, Some(markup)) = (i == last, markup) {
                body["reply_markup"] = markup.clone();
            }
            self.call_markdown_first("sendMessage", body).await?;
        }
        Ok(())
    }

    /// Replace the text and keyboard of an earlier bot message.
    async fn edit_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        markup: Option<&Value>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(markup) = markup {
            body["reply_markup"] = markup.clone();
        }
        self.call_markdown_first("editMessageText", body).await
    }

    /// Forward a file by its Telegram `file_id`.
    async fn send_document(
        &self,
        chat_id: &str,
        attachment: &Attachment,
        caption: &str,
        markup: Option<&Value>,
    ) -> Result<(), ChannelError> {
        let fits = caption.chars().count() <= TELEGRAM_MAX_CAPTION_LENGTH;

        let mut body = json!({
            "chat_id": chat_id,
            "document": attachment.file_id,
        });
        if fits {
            body["caption"] = json!(caption);
            if let Some(markup) = markup {
                body["reply_markup"] = markup.clone();
            }
        }
        self.call_markdown_first("sendDocument", body).await?;

        if !fits {
            self.send_text(chat_id, caption, markup).await?;
        }
        tracing::info!(chat_id, file_id = %attachment.file_id, "Telegram document sent");
        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    // Stop the button's loading spinner
                    if let Some(id) = incoming
                        .metadata
                        .get("callback_query_id")
                        .and_then(Value::as_str)
                    {
                        let ack = client
                            .post(api_url(&bot_token, "answerCallbackQuery"))
                            .json(&json!({ "callback_query_id": id }))
                            .send()
                            .await;
                        if let Err(e) = ack {
                            tracing::debug!("answerCallbackQuery failed: {e}");
                        }
                    }

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), ChannelError> {
        let chat_id = message
            .metadata
            .get("chat_id")
            .and_then(Value::as_str)
            .unwrap_or(&message.target);
        let markup = inline_keyboard(&message.controls);

        if let Some(attachment) = &message.attachment {
            return self
                .send_document(chat_id, attachment, &message.text, markup.as_ref())
                .await;
        }

        if let Some(message_id) = message
            .metadata
            .get("edit_message_id")
            .and_then(Value::as_i64)
        {
            if message.text.len() <= TELEGRAM_MAX_MESSAGE_LENGTH {
                match self
                    .edit_text(chat_id, message_id, &message.text, markup.as_ref())
                    .await
                {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        tracing::debug!(error = %e, "editMessageText failed; sending new message");
                    }
                }
            }
        }

        self.send_text(chat_id, &message.text, markup.as_ref()).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// A failed Bot API call. `status` is `None` when no response arrived.
#[derive(Debug)]
struct ApiFailure {
    method: String,
    status: Option<u16>,
    description: String,
}

impl From<ApiFailure> for ChannelError {
    fn from(f: ApiFailure) -> Self {
        let reason = match f.status {
            Some(status) => format!("{} returned {status}: {}", f.method, f.description),
            None => format!("{}: {}", f.method, f.description),
        };
        ChannelError::SendFailed {
            name: "telegram".into(),
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    /// Markdown entities were rejected; the plain-text retry may succeed.
    MarkdownParse,
    /// An edit with identical content. Nothing to do.
    NotModified,
    Other,
}

fn classify_failure(status: Option<u16>, description: &str) -> FailureKind {
    match status {
        Some(400) if description.contains("can't parse entities") => FailureKind::MarkdownParse,
        Some(400) if description.contains("message is not modified") => FailureKind::NotModified,
        _ => FailureKind::Other,
    }
}

/// The `description` of a Bot API error body, or the raw body.
fn error_description(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| v.get("description").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}

/// Turn one `getUpdates` entry into an event. Returns `None` for updates
/// without a sender.
fn parse_update(update: &Value) -> Option<IncomingMessage> {
    if let Some(query) = update.get("callback_query") {
        return parse_callback_query(query);
    }
    parse_message(update.get("message")?)
}

fn parse_callback_query(query: &Value) -> Option<IncomingMessage> {
    let data = query.get("data").and_then(Value::as_str)?;
    let from = query.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?.to_string();

    let message = query.get("message");
    let chat_id = message
        .and_then(|m| m.get("chat"))
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| user_id.clone());
    let message_id = message
        .and_then(|m| m.get("message_id"))
        .and_then(Value::as_i64);

    let mut incoming = IncomingMessage::new(
        "telegram",
        user_id,
        EventKind::Action(data.to_string()),
    )
    .with_metadata(json!({
        "chat_id": chat_id,
        "callback_query_id": query.get("id").and_then(Value::as_str),
        "edit_message_id": message_id,
    }));
    if let Some(username) = from.get("username").and_then(Value::as_str) {
        incoming = incoming.with_username(username);
    }
    Some(incoming)
}

fn parse_message(message: &Value) -> Option<IncomingMessage> {
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?.to_string();

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| user_id.clone());

    let kind = if let Some(doc) = message.get("document") {
        let file_id = doc.get("file_id").and_then(Value::as_str)?;
        let file_name = doc
            .get("file_name")
            .and_then(Value::as_str)
            .map(String::from);
        EventKind::Attachment(Attachment::new(file_id, file_name))
    } else if let Some(text) = message.get("text").and_then(Value::as_str) {
        EventKind::from_text(text)
    } else {
        // Photos, stickers, voice: treated as empty text so the user is re-prompted
        let caption = message
            .get("caption")
            .and_then(Value::as_str)
            .unwrap_or_default();
        EventKind::Text(caption.to_string())
    };

    let mut incoming = IncomingMessage::new("telegram", user_id, kind)
        .with_metadata(json!({ "chat_id": chat_id }));
    if let Some(username) = from.get("username").and_then(Value::as_str) {
        incoming = incoming.with_username(username);
    }
    Some(incoming)
}

/// One control per keyboard row. `None` when there are no controls.
fn inline_keyboard(controls: &[Control]) -> Option<Value> {
    if controls.is_empty() {
        return None;
    }
    let rows: Vec<Value> = controls
        .iter()
        .map(|c| match &c.target {
            ControlTarget::Action(action) => {
                json!([{ "text": c.label, "callback_data": action.code() }])
            }
            ControlTarget::Link(url) => json!([{ "text": c.label, "url": url }]),
        })
        .collect();
    Some(json!({ "inline_keyboard": rows }))
}

/// Split a message into chunks that fit Telegram's limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
