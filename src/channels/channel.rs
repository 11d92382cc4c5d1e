//! Transport boundary: inbound events, outbound renders, and the `Channel` trait.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChannelError;
use crate::menu::{Control, Render};

/// Stream of inbound events from a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A transport-level file reference (e.g. a Telegram `file_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    pub file_name: Option<String>,
}

impl Attachment {
    pub fn new(file_id: impl Into<String>, file_name: Option<String>) -> Self {
        Self {
            file_id: file_id.into(),
            file_name,
        }
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_name {
            Some(name) => write!(f, "{}/{}", self.file_id, name),
            None => write!(f, "{}", self.file_id),
        }
    }
}

/// Shape of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Slash command, name without the leading `/`, lowercased.
    Command(String),
    /// Opaque action code from a pressed control.
    Action(String),
    /// Free text.
    Text(String),
    /// A file sent by the user.
    Attachment(Attachment),
}

impl EventKind {
    /// Classify a typed line: `/name[@bot] args` is a command, anything else text.
    pub fn from_text(text: &str) -> Self {
        match text.trim_start().strip_prefix('/') {
            Some(rest) => {
                let word = rest.split_whitespace().next().unwrap_or_default();
                let name = word.split('@').next().unwrap_or_default();
                EventKind::Command(name.to_lowercase())
            }
            None => EventKind::Text(text.to_string()),
        }
    }
}

/// An inbound event from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Channel that produced the event.
    pub channel: String,
    /// Opaque user identifier; the session key.
    pub user_id: String,
    /// Transport handle (e.g. Telegram `@username`), when the user has one.
    pub username: Option<String>,
    pub kind: EventKind,
    /// Channel-specific routing data, echoed back on replies.
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: impl Into<String>, user_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            user_id: user_id.into(),
            username: None,
            kind,
            metadata: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A message the core wants delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    /// Destination user or chat identifier.
    pub target: String,
    pub text: String,
    /// Ordered controls rendered under the text.
    pub controls: Vec<Control>,
    /// File to forward alongside the text.
    pub attachment: Option<Attachment>,
    /// Channel-specific data copied from the event being answered.
    pub metadata: serde_json::Value,
}

impl OutgoingMessage {
    /// Plain text, no controls.
    pub fn text(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            text: text.into(),
            controls: Vec::new(),
            attachment: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Answer an inbound event with a rendered view.
    pub fn reply(to: &IncomingMessage, render: Render) -> Self {
        Self {
            target: to.user_id.clone(),
            text: render.text,
            controls: render.controls,
            attachment: None,
            metadata: to.metadata.clone(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// A chat transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name for logs and event tagging.
    fn name(&self) -> &str;

    /// Begin receiving events.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver a message.
    async fn send(&self, message: OutgoingMessage) -> Result<(), ChannelError>;

    /// Check the transport is reachable.
    async fn health_check(&self) -> Result<(), ChannelError>;

    /// Stop receiving events.
    async fn shutdown(&self) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::Action;

    #[test]
    fn slash_text_is_command() {
        assert_eq!(
            EventKind::from_text("/start"),
            EventKind::Command("start".into())
        );
        assert_eq!(
            EventKind::from_text("/Start@hire_desk_bot now"),
            EventKind::Command("start".into())
        );
    }

    #[test]
    fn plain_text_is_text() {
        assert_eq!(
            EventKind::from_text("Anna K."),
            EventKind::Text("Anna K.".into())
        );
        assert_eq!(
            EventKind::from_text("my site is a/b"),
            EventKind::Text("my site is a/b".into())
        );
    }

    #[test]
    fn attachment_display_joins_id_and_name() {
        let a = Attachment::new("doc123", Some("cv.pdf".into()));
        assert_eq!(a.to_string(), "doc123/cv.pdf");
        assert_eq!(Attachment::new("doc9", None).to_string(), "doc9");
    }

    #[test]
    fn reply_targets_sender_and_echoes_metadata() {
        let msg = IncomingMessage::new("telegram", "42", EventKind::Action("show_faq".into()))
            .with_metadata(serde_json::json!({"chat_id": "42", "message_id": 7}));
        let out = OutgoingMessage::reply(
            &msg,
            Render {
                text: "hi".into(),
                controls: vec![Control::action("Back", Action::ReturnToMenu)],
            },
        );
        assert_eq!(out.target, "42");
        assert_eq!(out.metadata["message_id"], 7);
        assert_eq!(out.controls.len(), 1);
    }
}
