//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Input lines:
//! - `:<action_code>` presses a control, e.g. `:show_faq`
//! - `:file <file_id> [file_name]` sends an attachment
//! - `/start` and other slash commands
//! - anything else is free text

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{
    Attachment, Channel, EventKind, IncomingMessage, MessageStream, OutgoingMessage,
};
use crate::error::ChannelError;
use crate::menu::ControlTarget;

/// User id of the console user.
pub const CLI_USER_ID: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify one console line.
fn parse_line(line: &str) -> EventKind {
    let Some(rest) = line.strip_prefix(':') else {
        return EventKind::from_text(line);
    };
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("file"), Some(file_id)) => {
            let name: Vec<&str> = parts.collect();
            let file_name = (!name.is_empty()).then(|| name.join(" "));
            EventKind::Attachment(Attachment::new(file_id, file_name))
        }
        _ => EventKind::Action(rest.trim().to_string()),
    }
}

/// Render an outgoing message as console text.
fn format_output(message: &OutgoingMessage) -> String {
    let mut out = message.text.clone();
    if let Some(attachment) = &message.attachment {
        out.push_str(&format!("\n📎 {attachment}"));
    }
    for control in &message.controls {
        let line = match &control.target {
            ControlTarget::Action(action) => format!("\n  :{:<24} {}", action.code(), control.label),
            ControlTarget::Link(url) => format!("\n  {:<25} {}", url, control.label),
        };
        out.push_str(&line);
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = IncomingMessage::new("cli", CLI_USER_ID, parse_line(&line))
                            .with_username("local");
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), ChannelError> {
        if message.target == CLI_USER_ID {
            println!("\n{}\n", format_output(&message));
            eprint!("> ");
        } else {
            eprintln!("\n📨 to {}:\n{}\n", message.target, format_output(&message));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
