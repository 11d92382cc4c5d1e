//! In-memory channel for tests and local experiments.
//!
//! Records every send attempt and can be told to fail a number of them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::channel::{Channel, IncomingMessage, MessageStream, OutgoingMessage};
use crate::error::ChannelError;

/// A channel that records outbound messages and replays queued inbound ones.
#[derive(Default)]
pub struct RecordingChannel {
    inbound: Mutex<VecDeque<IncomingMessage>>,
    sent: Mutex<Vec<OutgoingMessage>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events `start` will yield, in order, before the stream ends.
    pub fn with_inbound(messages: impl IntoIterator<Item = IncomingMessage>) -> Self {
        Self {
            inbound: Mutex::new(messages.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Make the next `n` sends fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Messages that were delivered successfully.
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Successful deliveries addressed to `target`.
    pub fn sent_to(&self, target: &str) -> Vec<OutgoingMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.target == target)
            .collect()
    }

    /// Send calls made, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let queued: Vec<IncomingMessage> = self
            .inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        Ok(Box::pin(futures::stream::iter(queued)))
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ChannelError::SendFailed {
                name: "recording".into(),
                reason: "simulated failure".into(),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
