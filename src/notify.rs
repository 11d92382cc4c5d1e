//! Notification dispatcher: delivers completed applications to the recruiter.
//!
//! Delivery is best-effort and at-most-once: one primary attempt, then one
//! plain-text failure notice if that fails. Nothing is queued or retried, and
//! the outcome never reaches the candidate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::channels::{Channel, OutgoingMessage};
use crate::intake::{ApplicationRecord, Resume};

/// Sent to the recruiter when the application itself could not be delivered.
pub const DELIVERY_FAILED_NOTICE: &str = "❌ Error: a new application could not be delivered.";

/// Outcome of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryResult {
    /// The application reached the recruiter.
    Delivered,
    /// The application failed; the failure notice went through.
    FallbackSent,
    /// Both attempts failed. The application is gone.
    Lost,
}

/// Running delivery totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    pub applications_submitted: u64,
    pub deliveries_failed: u64,
    pub applications_lost: u64,
}

/// Formats and sends application notices to the recruiter target.
pub struct NotificationDispatcher {
    channel: Arc<dyn Channel>,
    target: String,
    submitted: AtomicU64,
    failed: AtomicU64,
    lost: AtomicU64,
}

impl NotificationDispatcher {
    pub fn new(channel: Arc<dyn Channel>, target: impl Into<String>) -> Self {
        Self {
            channel,
            target: target.into(),
            submitted: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            lost: AtomicU64::new(0),
        }
    }

    /// Deliver one application. Never fails; the result says what happened.
    pub async fn deliver(&self, record: &ApplicationRecord) -> DeliveryResult {
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let mut notice = OutgoingMessage::text(&self.target, format_notice(record));
        if let Some(attachment) = record.resume.attachment() {
            notice = notice.with_attachment(attachment.clone());
        }

        let primary = match self.channel.send(notice).await {
            Ok(()) => {
                tracing::info!(
                    application_id = %record.id,
                    user_id = %record.applicant.user_id,
                    "Application delivered to recruiter"
                );
                return DeliveryResult::Delivered;
            }
            Err(e) => e,
        };

        self.failed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            application_id = %record.id,
            error = %primary,
            "Application delivery failed; sending failure notice"
        );

        let fallback = OutgoingMessage::text(&self.target, DELIVERY_FAILED_NOTICE);
        match self.channel.send(fallback).await {
            Ok(()) => DeliveryResult::FallbackSent,
            Err(e) => {
                self.lost.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    application_id = %record.id,
                    user_id = %record.applicant.user_id,
                    error = %e,
                    "Failure notice also failed; application lost"
                );
                DeliveryResult::Lost
            }
        }
    }

    pub fn counts(&self) -> DeliveryCounts {
        DeliveryCounts {
            applications_submitted: self.submitted.load(Ordering::Relaxed),
            deliveries_failed: self.failed.load(Ordering::Relaxed),
            applications_lost: self.lost.load(Ordering::Relaxed),
        }
    }
}

/// The fixed-shape recruiter notice (Markdown).
pub fn format_notice(record: &ApplicationRecord) -> String {
    let username = record
        .applicant
        .username
        .as_deref()
        .map(|u| format!("@{}", u.trim_start_matches('@')))
        .unwrap_or_else(|| "none".to_string());

    let mut notice = format!(
        "📬 *New application*\n\n\
         👤 *Name:* {}\n\
         📞 *Contact:* {}\n\
         📎 *File:* {}\n\
         🆔 *User ID:* {}\n\
         🌐 *Username:* {}",
        record.name,
        record.contact,
        record.resume.label(),
        record.applicant.user_id,
        username,
    );
    if let Resume::Text { text } = &record.resume {
        notice.push_str("\n\n📝 *Resume text:*\n");
        notice.push_str(text);
    }
    notice
}
