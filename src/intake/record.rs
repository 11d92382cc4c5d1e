//! Application record: the finished bundle handed to the notification dispatcher.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::channels::Attachment;

/// Label recorded when the candidate typed text instead of sending a file.
pub const TEXT_RESUME_LABEL: &str = "(text instead of file)";

/// The resume part of an application: a file reference or typed text, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resume {
    Attachment(Attachment),
    Text { text: String },
}

impl Resume {
    /// Transport reference for attachments, the fixed fallback label otherwise.
    pub fn reference(&self) -> String {
        match self {
            Resume::Attachment(a) => a.to_string(),
            Resume::Text { .. } => TEXT_RESUME_LABEL.to_string(),
        }
    }

    /// Short human label for the recruiter notice.
    pub fn label(&self) -> &str {
        match self {
            Resume::Attachment(a) => a.file_name.as_deref().unwrap_or(&a.file_id),
            Resume::Text { .. } => TEXT_RESUME_LABEL,
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            Resume::Attachment(a) => Some(a),
            Resume::Text { .. } => None,
        }
    }
}

/// Who submitted the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applicant {
    pub user_id: String,
    pub username: Option<String>,
}

/// A completed application. Built once per finished intake and consumed by delivery.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub name: String,
    pub contact: String,
    pub resume: Resume,
    pub applicant: Applicant,
    pub submitted_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn new(name: String, contact: String, resume: Resume, applicant: Applicant) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            contact,
            resume,
            applicant,
            submitted_at: Utc::now(),
        }
    }
}
