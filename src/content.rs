//! Content store: job posting facts and FAQ answers.
//!
//! Built once at startup and never mutated. FAQ answers for the built-in
//! topics are derived from the posting fields; a content file may replace
//! them or add further topics.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ContentError};

/// Text shown when an FAQ topic key is not configured.
pub const UNKNOWN_TOPIC_TEXT: &str = "Sorry, that question was not recognized.";

/// Longest FAQ key that still fits a `show_faq_topic:<key>` action code in
/// Telegram's 64-byte callback data.
pub const MAX_FAQ_KEY_BYTES: usize = 49;

/// Static facts about the advertised position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPosting {
    pub title: String,
    pub salary: String,
    pub schedule: String,
    pub location: String,
    /// Multi-line bullet list.
    pub requirements: String,
    /// Multi-line bullet list.
    pub benefits: String,
    /// Free-form contact line shown at the bottom of the posting.
    pub contact: String,
}

impl Default for JobPosting {
    fn default() -> Self {
        Self {
            title: "Sales Manager".to_string(),
            salary: "80,000 to 150,000 per month".to_string(),
            schedule: "Full-time, 9:00 to 18:00".to_string(),
            location: "City centre office (hybrid)".to_string(),
            requirements: "• At least 1 year of sales experience\n\
                           • Strong communication skills\n\
                           • Comfortable with outbound sales"
                .to_string(),
            benefits: "• Official salary plus bonuses\n\
                       • Paid training\n\
                       • Team events"
                .to_string(),
            contact: "📩 Questions: reply here or call the office".to_string(),
        }
    }
}

/// A single FAQ topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    /// Stable key used in `show_faq_topic:<key>` action codes.
    pub key: String,
    /// Button label.
    pub label: String,
    /// Answer text.
    pub answer: String,
}

impl FaqEntry {
    pub fn new(key: impl Into<String>, label: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            answer: answer.into(),
        }
    }
}

/// Optional JSON content file (`HIRE_DESK_CONTENT_PATH`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContentFile {
    pub posting: JobPosting,
    pub faq: Vec<FaqEntry>,
}

impl ContentFile {
    /// Read and parse a content file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let content: Self = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
        content.validate()?;
        Ok(content)
    }

    /// Every FAQ key must be non-empty, unique and short enough to use as
    /// button data.
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "faq".into(),
            message,
        };
        let mut seen = std::collections::HashSet::new();
        for entry in &self.faq {
            let key = entry.key.as_str();
            if key.trim().is_empty() {
                return Err(invalid("FAQ entry with an empty key".into()));
            }
            if key.len() > MAX_FAQ_KEY_BYTES {
                return Err(invalid(format!(
                    "FAQ key '{key}' is {} bytes; the limit is {MAX_FAQ_KEY_BYTES}",
                    key.len()
                )));
            }
            if !seen.insert(key) {
                return Err(invalid(format!("duplicate FAQ key '{key}'")));
            }
        }
        Ok(())
    }
}

/// Immutable lookup from topic key to formatted answer text.
#[derive(Debug, Clone)]
pub struct ContentStore {
    posting: JobPosting,
    faq: Vec<FaqEntry>,
}

impl ContentStore {
    /// Build a store whose FAQ covers the five built-in posting topics.
    pub fn new(posting: JobPosting) -> Self {
        let faq = default_faq(&posting);
        Self { posting, faq }
    }

    /// Merge extra FAQ entries. An entry with an existing key replaces the
    /// built-in answer in place; new keys are appended in order.
    pub fn with_extra_faq(mut self, extra: impl IntoIterator<Item = FaqEntry>) -> Self {
        for entry in extra {
            match self.faq.iter_mut().find(|e| e.key == entry.key) {
                Some(existing) => *existing = entry,
                None => self.faq.push(entry),
            }
        }
        self
    }

    pub fn posting(&self) -> &JobPosting {
        &self.posting
    }

    /// FAQ topics in display order.
    pub fn faq(&self) -> &[FaqEntry] {
        &self.faq
    }

    /// Look up the answer for an FAQ topic.
    pub fn lookup(&self, key: &str) -> Result<&str, ContentError> {
        self.faq
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.answer.as_str())
            .ok_or_else(|| ContentError::NotFound {
                key: key.to_string(),
            })
    }

    /// Like [`lookup`](Self::lookup), but unknown keys yield [`UNKNOWN_TOPIC_TEXT`].
    pub fn answer_or_fallback(&self, key: &str) -> &str {
        self.lookup(key).unwrap_or(UNKNOWN_TOPIC_TEXT)
    }

    /// The full job-posting view (Markdown).
    pub fn posting_text(&self) -> String {
        let p = &self.posting;
        format!(
            "*{}*\n\n\
             💰 *Salary:* {}\n\
             📅 *Schedule:* {}\n\
             📍 *Location:* {}\n\n\
             ✅ *Requirements:*\n{}\n\n\
             🎁 *Benefits:*\n{}\n\n\
             📞 *Contact:* {}",
            p.title, p.salary, p.schedule, p.location, p.requirements, p.benefits, p.contact
        )
    }
}

fn default_faq(p: &JobPosting) -> Vec<FaqEntry> {
    vec![
        FaqEntry::new(
            "salary",
            "💰 Salary",
            format!("Salary: {}. Paid twice a month.", p.salary),
        ),
        FaqEntry::new("schedule", "📅 Schedule", format!("Schedule: {}.", p.schedule)),
        FaqEntry::new("location", "📍 Location", format!("Location: {}.", p.location)),
        FaqEntry::new(
            "requirements",
            "✅ Requirements",
            format!("Requirements:\n{}", p.requirements),
        ),
        FaqEntry::new(
            "benefits",
            "🎁 Benefits",
            format!("We offer:\n{}", p.benefits),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn builtin_topics_are_derived_from_posting() {
        let posting = JobPosting {
            salary: "100k".into(),
            ..JobPosting::default()
        };
        let store = ContentStore::new(posting);
        let keys: Vec<&str> = store.faq().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            ["salary", "schedule", "location", "requirements", "benefits"]
        );
        assert_eq!(
            store.lookup("salary").unwrap(),
            "Salary: 100k. Paid twice a month."
        );
    }

    #[test]
    fn unknown_key_is_not_found() {
        let store = ContentStore::new(JobPosting::default());
        assert_eq!(
            store.lookup("parking"),
            Err(ContentError::NotFound {
                key: "parking".into()
            })
        );
        assert_eq!(store.answer_or_fallback("parking"), UNKNOWN_TOPIC_TEXT);
    }

    #[test]
    fn extra_faq_replaces_and_appends() {
        let store = ContentStore::new(JobPosting::default()).with_extra_faq([
            FaqEntry::new("salary", "💰 Pay", "Negotiable."),
            FaqEntry::new("remote", "🏠 Remote", "Two days a week."),
        ]);
        assert_eq!(store.faq().len(), 6);
        assert_eq!(store.faq()[0].label, "💰 Pay");
        assert_eq!(store.lookup("salary").unwrap(), "Negotiable.");
        assert_eq!(store.faq()[5].key, "remote");
    }

    #[test]
    fn posting_text_includes_every_field() {
        let store = ContentStore::new(JobPosting::default());
        let text = store.posting_text();
        let p = store.posting();
        for field in [
            &p.title,
            &p.salary,
            &p.schedule,
            &p.location,
            &p.requirements,
            &p.benefits,
            &p.contact,
        ] {
            assert!(text.contains(field.as_str()), "missing {field}");
        }
    }

    #[test]
    fn content_file_partial_posting_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"posting": {{"title": "Barista"}}, "faq": [{{"key": "uniform", "label": "Uniform", "answer": "Provided."}}]}}"#
        )
        .unwrap();

        let content = ContentFile::load(file.path()).unwrap();
        assert_eq!(content.posting.title, "Barista");
        assert_eq!(content.posting.salary, JobPosting::default().salary);
        assert_eq!(content.faq.len(), 1);
    }

    fn load_faq(faq_json: &str) -> Result<ContentFile, ConfigError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"faq": {faq_json}}}"#).unwrap();
        ContentFile::load(file.path())
    }

    #[test]
    fn faq_key_at_limit_is_accepted() {
        let key = "k".repeat(MAX_FAQ_KEY_BYTES);
        let content = load_faq(&format!(r#"[{{"key": "{key}", "label": "L", "answer": "A"}}]"#))
            .unwrap();
        assert_eq!(content.faq[0].key, key);
    }

    #[test]
    fn faq_key_too_long_for_button_data_is_rejected() {
        let key = "k".repeat(MAX_FAQ_KEY_BYTES + 1);
        let err = load_faq(&format!(r#"[{{"key": "{key}", "label": "L", "answer": "A"}}]"#))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "faq"));
    }

    #[test]
    fn faq_empty_or_duplicate_keys_are_rejected() {
        let empty = load_faq(r#"[{"key": " ", "label": "L", "answer": "A"}]"#);
        assert!(matches!(empty, Err(ConfigError::InvalidValue { .. })));

        let duplicate = load_faq(
            r#"[{"key": "uniform", "label": "L", "answer": "A"},
                {"key": "uniform", "label": "M", "answer": "B"}]"#,
        );
        assert!(matches!(duplicate, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn content_file_bad_json_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ContentFile::load(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
