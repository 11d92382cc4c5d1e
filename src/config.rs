//! Configuration types.
//!
//! Everything is read once at startup from the environment (a `.env` file is
//! honoured). Missing required values are fatal: the bot never starts serving
//! with a partial configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::content::{ContentFile, ContentStore, FaqEntry, JobPosting};
use crate::error::ConfigError;

/// Default idle time before an idle session is pruned.
const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

/// Which chat transport to run.
#[derive(Debug, Clone)]
pub enum Transport {
    Telegram { bot_token: SecretString },
    /// Local console; recruiter notices print to stderr.
    Cli,
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub transport: Transport,
    /// Where completed applications are delivered.
    pub recruiter_chat_id: String,
    /// Enables the "contact the recruiter" link on every menu.
    pub recruiter_contact_url: Option<String>,
    pub posting: JobPosting,
    /// FAQ entries from the content file, merged over the built-in topics.
    pub extra_faq: Vec<FaqEntry>,
    /// Serve `GET /api/status` on this port when set.
    pub status_port: Option<u16>,
    /// Idle sessions untouched this long are pruned.
    pub session_idle_timeout: Duration,
}

impl BotConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let transport = match get("HIRE_DESK_TRANSPORT").as_deref() {
            None | Some("telegram") => Transport::Telegram {
                bot_token: SecretString::from(require("TELEGRAM_BOT_TOKEN")?),
            },
            Some("cli") => Transport::Cli,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "HIRE_DESK_TRANSPORT".into(),
                    message: format!("expected 'telegram' or 'cli', got '{other}'"),
                });
            }
        };

        let recruiter_chat_id = require("RECRUITER_CHAT_ID")?;

        let content = match get("HIRE_DESK_CONTENT_PATH") {
            Some(path) => ContentFile::load(&PathBuf::from(path))?,
            None => ContentFile::default(),
        };
        let mut posting = content.posting;
        let overrides = [
            ("JOB_TITLE", &mut posting.title),
            ("JOB_SALARY", &mut posting.salary),
            ("JOB_SCHEDULE", &mut posting.schedule),
            ("JOB_LOCATION", &mut posting.location),
            ("JOB_REQUIREMENTS", &mut posting.requirements),
            ("JOB_BENEFITS", &mut posting.benefits),
            ("JOB_CONTACT", &mut posting.contact),
        ];
        for (key, field) in overrides {
            if let Some(value) = get(key) {
                // Allow literal "\n" in single-line env values
                *field = value.replace("\\n", "\n");
            }
        }

        let status_port = get("HIRE_DESK_STATUS_PORT")
            .map(|v| {
                v.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                    key: "HIRE_DESK_STATUS_PORT".into(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let idle_secs = get("HIRE_DESK_SESSION_IDLE_SECS")
            .map(|v| {
                v.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                    key: "HIRE_DESK_SESSION_IDLE_SECS".into(),
                    message: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_SESSION_IDLE_SECS);

        Ok(Self {
            transport,
            recruiter_chat_id,
            recruiter_contact_url: get("RECRUITER_CONTACT_URL"),
            posting,
            extra_faq: content.faq,
            status_port,
            session_idle_timeout: Duration::from_secs(idle_secs),
        })
    }

    /// Build the immutable content store for this configuration.
    pub fn content_store(&self) -> ContentStore {
        ContentStore::new(self.posting.clone()).with_extra_faq(self.extra_faq.clone())
    }
}
