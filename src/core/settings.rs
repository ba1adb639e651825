//! Chatbot settings and the business-hours policy.
//!
//! Settings are plain serde values. The engine holds one copy at a time and
//! swaps it atomically on update, so every call sees a consistent snapshot.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Default greeting sent to brand-new sessions.
pub const DEFAULT_WELCOME_MESSAGE: &str =
    "¡Hola! 👋 Bienvenido/a. ¿En qué podemos ayudarte hoy?";
/// Default reply when nothing else answered.
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "Lo siento, no he entendido tu mensaje. Un miembro del equipo te responderá pronto.";
/// Default reply outside business hours.
pub const DEFAULT_OUTSIDE_HOURS_MESSAGE: &str =
    "Ahora mismo estamos cerrados. Te responderemos en cuanto abramos.";
/// Default session timeout in minutes.
const DEFAULT_SESSION_TIMEOUT_MINUTES: u32 = 30;
/// Default generation budget.
const DEFAULT_MAX_TOKENS: u32 = 500;
/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default provider request timeout.
const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

/// Process-wide chatbot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatbotSettings {
    /// Master switch.
    pub enabled: bool,
    /// Greeting for brand-new sessions.
    pub welcome_message: String,
    /// Reply when nothing else answered.
    pub fallback_message: String,
    /// Idle minutes after which the transport may start a new session.
    pub session_timeout_minutes: u32,
    /// Opening-hours policy.
    pub business_hours: BusinessHours,
    /// AI generation settings.
    pub ai: AiConfig,
}

impl Default for ChatbotSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            business_hours: BusinessHours::default(),
            ai: AiConfig::default(),
        }
    }
}

impl ChatbotSettings {
    /// Loads settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Additional provider tried when the primary one fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackProvider {
    /// Provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// API key. Resolved from the environment when empty.
    #[serde(default)]
    pub api_key: String,
    /// Optional base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// AI generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    /// Whether AI replies are attempted at all.
    pub enabled: bool,
    /// Primary provider name.
    pub provider: String,
    /// Primary model.
    pub model: String,
    /// API key for the primary provider. Resolved from the environment when empty.
    pub api_key: String,
    /// Optional base URL override for the primary provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// System prompt override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Ground replies on the knowledge base.
    pub use_knowledge_base: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Providers tried, in order, after the primary one.
    pub fallbacks: Vec<FallbackProvider>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: None,
            use_knowledge_base: false,
            timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
            fallbacks: Vec::new(),
        }
    }
}

/// Day of the week in schedule entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    /// Monday.
    Monday,
    /// Tuesday.
    Tuesday,
    /// Wednesday.
    Wednesday,
    /// Thursday.
    Thursday,
    /// Friday.
    Friday,
    /// Saturday.
    Saturday,
    /// Sunday.
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

/// Opening window for one weekday. Times are `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    /// Weekday this entry applies to.
    pub day: DayOfWeek,
    /// Closed all day when `false`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Opening time.
    pub open: String,
    /// Closing time. Earlier than `open` means the window spans midnight.
    pub close: String,
}

const fn default_true() -> bool {
    true
}

impl DaySchedule {
    /// Creates an open day entry.
    #[must_use]
    pub fn new(day: DayOfWeek, open: &str, close: &str) -> Self {
        Self {
            day,
            enabled: true,
            open: open.to_string(),
            close: close.to_string(),
        }
    }

    fn contains(&self, time: NaiveTime) -> bool {
        let (Some(open), Some(close)) = (parse_hhmm(&self.open), parse_hhmm(&self.close)) else {
            tracing::warn!(
                open = %self.open,
                close = %self.close,
                "unparseable business-hours window, treating day as closed"
            );
            return false;
        };
        if open < close {
            time >= open && time < close
        } else {
            time >= open || time < close
        }
    }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Opening-hours policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessHours {
    /// When `false` the business is always considered open.
    pub enabled: bool,
    /// IANA timezone the schedule is expressed in.
    pub timezone: String,
    /// Per-day windows. Only the first entry for a weekday is honoured.
    pub schedule: Vec<DaySchedule>,
    /// Keep answering automatically outside opening hours.
    pub auto_reply_outside_hours: bool,
    /// Reply sent outside opening hours when automatic replies are off.
    pub outside_hours_message: String,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            enabled: false,
            timezone: "UTC".to_string(),
            schedule: Vec::new(),
            auto_reply_outside_hours: true,
            outside_hours_message: DEFAULT_OUTSIDE_HOURS_MESSAGE.to_string(),
        }
    }
}

impl BusinessHours {
    /// Whether `now` falls inside opening hours.
    ///
    /// Pure and evaluated per call. The first schedule entry whose day
    /// matches wins, even if later entries name the same day.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return true;
        }

        let tz = Tz::from_str(&self.timezone).unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "unknown timezone, using UTC");
            Tz::UTC
        });
        let local = now.with_timezone(&tz);
        let today = DayOfWeek::from(local.weekday());

        self.schedule
            .iter()
            .find(|entry| entry.day == today)
            .is_some_and(|entry| entry.enabled && entry.contains(local.time()))
    }

    /// Whether the engine should answer with the out-of-hours message.
    #[must_use]
    pub fn blocks_reply_at(&self, now: DateTime<Utc>) -> bool {
        !self.auto_reply_outside_hours && !self.is_open_at(now)
    }
}
