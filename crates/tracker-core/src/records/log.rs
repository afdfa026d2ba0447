use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::LogCode;

/// Student a log entry is about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogSubject {
    pub client_id: i64,
    pub name: String,
}

/// An append-only log trail entry. Pruned by age, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    /// Row ID; `None` until stored.
    pub id: Option<i64>,
    pub code: LogCode,
    pub subject: Option<LogSubject>,
    pub detail: String,
    pub logged_at: DateTime<Utc>,
}

impl LogEntry {
    #[must_use]
    pub fn new(code: LogCode, detail: impl Into<String>, logged_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            code,
            subject: None,
            detail: detail.into(),
            logged_at,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, client_id: i64, name: impl Into<String>) -> Self {
        self.subject = Some(LogSubject {
            client_id,
            name: name.into(),
        });
        self
    }

    /// Full log line: code message followed by the detail text.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.subject {
            Some(subject) => format!("{} for {}{}", self.code.message(), subject.name, self.detail),
            None => format!("{}{}", self.code.message(), self.detail),
        }
    }
}
