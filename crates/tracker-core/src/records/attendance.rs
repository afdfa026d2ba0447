use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::enums::AttendanceStatus;

/// Review comment attached to an attendance event.
///
/// ```text
/// missing → authored
///         → processed (checked, nothing found)
/// ```
///
/// `Processed` is the sentinel that keeps an event out of the missing-comment
/// query without pretending a comment exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CommentState {
    #[default]
    Missing,
    Authored {
        text: String,
        repo: Option<String>,
    },
    Processed,
}

impl CommentState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Authored { .. } => "authored",
            Self::Processed => "processed",
        }
    }

    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Only a missing comment may change; authored and processed are final.
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Missing, Self::Authored { .. } | Self::Processed)
        )
    }
}

/// One visit of a student to a scheduled class or course session.
///
/// Unique on `(client_id, visit_id)`. `starts_at` is wall-clock time in the
/// tracker's local time zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendanceEvent {
    pub client_id: i64,
    pub visit_id: i64,
    pub service_name: String,
    pub event_name: String,
    pub course_id: Option<i64>,
    pub starts_at: NaiveDateTime,
    pub status: AttendanceStatus,
    pub level: Option<u8>,
    pub comment: CommentState,
}

impl AttendanceEvent {
    #[must_use]
    pub const fn service_date(&self) -> NaiveDate {
        self.starts_at.date()
    }

    /// Events of leveled classes expect a code-review comment.
    #[must_use]
    pub const fn requires_review(&self) -> bool {
        self.level.is_some()
    }

    /// Compare only the fields the scheduling platform owns.
    #[must_use]
    pub fn same_source_fields(&self, other: &Self) -> bool {
        self.client_id == other.client_id
            && self.visit_id == other.visit_id
            && self.service_name == other.service_name
            && self.event_name == other.event_name
            && self.course_id == other.course_id
            && self.starts_at == other.starts_at
            && self.status == other.status
            && self.level == other.level
    }
}

/// Extract the class level from a service name such as `"Java Level 3"` or
/// `"Level 0: Intro to Java"`.
#[must_use]
pub fn level_from_service_name(service_name: &str) -> Option<u8> {
    let lower = service_name.to_ascii_lowercase();
    let idx = lower.find("level")?;
    let digits: String = lower[idx + "level".len()..]
        .trim_start_matches([' ', '-', '_'])
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Java Level 3", Some(3))]
    #[case("Level 0: Intro to Java", Some(0))]
    #[case("level-1 python", Some(1))]
    #[case("Open Lab", None)]
    #[case("Leveling up", None)]
    fn parses_levels(#[case] name: &str, #[case] expected: Option<u8>) {
        assert_eq!(level_from_service_name(name), expected);
    }

    #[test]
    fn comment_state_never_reverts() {
        let authored = CommentState::Authored {
            text: "added loops".into(),
            repo: None,
        };
        assert!(CommentState::Missing.can_transition_to(&authored));
        assert!(CommentState::Missing.can_transition_to(&CommentState::Processed));
        assert!(!authored.can_transition_to(&CommentState::Missing));
        assert!(!CommentState::Processed.can_transition_to(&authored));
    }

    #[test]
    fn comment_state_serializes_with_tag() {
        let json = serde_json::to_value(CommentState::Processed).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "processed" }));
    }
}
