use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A student as known to the scheduling platform and the tracker.
///
/// `client_id` is the scheduling platform's person ID and the stable
/// reconciliation key. The flags below `active` are derived by the store
/// during reconciliation and are ignored when comparing fetched records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentRecord {
    pub client_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub github_user: Option<String>,
    pub home_location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub current_level: Option<u8>,
    pub grade: Option<u8>,
    pub active: bool,
    /// Inserted by the most recent reconciliation and still missing history.
    pub is_new: bool,
    /// Went from inactive back to active.
    pub is_returned: bool,
    /// Login recorded before the last code-host username change.
    pub github_user_previous: Option<String>,
    pub github_renamed: bool,
}

impl StudentRecord {
    /// A freshly fetched, active student with no derived flags.
    #[must_use]
    pub fn new(client_id: i64, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            client_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            github_user: None,
            home_location: None,
            start_date: None,
            current_level: None,
            grade: None,
            active: true,
            is_new: false,
            is_returned: false,
            github_user_previous: None,
            github_renamed: false,
        }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Compare only the fields the scheduling platform owns.
    #[must_use]
    pub fn same_source_fields(&self, other: &Self) -> bool {
        self.client_id == other.client_id
            && self.first_name == other.first_name
            && self.last_name == other.last_name
            && self.github_user == other.github_user
            && self.home_location == other.home_location
            && self.start_date == other.start_date
            && self.current_level == other.current_level
            && self.grade == other.grade
            && self.active == other.active
    }

    /// Whether `incoming` replaces a non-empty login with a different one.
    #[must_use]
    pub fn github_rename_to(&self, incoming: &Self) -> Option<String> {
        match (&self.github_user, &incoming.github_user) {
            (Some(old), Some(new)) if !old.is_empty() && !old.eq_ignore_ascii_case(new) => {
                Some(old.clone())
            }
            _ => None,
        }
    }
}
