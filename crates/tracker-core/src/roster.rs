//! The active-student list threaded between import stages.
//!
//! Each stage that changes student state returns a new roster rather than
//! mutating a shared one.

use std::collections::HashMap;

use crate::records::StudentRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveRoster {
    students: Vec<StudentRecord>,
    by_client: HashMap<i64, usize>,
}

impl ActiveRoster {
    /// Build from any student list, dropping inactive students.
    #[must_use]
    pub fn from_students(students: impl IntoIterator<Item = StudentRecord>) -> Self {
        let students: Vec<_> = students.into_iter().filter(|s| s.active).collect();
        let by_client = students
            .iter()
            .enumerate()
            .map(|(i, s)| (s.client_id, i))
            .collect();
        Self {
            students,
            by_client,
        }
    }

    #[must_use]
    pub fn get(&self, client_id: i64) -> Option<&StudentRecord> {
        self.by_client.get(&client_id).map(|&i| &self.students[i])
    }

    #[must_use]
    pub fn contains(&self, client_id: i64) -> bool {
        self.by_client.contains_key(&client_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.students.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StudentRecord> {
        self.students.iter()
    }

    /// New or returning students whose attendance history predating the
    /// import window has not been fetched yet.
    pub fn new_students(&self) -> impl Iterator<Item = &StudentRecord> {
        self.students.iter().filter(|s| s.is_new || s.is_returned)
    }

    /// Students whose code-host login changed since the last comment import.
    pub fn renamed_students(&self) -> impl Iterator<Item = &StudentRecord> {
        self.students
            .iter()
            .filter(|s| s.github_renamed && s.github_user_previous.is_some())
    }

    /// Find the student owning a code-host login, case-insensitively.
    #[must_use]
    pub fn by_github_login(&self, login: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| {
            s.github_user
                .as_deref()
                .is_some_and(|u| u.eq_ignore_ascii_case(login))
        })
    }

    /// The same roster with every `is_new` and `is_returned` flag cleared.
    #[must_use]
    pub fn without_new_flags(self) -> Self {
        let students = self
            .students
            .into_iter()
            .map(|mut s| {
                s.is_new = false;
                s.is_returned = false;
                s
            })
            .collect::<Vec<_>>();
        Self::from_students(students)
    }

    /// The same roster with every `github_renamed` flag cleared.
    #[must_use]
    pub fn without_rename_flags(self) -> Self {
        let students = self
            .students
            .into_iter()
            .map(|mut s| {
                s.github_renamed = false;
                s
            })
            .collect::<Vec<_>>();
        Self::from_students(students)
    }
}

impl<'a> IntoIterator for &'a ActiveRoster {
    type Item = &'a StudentRecord;
    type IntoIter = std::slice::Iter<'a, StudentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.students.iter()
    }
}
