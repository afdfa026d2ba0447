//! Immutable map from the scheduling platform's location IDs to the tracker's
//! internal location codes.
//!
//! Built once per run and handed to every stage by reference. A miss is a hard
//! error for the one record that referenced the location and nothing else.

use std::collections::HashMap;

use crate::errors::CoreError;

/// A record that carries an external location ID needing resolution.
pub trait LocatedRecord {
    /// External ID of the record itself, reported on a lookup miss.
    fn record_id(&self) -> i64;
    fn location_id(&self) -> i64;
    fn set_location_code(&mut self, code: String);
}

/// A record dropped because its location is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupMiss {
    pub record_id: i64,
    pub location_id: i64,
}

impl From<LookupMiss> for CoreError {
    fn from(miss: LookupMiss) -> Self {
        Self::LocationNotFound {
            location_id: miss.location_id,
            record_id: miss.record_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationLookup {
    codes: HashMap<i64, String>,
}

impl LocationLookup {
    #[must_use]
    pub fn new(codes: HashMap<i64, String>) -> Self {
        Self { codes }
    }

    #[must_use]
    pub fn code_for(&self, location_id: i64) -> Option<&str> {
        self.codes.get(&location_id).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Resolve a single record in place.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LocationNotFound`] when the location ID is unknown.
    pub fn resolve_one<T: LocatedRecord>(&self, record: &mut T) -> Result<(), CoreError> {
        let location_id = record.location_id();
        let code = self.code_for(location_id).ok_or(CoreError::LocationNotFound {
            location_id,
            record_id: record.record_id(),
        })?;
        record.set_location_code(code.to_string());
        Ok(())
    }

    /// Resolve a batch. Records with unknown locations are split off into the
    /// miss list; the order of the resolved records is preserved.
    #[must_use]
    pub fn resolve<T: LocatedRecord>(&self, records: Vec<T>) -> (Vec<T>, Vec<LookupMiss>) {
        let mut resolved = Vec::with_capacity(records.len());
        let mut misses = Vec::new();
        for mut record in records {
            match self.code_for(record.location_id()) {
                Some(code) => {
                    record.set_location_code(code.to_string());
                    resolved.push(record);
                }
                None => misses.push(LookupMiss {
                    record_id: record.record_id(),
                    location_id: record.location_id(),
                }),
            }
        }
        (resolved, misses)
    }
}

impl FromIterator<(i64, String)> for LocationLookup {
    fn from_iter<I: IntoIterator<Item = (i64, String)>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ScheduleEntry;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn entry(schedule_id: i64, location_id: i64) -> ScheduleEntry {
        let starts_at = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap();
        ScheduleEntry {
            schedule_id,
            service_name: "Java Level 1".into(),
            location_id,
            location_code: None,
            starts_at,
            ends_at: starts_at + chrono::Duration::hours(1),
            capacity: 8,
            enrolled: 5,
        }
    }

    fn lookup() -> LocationLookup {
        [(10, "CP".to_string()), (20, "OV".to_string())]
            .into_iter()
            .collect()
    }

    #[test]
    fn resolve_splits_misses_and_keeps_order() {
        let (resolved, misses) = lookup().resolve(vec![entry(1, 10), entry(2, 99), entry(3, 20)]);

        let codes: Vec<_> = resolved
            .iter()
            .map(|e| (e.schedule_id, e.location_code.as_deref()))
            .collect();
        assert_eq!(codes, vec![(1, Some("CP")), (3, Some("OV"))]);
        assert_eq!(
            misses,
            vec![LookupMiss {
                record_id: 2,
                location_id: 99
            }]
        );
    }

    #[test]
    fn resolve_one_reports_the_record() {
        let mut missing = entry(5, 42);
        let err = lookup().resolve_one(&mut missing).unwrap_err();
        assert_eq!(
            err,
            CoreError::LocationNotFound {
                location_id: 42,
                record_id: 5
            }
        );
        assert!(missing.location_code.is_none());
    }
}
