//! # tracker-core
//!
//! Core types shared by every crate of the student tracker import:
//! - Record models for students, attendance, schedule, courses, and log entries
//! - Log codes and the stage state machines of the import and comment backfill
//! - The active-student roster threaded between import stages
//! - The immutable location lookup table
//! - Rolling date windows computed in the tracker's local time zone
//! - Cross-cutting error types

pub mod enums;
pub mod errors;
pub mod location;
pub mod records;
pub mod roster;
pub mod window;

pub use errors::CoreError;
pub use location::{LocatedRecord, LocationLookup, LookupMiss};
pub use roster::ActiveRoster;
pub use window::DateWindow;
