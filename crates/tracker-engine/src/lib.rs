//! # tracker-engine
//!
//! Orchestration for the student tracker's scheduled jobs:
//!
//! - [`ImportEngine`]: the nightly import, one stage per data set, ending
//!   with the [`CommentBackfill`]
//! - [`CrmExportEngine`]: the rolling-window export to the CRM
//! - [`RunLogger`]: the coded log trail every stage writes
//! - [`runner`]: the entry points behind the `tracker` subcommands
//!
//! Engines are generic over the source traits in `tracker-sources`, so tests
//! drive them with in-memory fakes against an in-memory store.

pub mod comments;
pub mod crm_export;
pub mod error;
pub mod import;
pub mod run_log;
pub mod runner;

pub use comments::{CommentBackfill, CommentBackfillReport};
pub use crm_export::{CrmExportEngine, CrmExportReport, CrmExportStage};
pub use error::{EngineError, FailureScope};
pub use import::{ImportEngine, ImportRunReport, StageOutcome};
pub use run_log::RunLogger;
pub use runner::RunStamp;
