//! Rolling-window and retention settings for the import and the CRM export.

use serde::{Deserialize, Serialize};

const fn default_attendance_past_days() -> u32 {
    7
}

const fn default_schedule_past_days() -> u32 {
    14
}

const fn default_schedule_future_days() -> u32 {
    45
}

const fn default_course_past_days() -> u32 {
    30
}

const fn default_course_future_days() -> u32 {
    120
}

const fn default_log_retention_days() -> u32 {
    21
}

fn default_comment_levels() -> Vec<u8> {
    vec![0, 1]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Attendance and comments are imported from `today - attendance_past_days`.
    #[serde(default = "default_attendance_past_days")]
    pub attendance_past_days: u32,

    #[serde(default = "default_schedule_past_days")]
    pub schedule_past_days: u32,

    #[serde(default = "default_schedule_future_days")]
    pub schedule_future_days: u32,

    /// Window for course attendance.
    #[serde(default = "default_course_past_days")]
    pub course_past_days: u32,

    #[serde(default = "default_course_future_days")]
    pub course_future_days: u32,

    /// Log rows older than this are pruned at the start of each run.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,

    /// Levels that get a dedicated comment pass after the bulk pass.
    #[serde(default = "default_comment_levels")]
    pub comment_levels: Vec<u8>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            attendance_past_days: default_attendance_past_days(),
            schedule_past_days: default_schedule_past_days(),
            schedule_future_days: default_schedule_future_days(),
            course_past_days: default_course_past_days(),
            course_future_days: default_course_future_days(),
            log_retention_days: default_log_retention_days(),
            comment_levels: default_comment_levels(),
        }
    }
}

const fn default_export_past_days() -> u32 {
    30
}

const fn default_export_future_days() -> u32 {
    45
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrmExportConfig {
    #[serde(default = "default_export_past_days")]
    pub past_days: u32,

    #[serde(default = "default_export_future_days")]
    pub future_days: u32,
}

impl Default for CrmExportConfig {
    fn default() -> Self {
        Self {
            past_days: default_export_past_days(),
            future_days: default_export_future_days(),
        }
    }
}
