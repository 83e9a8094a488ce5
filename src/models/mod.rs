use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row of the submission sheet, keyed by roll number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubmissionRecord {
    pub name: String,
    pub roll_no: String,
    /// Optional cohort tag; empty string when the student left it blank.
    #[serde(default)]
    pub batch: String,
    /// Relative link to the stored blob, e.g. "/uploads/101.py".
    pub file_link: String,
    /// Localized timestamp captured when the record was (re)inserted.
    pub submitted_at: String,
}

/// Process-wide accept/reject flag, persisted next to the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PortalStatus {
    pub accepting_submissions: bool,
}

impl Default for PortalStatus {
    fn default() -> Self {
        Self {
            accepting_submissions: true,
        }
    }
}
