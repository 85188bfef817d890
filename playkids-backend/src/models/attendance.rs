use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, VariantNames};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Sick,
    Vacation,
    Late,
}

impl AttendanceStatus {
    /// Whether the child was physically in the kindergarten that day
    pub fn is_attending(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub child_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub note: Option<String>,
    pub recorded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One child's mark, without the date
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceInput {
    pub child_id: i64,
    pub status: AttendanceStatus,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkAttendanceRequest {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub record: AttendanceInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkAttendanceRequest {
    pub date: NaiveDate,
    pub records: Vec<AttendanceInput>,
}

/// A row of the daily attendance sheet. Children without a mark have `status: null`.
#[derive(Debug, Clone, Serialize)]
pub struct DaySheetRow {
    pub child_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub group_id: Option<i64>,
    pub status: Option<AttendanceStatus>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub note: Option<String>,
}
