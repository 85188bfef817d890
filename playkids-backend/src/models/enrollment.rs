use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, VariantNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, VariantNames)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Rejected,
    Waitlisted,
}

/// An application submitted through the public site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub child_name: String,
    pub child_birth_date: NaiveDate,
    pub parent_name: String,
    pub parent_email: String,
    pub parent_phone: String,
    #[serde(skip_serializing)]
    pub phone_normalized: String,
    pub desired_start_date: Option<NaiveDate>,
    pub preferred_group_id: Option<i64>,
    pub message: Option<String>,
    pub status: EnrollmentStatus,
    pub admin_note: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentRequest {
    pub child_name: String,
    pub child_birth_date: NaiveDate,
    pub parent_name: String,
    pub parent_email: String,
    pub parent_phone: String,
    pub desired_start_date: Option<NaiveDate>,
    pub preferred_group_id: Option<i64>,
    pub message: Option<String>,
}

/// What the public status lookup reveals about an application
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentStatusView {
    pub id: i64,
    pub child_name: String,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Enrollment> for EnrollmentStatusView {
    fn from(e: Enrollment) -> Self {
        Self {
            id: e.id,
            child_name: e.child_name,
            status: e.status,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewEnrollmentRequest {
    pub status: EnrollmentStatus,
    pub admin_note: Option<String>,
}
