use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, VariantNames};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackCategory {
    #[default]
    General,
    Staff,
    Food,
    Facilities,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, VariantNames)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackStatus {
    New,
    Reviewed,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub rating: i32,
    pub category: FeedbackCategory,
    pub message: String,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub name: String,
    pub email: String,
    pub rating: i32,
    #[serde(default)]
    pub category: FeedbackCategory,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackStatusRequest {
    pub status: FeedbackStatus,
}
