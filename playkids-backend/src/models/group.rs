use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub min_age: i32,
    pub max_age: i32,
    pub capacity: i32,
    pub teacher_id: Option<i64>,
    pub room: Option<String>,
    /// Active children currently assigned
    pub child_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for both create and full update
#[derive(Debug, Clone, Deserialize)]
pub struct GroupRequest {
    pub name: String,
    pub min_age: i32,
    pub max_age: i32,
    pub capacity: i32,
    pub teacher_id: Option<i64>,
    pub room: Option<String>,
}
