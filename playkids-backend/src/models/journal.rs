use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, VariantNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, VariantNames)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mood {
    Happy,
    Calm,
    Tired,
    Upset,
    Sick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, VariantNames)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Appetite {
    AteAll,
    AteSome,
    AteNone,
}

/// A teacher's daily note about one child
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub child_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub date: NaiveDate,
    pub mood: Mood,
    pub appetite: Option<Appetite>,
    pub nap_minutes: Option<i32>,
    pub activities: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalRequest {
    pub child_id: i64,
    pub date: NaiveDate,
    pub mood: Mood,
    pub appetite: Option<Appetite>,
    pub nap_minutes: Option<i32>,
    pub activities: Option<String>,
    pub note: Option<String>,
}
