use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, VariantNames};

pub const MAX_RSVP_ATTENDEES: i32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub rsvp_required: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRequest {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    #[serde(default)]
    pub rsvp_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, VariantNames)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RsvpResponse {
    Going,
    NotGoing,
    Maybe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rsvp {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub response: RsvpResponse,
    pub attendees: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_attendees() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct RsvpRequest {
    pub response: RsvpResponse,
    #[serde(default = "default_attendees")]
    pub attendees: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RsvpSummary {
    pub going: i64,
    pub not_going: i64,
    pub maybe: i64,
    /// Headcount across `going` replies only
    pub total_attendees: i64,
}

impl RsvpSummary {
    pub fn from_rsvps(rsvps: &[Rsvp]) -> Self {
        rsvps.iter().fold(Self::default(), |mut acc, r| {
            match r.response {
                RsvpResponse::Going => {
                    acc.going += 1;
                    acc.total_attendees += r.attendees as i64;
                }
                RsvpResponse::NotGoing => acc.not_going += 1,
                RsvpResponse::Maybe => acc.maybe += 1,
            }
            acc
        })
    }
}
