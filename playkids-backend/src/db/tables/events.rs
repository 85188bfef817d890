//! Kindergarten events and parents' RSVPs

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_enum, get_timestamp, now_str, timestamp_str};
use crate::db::Database;
use crate::models::{Event, EventRequest, Rsvp, RsvpRequest};

const EVENT_COLUMNS: &str =
    "id, title, description, starts_at, ends_at, location, rsvp_required, created_by, created_at, updated_at";

const RSVP_SELECT: &str = "SELECT r.id, r.event_id, r.user_id, u.full_name, r.response, r.attendees,
        r.created_at, r.updated_at
     FROM event_rsvps r
     JOIN users u ON u.id = r.user_id";

fn row_to_event(row: &Row) -> SqliteResult<Event> {
    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        starts_at: get_timestamp(row, 3)?,
        ends_at: get_timestamp(row, 4)?,
        location: row.get(5)?,
        rsvp_required: row.get::<_, i64>(6)? != 0,
        created_by: row.get(7)?,
        created_at: get_timestamp(row, 8)?,
        updated_at: get_timestamp(row, 9)?,
    })
}

fn row_to_rsvp(row: &Row) -> SqliteResult<Rsvp> {
    Ok(Rsvp {
        id: row.get(0)?,
        event_id: row.get(1)?,
        user_id: row.get(2)?,
        user_name: row.get(3)?,
        response: get_enum(row, 4)?,
        attendees: row.get(5)?,
        created_at: get_timestamp(row, 6)?,
        updated_at: get_timestamp(row, 7)?,
    })
}

impl Database {
    /// List events by start time. With `ending_after`, only events that have not ended yet.
    pub fn list_events(&self, ending_after: Option<DateTime<Utc>>) -> SqliteResult<Vec<Event>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM events WHERE (?1 IS NULL OR ends_at >= ?1) ORDER BY starts_at, id",
            EVENT_COLUMNS
        ))?;
        let events = stmt
            .query_map([ending_after.map(timestamp_str)], row_to_event)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(events)
    }

    pub fn get_event(&self, id: i64) -> SqliteResult<Option<Event>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS),
            [id],
            row_to_event,
        )
        .optional()
    }

    pub fn create_event(&self, req: &EventRequest, created_by: i64) -> SqliteResult<Event> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO events (title, description, starts_at, ends_at, location, rsvp_required,
                    created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    req.title,
                    req.description,
                    timestamp_str(req.starts_at),
                    timestamp_str(req.ends_at),
                    req.location,
                    req.rsvp_required as i64,
                    created_by,
                    now_str()
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_event(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn update_event(&self, id: i64, req: &EventRequest) -> SqliteResult<Option<Event>> {
        let rows = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE events SET title = ?2, description = ?3, starts_at = ?4, ends_at = ?5,
                    location = ?6, rsvp_required = ?7, updated_at = ?8
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    req.title,
                    req.description,
                    timestamp_str(req.starts_at),
                    timestamp_str(req.ends_at),
                    req.location,
                    req.rsvp_required as i64,
                    now_str()
                ],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_event(id)
    }

    pub fn delete_event(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Insert or replace the user's reply to an event.
    pub fn upsert_rsvp(&self, event_id: i64, user_id: i64, req: &RsvpRequest) -> SqliteResult<Rsvp> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO event_rsvps (event_id, user_id, response, attendees, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(event_id, user_id) DO UPDATE SET
                    response = excluded.response,
                    attendees = excluded.attendees,
                    updated_at = excluded.updated_at",
                rusqlite::params![event_id, user_id, req.response.as_ref(), req.attendees, now_str()],
            )?;
        }
        let conn = self.conn()?;
        conn.query_row(
            &format!("{} WHERE r.event_id = ?1 AND r.user_id = ?2", RSVP_SELECT),
            [event_id, user_id],
            row_to_rsvp,
        )
    }

    pub fn list_rsvps(&self, event_id: i64) -> SqliteResult<Vec<Rsvp>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE r.event_id = ?1 ORDER BY r.created_at, r.id",
            RSVP_SELECT
        ))?;
        let rsvps = stmt
            .query_map([event_id], row_to_rsvp)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rsvps)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::db::open_temp;
    use crate::models::{EventRequest, Role, RsvpRequest, RsvpResponse};

    fn event_request(days_from_now: i64) -> EventRequest {
        let starts_at = Utc::now() + Duration::days(days_from_now);
        EventRequest {
            title: "Autumn fair".to_string(),
            description: None,
            starts_at,
            ends_at: starts_at + Duration::hours(2),
            location: Some("Main hall".to_string()),
            rsvp_required: true,
        }
    }

    #[test]
    fn test_upcoming_excludes_finished_events() {
        let (_dir, db) = open_temp();
        let t = db.create_user("t@example.com", "h", "Tess Teacher", None, Role::Teacher).unwrap();
        db.create_event(&event_request(-3), t.id).unwrap();
        let future = db.create_event(&event_request(3), t.id).unwrap();

        assert_eq!(db.list_events(None).unwrap().len(), 2);
        let upcoming = db.list_events(Some(Utc::now())).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, future.id);
    }

    #[test]
    fn test_rsvp_is_replaced_not_duplicated() {
        let (_dir, db) = open_temp();
        let t = db.create_user("t@example.com", "h", "Tess Teacher", None, Role::Teacher).unwrap();
        let p = db.create_user("p@example.com", "h", "Pat Parent", None, Role::Parent).unwrap();
        let event = db.create_event(&event_request(5), t.id).unwrap();

        db.upsert_rsvp(event.id, p.id, &RsvpRequest { response: RsvpResponse::Maybe, attendees: 1 })
            .unwrap();
        let rsvp = db
            .upsert_rsvp(event.id, p.id, &RsvpRequest { response: RsvpResponse::Going, attendees: 3 })
            .unwrap();
        assert_eq!(rsvp.user_name, "Pat Parent");
        assert_eq!(rsvp.attendees, 3);

        let all = db.list_rsvps(event.id).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].response, RsvpResponse::Going);
    }
}
