//! Contact-form messages from the public site

use rusqlite::{Result as SqliteResult, Row};

use crate::db::sqlite::{get_timestamp, now_str};
use crate::db::Database;
use crate::models::{ContactMessage, ContactRequest};

const CONTACT_COLUMNS: &str = "id, name, email, phone, subject, message, handled, created_at";

fn row_to_contact(row: &Row) -> SqliteResult<ContactMessage> {
    Ok(ContactMessage {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        subject: row.get(4)?,
        message: row.get(5)?,
        handled: row.get::<_, i64>(6)? != 0,
        created_at: get_timestamp(row, 7)?,
    })
}

impl Database {
    pub fn create_contact_message(&self, req: &ContactRequest) -> SqliteResult<ContactMessage> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO contact_messages (name, email, phone, subject, message, handled, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            rusqlite::params![
                req.name,
                req.email.to_lowercase(),
                req.phone,
                req.subject,
                req.message,
                now_str()
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {} FROM contact_messages WHERE id = ?1", CONTACT_COLUMNS),
            [id],
            row_to_contact,
        )
    }

    pub fn list_contact_messages(&self, handled: Option<bool>) -> SqliteResult<Vec<ContactMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM contact_messages WHERE (?1 IS NULL OR handled = ?1)
             ORDER BY created_at DESC, id DESC",
            CONTACT_COLUMNS
        ))?;
        let items = stmt
            .query_map([handled.map(|h| h as i64)], row_to_contact)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    pub fn mark_contact_handled(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("UPDATE contact_messages SET handled = 1 WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    pub fn delete_contact_message(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM contact_messages WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    pub fn count_unhandled_contact_messages(&self) -> SqliteResult<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM contact_messages WHERE handled = 0",
            [],
            |row| row.get(0),
        )
    }
}
