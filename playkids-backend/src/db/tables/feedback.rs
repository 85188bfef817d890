//! Parent feedback submitted from the public site

use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_enum, get_timestamp, now_str};
use crate::db::Database;
use crate::models::{Feedback, FeedbackCategory, FeedbackStatus};

const FEEDBACK_COLUMNS: &str =
    "id, name, email, rating, category, message, status, created_at, updated_at";

fn row_to_feedback(row: &Row) -> SqliteResult<Feedback> {
    Ok(Feedback {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        rating: row.get(3)?,
        category: get_enum(row, 4)?,
        message: row.get(5)?,
        status: get_enum(row, 6)?,
        created_at: get_timestamp(row, 7)?,
        updated_at: get_timestamp(row, 8)?,
    })
}

impl Database {
    pub fn create_feedback(
        &self,
        name: &str,
        email: &str,
        rating: i32,
        category: FeedbackCategory,
        message: &str,
    ) -> SqliteResult<Feedback> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO feedback (name, email, rating, category, message, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'new', ?6, ?6)",
            rusqlite::params![name, email, rating, category.as_ref(), message, now_str()],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {} FROM feedback WHERE id = ?1", FEEDBACK_COLUMNS),
            [id],
            row_to_feedback,
        )
    }

    pub fn list_feedback(&self, status: Option<FeedbackStatus>) -> SqliteResult<Vec<Feedback>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM feedback WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, id DESC",
            FEEDBACK_COLUMNS
        ))?;
        let items = stmt
            .query_map([status.map(|s| s.as_ref().to_string())], row_to_feedback)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    pub fn set_feedback_status(&self, id: i64, status: FeedbackStatus) -> SqliteResult<Option<Feedback>> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE feedback SET status = ?2, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![id, status.as_ref(), now_str()],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        conn.query_row(
            &format!("SELECT {} FROM feedback WHERE id = ?1", FEEDBACK_COLUMNS),
            [id],
            row_to_feedback,
        )
        .optional()
    }

    pub fn delete_feedback(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM feedback WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    pub fn count_new_feedback(&self) -> SqliteResult<i64> {
        let conn = self.conn()?;
        conn.query_row("SELECT COUNT(*) FROM feedback WHERE status = 'new'", [], |row| row.get(0))
    }
}
