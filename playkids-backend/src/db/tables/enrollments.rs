//! Enrollment applications

use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_date, get_enum, get_opt_date, get_opt_timestamp, get_timestamp, now_str};
use crate::db::Database;
use crate::models::{Enrollment, EnrollmentRequest, EnrollmentStatus};

const ENROLLMENT_COLUMNS: &str = "id, child_name, child_birth_date, parent_name, parent_email,
    parent_phone, phone_normalized, desired_start_date, preferred_group_id, message, status,
    admin_note, reviewed_at, created_at, updated_at";

fn row_to_enrollment(row: &Row) -> SqliteResult<Enrollment> {
    Ok(Enrollment {
        id: row.get(0)?,
        child_name: row.get(1)?,
        child_birth_date: get_date(row, 2)?,
        parent_name: row.get(3)?,
        parent_email: row.get(4)?,
        parent_phone: row.get(5)?,
        phone_normalized: row.get(6)?,
        desired_start_date: get_opt_date(row, 7)?,
        preferred_group_id: row.get(8)?,
        message: row.get(9)?,
        status: get_enum(row, 10)?,
        admin_note: row.get(11)?,
        reviewed_at: get_opt_timestamp(row, 12)?,
        created_at: get_timestamp(row, 13)?,
        updated_at: get_timestamp(row, 14)?,
    })
}

impl Database {
    pub fn create_enrollment(&self, req: &EnrollmentRequest, phone_normalized: &str) -> SqliteResult<Enrollment> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO enrollments (child_name, child_birth_date, parent_name, parent_email,
                    parent_phone, phone_normalized, desired_start_date, preferred_group_id, message,
                    status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10, ?10)",
                rusqlite::params![
                    req.child_name,
                    req.child_birth_date.to_string(),
                    req.parent_name,
                    req.parent_email.to_lowercase(),
                    req.parent_phone,
                    phone_normalized,
                    req.desired_start_date.map(|d| d.to_string()),
                    req.preferred_group_id,
                    req.message,
                    now_str()
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_enrollment(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_enrollment(&self, id: i64) -> SqliteResult<Option<Enrollment>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM enrollments WHERE id = ?1", ENROLLMENT_COLUMNS),
            [id],
            row_to_enrollment,
        )
        .optional()
    }

    pub fn list_enrollments(&self, status: Option<EnrollmentStatus>) -> SqliteResult<Vec<Enrollment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM enrollments WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, id DESC",
            ENROLLMENT_COLUMNS
        ))?;
        let items = stmt
            .query_map([status.map(|s| s.as_ref().to_string())], row_to_enrollment)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    pub fn find_enrollments_by_phone(&self, phone_normalized: &str) -> SqliteResult<Vec<Enrollment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM enrollments WHERE phone_normalized = ?1 ORDER BY created_at DESC, id DESC",
            ENROLLMENT_COLUMNS
        ))?;
        let items = stmt
            .query_map([phone_normalized], row_to_enrollment)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    /// Set the review outcome. `reviewed_at` is stamped when leaving `pending`.
    pub fn review_enrollment(
        &self,
        id: i64,
        status: EnrollmentStatus,
        admin_note: Option<&str>,
    ) -> SqliteResult<Option<Enrollment>> {
        let rows = {
            let conn = self.conn()?;
            let now = now_str();
            let reviewed_at = if status == EnrollmentStatus::Pending { None } else { Some(now.clone()) };
            conn.execute(
                "UPDATE enrollments SET status = ?2, admin_note = COALESCE(?3, admin_note),
                    reviewed_at = ?4, updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![id, status.as_ref(), admin_note, reviewed_at, now],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_enrollment(id)
    }

    pub fn count_pending_enrollments(&self) -> SqliteResult<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM enrollments WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )
    }
}
