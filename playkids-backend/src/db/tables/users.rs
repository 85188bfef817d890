//! Users and login sessions

use chrono::{Duration, Utc};
use rusqlite::{OptionalExtension, Result as SqliteResult, Row};
use uuid::Uuid;

use crate::db::sqlite::{get_enum, get_timestamp, now_str, timestamp_str};
use crate::db::Database;
use crate::models::{AuthSession, Role, User};

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, phone, role, active, created_at, updated_at";

fn row_to_user(row: &Row) -> SqliteResult<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        full_name: row.get(3)?,
        phone: row.get(4)?,
        role: get_enum(row, 5)?,
        active: row.get::<_, i64>(6)? != 0,
        created_at: get_timestamp(row, 7)?,
        updated_at: get_timestamp(row, 8)?,
    })
}

impl Database {
    pub fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        full_name: &str,
        phone: Option<&str>,
        role: Role,
    ) -> SqliteResult<User> {
        let conn = self.conn()?;
        let now = now_str();
        conn.execute(
            "INSERT INTO users (email, password_hash, full_name, phone, role, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
            rusqlite::params![email.to_lowercase(), password_hash, full_name, phone, role.as_ref(), now],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [id],
            row_to_user,
        )
    }

    pub fn get_user(&self, id: i64) -> SqliteResult<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [id],
            row_to_user,
        )
        .optional()
    }

    pub fn get_user_by_email(&self, email: &str) -> SqliteResult<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            [email.trim().to_lowercase()],
            row_to_user,
        )
        .optional()
    }

    pub fn list_users(&self, role: Option<Role>) -> SqliteResult<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE (?1 IS NULL OR role = ?1) ORDER BY full_name, id",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([role.map(|r| r.as_ref().to_string())], row_to_user)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(users)
    }

    /// Patch a user; `None` fields keep their current value.
    pub fn update_user(
        &self,
        id: i64,
        full_name: Option<&str>,
        phone: Option<&str>,
        role: Option<Role>,
        active: Option<bool>,
    ) -> SqliteResult<Option<User>> {
        let rows = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE users SET
                    full_name = COALESCE(?2, full_name),
                    phone = COALESCE(?3, phone),
                    role = COALESCE(?4, role),
                    active = COALESCE(?5, active),
                    updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    full_name,
                    phone,
                    role.map(|r| r.as_ref().to_string()),
                    active.map(|a| a as i64),
                    now_str()
                ],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_user(id)
    }

    pub fn set_user_password(&self, id: i64, password_hash: &str) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![id, password_hash, now_str()],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_user(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    pub fn count_users(&self) -> SqliteResult<i64> {
        let conn = self.conn()?;
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
    }

    /// Create the first admin account when no users exist yet. Returns true if created.
    pub fn ensure_bootstrap_admin(&self, email: &str, password_hash: &str) -> SqliteResult<bool> {
        if self.count_users()? > 0 {
            return Ok(false);
        }
        self.create_user(email, password_hash, "Administrator", None, Role::Admin)?;
        Ok(true)
    }

    // Session methods
    pub fn create_session(&self, user_id: i64, ttl_hours: i64) -> SqliteResult<AuthSession> {
        let created_at = Utc::now();
        let expires_at = Duration::try_hours(ttl_hours)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                rusqlite::Error::ToSqlConversionFailure(
                    format!("Session lifetime of {} hours is out of range", ttl_hours).into(),
                )
            })?;
        let conn = self.conn()?;
        let token = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO auth_sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![token, user_id, timestamp_str(created_at), timestamp_str(expires_at)],
        )?;

        Ok(AuthSession {
            id: conn.last_insert_rowid(),
            token,
            user_id,
            created_at,
            expires_at,
        })
    }

    /// Resolve a bearer token to its active user, if the session is live.
    pub fn validate_session(&self, token: &str) -> SqliteResult<Option<User>> {
        let conn = self.conn()?;
        let columns: Vec<String> = USER_COLUMNS.split(", ").map(|c| format!("u.{}", c)).collect();
        conn.query_row(
            &format!(
                "SELECT {} FROM auth_sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1 AND s.expires_at > ?2 AND u.active = 1",
                columns.join(", ")
            ),
            rusqlite::params![token, now_str()],
            row_to_user,
        )
        .optional()
    }

    pub fn delete_session(&self, token: &str) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows_affected = conn.execute("DELETE FROM auth_sessions WHERE token = ?1", [token])?;
        Ok(rows_affected > 0)
    }

    /// Revoke every session of a user except `keep_token`.
    pub fn delete_other_sessions(&self, user_id: i64, keep_token: &str) -> SqliteResult<usize> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM auth_sessions WHERE user_id = ?1 AND token != ?2",
            rusqlite::params![user_id, keep_token],
        )
    }

    pub fn cleanup_expired_sessions(&self) -> SqliteResult<usize> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM auth_sessions WHERE expires_at <= ?1", [now_str()])
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{is_unique_violation, open_temp};
    use crate::models::Role;

    #[test]
    fn test_duplicate_email_is_unique_violation() {
        let (_dir, db) = open_temp();
        db.create_user("Anna@Example.com", "h", "Anna Smith", None, Role::Parent).unwrap();
        let err = db
            .create_user("anna@example.com", "h", "Anna Again", None, Role::Parent)
            .unwrap_err();
        assert!(is_unique_violation(&err));
        let user = db.get_user_by_email("ANNA@example.com").unwrap().unwrap();
        assert_eq!(user.email, "anna@example.com");
    }

    #[test]
    fn test_session_lifecycle() {
        let (_dir, db) = open_temp();
        let user = db.create_user("t@example.com", "h", "Tina Teacher", None, Role::Teacher).unwrap();
        let session = db.create_session(user.id, 24).unwrap();
        assert_eq!(db.validate_session(&session.token).unwrap().unwrap().id, user.id);

        // Deactivated users lose access immediately
        db.update_user(user.id, None, None, None, Some(false)).unwrap();
        assert!(db.validate_session(&session.token).unwrap().is_none());

        db.update_user(user.id, None, None, None, Some(true)).unwrap();
        assert!(db.delete_session(&session.token).unwrap());
        assert!(db.validate_session(&session.token).unwrap().is_none());
    }

    #[test]
    fn test_expired_session_rejected() {
        let (_dir, db) = open_temp();
        let user = db.create_user("p@example.com", "h", "Pat Parent", None, Role::Parent).unwrap();
        let session = db.create_session(user.id, -1).unwrap();
        assert!(db.validate_session(&session.token).unwrap().is_none());
        assert_eq!(db.cleanup_expired_sessions().unwrap(), 1);
    }

    #[test]
    fn test_out_of_range_session_lifetime_is_an_error() {
        let (_dir, db) = open_temp();
        let user = db.create_user("p@example.com", "h", "Pat Parent", None, Role::Parent).unwrap();
        assert!(db.create_session(user.id, 3_000_000_000).is_err());
        assert!(db.create_session(user.id, i64::MAX).is_err());
        assert!(db.create_session(user.id, 8760).is_ok());
    }

    #[test]
    fn test_bootstrap_admin_only_when_empty() {
        let (_dir, db) = open_temp();
        assert!(db.ensure_bootstrap_admin("admin@example.com", "h").unwrap());
        assert!(!db.ensure_bootstrap_admin("other@example.com", "h").unwrap());
        assert_eq!(db.list_users(Some(Role::Admin)).unwrap().len(), 1);
    }
}
