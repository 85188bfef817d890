//! Direct messages between users, and per-user notifications

use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_enum, get_opt_timestamp, get_timestamp, now_str};
use crate::db::Database;
use crate::models::{Audience, Message, Notification, NotificationKind};

const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, s.full_name, m.recipient_id, r.full_name,
        m.subject, m.body, m.read_at, m.created_at
     FROM messages m
     JOIN users s ON s.id = m.sender_id
     JOIN users r ON r.id = m.recipient_id";

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, body, kind, read, created_at";

fn row_to_message(row: &Row) -> SqliteResult<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_name: row.get(2)?,
        recipient_id: row.get(3)?,
        recipient_name: row.get(4)?,
        subject: row.get(5)?,
        body: row.get(6)?,
        read_at: get_opt_timestamp(row, 7)?,
        created_at: get_timestamp(row, 8)?,
    })
}

fn row_to_notification(row: &Row) -> SqliteResult<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        kind: get_enum(row, 4)?,
        read: row.get::<_, i64>(5)? != 0,
        created_at: get_timestamp(row, 6)?,
    })
}

impl Database {
    pub fn send_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        subject: &str,
        body: &str,
    ) -> SqliteResult<Message> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO messages (sender_id, recipient_id, subject, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![sender_id, recipient_id, subject, body, now_str()],
            )?;
            conn.last_insert_rowid()
        };
        self.get_message(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_message(&self, id: i64) -> SqliteResult<Option<Message>> {
        let conn = self.conn()?;
        conn.query_row(&format!("{} WHERE m.id = ?1", MESSAGE_SELECT), [id], row_to_message)
            .optional()
    }

    pub fn list_inbox(&self, user_id: i64) -> SqliteResult<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE m.recipient_id = ?1 AND m.recipient_deleted = 0 ORDER BY m.created_at DESC, m.id DESC",
            MESSAGE_SELECT
        ))?;
        let messages = stmt.query_map([user_id], row_to_message)?.collect::<SqliteResult<Vec<_>>>()?;
        Ok(messages)
    }

    pub fn list_sent(&self, user_id: i64) -> SqliteResult<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE m.sender_id = ?1 AND m.sender_deleted = 0 ORDER BY m.created_at DESC, m.id DESC",
            MESSAGE_SELECT
        ))?;
        let messages = stmt.query_map([user_id], row_to_message)?.collect::<SqliteResult<Vec<_>>>()?;
        Ok(messages)
    }

    /// Only the recipient can mark a message read; already-read messages keep their timestamp.
    pub fn mark_message_read(&self, id: i64, recipient_id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE messages SET read_at = COALESCE(read_at, ?3) WHERE id = ?1 AND recipient_id = ?2",
            rusqlite::params![id, recipient_id, now_str()],
        )?;
        Ok(rows > 0)
    }

    /// Hide a message from one side of the conversation; the row is dropped once both sides deleted it.
    pub fn delete_message_for(&self, id: i64, user_id: i64) -> SqliteResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE messages SET
                sender_deleted = CASE WHEN sender_id = ?2 THEN 1 ELSE sender_deleted END,
                recipient_deleted = CASE WHEN recipient_id = ?2 THEN 1 ELSE recipient_deleted END
             WHERE id = ?1 AND (sender_id = ?2 OR recipient_id = ?2)",
            rusqlite::params![id, user_id],
        )?;
        tx.execute(
            "DELETE FROM messages WHERE id = ?1 AND sender_deleted = 1 AND recipient_deleted = 1",
            [id],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // --- Notifications ---

    pub fn create_notification(
        &self,
        user_id: i64,
        title: &str,
        body: &str,
        kind: NotificationKind,
    ) -> SqliteResult<Notification> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO notifications (user_id, title, body, kind, read, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            rusqlite::params![user_id, title, body, kind.as_ref(), now_str()],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS),
            [id],
            row_to_notification,
        )
    }

    /// Deliver one notification to every active user in `audience`. Returns the number delivered.
    pub fn broadcast_notification(
        &self,
        audience: Audience,
        title: &str,
        body: &str,
        kind: NotificationKind,
    ) -> SqliteResult<usize> {
        let (role, user_id) = match audience {
            Audience::All => (None, None),
            Audience::Role(role) => (Some(role.as_ref().to_string()), None),
            Audience::User(id) => (None, Some(id)),
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO notifications (user_id, title, body, kind, read, created_at)
             SELECT id, ?3, ?4, ?5, 0, ?6 FROM users
             WHERE active = 1 AND (?1 IS NULL OR role = ?1) AND (?2 IS NULL OR id = ?2)",
            rusqlite::params![role, user_id, title, body, kind.as_ref(), now_str()],
        )
    }

    pub fn list_notifications(&self, user_id: i64, unread_only: bool) -> SqliteResult<Vec<Notification>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notifications
             WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
             ORDER BY created_at DESC, id DESC",
            NOTIFICATION_COLUMNS
        ))?;
        let notifications = stmt
            .query_map(rusqlite::params![user_id, unread_only as i64], row_to_notification)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(notifications)
    }

    pub fn count_unread_notifications(&self, user_id: i64) -> SqliteResult<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
            [user_id],
            |row| row.get(0),
        )
    }

    pub fn mark_notification_read(&self, id: i64, user_id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn mark_all_notifications_read(&self, user_id: i64) -> SqliteResult<usize> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
            [user_id],
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::db::open_temp;
    use crate::models::{Audience, NotificationKind, Role};

    #[test]
    fn test_message_deleted_per_side() {
        let (_dir, db) = open_temp();
        let a = db.create_user("a@example.com", "h", "Ann Admin", None, Role::Admin).unwrap();
        let p = db.create_user("p@example.com", "h", "Pat Parent", None, Role::Parent).unwrap();

        let msg = db.send_message(a.id, p.id, "Trip", "Bring a hat").unwrap();
        assert_eq!(msg.sender_name, "Ann Admin");
        assert!(db.mark_message_read(msg.id, p.id).unwrap());
        assert!(!db.mark_message_read(msg.id, a.id).unwrap());

        assert!(db.delete_message_for(msg.id, a.id).unwrap());
        assert!(db.list_sent(a.id).unwrap().is_empty());
        assert_eq!(db.list_inbox(p.id).unwrap().len(), 1);

        assert!(db.delete_message_for(msg.id, p.id).unwrap());
        assert!(db.get_message(msg.id).unwrap().is_none());
    }

    #[test]
    fn test_broadcast_by_role() {
        let (_dir, db) = open_temp();
        db.create_user("a@example.com", "h", "Ann Admin", None, Role::Admin).unwrap();
        let p1 = db.create_user("p1@example.com", "h", "Pat One", None, Role::Parent).unwrap();
        let p2 = db.create_user("p2@example.com", "h", "Pat Two", None, Role::Parent).unwrap();
        db.update_user(p2.id, None, None, None, Some(false)).unwrap();

        let delivered = db
            .broadcast_notification(Audience::Role(Role::Parent), "Closed", "Holiday", NotificationKind::Alert)
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(db.count_unread_notifications(p1.id).unwrap(), 1);
        assert_eq!(db.mark_all_notifications_read(p1.id).unwrap(), 1);
        assert!(db.list_notifications(p1.id, true).unwrap().is_empty());

        assert_eq!(
            db.broadcast_notification(Audience::All, "Hi", "All", NotificationKind::Info)
                .unwrap(),
            2
        );
    }
}
