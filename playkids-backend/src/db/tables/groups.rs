//! Kindergarten groups (classes)

use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_timestamp, now_str};
use crate::db::Database;
use crate::models::{Group, GroupRequest};

const GROUP_SELECT: &str = "SELECT g.id, g.name, g.min_age, g.max_age, g.capacity, g.teacher_id, g.room,
        (SELECT COUNT(*) FROM children c WHERE c.group_id = g.id AND c.active = 1),
        g.created_at, g.updated_at
     FROM kid_groups g";

fn row_to_group(row: &Row) -> SqliteResult<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        min_age: row.get(2)?,
        max_age: row.get(3)?,
        capacity: row.get(4)?,
        teacher_id: row.get(5)?,
        room: row.get(6)?,
        child_count: row.get(7)?,
        created_at: get_timestamp(row, 8)?,
        updated_at: get_timestamp(row, 9)?,
    })
}

impl Database {
    pub fn list_groups(&self) -> SqliteResult<Vec<Group>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY g.min_age, g.name", GROUP_SELECT))?;
        let groups = stmt.query_map([], row_to_group)?.collect::<SqliteResult<Vec<_>>>()?;
        Ok(groups)
    }

    pub fn get_group(&self, id: i64) -> SqliteResult<Option<Group>> {
        let conn = self.conn()?;
        conn.query_row(&format!("{} WHERE g.id = ?1", GROUP_SELECT), [id], row_to_group)
            .optional()
    }

    pub fn create_group(&self, req: &GroupRequest) -> SqliteResult<Group> {
        let id = {
            let conn = self.conn()?;
            let now = now_str();
            conn.execute(
                "INSERT INTO kid_groups (name, min_age, max_age, capacity, teacher_id, room, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    req.name.trim(),
                    req.min_age,
                    req.max_age,
                    req.capacity,
                    req.teacher_id,
                    req.room,
                    now
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_group(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn update_group(&self, id: i64, req: &GroupRequest) -> SqliteResult<Option<Group>> {
        let rows = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE kid_groups SET name = ?2, min_age = ?3, max_age = ?4, capacity = ?5,
                    teacher_id = ?6, room = ?7, updated_at = ?8
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    req.name.trim(),
                    req.min_age,
                    req.max_age,
                    req.capacity,
                    req.teacher_id,
                    req.room,
                    now_str()
                ],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_group(id)
    }

    /// Delete a group; its children become unassigned.
    pub fn delete_group(&self, id: i64) -> SqliteResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE children SET group_id = NULL, updated_at = ?2 WHERE group_id = ?1",
            rusqlite::params![id, now_str()],
        )?;
        let rows = tx.execute("DELETE FROM kid_groups WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    /// Active children in a group, optionally not counting one child (for moves/edits).
    pub fn count_active_children_in_group(
        &self,
        group_id: i64,
        exclude_child: Option<i64>,
    ) -> SqliteResult<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM children
             WHERE group_id = ?1 AND active = 1 AND (?2 IS NULL OR id != ?2)",
            rusqlite::params![group_id, exclude_child],
            |row| row.get(0),
        )
    }

    pub fn count_groups(&self) -> SqliteResult<i64> {
        let conn = self.conn()?;
        conn.query_row("SELECT COUNT(*) FROM kid_groups", [], |row| row.get(0))
    }
}
