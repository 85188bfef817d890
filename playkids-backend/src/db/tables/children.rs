//! Children records

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_date, get_enum, get_timestamp, now_str};
use crate::db::Database;
use crate::models::{Child, ChildRequest};

const CHILD_COLUMNS: &str = "id, first_name, last_name, birth_date, gender, group_id, parent_id,
    allergies, medical_notes, emergency_contact_name, emergency_contact_phone, enrolled_on, active,
    created_at, updated_at";

fn row_to_child(row: &Row) -> SqliteResult<Child> {
    Ok(Child {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        birth_date: get_date(row, 3)?,
        gender: get_enum(row, 4)?,
        group_id: row.get(5)?,
        parent_id: row.get(6)?,
        allergies: row.get(7)?,
        medical_notes: row.get(8)?,
        emergency_contact_name: row.get(9)?,
        emergency_contact_phone: row.get(10)?,
        enrolled_on: get_date(row, 11)?,
        active: row.get::<_, i64>(12)? != 0,
        created_at: get_timestamp(row, 13)?,
        updated_at: get_timestamp(row, 14)?,
    })
}

/// Optional filters for listing children; all set filters must match.
#[derive(Debug, Clone, Default)]
pub struct ChildFilter {
    pub group_id: Option<i64>,
    pub parent_id: Option<i64>,
    /// Substring of "first last"
    pub query: Option<String>,
    pub active: Option<bool>,
}

impl Database {
    pub fn list_children(&self, filter: &ChildFilter) -> SqliteResult<Vec<Child>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM children
             WHERE (?1 IS NULL OR group_id = ?1)
               AND (?2 IS NULL OR parent_id = ?2)
               AND (?3 IS NULL OR (first_name || ' ' || last_name) LIKE '%' || ?3 || '%')
               AND (?4 IS NULL OR active = ?4)
             ORDER BY last_name, first_name, id",
            CHILD_COLUMNS
        ))?;
        let children = stmt
            .query_map(
                rusqlite::params![
                    filter.group_id,
                    filter.parent_id,
                    filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()),
                    filter.active.map(|a| a as i64)
                ],
                row_to_child,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(children)
    }

    pub fn get_child(&self, id: i64) -> SqliteResult<Option<Child>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM children WHERE id = ?1", CHILD_COLUMNS),
            [id],
            row_to_child,
        )
        .optional()
    }

    pub fn create_child(&self, req: &ChildRequest, enrolled_on: NaiveDate) -> SqliteResult<Child> {
        let id = {
            let conn = self.conn()?;
            let now = now_str();
            conn.execute(
                "INSERT INTO children (first_name, last_name, birth_date, gender, group_id, parent_id,
                    allergies, medical_notes, emergency_contact_name, emergency_contact_phone,
                    enrolled_on, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
                rusqlite::params![
                    req.first_name,
                    req.last_name,
                    req.birth_date.to_string(),
                    req.gender.as_ref(),
                    req.group_id,
                    req.parent_id,
                    req.allergies,
                    req.medical_notes,
                    req.emergency_contact_name,
                    req.emergency_contact_phone,
                    enrolled_on.to_string(),
                    req.active as i64,
                    now
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_child(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn update_child(
        &self,
        id: i64,
        req: &ChildRequest,
        enrolled_on: NaiveDate,
    ) -> SqliteResult<Option<Child>> {
        let rows = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE children SET first_name = ?2, last_name = ?3, birth_date = ?4, gender = ?5,
                    group_id = ?6, parent_id = ?7, allergies = ?8, medical_notes = ?9,
                    emergency_contact_name = ?10, emergency_contact_phone = ?11, enrolled_on = ?12,
                    active = ?13, updated_at = ?14
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    req.first_name,
                    req.last_name,
                    req.birth_date.to_string(),
                    req.gender.as_ref(),
                    req.group_id,
                    req.parent_id,
                    req.allergies,
                    req.medical_notes,
                    req.emergency_contact_name,
                    req.emergency_contact_phone,
                    enrolled_on.to_string(),
                    req.active as i64,
                    now_str()
                ],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_child(id)
    }

    pub fn delete_child(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM children WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    pub fn is_parent_of(&self, parent_id: i64, child_id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM children WHERE id = ?1 AND parent_id = ?2",
            [child_id, parent_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_active_children(&self) -> SqliteResult<i64> {
        let conn = self.conn()?;
        conn.query_row("SELECT COUNT(*) FROM children WHERE active = 1", [], |row| row.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::ChildFilter;
    use crate::db::open_temp;
    use crate::models::{ChildRequest, Gender, GroupRequest, Role};
    use chrono::NaiveDate;

    fn child_request(first: &str, last: &str) -> ChildRequest {
        ChildRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            birth_date: NaiveDate::from_ymd_opt(2022, 5, 1).unwrap(),
            gender: Gender::Female,
            group_id: None,
            parent_id: None,
            allergies: None,
            medical_notes: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            enrolled_on: None,
            active: true,
        }
    }

    #[test]
    fn test_filters_and_group_counts() {
        let (_dir, db) = open_temp();
        let today = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let group = db
            .create_group(&GroupRequest {
                name: "Sunflowers".to_string(),
                min_age: 3,
                max_age: 4,
                capacity: 2,
                teacher_id: None,
                room: Some("A1".to_string()),
            })
            .unwrap();
        let parent = db.create_user("mom@example.com", "h", "Mia Mom", None, Role::Parent).unwrap();

        let mut ella = child_request("Ella", "Brown");
        ella.group_id = Some(group.id);
        ella.parent_id = Some(parent.id);
        let ella = db.create_child(&ella, today).unwrap();
        let mut leo = child_request("Leo", "Adams");
        leo.group_id = Some(group.id);
        leo.active = false;
        db.create_child(&leo, today).unwrap();

        assert_eq!(db.get_group(group.id).unwrap().unwrap().child_count, 1);
        assert_eq!(db.count_active_children_in_group(group.id, Some(ella.id)).unwrap(), 0);

        let by_name = db
            .list_children(&ChildFilter {
                query: Some("ella b".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert!(db.is_parent_of(parent.id, ella.id).unwrap());

        let all = db.list_children(&ChildFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].first_name, "Leo");

        // Deleting the group unassigns its children
        assert!(db.delete_group(group.id).unwrap());
        assert_eq!(db.get_child(ella.id).unwrap().unwrap().group_id, None);
    }
}
