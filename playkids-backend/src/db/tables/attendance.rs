//! Daily attendance marks, one per child per date

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_date, get_enum, get_opt_enum, get_timestamp, now_str};
use crate::db::Database;
use crate::models::{AttendanceInput, AttendanceRecord, DaySheetRow};

const ATTENDANCE_COLUMNS: &str =
    "id, child_id, date, status, check_in, check_out, note, recorded_by, created_at, updated_at";

fn row_to_record(row: &Row) -> SqliteResult<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.get(0)?,
        child_id: row.get(1)?,
        date: get_date(row, 2)?,
        status: get_enum(row, 3)?,
        check_in: row.get(4)?,
        check_out: row.get(5)?,
        note: row.get(6)?,
        recorded_by: row.get(7)?,
        created_at: get_timestamp(row, 8)?,
        updated_at: get_timestamp(row, 9)?,
    })
}

fn upsert_on(
    conn: &Connection,
    date: NaiveDate,
    input: &AttendanceInput,
    recorded_by: i64,
) -> SqliteResult<()> {
    conn.execute(
        "INSERT INTO attendance (child_id, date, status, check_in, check_out, note, recorded_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
         ON CONFLICT(child_id, date) DO UPDATE SET
            status = excluded.status,
            check_in = excluded.check_in,
            check_out = excluded.check_out,
            note = excluded.note,
            recorded_by = excluded.recorded_by,
            updated_at = excluded.updated_at",
        rusqlite::params![
            input.child_id,
            date.to_string(),
            input.status.as_ref(),
            input.check_in,
            input.check_out,
            input.note,
            recorded_by,
            now_str()
        ],
    )?;
    Ok(())
}

impl Database {
    pub fn upsert_attendance(
        &self,
        date: NaiveDate,
        input: &AttendanceInput,
        recorded_by: i64,
    ) -> SqliteResult<AttendanceRecord> {
        {
            let conn = self.conn()?;
            upsert_on(&conn, date, input, recorded_by)?;
        }
        self.get_attendance(input.child_id, date)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    /// Write a whole day's marks atomically.
    pub fn upsert_attendance_bulk(
        &self,
        date: NaiveDate,
        inputs: &[AttendanceInput],
        recorded_by: i64,
    ) -> SqliteResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for input in inputs {
            upsert_on(&tx, date, input, recorded_by)?;
        }
        tx.commit()?;
        Ok(inputs.len())
    }

    pub fn get_attendance(&self, child_id: i64, date: NaiveDate) -> SqliteResult<Option<AttendanceRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM attendance WHERE child_id = ?1 AND date = ?2",
                ATTENDANCE_COLUMNS
            ),
            rusqlite::params![child_id, date.to_string()],
            row_to_record,
        )
        .optional()
    }

    /// Every active child (optionally of one group) with their mark for `date`, if any.
    pub fn attendance_day_sheet(
        &self,
        date: NaiveDate,
        group_id: Option<i64>,
    ) -> SqliteResult<Vec<DaySheetRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.first_name, c.last_name, c.group_id, a.status, a.check_in, a.check_out, a.note
             FROM children c
             LEFT JOIN attendance a ON a.child_id = c.id AND a.date = ?1
             WHERE c.active = 1 AND (?2 IS NULL OR c.group_id = ?2)
             ORDER BY c.last_name, c.first_name, c.id",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![date.to_string(), group_id], |row| {
                Ok(DaySheetRow {
                    child_id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    group_id: row.get(3)?,
                    status: get_opt_enum(row, 4)?,
                    check_in: row.get(5)?,
                    check_out: row.get(6)?,
                    note: row.get(7)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_child_attendance(
        &self,
        child_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> SqliteResult<Vec<AttendanceRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM attendance
             WHERE child_id = ?1 AND (?2 IS NULL OR date >= ?2) AND (?3 IS NULL OR date <= ?3)
             ORDER BY date DESC",
            ATTENDANCE_COLUMNS
        ))?;
        let records = stmt
            .query_map(
                rusqlite::params![
                    child_id,
                    from.map(|d| d.to_string()),
                    to.map(|d| d.to_string())
                ],
                row_to_record,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::open_temp;
    use crate::models::{AttendanceInput, AttendanceStatus, ChildRequest, Gender};
    use chrono::NaiveDate;

    fn mark(child_id: i64, status: AttendanceStatus) -> AttendanceInput {
        AttendanceInput {
            child_id,
            status,
            check_in: Some("08:15".to_string()),
            check_out: None,
            note: None,
        }
    }

    #[test]
    fn test_upsert_replaces_same_day_mark() {
        let (_dir, db) = open_temp();
        let today = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let child = db
            .create_child(
                &ChildRequest {
                    first_name: "Noah".to_string(),
                    last_name: "Green".to_string(),
                    birth_date: NaiveDate::from_ymd_opt(2022, 1, 10).unwrap(),
                    gender: Gender::Male,
                    group_id: None,
                    parent_id: None,
                    allergies: None,
                    medical_notes: None,
                    emergency_contact_name: None,
                    emergency_contact_phone: None,
                    enrolled_on: None,
                    active: true,
                },
                today,
            )
            .unwrap();
        let staff = db
            .create_user("t@example.com", "h", "Tina Teacher", None, crate::models::Role::Teacher)
            .unwrap();

        db.upsert_attendance(today, &mark(child.id, AttendanceStatus::Present), staff.id)
            .unwrap();
        let record = db
            .upsert_attendance(today, &mark(child.id, AttendanceStatus::Sick), staff.id)
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Sick);
        assert_eq!(db.list_child_attendance(child.id, None, None).unwrap().len(), 1);

        let sheet = db.attendance_day_sheet(today, None).unwrap();
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet[0].status, Some(AttendanceStatus::Sick));

        let other_day = db.attendance_day_sheet(today.succ_opt().unwrap(), None).unwrap();
        assert_eq!(other_day[0].status, None);
    }
}
