//! Read-only aggregates used by the reports endpoints

use chrono::NaiveDate;
use rusqlite::Result as SqliteResult;
use serde::Serialize;

use crate::db::Database;

/// Per-child attendance counts over a date range
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceCounts {
    pub child_id: i64,
    pub child_name: String,
    pub group_id: Option<i64>,
    pub present: i64,
    pub absent: i64,
    pub sick: i64,
    pub vacation: i64,
    pub late: i64,
}

impl AttendanceCounts {
    pub fn days_recorded(&self) -> i64 {
        self.present + self.absent + self.sick + self.vacation + self.late
    }

    pub fn days_attended(&self) -> i64 {
        self.present + self.late
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    pub active_children: i64,
    pub groups: i64,
    pub present_today: i64,
    pub pending_enrollments: i64,
    pub new_feedback: i64,
    pub overdue_payments: i64,
    pub unhandled_contact_messages: i64,
}

impl Database {
    /// Counts per status for every active child (optionally of one group) between
    /// `from` and `to` inclusive. Children with no marks get all-zero counts.
    pub fn attendance_counts(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        group_id: Option<i64>,
    ) -> SqliteResult<Vec<AttendanceCounts>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.first_name || ' ' || c.last_name, c.group_id,
                    COALESCE(SUM(a.status = 'present'), 0),
                    COALESCE(SUM(a.status = 'absent'), 0),
                    COALESCE(SUM(a.status = 'sick'), 0),
                    COALESCE(SUM(a.status = 'vacation'), 0),
                    COALESCE(SUM(a.status = 'late'), 0)
             FROM children c
             LEFT JOIN attendance a ON a.child_id = c.id AND a.date >= ?1 AND a.date <= ?2
             WHERE c.active = 1 AND (?3 IS NULL OR c.group_id = ?3)
             GROUP BY c.id
             ORDER BY c.last_name, c.first_name, c.id",
        )?;
        let rows = stmt
            .query_map(
                rusqlite::params![from.to_string(), to.to_string(), group_id],
                |row| {
                    Ok(AttendanceCounts {
                        child_id: row.get(0)?,
                        child_name: row.get(1)?,
                        group_id: row.get(2)?,
                        present: row.get(3)?,
                        absent: row.get(4)?,
                        sick: row.get(5)?,
                        vacation: row.get(6)?,
                        late: row.get(7)?,
                    })
                },
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn dashboard_counts(&self, today: NaiveDate) -> SqliteResult<DashboardCounts> {
        let (present_today, overdue_payments) = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM attendance a
                        JOIN children c ON c.id = a.child_id AND c.active = 1
                        WHERE a.date = ?1 AND a.status IN ('present', 'late')),
                    (SELECT COUNT(*) FROM payments WHERE status = 'pending' AND due_date < ?1)",
                [today.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
        };
        Ok(DashboardCounts {
            active_children: self.count_active_children()?,
            groups: self.count_groups()?,
            present_today,
            pending_enrollments: self.count_pending_enrollments()?,
            new_feedback: self.count_new_feedback()?,
            overdue_payments,
            unhandled_contact_messages: self.count_unhandled_contact_messages()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Months, Utc};

    use crate::db::open_temp;
    use crate::models::{AttendanceInput, AttendanceStatus, ChildRequest, Gender, Role};

    fn child(active: bool) -> ChildRequest {
        ChildRequest {
            first_name: "Luka".to_string(),
            last_name: "Babic".to_string(),
            birth_date: Utc::now().date_naive().checked_sub_months(Months::new(50)).unwrap(),
            gender: Gender::Male,
            group_id: None,
            parent_id: None,
            allergies: None,
            medical_notes: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            enrolled_on: None,
            active,
        }
    }

    #[test]
    fn test_present_today_ignores_inactive_children() {
        let (_dir, db) = open_temp();
        let today = Utc::now().date_naive();
        let teacher = db.create_user("t@example.com", "h", "Tina Teacher", None, Role::Teacher).unwrap();
        let active = db.create_child(&child(true), today).unwrap();
        let inactive = db.create_child(&child(false), today).unwrap();
        for (child_id, status) in [
            (active.id, AttendanceStatus::Late),
            (inactive.id, AttendanceStatus::Present),
        ] {
            let input = AttendanceInput { child_id, status, check_in: None, check_out: None, note: None };
            db.upsert_attendance(today, &input, teacher.id).unwrap();
        }

        let counts = db.dashboard_counts(today).unwrap();
        assert_eq!(counts.active_children, 1);
        assert_eq!(counts.present_today, 1);
    }
}
