//! Monthly fees per child

use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_date, get_enum, get_opt_enum, get_opt_timestamp, get_timestamp, now_str, timestamp_str};
use crate::db::Database;
use crate::models::{Payment, PaymentMethod, PaymentRequest, PaymentStatus};

const PAYMENT_COLUMNS: &str =
    "id, child_id, amount_cents, period, due_date, status, method, paid_at, note, created_at, updated_at";

fn row_to_payment(row: &Row) -> SqliteResult<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        child_id: row.get(1)?,
        amount_cents: row.get(2)?,
        period: row.get(3)?,
        due_date: get_date(row, 4)?,
        status: get_enum(row, 5)?,
        method: get_opt_enum(row, 6)?,
        paid_at: get_opt_timestamp(row, 7)?,
        note: row.get(8)?,
        created_at: get_timestamp(row, 9)?,
        updated_at: get_timestamp(row, 10)?,
    })
}

/// Filters for listing payments. `status` filters on the stored status, except
/// `overdue`, which selects pending payments due before `today`.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub child_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub period: Option<String>,
}

impl Database {
    pub fn list_payments(&self, filter: &PaymentFilter, today: NaiveDate) -> SqliteResult<Vec<Payment>> {
        let (stored_status, due_before) = match filter.status {
            Some(PaymentStatus::Overdue) => (Some(PaymentStatus::Pending), Some(today.to_string())),
            Some(PaymentStatus::Pending) => (Some(PaymentStatus::Pending), None),
            other => (other, None),
        };
        let due_from = match filter.status {
            Some(PaymentStatus::Pending) => Some(today.to_string()),
            _ => None,
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM payments
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR due_date < ?2)
               AND (?3 IS NULL OR due_date >= ?3)
               AND (?4 IS NULL OR child_id = ?4)
               AND (?5 IS NULL OR child_id IN (SELECT id FROM children WHERE parent_id = ?5))
               AND (?6 IS NULL OR period = ?6)
             ORDER BY period DESC, due_date, id",
            PAYMENT_COLUMNS
        ))?;
        let payments = stmt
            .query_map(
                rusqlite::params![
                    stored_status.map(|s| s.as_ref().to_string()),
                    due_before,
                    due_from,
                    filter.child_id,
                    filter.parent_id,
                    filter.period
                ],
                row_to_payment,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(payments)
    }

    pub fn get_payment(&self, id: i64) -> SqliteResult<Option<Payment>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS),
            [id],
            row_to_payment,
        )
        .optional()
    }

    pub fn create_payment(&self, req: &PaymentRequest) -> SqliteResult<Payment> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO payments (child_id, amount_cents, period, due_date, status, note, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?6)",
                rusqlite::params![
                    req.child_id,
                    req.amount_cents,
                    req.period,
                    req.due_date.to_string(),
                    req.note,
                    now_str()
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_payment(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    /// Patch a payment; `None` fields keep their current value.
    pub fn update_payment(
        &self,
        id: i64,
        amount_cents: Option<i64>,
        due_date: Option<NaiveDate>,
        status: Option<PaymentStatus>,
        note: Option<&str>,
    ) -> SqliteResult<Option<Payment>> {
        let rows = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE payments SET
                    amount_cents = COALESCE(?2, amount_cents),
                    due_date = COALESCE(?3, due_date),
                    status = COALESCE(?4, status),
                    note = COALESCE(?5, note),
                    updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    amount_cents,
                    due_date.map(|d| d.to_string()),
                    status.map(|s| s.as_ref().to_string()),
                    note,
                    now_str()
                ],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_payment(id)
    }

    pub fn mark_payment_paid(&self, id: i64, method: PaymentMethod) -> SqliteResult<Option<Payment>> {
        let rows = {
            let conn = self.conn()?;
            let now = Utc::now();
            conn.execute(
                "UPDATE payments SET status = 'paid', method = ?2, paid_at = ?3, updated_at = ?3
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![id, method.as_ref(), timestamp_str(now)],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_payment(id)
    }

    pub fn delete_payment(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM payments WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Create a pending payment for every active child lacking one for `period`.
    /// Returns the created payments; children already billed are left alone.
    pub fn generate_period_payments(
        &self,
        period: &str,
        amount_cents: i64,
        due_date: NaiveDate,
    ) -> SqliteResult<Vec<Payment>> {
        let created_ids = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let child_ids: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM children
                     WHERE active = 1
                       AND id NOT IN (SELECT child_id FROM payments WHERE period = ?1)
                     ORDER BY id",
                )?;
                let ids = stmt
                    .query_map([period], |row| row.get(0))?
                    .collect::<SqliteResult<Vec<i64>>>()?;
                ids
            };
            let now = now_str();
            let mut created = Vec::with_capacity(child_ids.len());
            for child_id in child_ids {
                tx.execute(
                    "INSERT INTO payments (child_id, amount_cents, period, due_date, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
                    rusqlite::params![child_id, amount_cents, period, due_date.to_string(), now],
                )?;
                created.push(tx.last_insert_rowid());
            }
            tx.commit()?;
            created
        };

        let mut payments = Vec::with_capacity(created_ids.len());
        for id in created_ids {
            if let Some(p) = self.get_payment(id)? {
                payments.push(p);
            }
        }
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::PaymentFilter;
    use crate::db::open_temp;
    use crate::models::{ChildRequest, Gender, PaymentMethod, PaymentStatus};
    use chrono::NaiveDate;

    fn add_child(db: &crate::db::Database, name: &str, active: bool) -> i64 {
        db.create_child(
            &ChildRequest {
                first_name: name.to_string(),
                last_name: "Test".to_string(),
                birth_date: NaiveDate::from_ymd_opt(2022, 3, 3).unwrap(),
                gender: Gender::Other,
                group_id: None,
                parent_id: None,
                allergies: None,
                medical_notes: None,
                emergency_contact_name: None,
                emergency_contact_phone: None,
                enrolled_on: None,
                active,
            },
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_generate_is_idempotent_per_period() {
        let (_dir, db) = open_temp();
        add_child(&db, "Ava", true);
        add_child(&db, "Ben", true);
        add_child(&db, "Cal", false);
        let due = NaiveDate::from_ymd_opt(2026, 10, 10).unwrap();

        assert_eq!(db.generate_period_payments("2026-10", 45_000, due).unwrap().len(), 2);
        assert_eq!(db.generate_period_payments("2026-10", 45_000, due).unwrap().len(), 0);
        assert_eq!(db.generate_period_payments("2026-11", 45_000, due).unwrap().len(), 2);
    }

    #[test]
    fn test_overdue_filter_and_pay() {
        let (_dir, db) = open_temp();
        add_child(&db, "Ava", true);
        let due = NaiveDate::from_ymd_opt(2026, 10, 10).unwrap();
        let created = db.generate_period_payments("2026-10", 45_000, due).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let overdue = db
            .list_payments(
                &PaymentFilter {
                    status: Some(PaymentStatus::Overdue),
                    ..Default::default()
                },
                today,
            )
            .unwrap();
        assert_eq!(overdue.len(), 1);

        let pending = db
            .list_payments(
                &PaymentFilter {
                    status: Some(PaymentStatus::Pending),
                    ..Default::default()
                },
                today,
            )
            .unwrap();
        assert!(pending.is_empty());

        let paid = db.mark_payment_paid(created[0].id, PaymentMethod::Card).unwrap().unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert!(paid.paid_at.is_some());
        // A second payment attempt is a no-op
        assert!(db.mark_payment_paid(created[0].id, PaymentMethod::Cash).unwrap().is_none());
    }
}
