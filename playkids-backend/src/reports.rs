//! Attendance and payment reports, plus the cached dashboard summary.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use moka::sync::Cache;
use serde::Serialize;

use crate::db::tables::reports::{AttendanceCounts, DashboardCounts};
use crate::db::Database;
use crate::models::{Payment, PaymentStatus};

/// How long a computed dashboard summary is served from memory
pub const DASHBOARD_TTL: Duration = Duration::from_secs(30);

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Share of recorded days the child was present or late. Zero when nothing was recorded.
pub fn attendance_rate(attended: i64, recorded: i64) -> f64 {
    if recorded <= 0 {
        return 0.0;
    }
    round4(attended as f64 / recorded as f64)
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildAttendanceRow {
    #[serde(flatten)]
    pub counts: AttendanceCounts,
    pub days_recorded: i64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub group_id: Option<i64>,
    pub children: Vec<ChildAttendanceRow>,
    pub days_recorded: i64,
    pub overall_rate: f64,
}

pub fn attendance_report(
    from: NaiveDate,
    to: NaiveDate,
    group_id: Option<i64>,
    counts: Vec<AttendanceCounts>,
) -> AttendanceReport {
    let mut total_recorded = 0;
    let mut total_attended = 0;
    let children = counts
        .into_iter()
        .map(|counts| {
            let days_recorded = counts.days_recorded();
            total_recorded += days_recorded;
            total_attended += counts.days_attended();
            ChildAttendanceRow {
                attendance_rate: attendance_rate(counts.days_attended(), days_recorded),
                days_recorded,
                counts,
            }
        })
        .collect();

    AttendanceReport {
        from,
        to,
        group_id,
        children,
        days_recorded: total_recorded,
        overall_rate: attendance_rate(total_attended, total_recorded),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentReport {
    pub period: Option<String>,
    pub billed_cents: i64,
    pub paid_cents: i64,
    pub outstanding_cents: i64,
    /// Count per effective status
    pub by_status: BTreeMap<String, i64>,
}

/// Totals over `payments`. Cancelled payments are counted but never billed.
pub fn payment_report(period: Option<String>, payments: &[Payment], today: NaiveDate) -> PaymentReport {
    let mut report = PaymentReport {
        period,
        ..Default::default()
    };
    for payment in payments {
        let status = payment.effective_status(today);
        *report.by_status.entry(status.as_ref().to_string()).or_insert(0) += 1;
        match status {
            PaymentStatus::Cancelled => {}
            PaymentStatus::Paid => {
                report.billed_cents += payment.amount_cents;
                report.paid_cents += payment.amount_cents;
            }
            PaymentStatus::Pending | PaymentStatus::Overdue => {
                report.billed_cents += payment.amount_cents;
                report.outstanding_cents += payment.amount_cents;
            }
        }
    }
    report
}

/// Dashboard summary cached per day for `DASHBOARD_TTL`.
pub struct DashboardCache {
    cache: Cache<NaiveDate, DashboardCounts>,
}

impl DashboardCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(4).time_to_live(ttl).build();
        Self { cache }
    }

    pub fn get_or_load(&self, db: &Database, today: NaiveDate) -> rusqlite::Result<DashboardCounts> {
        if let Some(hit) = self.cache.get(&today) {
            return Ok(hit);
        }
        let counts = db.dashboard_counts(today)?;
        self.cache.insert(today, counts.clone());
        Ok(counts)
    }

    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for DashboardCache {
    fn default() -> Self {
        Self::new(DASHBOARD_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_temp;
    use crate::models::{ChildRequest, Gender, PaymentRequest};
    use chrono::{Duration as ChronoDuration, Utc};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn counts(present: i64, late: i64, absent: i64) -> AttendanceCounts {
        AttendanceCounts {
            child_id: 1,
            child_name: "Mia Novak".to_string(),
            present,
            late,
            absent,
            ..Default::default()
        }
    }

    #[test]
    fn test_attendance_rate_rounding() {
        assert_eq!(attendance_rate(0, 0), 0.0);
        assert_eq!(attendance_rate(2, 3), 0.6667);
        assert_eq!(attendance_rate(5, 5), 1.0);
    }

    #[test]
    fn test_attendance_report_counts_late_as_attended() {
        let report = attendance_report(
            date("2026-10-01"),
            date("2026-10-31"),
            None,
            vec![counts(3, 1, 0), counts(0, 0, 0), counts(1, 0, 3)],
        );
        assert_eq!(report.children[0].attendance_rate, 1.0);
        assert_eq!(report.children[1].attendance_rate, 0.0);
        assert_eq!(report.children[2].attendance_rate, 0.25);
        assert_eq!(report.days_recorded, 8);
        assert_eq!(report.overall_rate, 0.625);
    }

    fn payment(status: PaymentStatus, amount: i64, due: &str) -> Payment {
        Payment {
            id: 0,
            child_id: 1,
            amount_cents: amount,
            period: "2026-10".to_string(),
            due_date: date(due),
            status,
            method: None,
            paid_at: None,
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payment_report_uses_effective_status() {
        let payments = vec![
            payment(PaymentStatus::Paid, 40_000, "2026-10-05"),
            payment(PaymentStatus::Pending, 40_000, "2026-10-05"),
            payment(PaymentStatus::Pending, 40_000, "2026-10-30"),
            payment(PaymentStatus::Cancelled, 40_000, "2026-10-05"),
        ];
        let report = payment_report(Some("2026-10".to_string()), &payments, date("2026-10-17"));
        assert_eq!(report.billed_cents, 120_000);
        assert_eq!(report.paid_cents, 40_000);
        assert_eq!(report.outstanding_cents, 80_000);
        assert_eq!(report.by_status.get("overdue"), Some(&1));
        assert_eq!(report.by_status.get("pending"), Some(&1));
        assert_eq!(report.by_status.get("cancelled"), Some(&1));
    }

    #[test]
    fn test_dashboard_cache_serves_stale_until_invalidated() {
        let (_dir, db) = open_temp();
        let today = Utc::now().date_naive();
        let cache = DashboardCache::default();
        assert_eq!(cache.get_or_load(&db, today).unwrap().active_children, 0);

        let child = db
            .create_child(
                &ChildRequest {
                    first_name: "Mia".to_string(),
                    last_name: "Novak".to_string(),
                    birth_date: today - ChronoDuration::days(365 * 4),
                    gender: Gender::Female,
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
        db.create_payment(&PaymentRequest {
            child_id: child.id,
            amount_cents: 45_000,
            period: "2026-01".to_string(),
            due_date: today - ChronoDuration::days(10),
            note: None,
        })
        .unwrap();

        assert_eq!(cache.get_or_load(&db, today).unwrap().active_children, 0);
        cache.invalidate();
        let fresh = cache.get_or_load(&db, today).unwrap();
        assert_eq!(fresh.active_children, 1);
        assert_eq!(fresh.overdue_payments, 1);
    }
}
