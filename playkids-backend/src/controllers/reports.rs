use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::controllers::{db_error, require_admin, require_staff, today};
use crate::db::tables::PaymentFilter;
use crate::reports::{attendance_report, payment_report};
use crate::validation::{ValidationErrors, Validator};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/reports")
            .route("/attendance", web::get().to(attendance))
            .route("/payments", web::get().to(payments))
            .route("/dashboard", web::get().to(dashboard)),
    );
}

#[derive(Deserialize)]
struct AttendanceQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    group_id: Option<i64>,
}

/// Defaults to the current month up to today.
async fn attendance(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<AttendanceQuery>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let to = query.to.unwrap_or_else(today);
    let from = query.from.unwrap_or_else(|| to.with_day(1).unwrap_or(to));
    if from > to {
        return ValidationErrors::single("from", "from must not be after to").to_response();
    }
    match state.db.attendance_counts(from, to, query.group_id) {
        Ok(counts) => HttpResponse::Ok().json(attendance_report(from, to, query.group_id, counts)),
        Err(e) => db_error("Failed to build attendance report", e),
    }
}

#[derive(Deserialize)]
struct PaymentsQuery {
    period: Option<String>,
}

async fn payments(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<PaymentsQuery>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    let period = query.period.as_deref().map(str::trim).filter(|p| !p.is_empty());
    if let Some(period) = period {
        let mut v = Validator::new();
        v.period("period", period);
        if let Err(errors) = v.finish() {
            return errors.to_response();
        }
    }
    let filter = PaymentFilter {
        period: period.map(str::to_string),
        ..Default::default()
    };
    let today = today();
    match state.db.list_payments(&filter, today) {
        Ok(list) => HttpResponse::Ok().json(payment_report(filter.period.clone(), &list, today)),
        Err(e) => db_error("Failed to build payment report", e),
    }
}

async fn dashboard(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    match state.dashboard_cache.get_or_load(&state.db, today()) {
        Ok(counts) => HttpResponse::Ok().json(counts),
        Err(e) => db_error("Failed to load dashboard", e),
    }
}
