use std::collections::HashSet;

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::controllers::children::ensure_child_access;
use crate::controllers::{db_error, require_staff, require_user, today};
use crate::models::{AttendanceInput, BulkAttendanceRequest, MarkAttendanceRequest};
use crate::validation::{sanitize_optional, ValidationErrors, Validator};
use crate::AppState;

const MAX_NOTE_LENGTH: usize = 500;
/// Largest batch accepted by the bulk endpoint
const MAX_BULK_RECORDS: usize = 200;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/attendance")
            .route("", web::get().to(day_sheet))
            .route("", web::post().to(mark_attendance))
            .route("/bulk", web::post().to(mark_attendance_bulk))
            .route("/child/{id}", web::get().to(child_history)),
    );
}

/// Per-record checks. Child existence is checked separately against the database.
fn validate_input(v: &mut Validator, input: &AttendanceInput) {
    v.time_of_day("check_in", input.check_in.as_deref())
        .time_of_day("check_out", input.check_out.as_deref())
        .optional_length("note", input.note.as_deref(), MAX_NOTE_LENGTH);
    if let (Some(check_in), Some(check_out)) = (&input.check_in, &input.check_out) {
        // HH:MM compares correctly as text
        v.check(
            check_out >= check_in,
            "check_out",
            "check_out cannot be before check_in",
        );
    }
    if !input.status.is_attending() {
        v.check(
            input.check_in.is_none() && input.check_out.is_none(),
            "check_in",
            "Check-in and check-out only apply to present or late children",
        );
    }
}

fn check_child_exists(
    state: &web::Data<AppState>,
    v: &mut Validator,
    child_id: i64,
) -> Result<(), HttpResponse> {
    match state.db.get_child(child_id) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => {
            v.error("child_id", "child_id must reference an existing child");
            Ok(())
        }
        Err(e) => Err(db_error("Failed to look up child", e)),
    }
}

fn cleaned(input: &AttendanceInput) -> AttendanceInput {
    AttendanceInput {
        note: sanitize_optional(input.note.as_deref()),
        ..input.clone()
    }
}

async fn mark_attendance(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<MarkAttendanceRequest>,
) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let mut v = Validator::new();
    v.date_not_future("date", body.date, today());
    validate_input(&mut v, &body.record);
    if let Err(resp) = check_child_exists(&state, &mut v, body.record.child_id) {
        return resp;
    }
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    match state.db.upsert_attendance(body.date, &cleaned(&body.record), user.id) {
        Ok(record) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(record)
        }
        Err(e) => db_error("Failed to save attendance", e),
    }
}

async fn mark_attendance_bulk(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<BulkAttendanceRequest>,
) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    if body.records.len() > MAX_BULK_RECORDS {
        return ValidationErrors::single("records", format!("At most {} records per request", MAX_BULK_RECORDS))
            .to_response();
    }

    let mut v = Validator::new();
    v.date_not_future("date", body.date, today())
        .check(!body.records.is_empty(), "records", "records must not be empty");

    let mut seen = HashSet::new();
    for (i, input) in body.records.iter().enumerate() {
        let mut record_v = Validator::new();
        validate_input(&mut record_v, input);
        record_v.check(
            seen.insert(input.child_id),
            "child_id",
            "Child appears more than once in this batch",
        );
        if let Err(resp) = check_child_exists(&state, &mut record_v, input.child_id) {
            return resp;
        }
        record_v.nest_into(&format!("records[{}]", i), &mut v);
    }
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let records: Vec<AttendanceInput> = body.records.iter().map(cleaned).collect();
    match state.db.upsert_attendance_bulk(body.date, &records, user.id) {
        Ok(saved) => {
            log::info!("{} saved {} attendance marks for {}", user.email, saved, body.date);
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(serde_json::json!({ "date": body.date, "saved": saved }))
        }
        Err(e) => db_error("Failed to save attendance batch", e),
    }
}

#[derive(Deserialize)]
struct DaySheetQuery {
    date: Option<NaiveDate>,
    group_id: Option<i64>,
}

async fn day_sheet(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<DaySheetQuery>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let date = query.date.unwrap_or_else(today);
    match state.db.attendance_day_sheet(date, query.group_id) {
        Ok(rows) => HttpResponse::Ok().json(serde_json::json!({ "date": date, "children": rows })),
        Err(e) => db_error("Failed to load attendance sheet", e),
    }
}

#[derive(Deserialize)]
struct RangeQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn child_history(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<RangeQuery>,
) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let child = match ensure_child_access(&state, &user, path.into_inner()) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return ValidationErrors::single("from", "from must not be after to").to_response();
        }
    }
    match state.db.list_child_attendance(child.id, query.from, query.to) {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => db_error("Failed to load attendance history", e),
    }
}
