use std::collections::BTreeSet;

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::controllers::{conflict, db_error, not_found, require_admin, require_user, today};
use crate::db::is_unique_violation;
use crate::db::tables::PaymentFilter;
use crate::models::{
    GeneratePaymentsRequest, NotificationKind, PayRequest, PaymentRequest, PaymentStatus,
    UpdatePaymentRequest,
};
use crate::validation::{sanitize_optional, Validator};
use crate::AppState;

/// 1,000,000.00 in the billing currency
const MAX_AMOUNT_CENTS: i64 = 100_000_000;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/payments")
            .route("", web::get().to(list_payments))
            .route("", web::post().to(create_payment))
            .route("/generate", web::post().to(generate_payments))
            .route("/{id}", web::get().to(get_payment))
            .route("/{id}", web::put().to(update_payment))
            .route("/{id}", web::delete().to(delete_payment))
            .route("/{id}/pay", web::post().to(pay)),
    );
}

#[derive(Deserialize)]
struct ListPaymentsQuery {
    status: Option<PaymentStatus>,
    child_id: Option<i64>,
    period: Option<String>,
}

async fn list_payments(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListPaymentsQuery>,
) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let query = query.into_inner();
    let filter = PaymentFilter {
        status: query.status,
        child_id: query.child_id,
        parent_id: if user.role.is_staff() { None } else { Some(user.id) },
        period: query.period,
    };
    let today = today();
    match state.db.list_payments(&filter, today) {
        Ok(payments) => {
            let payments: Vec<_> = payments
                .into_iter()
                .map(|p| p.with_effective_status(today))
                .collect();
            HttpResponse::Ok().json(payments)
        }
        Err(e) => db_error("Failed to list payments", e),
    }
}

async fn get_payment(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let payment = match state.db.get_payment(path.into_inner()) {
        Ok(Some(p)) => p,
        Ok(None) => return not_found("Payment"),
        Err(e) => return db_error("Failed to get payment", e),
    };
    if !user.role.is_staff() {
        match state.db.is_parent_of(user.id, payment.child_id) {
            Ok(true) => {}
            // Parents never learn about other families' payments
            Ok(false) => return not_found("Payment"),
            Err(e) => return db_error("Failed to check payment access", e),
        }
    }
    HttpResponse::Ok().json(payment.with_effective_status(today()))
}

async fn create_payment(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<PaymentRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    let mut v = Validator::new();
    v.range("amount_cents", body.amount_cents, 1, MAX_AMOUNT_CENTS)
        .period("period", &body.period)
        .optional_length("note", body.note.as_deref(), 500);
    match state.db.get_child(body.child_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            v.error("child_id", "child_id must reference an existing child");
        }
        Err(e) => return db_error("Failed to look up child", e),
    }
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let payment = PaymentRequest {
        note: sanitize_optional(body.note.as_deref()),
        ..body.into_inner()
    };
    match state.db.create_payment(&payment) {
        Ok(created) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Created().json(created.with_effective_status(today()))
        }
        Err(e) if is_unique_violation(&e) => conflict(format!(
            "Child already has a payment for {}",
            payment.period
        )),
        Err(e) => db_error("Failed to create payment", e),
    }
}

async fn update_payment(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdatePaymentRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    let mut v = Validator::new();
    if let Some(amount) = body.amount_cents {
        v.range("amount_cents", amount, 1, MAX_AMOUNT_CENTS);
    }
    v.check(
        matches!(body.status, None | Some(PaymentStatus::Pending) | Some(PaymentStatus::Cancelled)),
        "status",
        "status can only be set to pending or cancelled; use the pay endpoint to record payment",
    )
    .optional_length("note", body.note.as_deref(), 500);
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let id = path.into_inner();
    match state.db.get_payment(id) {
        Ok(Some(existing)) if existing.status == PaymentStatus::Paid && body.status.is_some() => {
            return conflict("Paid payments cannot change status");
        }
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Payment"),
        Err(e) => return db_error("Failed to get payment", e),
    }

    let note = sanitize_optional(body.note.as_deref());
    match state
        .db
        .update_payment(id, body.amount_cents, body.due_date, body.status, note.as_deref())
    {
        Ok(Some(payment)) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(payment.with_effective_status(today()))
        }
        Ok(None) => not_found("Payment"),
        Err(e) => db_error("Failed to update payment", e),
    }
}

async fn pay(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<PayRequest>,
) -> impl Responder {
    let admin = match require_admin(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    let existing = match state.db.get_payment(id) {
        Ok(Some(p)) => p,
        Ok(None) => return not_found("Payment"),
        Err(e) => return db_error("Failed to get payment", e),
    };
    match existing.status {
        PaymentStatus::Paid => return conflict("Payment is already paid"),
        PaymentStatus::Cancelled => return conflict("Cancelled payments cannot be paid"),
        _ => {}
    }

    match state.db.mark_payment_paid(id, body.method) {
        Ok(Some(payment)) => {
            log::info!("{} recorded payment {} via {}", admin.email, id, body.method.as_ref());
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(payment)
        }
        // Lost a race with another update
        Ok(None) => conflict("Payment is no longer pending"),
        Err(e) => db_error("Failed to record payment", e),
    }
}

async fn delete_payment(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.delete_payment(path.into_inner()) {
        Ok(true) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Ok(false) => not_found("Payment"),
        Err(e) => db_error("Failed to delete payment", e),
    }
}

async fn generate_payments(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<GeneratePaymentsRequest>,
) -> impl Responder {
    let admin = match require_admin(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let mut v = Validator::new();
    v.period("period", &body.period)
        .range("amount_cents", body.amount_cents, 1, MAX_AMOUNT_CENTS);
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let active_children = match state.db.count_active_children() {
        Ok(n) => n,
        Err(e) => return db_error("Failed to count children", e),
    };
    let created = match state
        .db
        .generate_period_payments(&body.period, body.amount_cents, body.due_date)
    {
        Ok(created) => created,
        Err(e) => return db_error("Failed to generate payments", e),
    };

    // One notification per parent, however many children they have
    let mut parents = BTreeSet::new();
    for payment in &created {
        match state.db.get_child(payment.child_id) {
            Ok(Some(child)) => {
                if let Some(parent_id) = child.parent_id {
                    parents.insert(parent_id);
                }
            }
            Ok(None) => {}
            Err(e) => return db_error("Failed to look up child", e),
        }
    }
    let title = format!("New fees for {}", body.period);
    let message = format!("Monthly fees for {} are due by {}.", body.period, body.due_date);
    for parent_id in &parents {
        if let Err(e) = state
            .db
            .create_notification(*parent_id, &title, &message, NotificationKind::Payment)
        {
            log::warn!("Failed to notify parent {} about fees: {}", parent_id, e);
        }
    }

    log::info!(
        "{} generated {} payments for {} ({} parents notified)",
        admin.email,
        created.len(),
        body.period,
        parents.len()
    );
    state.dashboard_cache.invalidate();
    HttpResponse::Ok().json(serde_json::json!({
        "created": created.len(),
        "skipped": (active_children as usize).saturating_sub(created.len()),
        "notified_parents": parents.len()
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use chrono::Duration;

    use crate::controllers::test_support::{bearer, seed_user, test_app, test_state};
    use crate::controllers::today;
    use crate::models::{ChildRequest, Gender, PaymentRequest, Role};

    fn add_child(state: &actix_web::web::Data<crate::AppState>, first: &str, parent_id: Option<i64>) -> i64 {
        state
            .db
            .create_child(
                &ChildRequest {
                    first_name: first.to_string(),
                    last_name: "Babić".to_string(),
                    birth_date: today() - Duration::days(365 * 3),
                    gender: Gender::Female,
                    group_id: None,
                    parent_id,
                    allergies: None,
                    medical_notes: None,
                    emergency_contact_name: None,
                    emergency_contact_phone: None,
                    enrolled_on: None,
                    active: true,
                },
                today(),
            )
            .unwrap()
            .id
    }

    #[actix_web::test]
    async fn test_generate_skips_billed_children_and_notifies_parents_once() {
        let (_dir, state) = test_state();
        let (_, admin) = seed_user(&state, "a@example.com", Role::Admin);
        let (parent, _) = seed_user(&state, "p@example.com", Role::Parent);
        let first = add_child(&state, "Ema", Some(parent.id));
        add_child(&state, "Lea", Some(parent.id));
        add_child(&state, "Ivo", None);
        state
            .db
            .create_payment(&PaymentRequest {
                child_id: first,
                amount_cents: 40_000,
                period: "2026-11".to_string(),
                due_date: today(),
                note: None,
            })
            .unwrap();
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/payments/generate")
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({
                "period": "2026-11", "amount_cents": 40_000, "due_date": today() + Duration::days(14)
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["created"], 2);
        assert_eq!(body["skipped"], 1);
        assert_eq!(body["notified_parents"], 1);
        assert_eq!(state.db.count_unread_notifications(parent.id).unwrap(), 1);
    }

    #[actix_web::test]
    async fn test_overdue_reported_and_paying_twice_conflicts() {
        let (_dir, state) = test_state();
        let (_, admin) = seed_user(&state, "a@example.com", Role::Admin);
        let (parent, parent_token) = seed_user(&state, "p@example.com", Role::Parent);
        let child = add_child(&state, "Ema", Some(parent.id));
        let payment = state
            .db
            .create_payment(&PaymentRequest {
                child_id: child,
                amount_cents: 40_000,
                period: "2026-09".to_string(),
                due_date: today() - Duration::days(3),
                note: None,
            })
            .unwrap();
        let app = test_app!(state);

        let req = test::TestRequest::get()
            .uri("/api/payments?status=overdue")
            .insert_header(bearer(&parent_token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["status"], "overdue");

        let req = test::TestRequest::put()
            .uri(&format!("/api/payments/{}", payment.id))
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({ "status": "overdue" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        for expected in [200, 409] {
            let req = test::TestRequest::post()
                .uri(&format!("/api/payments/{}/pay", payment.id))
                .insert_header(bearer(&admin))
                .set_json(serde_json::json!({ "method": "card" }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), expected);
        }
    }
}
