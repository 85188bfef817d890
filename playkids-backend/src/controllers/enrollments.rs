use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::controllers::{db_error, not_found, require_admin, today};
use crate::models::{EnrollmentRequest, EnrollmentStatus, EnrollmentStatusView, ReviewEnrollmentRequest};
use crate::validation::{is_valid_phone, normalize_phone, sanitize_optional, ValidationErrors, Validator};
use crate::AppState;

const MAX_MESSAGE_LENGTH: usize = 2000;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/enrollments")
            .route("", web::post().to(apply))
            .route("", web::get().to(list_enrollments))
            .route("/status/{phone}", web::get().to(application_status))
            .route("/{id}", web::get().to(get_enrollment))
            .route("/{id}", web::patch().to(review_enrollment)),
    );
}

/// Public application form
async fn apply(state: web::Data<AppState>, body: web::Json<EnrollmentRequest>) -> impl Responder {
    let mut v = Validator::new();
    v.name("child_name", &body.child_name)
        .child_age("child_birth_date", body.child_birth_date, today())
        .name("parent_name", &body.parent_name)
        .email("parent_email", &body.parent_email)
        .phone("parent_phone", &body.parent_phone)
        .optional_length("message", body.message.as_deref(), MAX_MESSAGE_LENGTH);
    if let Some(start) = body.desired_start_date {
        v.date_not_past("desired_start_date", start, today());
    }
    if let Some(group_id) = body.preferred_group_id {
        match state.db.get_group(group_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                v.error("preferred_group_id", "preferred_group_id must reference an existing group");
            }
            Err(e) => return db_error("Failed to look up group", e),
        }
    }
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let body = body.into_inner();
    let application = EnrollmentRequest {
        child_name: body.child_name.trim().to_string(),
        parent_name: body.parent_name.trim().to_string(),
        parent_email: body.parent_email.trim().to_lowercase(),
        parent_phone: body.parent_phone.trim().to_string(),
        message: sanitize_optional(body.message.as_deref()),
        ..body
    };
    match state
        .db
        .create_enrollment(&application, &normalize_phone(&application.parent_phone))
    {
        Ok(enrollment) => {
            log::info!("New enrollment application {} for {}", enrollment.id, enrollment.child_name);
            state.dashboard_cache.invalidate();
            HttpResponse::Created().json(EnrollmentStatusView::from(enrollment))
        }
        Err(e) => db_error("Failed to save enrollment", e),
    }
}

/// Public lookup of an application by the parent's phone number
async fn application_status(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let phone = path.into_inner();
    if !is_valid_phone(phone.trim()) {
        return ValidationErrors::single("phone", "Invalid phone number").to_response();
    }
    match state.db.find_enrollments_by_phone(&normalize_phone(&phone)) {
        Ok(found) if found.is_empty() => not_found("Enrollment"),
        Ok(found) => {
            let views: Vec<EnrollmentStatusView> = found.into_iter().map(Into::into).collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => db_error("Failed to look up enrollments", e),
    }
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<EnrollmentStatus>,
}

async fn list_enrollments(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.list_enrollments(query.status) {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => db_error("Failed to list enrollments", e),
    }
}

async fn get_enrollment(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.get_enrollment(path.into_inner()) {
        Ok(Some(enrollment)) => HttpResponse::Ok().json(enrollment),
        Ok(None) => not_found("Enrollment"),
        Err(e) => db_error("Failed to get enrollment", e),
    }
}

async fn review_enrollment(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<ReviewEnrollmentRequest>,
) -> impl Responder {
    let admin = match require_admin(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let mut v = Validator::new();
    v.optional_length("admin_note", body.admin_note.as_deref(), MAX_MESSAGE_LENGTH);
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let note = sanitize_optional(body.admin_note.as_deref());
    match state.db.review_enrollment(path.into_inner(), body.status, note.as_deref()) {
        Ok(Some(enrollment)) => {
            log::info!(
                "{} marked enrollment {} as {}",
                admin.email,
                enrollment.id,
                enrollment.status.as_ref()
            );
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(enrollment)
        }
        Ok(None) => not_found("Enrollment"),
        Err(e) => db_error("Failed to review enrollment", e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use chrono::{Duration, Months};

    use crate::controllers::test_support::{bearer, seed_user, test_app, test_state};
    use crate::controllers::today;
    use crate::models::Role;

    fn application(phone: &str) -> serde_json::Value {
        let birth = today().checked_sub_months(Months::new(12 * 3 + 1)).unwrap();
        serde_json::json!({
            "child_name": "Petra",
            "child_birth_date": birth,
            "parent_name": "Ivana Babić",
            "parent_email": "ivana@example.com",
            "parent_phone": phone,
            "desired_start_date": today() + Duration::days(30)
        })
    }

    #[actix_web::test]
    async fn test_apply_lookup_and_review() {
        let (_dir, state) = test_state();
        let (_, admin) = seed_user(&state, "a@example.com", Role::Admin);
        let app = test_app!(state);

        let mut late = application("+385 91 234 5678");
        late["desired_start_date"] = serde_json::json!(today() - Duration::days(1));
        let req = test::TestRequest::post().uri("/api/enrollments").set_json(late).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let mut form = application("+385 91 234 5678");
        form["parent_email"] = serde_json::json!("  Ivana@Example.COM ");
        let req = test::TestRequest::post().uri("/api/enrollments").set_json(form).to_request();
        let created: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created["status"], "pending");

        // Any formatting of the same number finds the application
        let req = test::TestRequest::get().uri("/api/enrollments/status/+385-91-2345678").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["child_name"], "Petra");
        assert!(body[0].get("parent_email").is_none());

        let req = test::TestRequest::get().uri("/api/enrollments/status/12ab").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
        let req = test::TestRequest::get().uri("/api/enrollments/status/0911111111").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::patch()
            .uri(&format!("/api/enrollments/{}", created["id"]))
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({ "status": "approved", "admin_note": "Starts in Ladybugs" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "approved");
        assert!(body["reviewed_at"].is_string());
        assert_eq!(body["parent_email"], "ivana@example.com");
    }
}
