use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::controllers::{db_error, not_found, require_admin};
use crate::models::{FeedbackRequest, FeedbackStatus, FeedbackStatusRequest};
use crate::validation::{sanitize_text, Validator};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/feedback")
            .route("", web::post().to(submit_feedback))
            .route("", web::get().to(list_feedback))
            .route("/{id}", web::patch().to(set_status))
            .route("/{id}", web::delete().to(delete_feedback)),
    );
}

/// Public endpoint, no session required
async fn submit_feedback(state: web::Data<AppState>, body: web::Json<FeedbackRequest>) -> impl Responder {
    let mut v = Validator::new();
    v.name("name", &body.name)
        .email("email", &body.email)
        .range("rating", body.rating, 1, 5)
        .required("message", &body.message)
        .length("message", &body.message, 10, 2000);
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    match state.db.create_feedback(
        &sanitize_text(&body.name),
        &body.email.trim().to_lowercase(),
        body.rating,
        body.category,
        &sanitize_text(&body.message),
    ) {
        Ok(feedback) => {
            log::info!("Received {}-star feedback ({})", feedback.rating, feedback.category.as_ref());
            state.dashboard_cache.invalidate();
            HttpResponse::Created().json(serde_json::json!({
                "id": feedback.id,
                "message": "Thank you for your feedback"
            }))
        }
        Err(e) => db_error("Failed to save feedback", e),
    }
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<FeedbackStatus>,
}

async fn list_feedback(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.list_feedback(query.status) {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => db_error("Failed to list feedback", e),
    }
}

async fn set_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<FeedbackStatusRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.set_feedback_status(path.into_inner(), body.status) {
        Ok(Some(feedback)) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(feedback)
        }
        Ok(None) => not_found("Feedback"),
        Err(e) => db_error("Failed to update feedback", e),
    }
}

async fn delete_feedback(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.delete_feedback(path.into_inner()) {
        Ok(true) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Ok(false) => not_found("Feedback"),
        Err(e) => db_error("Failed to delete feedback", e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;

    use crate::controllers::test_support::{bearer, seed_user, test_app, test_state};
    use crate::models::Role;

    #[actix_web::test]
    async fn test_public_submit_and_admin_review() {
        let (_dir, state) = test_state();
        let (_, admin) = seed_user(&state, "a@example.com", Role::Admin);
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/feedback")
            .set_json(serde_json::json!({
                "name": "Ana", "email": "not-an-email", "rating": 6, "message": "short"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["details"].as_array().unwrap().len(), 3);

        let req = test::TestRequest::post()
            .uri("/api/feedback")
            .set_json(serde_json::json!({
                "name": "Ana", "email": "Ana@Example.com", "rating": 5,
                "category": "food", "message": "The new lunch menu is <great>!"
            }))
            .to_request();
        let created: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::get().uri("/api/feedback?status=new").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);

        let req = test::TestRequest::patch()
            .uri(&format!("/api/feedback/{}", created["id"]))
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({ "status": "reviewed" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "reviewed");
        assert_eq!(body["email"], "ana@example.com");
        assert_eq!(body["message"], "The new lunch menu is &lt;great&gt;!");

        let req = test::TestRequest::get()
            .uri("/api/feedback?status=new")
            .insert_header(bearer(&admin))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.as_array().unwrap().is_empty());
    }
}
