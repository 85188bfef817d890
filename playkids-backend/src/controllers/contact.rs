use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::controllers::{db_error, not_found, require_admin};
use crate::models::ContactRequest;
use crate::validation::{sanitize_text, Validator};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/contact")
            .route("", web::post().to(submit))
            .route("", web::get().to(list_messages))
            .route("/{id}/handled", web::post().to(mark_handled))
            .route("/{id}", web::delete().to(delete_message)),
    );
}

async fn submit(state: web::Data<AppState>, body: web::Json<ContactRequest>) -> impl Responder {
    let mut v = Validator::new();
    v.name("name", &body.name)
        .email("email", &body.email)
        .optional_phone("phone", body.phone.as_deref())
        .required("subject", &body.subject)
        .length("subject", &body.subject, 2, 200)
        .required("message", &body.message)
        .length("message", &body.message, 10, 5000);
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let body = body.into_inner();
    let cleaned = ContactRequest {
        name: sanitize_text(&body.name),
        email: body.email.trim().to_lowercase(),
        phone: body.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        subject: sanitize_text(&body.subject),
        message: sanitize_text(&body.message),
    };
    match state.db.create_contact_message(&cleaned) {
        Ok(message) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Created().json(serde_json::json!({
                "id": message.id,
                "message": "Thank you, we will get back to you soon"
            }))
        }
        Err(e) => db_error("Failed to save contact message", e),
    }
}

#[derive(Deserialize)]
struct ListQuery {
    handled: Option<bool>,
}

async fn list_messages(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.list_contact_messages(query.handled) {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => db_error("Failed to list contact messages", e),
    }
}

async fn mark_handled(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.mark_contact_handled(path.into_inner()) {
        Ok(true) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Ok(false) => not_found("Contact message"),
        Err(e) => db_error("Failed to update contact message", e),
    }
}

async fn delete_message(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.delete_contact_message(path.into_inner()) {
        Ok(true) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Ok(false) => not_found("Contact message"),
        Err(e) => db_error("Failed to delete contact message", e),
    }
}
