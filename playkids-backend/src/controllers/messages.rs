use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::controllers::{db_error, not_found, require_user};
use crate::models::{NotificationKind, SendMessageRequest};
use crate::validation::{sanitize_text, Validator};
use crate::AppState;

const MAX_SUBJECT_LENGTH: usize = 200;
const MAX_BODY_LENGTH: usize = 5000;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/messages")
            .route("", web::post().to(send_message))
            .route("/inbox", web::get().to(inbox))
            .route("/sent", web::get().to(sent))
            .route("/{id}", web::get().to(get_message))
            .route("/{id}", web::delete().to(delete_message))
            .route("/{id}/read", web::post().to(mark_read)),
    );
}

async fn inbox(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.db.list_inbox(user.id) {
        Ok(messages) => HttpResponse::Ok().json(messages),
        Err(e) => db_error("Failed to list inbox", e),
    }
}

async fn sent(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.db.list_sent(user.id) {
        Ok(messages) => HttpResponse::Ok().json(messages),
        Err(e) => db_error("Failed to list sent messages", e),
    }
}

async fn get_message(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.db.get_message(path.into_inner()) {
        Ok(Some(m)) if m.sender_id == user.id || m.recipient_id == user.id => HttpResponse::Ok().json(m),
        Ok(_) => not_found("Message"),
        Err(e) => db_error("Failed to get message", e),
    }
}

async fn send_message(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SendMessageRequest>,
) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let mut v = Validator::new();
    v.required("subject", &body.subject)
        .length("subject", &body.subject, 1, MAX_SUBJECT_LENGTH)
        .required("body", &body.body)
        .length("body", &body.body, 1, MAX_BODY_LENGTH)
        .check(body.recipient_id != user.id, "recipient_id", "You cannot message yourself");
    match state.db.get_user(body.recipient_id) {
        Ok(Some(recipient)) if recipient.active => {}
        Ok(_) => {
            v.error("recipient_id", "recipient_id must reference an active user");
        }
        Err(e) => return db_error("Failed to look up recipient", e),
    }
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let subject = sanitize_text(&body.subject);
    match state
        .db
        .send_message(user.id, body.recipient_id, &subject, &sanitize_text(&body.body))
    {
        Ok(message) => {
            let title = format!("New message from {}", user.full_name);
            if let Err(e) =
                state
                    .db
                    .create_notification(body.recipient_id, &title, &subject, NotificationKind::Info)
            {
                log::warn!("Failed to notify recipient {}: {}", body.recipient_id, e);
            }
            HttpResponse::Created().json(message)
        }
        Err(e) => db_error("Failed to send message", e),
    }
}

async fn mark_read(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.db.mark_message_read(path.into_inner(), user.id) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => not_found("Message"),
        Err(e) => db_error("Failed to mark message read", e),
    }
}

async fn delete_message(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.db.delete_message_for(path.into_inner(), user.id) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => not_found("Message"),
        Err(e) => db_error("Failed to delete message", e),
    }
}
