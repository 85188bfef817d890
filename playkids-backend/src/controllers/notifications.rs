use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::controllers::{db_error, not_found, require_staff, require_user};
use crate::models::{Audience, BroadcastRequest};
use crate::validation::{sanitize_text, Validator};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/notifications")
            .route("", web::get().to(list_notifications))
            .route("", web::post().to(broadcast))
            .route("/unread-count", web::get().to(unread_count))
            .route("/read-all", web::post().to(mark_all_read))
            .route("/{id}/read", web::post().to(mark_read)),
    );
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    unread: bool,
}

async fn list_notifications(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.db.list_notifications(user.id, query.unread) {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => db_error("Failed to list notifications", e),
    }
}

async fn unread_count(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.db.count_unread_notifications(user.id) {
        Ok(count) => HttpResponse::Ok().json(serde_json::json!({ "count": count })),
        Err(e) => db_error("Failed to count notifications", e),
    }
}

async fn mark_read(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.db.mark_notification_read(path.into_inner(), user.id) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => not_found("Notification"),
        Err(e) => db_error("Failed to mark notification read", e),
    }
}

async fn mark_all_read(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.db.mark_all_notifications_read(user.id) {
        Ok(updated) => HttpResponse::Ok().json(serde_json::json!({ "updated": updated })),
        Err(e) => db_error("Failed to mark notifications read", e),
    }
}

async fn broadcast(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<BroadcastRequest>,
) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let mut v = Validator::new();
    v.required("title", &body.title)
        .length("title", &body.title, 1, 200)
        .required("body", &body.body)
        .length("body", &body.body, 1, 2000);
    let audience = Audience::parse(&body.audience);
    v.check(
        audience.is_some(),
        "audience",
        "audience must be 'all', a role name, or 'user:<id>'",
    );
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }
    let Some(audience) = audience else {
        return HttpResponse::BadRequest().json(serde_json::json!({ "error": "Invalid audience" }));
    };

    match state.db.broadcast_notification(
        audience,
        &sanitize_text(&body.title),
        &sanitize_text(&body.body),
        body.kind,
    ) {
        Ok(delivered) => {
            log::info!("{} broadcast '{}' to {} user(s)", user.email, body.title.trim(), delivered);
            HttpResponse::Ok().json(serde_json::json!({ "delivered": delivered }))
        }
        Err(e) => db_error("Failed to broadcast notification", e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;

    use crate::controllers::test_support::{bearer, seed_user, test_app, test_state};
    use crate::models::Role;

    #[actix_web::test]
    async fn test_broadcast_to_parents_then_read_all() {
        let (_dir, state) = test_state();
        let (_, teacher) = seed_user(&state, "t@example.com", Role::Teacher);
        let (_, parent) = seed_user(&state, "p1@example.com", Role::Parent);
        seed_user(&state, "p2@example.com", Role::Parent);
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/notifications")
            .insert_header(bearer(&parent))
            .set_json(serde_json::json!({ "title": "x", "body": "y", "audience": "all" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::post()
            .uri("/api/notifications")
            .insert_header(bearer(&teacher))
            .set_json(serde_json::json!({ "title": "Closed", "body": "x", "audience": "everyone" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::post()
            .uri("/api/notifications")
            .insert_header(bearer(&teacher))
            .set_json(serde_json::json!({
                "title": "Closed Friday", "body": "Staff training day", "kind": "alert", "audience": "parent"
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["delivered"], 2);

        let req = test::TestRequest::get()
            .uri("/api/notifications/unread-count")
            .insert_header(bearer(&parent))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);

        let req = test::TestRequest::post()
            .uri("/api/notifications/read-all")
            .insert_header(bearer(&parent))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get()
            .uri("/api/notifications?unread=true")
            .insert_header(bearer(&parent))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.as_array().unwrap().is_empty());
    }
}
