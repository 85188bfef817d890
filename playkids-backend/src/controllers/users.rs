use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::controllers::{conflict, db_error, not_found, require_admin};
use crate::db::is_unique_violation;
use crate::models::{CreateUserRequest, Role, UpdateUserRequest};
use crate::passwords::hash_password;
use crate::validation::{sanitize_optional, Validator};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/users")
            .route("", web::get().to(list_users))
            .route("", web::post().to(create_user))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::put().to(update_user))
            .route("/{id}", web::delete().to(delete_user)),
    );
}

#[derive(Deserialize)]
struct ListUsersQuery {
    role: Option<Role>,
}

async fn list_users(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListUsersQuery>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.list_users(query.role) {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(e) => db_error("Failed to list users", e),
    }
}

async fn get_user(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.get_user(path.into_inner()) {
        Ok(Some(user)) => HttpResponse::Ok().json(user),
        Ok(None) => not_found("User"),
        Err(e) => db_error("Failed to get user", e),
    }
}

async fn create_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateUserRequest>,
) -> impl Responder {
    let admin = match require_admin(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let mut v = Validator::new();
    v.email("email", &body.email)
        .password("password", &body.password)
        .name("full_name", &body.full_name)
        .optional_phone("phone", body.phone.as_deref());
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let phone = sanitize_optional(body.phone.as_deref());
    match state.db.create_user(
        body.email.trim(),
        &hash_password(&body.password),
        body.full_name.trim(),
        phone.as_deref(),
        body.role,
    ) {
        Ok(user) => {
            log::info!("Admin {} created {} account {}", admin.email, user.role, user.email);
            HttpResponse::Created().json(user)
        }
        Err(e) if is_unique_violation(&e) => conflict("An account with this email already exists"),
        Err(e) => db_error("Failed to create user", e),
    }
}

async fn update_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateUserRequest>,
) -> impl Responder {
    let admin = match require_admin(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = path.into_inner();

    let mut v = Validator::new();
    if let Some(name) = &body.full_name {
        v.name("full_name", name);
    }
    v.optional_phone("phone", body.phone.as_deref());
    if id == admin.id {
        v.check(body.active != Some(false), "active", "You cannot deactivate your own account")
            .check(
                body.role.map_or(true, |r| r == Role::Admin),
                "role",
                "You cannot change your own role",
            );
    }
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let full_name = body.full_name.as_deref().map(str::trim);
    let phone = sanitize_optional(body.phone.as_deref());
    match state
        .db
        .update_user(id, full_name, phone.as_deref(), body.role, body.active)
    {
        Ok(Some(user)) => HttpResponse::Ok().json(user),
        Ok(None) => not_found("User"),
        Err(e) => db_error("Failed to update user", e),
    }
}

async fn delete_user(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let admin = match require_admin(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    if id == admin.id {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "You cannot delete your own account"
        }));
    }
    match state.db.delete_user(id) {
        Ok(true) => {
            log::info!("Admin {} deleted user {}", admin.email, id);
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Ok(false) => not_found("User"),
        Err(e) => db_error("Failed to delete user", e),
    }
}
