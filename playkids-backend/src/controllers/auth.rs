use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Serialize;

use crate::controllers::{bearer_token, conflict, db_error, require_user};
use crate::db::is_unique_violation;
use crate::models::{ChangePasswordRequest, LoginRequest, RegisterRequest, Role, User};
use crate::passwords::{hash_password, verify_password};
use crate::validation::{sanitize_optional, Validator};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me))
            .route("/change-password", web::post().to(change_password))
            .route("/register", web::post().to(register)),
    );
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
    user: User,
}

fn invalid_credentials() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "error": "Invalid email or password"
    }))
}

async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    let mut v = Validator::new();
    v.required("email", &body.email).required("password", &body.password);
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let user = match state.db.get_user_by_email(&body.email) {
        Ok(Some(user)) => user,
        Ok(None) => return invalid_credentials(),
        Err(e) => return db_error("Failed to look up user", e),
    };
    if !user.active || !verify_password(&body.password, &user.password_hash) {
        log::warn!("Failed login for {}", user.email);
        return invalid_credentials();
    }

    match state.db.create_session(user.id, state.config.session_ttl_hours) {
        Ok(session) => {
            log::info!("User {} logged in", user.email);
            HttpResponse::Ok().json(LoginResponse {
                token: session.token,
                expires_at: session.expires_at,
                user,
            })
        }
        Err(e) => db_error("Failed to create session", e),
    }
}

async fn logout(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let token = match bearer_token(&req) {
        Some(t) => t,
        None => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "No authorization token provided"
            }));
        }
    };
    match state.db.delete_session(&token) {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Err(e) => db_error("Failed to delete session", e),
    }
}

async fn me(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    match require_user(&state, &req) {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(resp) => resp,
    }
}

async fn change_password(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ChangePasswordRequest>,
) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let mut v = Validator::new();
    v.check(
        verify_password(&body.current_password, &user.password_hash),
        "current_password",
        "Current password is incorrect",
    )
    .password("new_password", &body.new_password)
    .check(
        body.new_password != body.current_password,
        "new_password",
        "New password must differ from the current one",
    );
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    if let Err(e) = state.db.set_user_password(user.id, &hash_password(&body.new_password)) {
        return db_error("Failed to update password", e);
    }
    let token = bearer_token(&req).unwrap_or_default();
    match state.db.delete_other_sessions(user.id, &token) {
        Ok(revoked) => {
            log::info!("User {} changed password, revoked {} other session(s)", user.email, revoked);
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Err(e) => db_error("Failed to revoke sessions", e),
    }
}

async fn register(state: web::Data<AppState>, body: web::Json<RegisterRequest>) -> impl Responder {
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
        Role::Parent,
    ) {
        Ok(user) => {
            log::info!("Parent account registered: {}", user.email);
            HttpResponse::Created().json(user)
        }
        Err(e) if is_unique_violation(&e) => conflict("An account with this email already exists"),
        Err(e) => db_error("Failed to register user", e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;

    use crate::controllers::test_support::{bearer, seed_user, test_app, test_state, TEST_PASSWORD};
    use crate::models::Role;

    #[actix_web::test]
    async fn test_login_me_logout() {
        let (_dir, state) = test_state();
        seed_user(&state, "teacher@example.com", Role::Teacher);
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(serde_json::json!({ "email": "Teacher@Example.com", "password": TEST_PASSWORD }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(body["user"]["role"], "teacher");
        assert!(body["user"].get("password_hash").is_none());

        let req = test::TestRequest::get().uri("/api/auth/me").insert_header(bearer(&token)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let req = test::TestRequest::post().uri("/api/auth/logout").insert_header(bearer(&token)).to_request();
        test::call_service(&app, req).await;
        let req = test::TestRequest::get().uri("/api/auth/me").insert_header(bearer(&token)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_wrong_password_is_unauthorized() {
        let (_dir, state) = test_state();
        seed_user(&state, "parent@example.com", Role::Parent);
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(serde_json::json!({ "email": "parent@example.com", "password": "Nope12345" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_register_validates_and_rejects_duplicates() {
        let (_dir, state) = test_state();
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(serde_json::json!({ "email": "bad", "password": "weak", "full_name": "A" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Validation failed");
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["email", "password", "full_name"]);

        let good = serde_json::json!({
            "email": "new.parent@example.com",
            "password": "Strong123",
            "full_name": "Ana Kovač",
            "phone": "+385 91 234 5678"
        });
        let req = test::TestRequest::post().uri("/api/auth/register").set_json(&good).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);

        let req = test::TestRequest::post().uri("/api/auth/register").set_json(&good).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
    }

    #[actix_web::test]
    async fn test_change_password_revokes_other_sessions() {
        let (_dir, state) = test_state();
        let (user, token) = seed_user(&state, "admin@example.com", Role::Admin);
        let other = state.db.create_session(user.id, 1).unwrap();
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/change-password")
            .insert_header(bearer(&token))
            .set_json(serde_json::json!({ "current_password": TEST_PASSWORD, "new_password": "Brand9New" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        assert!(state.db.validate_session(&token).unwrap().is_some());
        assert!(state.db.validate_session(&other.token).unwrap().is_none());
    }
}
