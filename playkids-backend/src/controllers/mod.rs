pub mod attendance;
pub mod auth;
pub mod children;
pub mod contact;
pub mod enrollments;
pub mod events;
pub mod feedback;
pub mod gallery;
pub mod groups;
pub mod health;
pub mod journal;
pub mod menus;
pub mod messages;
pub mod notifications;
pub mod payments;
pub mod reports;
pub mod users;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{NaiveDate, Utc};

use crate::models::{Role, User};
use crate::AppState;

/// Register every API scope.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::config)
        .configure(auth::config)
        .configure(users::config)
        .configure(groups::config)
        .configure(children::config)
        .configure(attendance::config)
        .configure(menus::config)
        .configure(payments::config)
        .configure(messages::config)
        .configure(notifications::config)
        .configure(feedback::config)
        .configure(journal::config)
        .configure(enrollments::config)
        .configure(contact::config)
        .configure(gallery::config)
        .configure(events::config)
        .configure(reports::config);
}

pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolve the session user, or the 401/500 response to return.
pub fn require_user(state: &web::Data<AppState>, req: &HttpRequest) -> Result<User, HttpResponse> {
    let token = match bearer_token(req) {
        Some(t) => t,
        None => {
            return Err(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "No authorization token provided"
            })));
        }
    };

    match state.db.validate_session(&token) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid or expired session"
        }))),
        Err(e) => {
            log::error!("Session validation error: {}", e);
            Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            })))
        }
    }
}

/// Like `require_user`, but answers 403 unless the user has one of `roles`.
pub fn require_role(
    state: &web::Data<AppState>,
    req: &HttpRequest,
    roles: &[Role],
) -> Result<User, HttpResponse> {
    let user = require_user(state, req)?;
    if roles.contains(&user.role) {
        Ok(user)
    } else {
        Err(forbidden("Insufficient permissions"))
    }
}

pub fn require_staff(state: &web::Data<AppState>, req: &HttpRequest) -> Result<User, HttpResponse> {
    require_role(state, req, &[Role::Admin, Role::Teacher])
}

pub fn require_admin(state: &web::Data<AppState>, req: &HttpRequest) -> Result<User, HttpResponse> {
    require_role(state, req, &[Role::Admin])
}

/// Session user if a valid token was sent. Public endpoints use this to widen what staff see.
pub fn optional_user(state: &web::Data<AppState>, req: &HttpRequest) -> Option<User> {
    let token = bearer_token(req)?;
    state.db.validate_session(&token).ok().flatten()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn db_error(context: &str, e: rusqlite::Error) -> HttpResponse {
    log::error!("{}: {}", context, e);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": format!("Database error: {}", e)
    }))
}

pub fn not_found(what: &str) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "error": format!("{} not found", what)
    }))
}

pub fn forbidden(message: &str) -> HttpResponse {
    HttpResponse::Forbidden().json(serde_json::json!({ "error": message }))
}

pub fn conflict(message: impl Into<String>) -> HttpResponse {
    HttpResponse::Conflict().json(serde_json::json!({ "error": message.into() }))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use actix_web::web;
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::db::Database;
    use crate::models::{Role, User};
    use crate::passwords::hash_password;
    use crate::reports::DashboardCache;
    use crate::AppState;

    pub const TEST_PASSWORD: &str = "Sunshine42!";

    pub fn test_state() -> (TempDir, web::Data<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("playkids.db");
        let config = Config {
            port: 0,
            database_url: db_path.to_string_lossy().to_string(),
            upload_dir: dir.path().join("uploads"),
            session_ttl_hours: 1,
            admin_email: None,
            admin_password: None,
            cors_origin: None,
            frontend_dist: None,
        };
        crate::config::initialize_storage(&config).unwrap();
        let db = Database::new(&config.database_url).unwrap();
        let state = web::Data::new(AppState {
            db: Arc::new(db),
            config,
            dashboard_cache: DashboardCache::default(),
        });
        (dir, state)
    }

    /// Create a user with `TEST_PASSWORD` and return it with a live session token.
    pub fn seed_user(state: &web::Data<AppState>, email: &str, role: Role) -> (User, String) {
        let user = state
            .db
            .create_user(email, &hash_password(TEST_PASSWORD), "Test User", None, role)
            .unwrap();
        let session = state.db.create_session(user.id, 1).unwrap();
        (user, session.token)
    }

    pub fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token))
    }

    /// Build the full API service over `state`.
    macro_rules! test_app {
        ($state:expr) => {
            actix_web::test::init_service(
                actix_web::App::new()
                    .app_data($state.clone())
                    .app_data(crate::validation::json_config())
                    .app_data(crate::validation::query_config())
                    .app_data(crate::validation::path_config())
                    .configure(crate::controllers::configure_api),
            )
            .await
        };
    }
    pub(crate) use test_app;
}
