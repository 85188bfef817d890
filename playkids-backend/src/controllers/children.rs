use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::controllers::{conflict, db_error, forbidden, not_found, require_admin, require_staff, require_user, today};
use crate::db::tables::ChildFilter;
use crate::models::{Child, ChildRequest, Role, User};
use crate::validation::{sanitize_optional, Validator};
use crate::AppState;

const MAX_NOTES_LENGTH: usize = 1000;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/children")
            .route("", web::get().to(list_children))
            .route("", web::post().to(create_child))
            .route("/{id}", web::get().to(get_child))
            .route("/{id}", web::put().to(update_child))
            .route("/{id}", web::delete().to(delete_child)),
    );
}

/// Staff may see any child; parents only their own. Answers 404/403 otherwise.
pub fn ensure_child_access(
    state: &web::Data<AppState>,
    user: &User,
    child_id: i64,
) -> Result<Child, HttpResponse> {
    let child = match state.db.get_child(child_id) {
        Ok(Some(c)) => c,
        Ok(None) => return Err(not_found("Child")),
        Err(e) => return Err(db_error("Failed to get child", e)),
    };
    if user.role.is_staff() || child.parent_id == Some(user.id) {
        Ok(child)
    } else {
        Err(forbidden("You can only access your own children"))
    }
}

#[derive(Deserialize)]
struct ListChildrenQuery {
    group_id: Option<i64>,
    q: Option<String>,
    active: Option<bool>,
}

async fn list_children(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListChildrenQuery>,
) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let query = query.into_inner();
    let filter = ChildFilter {
        group_id: query.group_id,
        parent_id: if user.role.is_staff() { None } else { Some(user.id) },
        query: query.q,
        active: query.active,
    };
    match state.db.list_children(&filter) {
        Ok(children) => HttpResponse::Ok().json(children),
        Err(e) => db_error("Failed to list children", e),
    }
}

async fn get_child(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match ensure_child_access(&state, &user, path.into_inner()) {
        Ok(child) => HttpResponse::Ok().json(child),
        Err(resp) => resp,
    }
}

/// Validate the body and return a cleaned copy, checking references and group capacity.
/// `existing` is the child being updated, if any.
fn prepare_child(
    state: &web::Data<AppState>,
    body: ChildRequest,
    existing: Option<&Child>,
) -> Result<ChildRequest, HttpResponse> {
    let mut v = Validator::new();
    v.name("first_name", &body.first_name).name("last_name", &body.last_name);
    // Children who outgrow the age range stay editable until the birth date itself changes
    if existing.map_or(true, |c| c.birth_date != body.birth_date) {
        v.child_age("birth_date", body.birth_date, today());
    }
    v.optional_length("allergies", body.allergies.as_deref(), MAX_NOTES_LENGTH)
        .optional_length("medical_notes", body.medical_notes.as_deref(), MAX_NOTES_LENGTH)
        .optional_length("emergency_contact_name", body.emergency_contact_name.as_deref(), 100)
        .optional_phone("emergency_contact_phone", body.emergency_contact_phone.as_deref());
    if let Some(enrolled_on) = body.enrolled_on {
        v.check(
            enrolled_on >= body.birth_date,
            "enrolled_on",
            "enrolled_on cannot be before birth_date",
        );
    }

    if let Some(parent_id) = body.parent_id {
        match state.db.get_user(parent_id) {
            Ok(Some(user)) if user.role == Role::Parent => {}
            Ok(_) => {
                v.error("parent_id", "parent_id must reference a parent account");
            }
            Err(e) => return Err(db_error("Failed to look up parent", e)),
        }
    }

    let group = match body.group_id {
        Some(group_id) => match state.db.get_group(group_id) {
            Ok(Some(g)) => Some(g),
            Ok(None) => {
                v.error("group_id", "group_id must reference an existing group");
                None
            }
            Err(e) => return Err(db_error("Failed to look up group", e)),
        },
        None => None,
    };
    v.finish().map_err(|errors| errors.to_response())?;

    if let (Some(group), true) = (&group, body.active) {
        let taken = state
            .db
            .count_active_children_in_group(group.id, existing.map(|c| c.id))
            .map_err(|e| db_error("Failed to count group children", e))?;
        if taken >= group.capacity as i64 {
            return Err(conflict(format!(
                "Group '{}' is at capacity ({})",
                group.name, group.capacity
            )));
        }
    }

    Ok(ChildRequest {
        first_name: body.first_name.trim().to_string(),
        last_name: body.last_name.trim().to_string(),
        allergies: sanitize_optional(body.allergies.as_deref()),
        medical_notes: sanitize_optional(body.medical_notes.as_deref()),
        emergency_contact_name: sanitize_optional(body.emergency_contact_name.as_deref()),
        emergency_contact_phone: body
            .emergency_contact_phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        ..body
    })
}

async fn create_child(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ChildRequest>,
) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let child = match prepare_child(&state, body.into_inner(), None) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let enrolled_on = child.enrolled_on.unwrap_or_else(today);
    match state.db.create_child(&child, enrolled_on) {
        Ok(created) => {
            log::info!("{} added child {} ({})", user.email, created.full_name(), created.id);
            state.dashboard_cache.invalidate();
            HttpResponse::Created().json(created)
        }
        Err(e) => db_error("Failed to create child", e),
    }
}

async fn update_child(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<ChildRequest>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let id = path.into_inner();
    let existing = match state.db.get_child(id) {
        Ok(Some(c)) => c,
        Ok(None) => return not_found("Child"),
        Err(e) => return db_error("Failed to get child", e),
    };
    let child = match prepare_child(&state, body.into_inner(), Some(&existing)) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let enrolled_on = child.enrolled_on.unwrap_or(existing.enrolled_on);
    match state.db.update_child(id, &child, enrolled_on) {
        Ok(Some(updated)) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(updated)
        }
        Ok(None) => not_found("Child"),
        Err(e) => db_error("Failed to update child", e),
    }
}

async fn delete_child(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let admin = match require_admin(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    match state.db.delete_child(id) {
        Ok(true) => {
            log::info!("{} deleted child {}", admin.email, id);
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Ok(false) => not_found("Child"),
        Err(e) => db_error("Failed to delete child", e),
    }
}
