use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::controllers::{conflict, db_error, not_found, require_admin, require_staff, require_user};
use crate::db::is_unique_violation;
use crate::db::tables::ChildFilter;
use crate::models::{GroupRequest, Role};
use crate::validation::{Validator, MAX_CHILD_AGE_YEARS};
use crate::AppState;

pub const MAX_GROUP_CAPACITY: i32 = 40;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/groups")
            .route("", web::get().to(list_groups))
            .route("", web::post().to(create_group))
            .route("/{id}", web::get().to(get_group))
            .route("/{id}", web::put().to(update_group))
            .route("/{id}", web::delete().to(delete_group))
            .route("/{id}/children", web::get().to(list_group_children)),
    );
}

/// Field checks shared by create and update. Returns the 400/500 response on failure.
fn validate_group(state: &web::Data<AppState>, body: &GroupRequest) -> Result<(), HttpResponse> {
    let mut v = Validator::new();
    v.required("name", &body.name)
        .length("name", &body.name, 2, 50)
        .range("min_age", body.min_age, 0, MAX_CHILD_AGE_YEARS)
        .range("max_age", body.max_age, 0, MAX_CHILD_AGE_YEARS)
        .check(
            body.min_age <= body.max_age,
            "max_age",
            "max_age must not be less than min_age",
        )
        .range("capacity", body.capacity, 1, MAX_GROUP_CAPACITY)
        .optional_length("room", body.room.as_deref(), 50);

    if let Some(teacher_id) = body.teacher_id {
        match state.db.get_user(teacher_id) {
            Ok(Some(user)) if user.role == Role::Teacher && user.active => {}
            Ok(_) => {
                v.error("teacher_id", "teacher_id must reference an active teacher");
            }
            Err(e) => return Err(db_error("Failed to look up teacher", e)),
        }
    }
    v.finish().map_err(|errors| errors.to_response())
}

async fn list_groups(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    if let Err(resp) = require_user(&state, &req) {
        return resp;
    }
    match state.db.list_groups() {
        Ok(groups) => HttpResponse::Ok().json(groups),
        Err(e) => db_error("Failed to list groups", e),
    }
}

async fn get_group(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_user(&state, &req) {
        return resp;
    }
    match state.db.get_group(path.into_inner()) {
        Ok(Some(group)) => HttpResponse::Ok().json(group),
        Ok(None) => not_found("Group"),
        Err(e) => db_error("Failed to get group", e),
    }
}

async fn list_group_children(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let id = path.into_inner();
    match state.db.get_group(id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Group"),
        Err(e) => return db_error("Failed to get group", e),
    }
    let filter = ChildFilter {
        group_id: Some(id),
        active: Some(true),
        ..Default::default()
    };
    match state.db.list_children(&filter) {
        Ok(children) => HttpResponse::Ok().json(children),
        Err(e) => db_error("Failed to list group children", e),
    }
}

async fn create_group(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<GroupRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    if let Err(resp) = validate_group(&state, &body) {
        return resp;
    }
    match state.db.create_group(&body) {
        Ok(group) => {
            log::info!("Created group '{}'", group.name);
            state.dashboard_cache.invalidate();
            HttpResponse::Created().json(group)
        }
        Err(e) if is_unique_violation(&e) => conflict(format!("Group '{}' already exists", body.name.trim())),
        Err(e) => db_error("Failed to create group", e),
    }
}

async fn update_group(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<GroupRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    let id = path.into_inner();
    let existing = match state.db.get_group(id) {
        Ok(Some(g)) => g,
        Ok(None) => return not_found("Group"),
        Err(e) => return db_error("Failed to get group", e),
    };
    if let Err(resp) = validate_group(&state, &body) {
        return resp;
    }
    if (body.capacity as i64) < existing.child_count {
        return conflict(format!(
            "Group already has {} children; capacity cannot be lower",
            existing.child_count
        ));
    }
    match state.db.update_group(id, &body) {
        Ok(Some(group)) => HttpResponse::Ok().json(group),
        Ok(None) => not_found("Group"),
        Err(e) if is_unique_violation(&e) => conflict(format!("Group '{}' already exists", body.name.trim())),
        Err(e) => db_error("Failed to update group", e),
    }
}

async fn delete_group(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }
    match state.db.delete_group(path.into_inner()) {
        Ok(true) => {
            state.dashboard_cache.invalidate();
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Ok(false) => not_found("Group"),
        Err(e) => db_error("Failed to delete group", e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use chrono::Months;

    use crate::controllers::test_support::{bearer, seed_user, test_app, test_state};
    use crate::controllers::today;
    use crate::models::{ChildRequest, Gender, GroupRequest, Role};

    fn child_in(group_id: i64, first_name: &str) -> ChildRequest {
        ChildRequest {
            first_name: first_name.to_string(),
            last_name: "Horvat".to_string(),
            birth_date: today().checked_sub_months(Months::new(12 * 3 + 4)).unwrap(),
            gender: Gender::Male,
            group_id: Some(group_id),
            parent_id: None,
            allergies: None,
            medical_notes: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            enrolled_on: None,
            active: true,
        }
    }

    #[actix_web::test]
    async fn test_group_validation_and_teacher_reference() {
        let (_dir, state) = test_state();
        let (_, admin) = seed_user(&state, "a@example.com", Role::Admin);
        let (parent, _) = seed_user(&state, "p@example.com", Role::Parent);
        let (teacher, _) = seed_user(&state, "t@example.com", Role::Teacher);
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/groups")
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({
                "name": "Ladybugs", "min_age": 5, "max_age": 3, "capacity": 0, "teacher_id": parent.id
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["max_age", "capacity", "teacher_id"]);

        let req = test::TestRequest::post()
            .uri("/api/groups")
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({
                "name": "Ladybugs", "min_age": 3, "max_age": 4, "capacity": 20, "teacher_id": teacher.id
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["child_count"], 0);

        let req = test::TestRequest::post()
            .uri("/api/groups")
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({ "name": "Ladybugs", "min_age": 3, "max_age": 4, "capacity": 20 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 409);
    }

    #[actix_web::test]
    async fn test_capacity_floor_and_delete_unassigns_children() {
        let (_dir, state) = test_state();
        let (_, admin) = seed_user(&state, "a@example.com", Role::Admin);
        let group = state
            .db
            .create_group(&GroupRequest {
                name: "Bees".to_string(),
                min_age: 2,
                max_age: 5,
                capacity: 10,
                teacher_id: None,
                room: None,
            })
            .unwrap();
        let mut child_ids = Vec::new();
        for name in ["Ivan", "Marko"] {
            child_ids.push(state.db.create_child(&child_in(group.id, name), today()).unwrap().id);
        }
        let app = test_app!(state);

        let req = test::TestRequest::put()
            .uri(&format!("/api/groups/{}", group.id))
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({ "name": "Bees", "min_age": 2, "max_age": 5, "capacity": 1 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 409);

        let req = test::TestRequest::put()
            .uri(&format!("/api/groups/{}", group.id))
            .insert_header(bearer(&admin))
            .set_json(serde_json::json!({ "name": "Bees", "min_age": 2, "max_age": 5, "capacity": 2 }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["capacity"], 2);
        assert_eq!(body["child_count"], 2);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/groups/{}", group.id))
            .insert_header(bearer(&admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        for id in child_ids {
            let child = state.db.get_child(id).unwrap().unwrap();
            assert_eq!(child.group_id, None);
        }
    }
}
