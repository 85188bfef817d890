use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::controllers::children::ensure_child_access;
use crate::controllers::{db_error, forbidden, not_found, require_staff, require_user, today};
use crate::db::tables::JournalFilter;
use crate::models::{JournalEntry, JournalRequest, Role, User};
use crate::validation::{sanitize_optional, ValidationErrors, Validator};
use crate::AppState;

const MAX_NAP_MINUTES: i32 = 300;
const MAX_TEXT_LENGTH: usize = 2000;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/journal")
            .route("", web::get().to(list_journal))
            .route("", web::post().to(create_entry))
            .route("/{id}", web::get().to(get_entry))
            .route("/{id}", web::put().to(update_entry))
            .route("/{id}", web::delete().to(delete_entry)),
    );
}

#[derive(Deserialize)]
struct ListQuery {
    child_id: Option<i64>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn list_journal(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Some(child_id) = query.child_id {
        if let Err(resp) = ensure_child_access(&state, &user, child_id) {
            return resp;
        }
    }
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return ValidationErrors::single("from", "from must not be after to").to_response();
        }
    }
    let filter = JournalFilter {
        child_id: query.child_id,
        parent_id: if user.role.is_staff() { None } else { Some(user.id) },
        from: query.from,
        to: query.to,
    };
    match state.db.list_journal(&filter) {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => db_error("Failed to list journal", e),
    }
}

async fn get_entry(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let entry = match state.db.get_journal_entry(path.into_inner()) {
        Ok(Some(e)) => e,
        Ok(None) => return not_found("Journal entry"),
        Err(e) => return db_error("Failed to get journal entry", e),
    };
    match ensure_child_access(&state, &user, entry.child_id) {
        Ok(_) => HttpResponse::Ok().json(entry),
        Err(resp) => resp,
    }
}

fn prepare_entry(state: &web::Data<AppState>, body: JournalRequest) -> Result<JournalRequest, HttpResponse> {
    let mut v = Validator::new();
    v.date_not_future("date", body.date, today())
        .optional_length("activities", body.activities.as_deref(), MAX_TEXT_LENGTH)
        .optional_length("note", body.note.as_deref(), MAX_TEXT_LENGTH);
    if let Some(nap) = body.nap_minutes {
        v.range("nap_minutes", nap, 0, MAX_NAP_MINUTES);
    }
    match state.db.get_child(body.child_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            v.error("child_id", "child_id must reference an existing child");
        }
        Err(e) => return Err(db_error("Failed to look up child", e)),
    }
    v.finish().map_err(|errors| errors.to_response())?;

    Ok(JournalRequest {
        activities: sanitize_optional(body.activities.as_deref()),
        note: sanitize_optional(body.note.as_deref()),
        ..body
    })
}

/// Only the author or an admin may change an entry.
fn load_own_entry(state: &web::Data<AppState>, user: &User, id: i64) -> Result<JournalEntry, HttpResponse> {
    let entry = match state.db.get_journal_entry(id) {
        Ok(Some(e)) => e,
        Ok(None) => return Err(not_found("Journal entry")),
        Err(e) => return Err(db_error("Failed to get journal entry", e)),
    };
    if entry.author_id != user.id && user.role != Role::Admin {
        return Err(forbidden("Only the author can change this entry"));
    }
    Ok(entry)
}

async fn create_entry(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<JournalRequest>,
) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let entry = match prepare_entry(&state, body.into_inner()) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    match state.db.create_journal_entry(user.id, &entry) {
        Ok(created) => HttpResponse::Created().json(created),
        Err(e) => db_error("Failed to create journal entry", e),
    }
}

async fn update_entry(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<JournalRequest>,
) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    if let Err(resp) = load_own_entry(&state, &user, id) {
        return resp;
    }
    let entry = match prepare_entry(&state, body.into_inner()) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    match state.db.update_journal_entry(id, &entry) {
        Ok(Some(updated)) => HttpResponse::Ok().json(updated),
        Ok(None) => not_found("Journal entry"),
        Err(e) => db_error("Failed to update journal entry", e),
    }
}

async fn delete_entry(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = path.into_inner();
    if let Err(resp) = load_own_entry(&state, &user, id) {
        return resp;
    }
    match state.db.delete_journal_entry(id) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => not_found("Journal entry"),
        Err(e) => db_error("Failed to delete journal entry", e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use chrono::Duration;

    use crate::controllers::test_support::{bearer, seed_user, test_app, test_state};
    use crate::controllers::today;
    use crate::models::{ChildRequest, Gender, Role};

    fn add_child(state: &actix_web::web::Data<crate::AppState>, parent_id: Option<i64>) -> i64 {
        state
            .db
            .create_child(
                &ChildRequest {
                    first_name: "Lana".to_string(),
                    last_name: "Kovač".to_string(),
                    birth_date: today() - Duration::days(365 * 3),
                    gender: Gender::Female,
                    group_id: None,
                    parent_id,
                    allergies: None,
                    medical_notes: None,
                    emergency_contact_name: None,
                    emergency_contact_phone: None,
                    enrolled_on: None,
                    active: true,
                },
                today(),
            )
            .unwrap()
            .id
    }

    #[actix_web::test]
    async fn test_journal_author_rules_and_parent_scope() {
        let (_dir, state) = test_state();
        let (_, author) = seed_user(&state, "t1@example.com", Role::Teacher);
        let (_, other_teacher) = seed_user(&state, "t2@example.com", Role::Teacher);
        let (parent, parent_token) = seed_user(&state, "p@example.com", Role::Parent);
        let own = add_child(&state, Some(parent.id));
        let other = add_child(&state, None);
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/journal")
            .insert_header(bearer(&author))
            .set_json(serde_json::json!({
                "child_id": own, "date": today(), "mood": "happy", "nap_minutes": 301
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let mut ids = Vec::new();
        for child in [own, other] {
            let req = test::TestRequest::post()
                .uri("/api/journal")
                .insert_header(bearer(&author))
                .set_json(serde_json::json!({
                    "child_id": child, "date": today(), "mood": "happy",
                    "appetite": "ate_all", "nap_minutes": 90, "note": "Painted a <sun>"
                }))
                .to_request();
            let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
            ids.push(body["id"].as_i64().unwrap());
        }

        let req = test::TestRequest::get().uri("/api/journal").insert_header(bearer(&parent_token)).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["note"], "Painted a &lt;sun&gt;");

        let req = test::TestRequest::get()
            .uri(&format!("/api/journal?child_id={}", other))
            .insert_header(bearer(&parent_token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/journal/{}", ids[0]))
            .insert_header(bearer(&other_teacher))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/journal/{}", ids[0]))
            .insert_header(bearer(&author))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }
}
