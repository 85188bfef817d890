use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;

use crate::controllers::{db_error, not_found, require_staff, require_user};
use crate::models::event::MAX_RSVP_ATTENDEES;
use crate::models::{EventRequest, RsvpRequest, RsvpSummary};
use crate::validation::{sanitize_optional, sanitize_text, ValidationErrors, Validator};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/events")
            .route("", web::get().to(list_events))
            .route("", web::post().to(create_event))
            .route("/{id}", web::get().to(get_event))
            .route("/{id}", web::put().to(update_event))
            .route("/{id}", web::delete().to(delete_event))
            .route("/{id}/rsvp", web::post().to(rsvp))
            .route("/{id}/rsvps", web::get().to(list_rsvps)),
    );
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    upcoming: bool,
}

async fn list_events(state: web::Data<AppState>, query: web::Query<ListQuery>) -> impl Responder {
    let ending_after = if query.upcoming { Some(Utc::now()) } else { None };
    match state.db.list_events(ending_after) {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(e) => db_error("Failed to list events", e),
    }
}

async fn get_event(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    match state.db.get_event(path.into_inner()) {
        Ok(Some(event)) => HttpResponse::Ok().json(event),
        Ok(None) => not_found("Event"),
        Err(e) => db_error("Failed to get event", e),
    }
}

fn prepare_event(body: EventRequest) -> Result<EventRequest, ValidationErrors> {
    let mut v = Validator::new();
    v.required("title", &body.title)
        .length("title", &body.title, 2, 100)
        .optional_length("description", body.description.as_deref(), 2000)
        .optional_length("location", body.location.as_deref(), 200)
        .check(
            body.ends_at >= body.starts_at,
            "ends_at",
            "ends_at must not be before starts_at",
        );
    v.finish()?;
    Ok(EventRequest {
        title: sanitize_text(&body.title),
        description: sanitize_optional(body.description.as_deref()),
        location: sanitize_optional(body.location.as_deref()),
        ..body
    })
}

async fn create_event(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<EventRequest>,
) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let event = match prepare_event(body.into_inner()) {
        Ok(e) => e,
        Err(errors) => return errors.to_response(),
    };
    match state.db.create_event(&event, user.id) {
        Ok(created) => {
            log::info!("{} created event '{}'", user.email, created.title);
            HttpResponse::Created().json(created)
        }
        Err(e) => db_error("Failed to create event", e),
    }
}

async fn update_event(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<EventRequest>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let event = match prepare_event(body.into_inner()) {
        Ok(e) => e,
        Err(errors) => return errors.to_response(),
    };
    match state.db.update_event(path.into_inner(), &event) {
        Ok(Some(updated)) => HttpResponse::Ok().json(updated),
        Ok(None) => not_found("Event"),
        Err(e) => db_error("Failed to update event", e),
    }
}

async fn delete_event(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    match state.db.delete_event(path.into_inner()) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => not_found("Event"),
        Err(e) => db_error("Failed to delete event", e),
    }
}

async fn rsvp(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<RsvpRequest>,
) -> impl Responder {
    let user = match require_user(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let event = match state.db.get_event(path.into_inner()) {
        Ok(Some(e)) => e,
        Ok(None) => return not_found("Event"),
        Err(e) => return db_error("Failed to get event", e),
    };
    if !event.rsvp_required {
        return ValidationErrors::single("event", "This event does not take RSVPs").to_response();
    }
    if event.ends_at < Utc::now() {
        return ValidationErrors::single("event", "This event has already ended").to_response();
    }
    let mut v = Validator::new();
    v.range("attendees", body.attendees, 1, MAX_RSVP_ATTENDEES);
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }
    match state.db.upsert_rsvp(event.id, user.id, &body) {
        Ok(saved) => HttpResponse::Ok().json(saved),
        Err(e) => db_error("Failed to save RSVP", e),
    }
}

async fn list_rsvps(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let id = path.into_inner();
    match state.db.get_event(id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Event"),
        Err(e) => return db_error("Failed to get event", e),
    }
    match state.db.list_rsvps(id) {
        Ok(rsvps) => {
            let summary = RsvpSummary::from_rsvps(&rsvps);
            HttpResponse::Ok().json(serde_json::json!({ "rsvps": rsvps, "summary": summary }))
        }
        Err(e) => db_error("Failed to list RSVPs", e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use chrono::{Duration, Utc};

    use crate::controllers::test_support::{bearer, seed_user, test_app, test_state};
    use crate::models::Role;

    fn event_json(title: &str, start_in_days: i64, rsvp_required: bool) -> serde_json::Value {
        let starts = Utc::now() + Duration::days(start_in_days);
        serde_json::json!({
            "title": title,
            "starts_at": starts,
            "ends_at": starts + Duration::hours(2),
            "location": "Garden",
            "rsvp_required": rsvp_required
        })
    }

    #[actix_web::test]
    async fn test_rsvp_rules_and_summary() {
        let (_dir, state) = test_state();
        let (_, staff) = seed_user(&state, "t@example.com", Role::Teacher);
        let (_, p1) = seed_user(&state, "p1@example.com", Role::Parent);
        let (_, p2) = seed_user(&state, "p2@example.com", Role::Parent);
        let app = test_app!(state);

        let mut bad = event_json("Picnic", 3, true);
        bad["ends_at"] = serde_json::json!(Utc::now());
        let req = test::TestRequest::post().uri("/api/events").insert_header(bearer(&staff)).set_json(bad).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let mut ids = Vec::new();
        for (title, days, rsvp) in [("Picnic", 3, true), ("Open day", 5, false), ("Past party", -3, true)] {
            let req = test::TestRequest::post()
                .uri("/api/events")
                .insert_header(bearer(&staff))
                .set_json(event_json(title, days, rsvp))
                .to_request();
            let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
            ids.push(body["id"].as_i64().unwrap());
        }

        let req = test::TestRequest::get().uri("/api/events?upcoming=true").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        for (id, message) in [(ids[1], "This event does not take RSVPs"), (ids[2], "This event has already ended")] {
            let req = test::TestRequest::post()
                .uri(&format!("/api/events/{}/rsvp", id))
                .insert_header(bearer(&p1))
                .set_json(serde_json::json!({ "response": "going" }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 400);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "Validation failed");
            assert_eq!(body["details"][0]["field"], "event");
            assert_eq!(body["details"][0]["message"], message);
        }

        let replies = [(&p1, "maybe", 1), (&p1, "going", 3), (&p2, "not_going", 1)];
        for (token, response, attendees) in replies {
            let req = test::TestRequest::post()
                .uri(&format!("/api/events/{}/rsvp", ids[0]))
                .insert_header(bearer(token))
                .set_json(serde_json::json!({ "response": response, "attendees": attendees }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), 200);
        }

        let req = test::TestRequest::get()
            .uri(&format!("/api/events/{}/rsvps", ids[0]))
            .insert_header(bearer(&staff))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["rsvps"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["summary"],
            serde_json::json!({ "going": 1, "not_going": 1, "maybe": 0, "total_attendees": 3 })
        );
    }
}
