use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::controllers::{conflict, db_error, not_found, require_staff, require_user, today};
use crate::db::is_unique_violation;
use crate::menu_planner::{build_week, shopping_list, week_range, week_start};
use crate::models::{CopyWeekRequest, DishRequest, Ingredient, MealType, SetMenuSlotRequest};
use crate::validation::{ValidationErrors, Validator};
use crate::AppState;

/// Upper bound for any per-serving nutrition value
const MAX_NUTRITION_VALUE: f64 = 5000.0;
const MAX_SERVINGS: i32 = 500;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/dishes")
            .route("", web::get().to(list_dishes))
            .route("", web::post().to(create_dish))
            .route("/{id}", web::get().to(get_dish))
            .route("/{id}", web::put().to(update_dish))
            .route("/{id}", web::delete().to(delete_dish)),
    );
    cfg.service(
        web::scope("/api/menus")
            .route("/week", web::get().to(get_week))
            .route("/shopping-list", web::get().to(get_shopping_list))
            .route("/copy-week", web::post().to(copy_week))
            .route("/{date}/{meal}", web::put().to(set_slot))
            .route("/{date}/{meal}", web::delete().to(clear_slot)),
    );
}

fn validate_dish(body: &DishRequest) -> Result<DishRequest, HttpResponse> {
    let mut v = Validator::new();
    v.required("name", &body.name)
        .length("name", &body.name, 2, 100)
        .range("nutrition.calories", body.nutrition.calories, 0.0, MAX_NUTRITION_VALUE)
        .range("nutrition.protein", body.nutrition.protein, 0.0, MAX_NUTRITION_VALUE)
        .range("nutrition.fat", body.nutrition.fat, 0.0, MAX_NUTRITION_VALUE)
        .range("nutrition.carbs", body.nutrition.carbs, 0.0, MAX_NUTRITION_VALUE);
    for (i, allergen) in body.allergens.iter().enumerate() {
        v.required(&format!("allergens[{}]", i), allergen)
            .length(&format!("allergens[{}]", i), allergen, 1, 50);
    }
    for (i, ingredient) in body.ingredients.iter().enumerate() {
        let mut iv = Validator::new();
        iv.required("name", &ingredient.name)
            .length("name", &ingredient.name, 1, 100)
            .check(
                ingredient.quantity.is_finite() && ingredient.quantity > 0.0,
                "quantity",
                "quantity must be greater than 0",
            )
            .required("unit", &ingredient.unit)
            .length("unit", &ingredient.unit, 1, 20);
        iv.nest_into(&format!("ingredients[{}]", i), &mut v);
    }
    v.finish().map_err(|errors| errors.to_response())?;

    Ok(DishRequest {
        name: body.name.trim().to_string(),
        meal_type: body.meal_type,
        nutrition: body.nutrition,
        allergens: body.allergens.iter().map(|a| a.trim().to_lowercase()).collect(),
        ingredients: body
            .ingredients
            .iter()
            .map(|i| Ingredient {
                name: i.name.trim().to_string(),
                quantity: i.quantity,
                unit: i.unit.trim().to_string(),
            })
            .collect(),
    })
}

#[derive(Deserialize)]
struct ListDishesQuery {
    meal_type: Option<MealType>,
}

async fn list_dishes(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListDishesQuery>,
) -> impl Responder {
    if let Err(resp) = require_user(&state, &req) {
        return resp;
    }
    match state.db.list_dishes(query.meal_type) {
        Ok(dishes) => HttpResponse::Ok().json(dishes),
        Err(e) => db_error("Failed to list dishes", e),
    }
}

async fn get_dish(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_user(&state, &req) {
        return resp;
    }
    match state.db.get_dish(path.into_inner()) {
        Ok(Some(dish)) => HttpResponse::Ok().json(dish),
        Ok(None) => not_found("Dish"),
        Err(e) => db_error("Failed to get dish", e),
    }
}

async fn create_dish(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<DishRequest>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let dish = match validate_dish(&body) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    match state.db.create_dish(&dish) {
        Ok(created) => HttpResponse::Created().json(created),
        Err(e) if is_unique_violation(&e) => conflict(format!("Dish '{}' already exists", dish.name)),
        Err(e) => db_error("Failed to create dish", e),
    }
}

async fn update_dish(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<DishRequest>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let dish = match validate_dish(&body) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    match state.db.update_dish(path.into_inner(), &dish) {
        Ok(Some(updated)) => HttpResponse::Ok().json(updated),
        Ok(None) => not_found("Dish"),
        Err(e) if is_unique_violation(&e) => conflict(format!("Dish '{}' already exists", dish.name)),
        Err(e) => db_error("Failed to update dish", e),
    }
}

async fn delete_dish(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    match state.db.delete_dish(path.into_inner()) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => not_found("Dish"),
        Err(e) => db_error("Failed to delete dish", e),
    }
}

/// Parse the `{date}/{meal}` path pair.
fn parse_slot(path: &(String, String)) -> Result<(NaiveDate, MealType), HttpResponse> {
    let mut v = Validator::new();
    let date = v.date("date", &path.0);
    let meal = v.one_of::<MealType>("meal", &path.1);
    v.finish().map_err(|errors| errors.to_response())?;
    date.zip(meal)
        .ok_or_else(|| ValidationErrors::single("meal", "Invalid menu slot").to_response())
}

async fn set_slot(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Json<SetMenuSlotRequest>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let (date, meal) = match parse_slot(&path) {
        Ok(slot) => slot,
        Err(resp) => return resp,
    };

    let mut v = Validator::new();
    v.range("servings", body.servings, 1, MAX_SERVINGS);
    match state.db.get_dish(body.dish_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            v.error("dish_id", "dish_id must reference an existing dish");
        }
        Err(e) => return db_error("Failed to look up dish", e),
    }
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    match state.db.set_menu_slot(date, meal, body.dish_id, body.servings) {
        Ok(entry) => HttpResponse::Ok().json(entry),
        Err(e) => db_error("Failed to set menu slot", e),
    }
}

async fn clear_slot(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let (date, meal) = match parse_slot(&path) {
        Ok(slot) => slot,
        Err(resp) => return resp,
    };
    match state.db.clear_menu_slot(date, meal) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => not_found("Menu slot"),
        Err(e) => db_error("Failed to clear menu slot", e),
    }
}

#[derive(Deserialize)]
struct WeekQuery {
    start: Option<NaiveDate>,
}

async fn get_week(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<WeekQuery>,
) -> impl Responder {
    if let Err(resp) = require_user(&state, &req) {
        return resp;
    }
    let (from, to) = week_range(query.start.unwrap_or_else(today));
    match state.db.list_menu_range(from, to) {
        Ok(entries) => HttpResponse::Ok().json(build_week(from, entries)),
        Err(e) => db_error("Failed to load weekly menu", e),
    }
}

async fn get_shopping_list(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<WeekQuery>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let (from, to) = week_range(query.start.unwrap_or_else(today));
    match state.db.list_menu_range(from, to) {
        Ok(entries) => HttpResponse::Ok().json(serde_json::json!({
            "week_start": from,
            "week_end": to,
            "items": shopping_list(&entries),
        })),
        Err(e) => db_error("Failed to build shopping list", e),
    }
}

async fn copy_week(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CopyWeekRequest>,
) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let (source_start, source_end) = week_range(body.from);
    let target_start = week_start(body.to);
    if source_start == target_start {
        return crate::validation::ValidationErrors::single(
            "to",
            "Target week must differ from the source week",
        )
        .to_response();
    }
    let offset_days = (target_start - source_start).num_days();
    match state.db.copy_menu_range(source_start, source_end, offset_days) {
        Ok(copied) => {
            log::info!(
                "{} copied {} menu slots from week of {} to week of {}",
                user.email,
                copied,
                source_start,
                target_start
            );
            HttpResponse::Ok().json(serde_json::json!({
                "from_week": source_start,
                "to_week": target_start,
                "copied": copied
            }))
        }
        Err(e) => db_error("Failed to copy menu week", e),
    }
}
