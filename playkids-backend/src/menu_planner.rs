//! Weekly menu calendar and shopping list built from scheduled dishes.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::{Dish, MealType, MenuEntry, Nutrition};

pub const DAYS_PER_WEEK: i64 = 7;

/// Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Inclusive (monday, sunday) range of the week containing `date`.
pub fn week_range(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = week_start(date);
    (start, start + Duration::days(DAYS_PER_WEEK - 1))
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedMeal {
    pub meal: MealType,
    pub servings: i32,
    pub dish: Dish,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuDay {
    pub date: NaiveDate,
    pub meals: Vec<PlannedMeal>,
    /// Per-child totals over the day's meals
    pub nutrition: Nutrition,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekMenu {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: Vec<MenuDay>,
}

/// Lay the entries of one week out as seven days, meals in serving order.
/// Entries outside the week are ignored.
pub fn build_week(start: NaiveDate, entries: Vec<(MenuEntry, Dish)>) -> WeekMenu {
    let start = week_start(start);
    let mut days: Vec<MenuDay> = (0..DAYS_PER_WEEK)
        .map(|offset| MenuDay {
            date: start + Duration::days(offset),
            meals: Vec::new(),
            nutrition: Nutrition::default(),
        })
        .collect();

    for (entry, dish) in entries {
        let offset = (entry.date - start).num_days();
        if !(0..DAYS_PER_WEEK).contains(&offset) {
            continue;
        }
        days[offset as usize].meals.push(PlannedMeal {
            meal: entry.meal,
            servings: entry.servings,
            dish,
        });
    }

    for day in &mut days {
        day.meals.sort_by_key(|m| m.meal);
        let total = day
            .meals
            .iter()
            .fold(Nutrition::default(), |acc, m| acc + m.dish.nutrition);
        day.nutrition = total.rounded();
    }

    WeekMenu {
        week_start: start,
        week_end: start + Duration::days(DAYS_PER_WEEK - 1),
        days,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingItem {
    pub name: String,
    pub unit: String,
    pub quantity: f64,
}

/// Lowercase, trim, and collapse inner whitespace.
pub fn normalize_ingredient_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Sum `quantity x servings` for every ingredient, grouped by normalized name and unit.
pub fn shopping_list(entries: &[(MenuEntry, Dish)]) -> Vec<ShoppingItem> {
    let mut totals: BTreeMap<(String, String), f64> = BTreeMap::new();
    for (entry, dish) in entries {
        for ingredient in &dish.ingredients {
            let key = (
                normalize_ingredient_name(&ingredient.name),
                ingredient.unit.trim().to_lowercase(),
            );
            *totals.entry(key).or_insert(0.0) += ingredient.quantity * entry.servings as f64;
        }
    }

    totals
        .into_iter()
        .map(|((name, unit), quantity)| ShoppingItem {
            name,
            unit,
            quantity: (quantity * 100.0).round() / 100.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ingredient;
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dish(id: i64, meal: MealType, calories: f64, ingredients: Vec<(&str, f64, &str)>) -> Dish {
        Dish {
            id,
            name: format!("Dish {}", id),
            meal_type: meal,
            nutrition: Nutrition {
                calories,
                protein: 1.25,
                fat: 0.0,
                carbs: 0.0,
            },
            allergens: vec![],
            ingredients: ingredients
                .into_iter()
                .map(|(name, quantity, unit)| Ingredient {
                    name: name.to_string(),
                    quantity,
                    unit: unit.to_string(),
                })
                .collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry(d: &str, meal: MealType, dish_id: i64, servings: i32) -> MenuEntry {
        MenuEntry {
            id: 0,
            date: date(d),
            meal,
            dish_id,
            servings,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2026-10-17 is a Saturday
        assert_eq!(week_start(date("2026-10-17")), date("2026-10-12"));
        assert_eq!(week_start(date("2026-10-12")), date("2026-10-12"));
        assert_eq!(week_start(date("2026-10-18")), date("2026-10-12"));
        assert_eq!(week_range(date("2026-10-14")), (date("2026-10-12"), date("2026-10-18")));
    }

    #[test]
    fn test_build_week_orders_meals_and_sums_nutrition() {
        let entries = vec![
            (entry("2026-10-13", MealType::Lunch, 2, 20), dish(2, MealType::Lunch, 420.0, vec![])),
            (entry("2026-10-13", MealType::Breakfast, 1, 20), dish(1, MealType::Breakfast, 180.0, vec![])),
            (entry("2026-10-30", MealType::Lunch, 2, 20), dish(2, MealType::Lunch, 420.0, vec![])),
        ];
        let week = build_week(date("2026-10-15"), entries);

        assert_eq!(week.week_start, date("2026-10-12"));
        assert_eq!(week.days.len(), 7);
        let tuesday = &week.days[1];
        assert_eq!(tuesday.date, date("2026-10-13"));
        let meals: Vec<MealType> = tuesday.meals.iter().map(|m| m.meal).collect();
        assert_eq!(meals, vec![MealType::Breakfast, MealType::Lunch]);
        assert_eq!(tuesday.nutrition.calories, 600.0);
        assert_eq!(tuesday.nutrition.protein, 2.5);
        assert!(week.days.iter().filter(|d| d.date != tuesday.date).all(|d| d.meals.is_empty()));
    }

    #[test]
    fn test_shopping_list_merges_normalized_names() {
        let porridge = dish(1, MealType::Breakfast, 180.0, vec![("Oats", 40.0, "g"), ("Milk", 0.15, "l")]);
        let pancakes = dish(2, MealType::Snack, 200.0, vec![("  milk ", 0.1, "l"), ("Rolled  Oats", 10.0, "g")]);
        let entries = vec![
            (entry("2026-10-12", MealType::Breakfast, 1, 20), porridge),
            (entry("2026-10-12", MealType::Snack, 2, 3), pancakes),
        ];

        let list = shopping_list(&entries);
        assert_eq!(
            list,
            vec![
                ShoppingItem { name: "milk".to_string(), unit: "l".to_string(), quantity: 3.3 },
                ShoppingItem { name: "oats".to_string(), unit: "g".to_string(), quantity: 800.0 },
                ShoppingItem { name: "rolled oats".to_string(), unit: "g".to_string(), quantity: 30.0 },
            ]
        );
    }
}
