//! Dishes and the (date, meal) menu calendar

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_date, get_enum, get_timestamp, now_str};
use crate::db::Database;
use crate::models::{Dish, DishRequest, MealType, MenuEntry, Nutrition};

const DISH_COLUMNS: &str =
    "id, name, meal_type, calories, protein, fat, carbs, allergens, ingredients, created_at, updated_at";

const MENU_COLUMNS: &str = "id, date, meal, dish_id, servings, created_at, updated_at";

fn row_to_dish(row: &Row) -> SqliteResult<Dish> {
    let allergens: String = row.get(7)?;
    let ingredients: String = row.get(8)?;
    Ok(Dish {
        id: row.get(0)?,
        name: row.get(1)?,
        meal_type: get_enum(row, 2)?,
        nutrition: Nutrition {
            calories: row.get(3)?,
            protein: row.get(4)?,
            fat: row.get(5)?,
            carbs: row.get(6)?,
        },
        allergens: serde_json::from_str(&allergens).unwrap_or_default(),
        ingredients: serde_json::from_str(&ingredients).unwrap_or_default(),
        created_at: get_timestamp(row, 9)?,
        updated_at: get_timestamp(row, 10)?,
    })
}

fn row_to_menu_entry(row: &Row) -> SqliteResult<MenuEntry> {
    Ok(MenuEntry {
        id: row.get(0)?,
        date: get_date(row, 1)?,
        meal: get_enum(row, 2)?,
        dish_id: row.get(3)?,
        servings: row.get(4)?,
        created_at: get_timestamp(row, 5)?,
        updated_at: get_timestamp(row, 6)?,
    })
}

impl Database {
    pub fn list_dishes(&self, meal_type: Option<MealType>) -> SqliteResult<Vec<Dish>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM dishes WHERE (?1 IS NULL OR meal_type = ?1) ORDER BY name",
            DISH_COLUMNS
        ))?;
        let dishes = stmt
            .query_map([meal_type.map(|m| m.as_ref().to_string())], row_to_dish)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(dishes)
    }

    pub fn get_dish(&self, id: i64) -> SqliteResult<Option<Dish>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM dishes WHERE id = ?1", DISH_COLUMNS),
            [id],
            row_to_dish,
        )
        .optional()
    }

    pub fn create_dish(&self, req: &DishRequest) -> SqliteResult<Dish> {
        let id = {
            let conn = self.conn()?;
            let allergens = serde_json::to_string(&req.allergens).unwrap_or_else(|_| "[]".to_string());
            let ingredients = serde_json::to_string(&req.ingredients).unwrap_or_else(|_| "[]".to_string());
            conn.execute(
                "INSERT INTO dishes (name, meal_type, calories, protein, fat, carbs, allergens, ingredients, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                rusqlite::params![
                    req.name.trim(),
                    req.meal_type.as_ref(),
                    req.nutrition.calories,
                    req.nutrition.protein,
                    req.nutrition.fat,
                    req.nutrition.carbs,
                    allergens,
                    ingredients,
                    now_str()
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_dish(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn update_dish(&self, id: i64, req: &DishRequest) -> SqliteResult<Option<Dish>> {
        let rows = {
            let conn = self.conn()?;
            let allergens = serde_json::to_string(&req.allergens).unwrap_or_else(|_| "[]".to_string());
            let ingredients = serde_json::to_string(&req.ingredients).unwrap_or_else(|_| "[]".to_string());
            conn.execute(
                "UPDATE dishes SET name = ?2, meal_type = ?3, calories = ?4, protein = ?5, fat = ?6,
                    carbs = ?7, allergens = ?8, ingredients = ?9, updated_at = ?10
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    req.name.trim(),
                    req.meal_type.as_ref(),
                    req.nutrition.calories,
                    req.nutrition.protein,
                    req.nutrition.fat,
                    req.nutrition.carbs,
                    allergens,
                    ingredients,
                    now_str()
                ],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_dish(id)
    }

    /// Deleting a dish also clears every menu slot that served it.
    pub fn delete_dish(&self, id: i64) -> SqliteResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM menu_entries WHERE dish_id = ?1", [id])?;
        let rows = tx.execute("DELETE FROM dishes WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    pub fn set_menu_slot(
        &self,
        date: NaiveDate,
        meal: MealType,
        dish_id: i64,
        servings: i32,
    ) -> SqliteResult<MenuEntry> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO menu_entries (date, meal, dish_id, servings, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(date, meal) DO UPDATE SET
                dish_id = excluded.dish_id,
                servings = excluded.servings,
                updated_at = excluded.updated_at",
            rusqlite::params![date.to_string(), meal.as_ref(), dish_id, servings, now_str()],
        )?;
        conn.query_row(
            &format!("SELECT {} FROM menu_entries WHERE date = ?1 AND meal = ?2", MENU_COLUMNS),
            rusqlite::params![date.to_string(), meal.as_ref()],
            row_to_menu_entry,
        )
    }

    pub fn clear_menu_slot(&self, date: NaiveDate, meal: MealType) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM menu_entries WHERE date = ?1 AND meal = ?2",
            rusqlite::params![date.to_string(), meal.as_ref()],
        )?;
        Ok(rows > 0)
    }

    /// Menu entries with their dishes for `from..=to`, ordered by date.
    pub fn list_menu_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> SqliteResult<Vec<(MenuEntry, Dish)>> {
        let entries = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM menu_entries WHERE date >= ?1 AND date <= ?2 ORDER BY date",
                MENU_COLUMNS
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![from.to_string(), to.to_string()], row_to_menu_entry)?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(dish) = self.get_dish(entry.dish_id)? {
                out.push((entry, dish));
            }
        }
        Ok(out)
    }

    /// Replace the target range with the source entries shifted by `offset_days`.
    pub fn copy_menu_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        offset_days: i64,
    ) -> SqliteResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let shift = format!("{:+} days", offset_days);
        tx.execute(
            "DELETE FROM menu_entries WHERE date >= date(?1, ?3) AND date <= date(?2, ?3)",
            rusqlite::params![from.to_string(), to.to_string(), shift],
        )?;
        let copied = tx.execute(
            "INSERT INTO menu_entries (date, meal, dish_id, servings, created_at, updated_at)
             SELECT date(date, ?3), meal, dish_id, servings, ?4, ?4
             FROM menu_entries WHERE date >= ?1 AND date <= ?2",
            rusqlite::params![from.to_string(), to.to_string(), shift, now_str()],
        )?;
        tx.commit()?;
        Ok(copied)
    }
}
