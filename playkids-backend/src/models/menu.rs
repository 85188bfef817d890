use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul};
use strum::{AsRefStr, EnumIter, EnumString, VariantNames};

/// Meal slots of a kindergarten day, in serving order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
    EnumIter,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Snack,
    Lunch,
    AfternoonSnack,
    Dinner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    /// Amount needed for one serving
    pub quantity: f64,
    pub unit: String,
}

/// Per-serving nutrition values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub carbs: f64,
}

impl Add for Nutrition {
    type Output = Nutrition;

    fn add(self, other: Nutrition) -> Nutrition {
        Nutrition {
            calories: self.calories + other.calories,
            protein: self.protein + other.protein,
            fat: self.fat + other.fat,
            carbs: self.carbs + other.carbs,
        }
    }
}

impl AddAssign for Nutrition {
    fn add_assign(&mut self, other: Nutrition) {
        *self = *self + other;
    }
}

impl Mul<f64> for Nutrition {
    type Output = Nutrition;

    fn mul(self, factor: f64) -> Nutrition {
        Nutrition {
            calories: self.calories * factor,
            protein: self.protein * factor,
            fat: self.fat * factor,
            carbs: self.carbs * factor,
        }
    }
}

impl Nutrition {
    pub fn rounded(self) -> Nutrition {
        let r = |v: f64| (v * 10.0).round() / 10.0;
        Nutrition {
            calories: r(self.calories),
            protein: r(self.protein),
            fat: r(self.fat),
            carbs: r(self.carbs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub name: String,
    pub meal_type: MealType,
    pub nutrition: Nutrition,
    pub allergens: Vec<String>,
    pub ingredients: Vec<Ingredient>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DishRequest {
    pub name: String,
    pub meal_type: MealType,
    #[serde(default)]
    pub nutrition: Nutrition,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
}

/// A dish scheduled into one (date, meal) slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub meal: MealType,
    pub dish_id: i64,
    pub servings: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_servings() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetMenuSlotRequest {
    pub dish_id: i64,
    #[serde(default = "default_servings")]
    pub servings: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CopyWeekRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
}
