//! Request validation and sanitization.
//!
//! Handlers build a [`Validator`], run one rule per field and call
//! [`Validator::finish`]. The first failing rule for a field wins; later rules
//! for the same field are skipped. Failures render as HTTP 400 with
//! `{ "error": "Validation failed", "details": [{ "field", "message" }] }`.

use actix_web::{error::InternalError, web, HttpResponse};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use strum::VariantNames;

/// Youngest and oldest age (whole years) accepted for a kindergarten child
pub const MIN_CHILD_AGE_YEARS: i32 = 1;
pub const MAX_CHILD_AGE_YEARS: i32 = 7;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Max JSON body accepted by any endpoint (256 KB)
pub const MAX_JSON_BYTES: usize = 256 * 1024;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap()
});

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{L}[\p{L}\s'\-]*$").unwrap());

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9\s\-()]+$").unwrap());

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap());

static PERIOD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-(0[1-9]|1[0-2])$").unwrap());

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && EMAIL_PATTERN.is_match(email)
}

/// Letters of any script, spaces, hyphens and apostrophes; 2-50 characters.
pub fn is_valid_name(name: &str) -> bool {
    let len = name.chars().count();
    (2..=50).contains(&len) && NAME_PATTERN.is_match(name)
}

pub fn is_valid_phone(phone: &str) -> bool {
    if !PHONE_PATTERN.is_match(phone) {
        return false;
    }
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
}

/// Keep only digits, preserving a leading `+`.
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    out
}

/// `HH:MM`, 24-hour clock
pub fn is_valid_time_of_day(value: &str) -> bool {
    TIME_PATTERN.is_match(value)
}

/// Billing period, `YYYY-MM`
pub fn is_valid_period(value: &str) -> bool {
    PERIOD_PATTERN.is_match(value)
}

/// Whole years between `birth_date` and `today`, `None` for a future birth date.
pub fn age_in_years(birth_date: NaiveDate, today: NaiveDate) -> Option<i32> {
    if birth_date > today {
        return None;
    }
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    Some(age)
}

pub fn is_valid_age(birth_date: NaiveDate, today: NaiveDate) -> bool {
    matches!(
        age_in_years(birth_date, today),
        Some(age) if (MIN_CHILD_AGE_YEARS..=MAX_CHILD_AGE_YEARS).contains(&age)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordCheck {
    pub is_valid: bool,
    /// Number of satisfied rules, 0-5
    pub score: u8,
    pub strength: PasswordStrength,
    pub errors: Vec<String>,
}

/// Score a password against the five rules. Length, upper, lower and digit are
/// required; a special character only raises the score.
pub fn validate_password(password: &str) -> PasswordCheck {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LENGTH;
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    let mut errors = Vec::new();
    if !long_enough {
        errors.push(format!("Password must be at least {} characters long", MIN_PASSWORD_LENGTH));
    }
    if !has_upper {
        errors.push("Password must contain an uppercase letter".to_string());
    }
    if !has_lower {
        errors.push("Password must contain a lowercase letter".to_string());
    }
    if !has_digit {
        errors.push("Password must contain a digit".to_string());
    }

    let score = [long_enough, has_upper, has_lower, has_digit, has_special]
        .iter()
        .filter(|ok| **ok)
        .count() as u8;

    let strength = match score {
        0..=2 => PasswordStrength::Weak,
        3 | 4 => PasswordStrength::Medium,
        _ => PasswordStrength::Strong,
    };

    PasswordCheck {
        is_valid: errors.is_empty(),
        score,
        strength,
        errors,
    }
}

/// Trim, drop control characters (newlines and tabs survive) and HTML-escape.
pub fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '\n' | '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

pub fn sanitize_optional(input: Option<&str>) -> Option<String> {
    input.map(sanitize_text).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    pub details: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            details: vec![FieldError {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }

    pub fn to_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Validation failed",
            "details": self.details,
        }))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .details
            .iter()
            .map(|d| format!("{}: {}", d.field, d.message))
            .collect();
        write!(f, "Validation failed: {}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Collects field errors across a request body.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn has_error(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        if !self.has_error(field) {
            self.errors.push(FieldError {
                field: field.to_string(),
                message: message.into(),
            });
        }
        self
    }

    /// Record `message` for `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.error(field, message);
        }
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, format!("{} is required", field))
    }

    /// Character length of the trimmed value. Empty values are left to `required`.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || self.has_error(field) {
            return self;
        }
        let len = trimmed.chars().count();
        self.check(
            (min..=max).contains(&len),
            field,
            format!("{} must be between {} and {} characters", field, min, max),
        )
    }

    pub fn optional_length(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(v) = value {
            self.length(field, v, 0, max);
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        self.required(field, value);
        if self.has_error(field) {
            return self;
        }
        self.check(is_valid_email(value.trim()), field, "Invalid email address")
    }

    pub fn phone(&mut self, field: &str, value: &str) -> &mut Self {
        self.required(field, value);
        if self.has_error(field) {
            return self;
        }
        self.check(is_valid_phone(value.trim()), field, "Invalid phone number")
    }

    pub fn optional_phone(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => self.phone(field, v),
            _ => self,
        }
    }

    pub fn name(&mut self, field: &str, value: &str) -> &mut Self {
        self.required(field, value);
        if self.has_error(field) {
            return self;
        }
        self.check(
            is_valid_name(value.trim()),
            field,
            format!("{} must be 2-50 letters, spaces, hyphens or apostrophes", field),
        )
    }

    pub fn range<T>(&mut self, field: &str, value: T, min: T, max: T) -> &mut Self
    where
        T: PartialOrd + fmt::Display,
    {
        let ok = value >= min && value <= max;
        self.check(ok, field, format!("{} must be between {} and {}", field, min, max))
    }

    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        let result = validate_password(value);
        if !result.is_valid {
            self.error(field, result.errors.join("; "));
        }
        self
    }

    pub fn date_not_future(&mut self, field: &str, date: NaiveDate, today: NaiveDate) -> &mut Self {
        self.check(date <= today, field, format!("{} cannot be in the future", field))
    }

    pub fn date_not_past(&mut self, field: &str, date: NaiveDate, today: NaiveDate) -> &mut Self {
        self.check(date >= today, field, format!("{} cannot be in the past", field))
    }

    pub fn child_age(&mut self, field: &str, birth_date: NaiveDate, today: NaiveDate) -> &mut Self {
        self.check(
            is_valid_age(birth_date, today),
            field,
            format!(
                "Child must be between {} and {} years old",
                MIN_CHILD_AGE_YEARS, MAX_CHILD_AGE_YEARS
            ),
        )
    }

    pub fn time_of_day(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.check(is_valid_time_of_day(v), field, format!("{} must be HH:MM", field)),
            None => self,
        }
    }

    pub fn period(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(is_valid_period(value), field, format!("{} must be YYYY-MM", field))
    }

    /// Parse a string-valued enum, recording the allowed values on failure.
    pub fn one_of<T>(&mut self, field: &str, value: &str) -> Option<T>
    where
        T: FromStr + VariantNames,
    {
        match value.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.error(field, format!("{} must be one of: {}", field, T::VARIANTS.join(", ")));
                None
            }
        }
    }

    /// Parse a `YYYY-MM-DD` string.
    pub fn date(&mut self, field: &str, value: &str) -> Option<NaiveDate> {
        match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                self.error(field, format!("{} must be a date (YYYY-MM-DD)", field));
                None
            }
        }
    }

    pub fn finish(&self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                details: self.errors.clone(),
            })
        }
    }

    /// Prefix every collected field, e.g. `records[3].status`.
    pub fn nest_into(self, prefix: &str, parent: &mut Validator) {
        for e in self.errors {
            parent.errors.push(FieldError {
                field: format!("{}.{}", prefix, e.field),
                message: e.message,
            });
        }
    }
}

/// JSON extractor config: malformed bodies answer with the validation shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_JSON_BYTES)
        .error_handler(|err, _req| {
            let resp = ValidationErrors::single("body", err.to_string()).to_response();
            InternalError::from_response(err, resp).into()
        })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let resp = ValidationErrors::single("query", err.to_string()).to_response();
        InternalError::from_response(err, resp).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        let resp = ValidationErrors::single("path", err.to_string()).to_response();
        InternalError::from_response(err, resp).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Months;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_email_rules() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("first.last+tag@kids.example.org"));
        assert!(!is_valid_email("test@"));
        assert!(!is_valid_email("test example@example.com"));
        assert!(!is_valid_email("test@example"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_weak_password_rejected() {
        let check = validate_password("weak");
        assert!(!check.is_valid);
        assert_eq!(check.strength, PasswordStrength::Weak);
        assert_eq!(check.score, 1);
        assert_eq!(check.errors.len(), 3);
    }

    #[test]
    fn test_password_strength_levels() {
        let medium = validate_password("Sunshine42");
        assert!(medium.is_valid);
        assert_eq!(medium.score, 4);
        assert_eq!(medium.strength, PasswordStrength::Medium);

        let strong = validate_password("Sunshine42!");
        assert!(strong.is_valid);
        assert_eq!(strong.score, 5);
        assert_eq!(strong.strength, PasswordStrength::Strong);
    }

    #[test]
    fn test_age_three_years_ago_is_valid() {
        let today = day("2026-10-17");
        let birth = today.checked_sub_months(Months::new(36)).unwrap();
        assert!(is_valid_age(birth, today));
    }

    #[test]
    fn test_age_bounds() {
        let today = day("2026-10-17");
        // Turns 1 today
        assert!(is_valid_age(day("2025-10-17"), today));
        // Still 0 for one more day
        assert!(!is_valid_age(day("2025-10-18"), today));
        assert!(is_valid_age(day("2018-10-18"), today));
        assert!(!is_valid_age(day("2018-10-17"), today));
        assert!(!is_valid_age(day("2027-01-01"), today));
    }

    #[test]
    fn test_phone_rules() {
        assert!(is_valid_phone("+1 (555) 123-4567"));
        assert!(is_valid_phone("0501234567"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("555-CALL-NOW"));
        assert_eq!(normalize_phone(" +1 (555) 123-4567 "), "+15551234567");
        assert_eq!(normalize_phone("050-123-45-67"), "0501234567");
    }

    #[test]
    fn test_name_rules() {
        assert!(is_valid_name("Anna-Maria"));
        assert!(is_valid_name("O'Brien"));
        assert!(is_valid_name("Олена"));
        assert!(!is_valid_name("A"));
        assert!(!is_valid_name("R2D2"));
        assert!(!is_valid_name("-Anna"));
    }

    #[test]
    fn test_sanitize_escapes_markup() {
        assert_eq!(
            sanitize_text("  <b>Hi</b> & \"bye\"\u{0007}  "),
            "&lt;b&gt;Hi&lt;/b&gt; &amp; &quot;bye&quot;"
        );
        assert_eq!(sanitize_text("line one\nline two"), "line one\nline two");
        assert_eq!(sanitize_optional(Some("   ")), None);
    }

    #[test]
    fn test_validator_first_error_per_field_wins() {
        let mut v = Validator::new();
        v.email("email", "")
            .length("message", "short", 10, 2000)
            .range("rating", 6, 1, 5);
        let errs = v.finish().unwrap_err();
        assert_eq!(errs.details.len(), 3);
        assert_eq!(errs.details[0].field, "email");
        assert_eq!(errs.details[0].message, "email is required");
        assert!(errs.to_string().contains("rating"));
    }

    #[test]
    fn test_validator_nested_fields() {
        let mut parent = Validator::new();
        let mut child = Validator::new();
        child.error("status", "bad");
        child.nest_into("records[2]", &mut parent);
        let errs = parent.finish().unwrap_err();
        assert_eq!(errs.details[0].field, "records[2].status");
    }

    #[test]
    fn test_time_and_period_formats() {
        assert!(is_valid_time_of_day("08:30"));
        assert!(!is_valid_time_of_day("24:00"));
        assert!(is_valid_period("2026-09"));
        assert!(!is_valid_period("2026-13"));
    }
}
