use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationErrors;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ().\-]{7,20}$").expect("valid phone regex"));
static CONTACT_PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ().\-]+$").expect("valid contact phone regex"));
static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]{1,64}$").expect("valid id regex"));

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Case- and whitespace-insensitive key for a street address.
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    PHONE_RE.is_match(phone) && (10..=15).contains(&digits)
}

/// Contact numbers are stored as entered, so extensions and short internal
/// numbers pass. Only the character set is checked.
pub fn is_plausible_contact_phone(phone: &str) -> bool {
    let phone = phone.trim();
    CONTACT_PHONE_RE.is_match(phone) && phone.chars().any(|c| c.is_ascii_digit())
}

pub fn is_valid_id(id: &str) -> bool {
    ID_RE.is_match(id)
}

pub fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

pub fn require(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if is_blank(value) {
        errors.add(field, "is required");
    }
}

pub fn check_email(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if let Some(email) = value {
        if !is_valid_email(email) {
            errors.add(field, "must be a valid email address");
        }
    }
}

pub fn check_phone(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if let Some(phone) = value.filter(|p| !p.trim().is_empty()) {
        if !is_valid_phone(phone) {
            errors.add(field, "must be a valid phone number");
        }
    }
}

pub fn check_contact_phone(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if let Some(phone) = value.filter(|p| !p.trim().is_empty()) {
        if !is_plausible_contact_phone(phone) {
            errors.add(field, "must contain only digits and phone punctuation");
        }
    }
}

pub fn check_id(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if let Some(id) = value {
        if !is_valid_id(id) {
            errors.add(field, "is not a valid record id");
        }
    }
}
