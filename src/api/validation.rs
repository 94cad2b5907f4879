//! Input validation for API requests.
//!
//! Field validators return `Err(message)`; collect them into an `ApiError`
//! with the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Licence plates: letters, digits, single spaces or dashes between groups
    static ref PLATE_REGEX: Regex = Regex::new(
        r"^[A-Z0-9]+([ -][A-Z0-9]+)*$"
    ).unwrap();

    /// Space numbers such as A-01, 12, or P2-104
    static ref SPACE_NUMBER_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$"
    ).unwrap();

    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();
}

/// Normalise a plate to its stored form (upper case, trimmed)
pub fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

/// Validate an already-normalised plate
pub fn validate_plate(plate: &str) -> Result<(), String> {
    if plate.is_empty() {
        return Err("Plate is required".to_string());
    }

    if plate.len() < 2 || plate.len() > 12 {
        return Err("Plate must be between 2 and 12 characters".to_string());
    }

    if !PLATE_REGEX.is_match(plate) {
        return Err("Plate may only contain letters, digits, spaces and dashes".to_string());
    }

    Ok(())
}

pub fn validate_space_number(number: &str) -> Result<(), String> {
    if number.is_empty() {
        return Err("Space number is required".to_string());
    }

    if number.len() > 16 {
        return Err("Space number is too long (max 16 characters)".to_string());
    }

    if !SPACE_NUMBER_REGEX.is_match(number) {
        return Err("Space number must be alphanumeric with dashes".to_string());
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 || !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 10 {
        return Err("Password must be at least 10 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

pub fn validate_alert_message(message: &str) -> Result<(), String> {
    if message.trim().is_empty() {
        return Err("Message is required".to_string());
    }

    if message.len() > 500 {
        return Err("Message is too long (max 500 characters)".to_string());
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

pub fn validate_wallet_balance(balance: f64) -> Result<(), String> {
    if !balance.is_finite() || balance < 0.0 {
        return Err("Wallet balance must be a non-negative number".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_plate() {
        assert!(validate_plate("ABC123").is_ok());
        assert!(validate_plate("GR 1234-20").is_ok());
        assert!(validate_plate("KA-01-AB-1234").is_err()); // too long
        assert!(validate_plate(&normalize_plate("  ab-12 ")).is_ok());

        assert!(validate_plate("").is_err());
        assert!(validate_plate("A").is_err());
        assert!(validate_plate("AB--12").is_err());
        assert!(validate_plate("abc123").is_err()); // must be normalised first
        assert!(validate_plate("AB_12").is_err());
    }

    #[test]
    fn test_validate_space_number() {
        assert!(validate_space_number("A-01").is_ok());
        assert!(validate_space_number("12").is_ok());
        assert!(validate_space_number("P2-104").is_ok());

        assert!(validate_space_number("").is_err());
        assert!(validate_space_number("-A").is_err());
        assert!(validate_space_number("A 01").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("admin@parkwise.local").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("long-enough-pass").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "session_id").is_ok());
        assert!(validate_uuid("", "session_id").is_err());
        assert!(validate_uuid("not-a-uuid", "session_id").is_err());
    }

    #[test]
    fn test_validate_wallet_balance() {
        assert!(validate_wallet_balance(0.0).is_ok());
        assert!(validate_wallet_balance(12.5).is_ok());
        assert!(validate_wallet_balance(-1.0).is_err());
        assert!(validate_wallet_balance(f64::NAN).is_err());
    }
}
