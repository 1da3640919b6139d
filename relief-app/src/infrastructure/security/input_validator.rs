use relief_errors::AppError;
use std::sync::OnceLock;

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_ID_LENGTH: usize = 128;
const MAX_NAME_LENGTH: usize = 200;

fn email_pattern() -> &'static regex_lite::Regex {
    static EMAIL: OnceLock<regex_lite::Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        regex_lite::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

pub struct InputValidator;

impl InputValidator {
    /// Returns the trimmed address. Case is preserved; emails are compared verbatim.
    pub fn validate_email(email: &str) -> Result<String, AppError> {
        let email = email.trim();

        if email.is_empty() {
            return Err(AppError::Validation("email is required".to_string()));
        }

        if email.len() > MAX_EMAIL_LENGTH {
            return Err(AppError::Validation("email is too long".to_string()));
        }

        if !email_pattern().is_match(email) {
            tracing::warn!("Rejected malformed email: {}", email);
            return Err(AppError::Validation("email is not valid".to_string()));
        }

        Ok(email.to_string())
    }

    /// Document ids: non-empty, bounded, no path separators or control chars.
    pub fn validate_id(field: &str, id: &str) -> Result<String, AppError> {
        let id = id.trim();

        if id.is_empty() {
            return Err(AppError::Validation(format!("{field} is required")));
        }

        if id.len() > MAX_ID_LENGTH {
            return Err(AppError::Validation(format!("{field} is too long")));
        }

        if id.chars().any(|c| c == '/' || c.is_control() || c.is_whitespace()) {
            return Err(AppError::Validation(format!(
                "{field} contains invalid characters"
            )));
        }

        Ok(id.to_string())
    }

    pub fn validate_station_name(name: &str) -> Result<String, AppError> {
        let name: String = name.trim().chars().filter(|c| !c.is_control()).collect();

        if name.is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }

        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(AppError::Validation("name is too long".to_string()));
        }

        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert_eq!(
            InputValidator::validate_email("  lead@shelter.hk ").unwrap(),
            "lead@shelter.hk"
        );
    }

    #[test]
    fn test_invalid_email() {
        assert!(InputValidator::validate_email("").is_err());
        assert!(InputValidator::validate_email("not-an-email").is_err());
        assert!(InputValidator::validate_email("two words@x.org").is_err());
        assert!(InputValidator::validate_email("a@b").is_err());
    }

    #[test]
    fn test_ids() {
        assert!(InputValidator::validate_id("stationId", "st_001").is_ok());
        assert!(InputValidator::validate_id("stationId", "").is_err());
        assert!(InputValidator::validate_id("stationId", "a/b").is_err());
        assert!(InputValidator::validate_id("stationId", &"x".repeat(129)).is_err());
    }

    #[test]
    fn test_station_name() {
        assert_eq!(
            InputValidator::validate_station_name(" Tai Po Depot\u{7} ").unwrap(),
            "Tai Po Depot"
        );
        assert!(InputValidator::validate_station_name("   ").is_err());
    }
}
