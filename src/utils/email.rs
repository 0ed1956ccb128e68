use crate::error::{AppError, AppResult};
use regex::Regex;

pub fn validate_email(email: &str) -> AppResult<()> {
    let email_regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();

    if !email_regex.is_match(email) {
        return Err(AppError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }

    Ok(())
}
