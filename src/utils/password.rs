use crate::error::{AppError, AppResult};

/// 密码至少 8 位，须包含大写、小写与数字
pub fn validate_password(password: &str) -> AppResult<()> {
    if password.len() < 8
        || !password.chars().any(|c| c.is_ascii_uppercase())
        || !password.chars().any(|c| c.is_ascii_lowercase())
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(AppError::ValidationError(
            "Password must be at least 8 characters and contain uppercase, lowercase and digits"
                .to_string(),
        ));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::InternalError(format!("Failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| AppError::InternalError(format!("Failed to verify password: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Password123").is_ok());
        assert!(validate_password("password123").is_err()); // 缺少大写
        assert!(validate_password("PASSWORD123").is_err()); // 缺少小写
        assert!(validate_password("Password").is_err()); // 缺少数字
        assert!(validate_password("Pass123").is_err()); // 太短
    }

    #[test]
    fn test_hash_and_verify_password() {
        let password = "Password123";
        let hashed = hash_password(password).unwrap();

        assert!(verify_password(password, &hashed).unwrap());
        assert!(!verify_password("WrongPassword", &hashed).unwrap());
    }
}
