use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in,
        }
    }

    pub fn generate_token(&self, user_id: i64, email: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expires_in);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    pub fn get_expires_in(&self) -> i64 {
        self.expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify_token() {
        let service = JwtService::new("test-secret", 3600);
        let token = service.generate_token(42, "tutor@example.com").unwrap();

        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "tutor@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let service = JwtService::new("test-secret", 3600);
        let token = service.generate_token(42, "tutor@example.com").unwrap();

        let other = JwtService::new("other-secret", 3600);
        assert!(other.verify_token(&token).is_err());
    }
}
