use crate::database::DbPool;
use crate::entities::user_entity;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::{hash_password, validate_email, validate_password, verify_password, JwtService};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

#[derive(Clone)]
pub struct AuthService {
    pool: DbPool,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(pool: DbPool, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        validate_email(&request.email)?;
        validate_password(&request.password)?;
        if request.name.trim().is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }

        let existing = user_entity::Entity::find()
            .filter(user_entity::Column::Email.eq(request.email.clone()))
            .one(&*self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::ValidationError(
                "A user with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let user = user_entity::ActiveModel {
            email: Set(request.email),
            name: Set(request.name),
            password_hash: Set(password_hash),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        let token = self.jwt_service.generate_token(user.id, &user.email)?;
        Ok(AuthResponse {
            user: user.into(),
            token,
            expires_in: self.jwt_service.get_expires_in(),
        })
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let user = user_entity::Entity::find()
            .filter(user_entity::Column::Email.eq(request.email.clone()))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid credentials".to_string()))?;

        // 密码错误与用户不存在返回同样的错误
        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError("Invalid credentials".to_string()));
        }

        let token = self.jwt_service.generate_token(user.id, &user.email)?;
        Ok(AuthResponse {
            user: user.into(),
            token,
            expires_in: self.jwt_service.get_expires_in(),
        })
    }

    pub async fn get_profile(&self, user_id: i64) -> AppResult<UserResponse> {
        let user = user_entity::Entity::find_by_id(user_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn user_fixture() -> user_entity::Model {
        user_entity::Model {
            id: 1,
            email: "tutor@example.com".to_string(),
            name: "Anna".to_string(),
            password_hash: hash_password("Password123").unwrap(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = AuthService::new(std::sync::Arc::new(db), JwtService::new("secret", 3600));

        let err = service
            .register(RegisterRequest {
                email: "tutor@example.com".to_string(),
                password: "short".to_string(),
                name: "Anna".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_fixture()]])
            .into_connection();
        let service = AuthService::new(std::sync::Arc::new(db), JwtService::new("secret", 3600));

        let err = service
            .register(RegisterRequest {
                email: "tutor@example.com".to_string(),
                password: "Password123".to_string(),
                name: "Anna".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_fixture()]])
            .into_connection();
        let service = AuthService::new(std::sync::Arc::new(db), JwtService::new("secret", 3600));

        let err = service
            .login(LoginRequest {
                email: "tutor@example.com".to_string(),
                password: "WrongPassword1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_login_succeeds_with_valid_credentials() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_fixture()]])
            .into_connection();
        let service = AuthService::new(std::sync::Arc::new(db), JwtService::new("secret", 3600));

        let response = service
            .login(LoginRequest {
                email: "tutor@example.com".to_string(),
                password: "Password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.user.id, 1);
        assert!(!response.token.is_empty());
    }
}
