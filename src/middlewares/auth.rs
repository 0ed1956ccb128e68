use crate::error::AppError;
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            // 完全匹配的公开路径
            exact_paths: vec![
                "/health",
                "/swagger-ui",
                "/swagger-ui/",
                "/api-docs/openapi.json",
                "/api/v1/auth/register",
                "/api/v1/auth/login",
            ],
            // 前缀匹配的公开路径
            prefix_paths: vec!["/swagger-ui/", "/api-docs/"],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        if self.exact_paths.contains(&path) {
            return true;
        }
        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let path = req.path();

        if self.public_paths.is_public_path(path) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let token = bearer_token(&req).or_else(|| {
            // EventSource 无法自定义 Header，事件流接受查询参数令牌
            if path.starts_with("/api/v1/events/") {
                query_token(req.query_string())
            } else {
                None
            }
        });

        if let Some(token) = token {
            match self.jwt_service.verify_token(&token) {
                Ok(claims) => {
                    // 将用户ID添加到请求扩展中
                    req.extensions_mut()
                        .insert(claims.sub.parse::<i64>().unwrap_or(0));
                    let fut = self.service.call(req);
                    Box::pin(fut)
                }
                Err(_) => {
                    let error = AppError::AuthError("Invalid access token".to_string());
                    Box::pin(async move { Err(error.into()) })
                }
            }
        } else {
            let error = AppError::AuthError("Missing access token".to_string());
            Box::pin(async move { Err(error.into()) })
        }
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn query_token(query: &str) -> Option<String> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_endpoints_are_public() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path("/api/v1/auth/register"));
        assert!(paths.is_public_path("/api/v1/auth/login"));
        assert!(paths.is_public_path("/health"));
        assert!(paths.is_public_path("/api-docs/openapi.json"));
    }

    #[test]
    fn test_profile_and_api_routes_require_auth() {
        let paths = PublicPaths::new();
        assert!(!paths.is_public_path("/api/v1/auth/me"));
        assert!(!paths.is_public_path("/api/v1/lessons"));
        assert!(!paths.is_public_path("/api/v1/events/lessons"));
    }

    #[test]
    fn test_query_token_extraction() {
        assert_eq!(query_token("token=abc&x=1"), Some("abc".to_string()));
        assert_eq!(query_token("x=1&token=abc"), Some("abc".to_string()));
        assert_eq!(query_token("token="), None);
        assert_eq!(query_token("x=1"), None);
    }
}
