// Admin authentication: credential check at login, JWT validation on every
// /api/v1/admin request.

use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

/// Issued tokens live this long (seconds).
pub const TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

const ADMIN_PATH_PREFIX: &str = "/api/v1/admin";

/// Admin credentials and the JWT signing secret, loaded once at startup.
#[derive(Clone)]
pub struct AuthSettings {
    pub secret: String,
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

fn issue_token_with_ttl(secret: &str, subject: &str, ttl_secs: i64) -> anyhow::Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: subject.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(Into::into)
}

/// Sign a short-lived HS256 admin token.
pub fn issue_token(secret: &str, subject: &str) -> anyhow::Result<String> {
    issue_token_with_ttl(secret, subject, TOKEN_TTL_SECS)
}

/// Decode and verify a token (signature + expiry). None on any failure.
pub fn validate_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Middleware guarding the admin scope. Public read routes and /health pass
/// through untouched; admin requests need a valid Bearer token.
pub struct AdminAuth {
    secret: String,
}

impl AdminAuth {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthMiddleware {
            service,
            secret: self.secret.clone(),
        }))
    }
}

pub struct AdminAuthMiddleware<S> {
    service: S,
    secret: String,
}

impl<S, B> Service<ServiceRequest> for AdminAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Only the admin scope is credential-gated.
        if !req.path().starts_with(ADMIN_PATH_PREFIX) {
            let fut = self.service.call(req);
            return Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            });
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        if let Some(token) = token {
            if validate_token(&self.secret, token).is_some() {
                let fut = self.service.call(req);
                return Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                });
            }
        }

        Box::pin(async move {
            let response = HttpResponse::Unauthorized()
                .json(serde_json::json!({
                    "success": false,
                    "error": "Invalid or missing authentication token"
                }))
                .map_into_right_body();
            Ok(req.into_response(response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip_validates() {
        let token = issue_token("top-secret", "admin").unwrap();
        let claims = validate_token("top-secret", &token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("top-secret", "admin").unwrap();
        assert!(validate_token("other-secret", &token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default validation leeway.
        let token = issue_token_with_ttl("top-secret", "admin", -120).unwrap();
        assert!(validate_token("top-secret", &token).is_none());
    }
}
