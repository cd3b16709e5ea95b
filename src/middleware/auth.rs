use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::Config, error::AppError, state::AppState};

/// Claims of a token minted by the external auth service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: i64,
}

/// The authenticated user for this request.
pub struct AuthUser(pub Uuid);

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    match &config.jwt_audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        AppError::Unauthorized
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let claims = verify_token(token, &state.config)?;

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn config(audience: Option<&str>) -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.jwt_secret = "test-secret".into();
        config.jwt_audience = audience.map(str::to_string);
        config
    }

    fn token(secret: &str, aud: Option<&str>, exp: i64) -> String {
        let claims = Claims {
            sub: Uuid::nil(),
            email: Some("trader@example.com".into()),
            aud: aud.map(str::to_string),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_an_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn accepts_valid_token() {
        let claims = verify_token(&token("test-secret", None, in_an_hour()), &config(None)).unwrap();
        assert_eq!(claims.sub, Uuid::nil());
    }

    #[test]
    fn audience_is_ignored_unless_configured() {
        let t = token("test-secret", Some("authenticated"), in_an_hour());
        assert!(verify_token(&t, &config(None)).is_ok());
        assert!(verify_token(&t, &config(Some("authenticated"))).is_ok());
        assert!(verify_token(&t, &config(Some("other"))).is_err());
    }

    #[test]
    fn rejects_wrong_secret_and_expired() {
        assert!(verify_token(&token("nope", None, in_an_hour()), &config(None)).is_err());
        assert!(verify_token(&token("test-secret", None, 1_000), &config(None)).is_err());
    }
}
