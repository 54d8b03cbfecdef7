//! Bearer-token authentication for the orders API.
//!
//! A [`JwtVerifier`] lives in the router state; the [`AuthUser`] extractor
//! verifies the `Authorization: Bearer` header and hands the handler an
//! explicit identity value. Handlers that require auth simply take
//! `AuthUser` as an argument.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::StatusCode;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tracing::warn;

/// Verifies bearer tokens issued by the identity provider.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build a verifier over the shared HS256 secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a token and return its subject claim.
    ///
    /// # Errors
    ///
    /// Returns the decode error for expired, malformed or forged tokens.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        Ok(decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier").finish_non_exhaustive()
    }
}

/// Token claims the platform cares about.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// Subject: the authenticated principal's id.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: usize,
    /// Optional role list.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The authenticated caller, extracted per request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Principal id from the token subject.
    pub user_id: String,
    /// Roles carried by the token.
    pub roles: Vec<String>,
}

impl<S> FromRequestParts<S> for AuthUser
where
    JwtVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = JwtVerifier::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing authentication credentials"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or((StatusCode::UNAUTHORIZED, "invalid authorization scheme"))?;

        match verifier.verify(token) {
            Ok(claims) => Ok(AuthUser {
                user_id: claims.sub,
                roles: claims.roles,
            }),
            Err(error) => {
                warn!(%error, "token rejected");
                Err((StatusCode::UNAUTHORIZED, "invalid token"))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: usize,
    }

    fn token(secret: &str, sub: &str, exp: usize) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        4_102_444_800 // 2100-01-01
    }

    #[test]
    fn accepts_valid_token() {
        let verifier = JwtVerifier::new("secret");
        let claims = verifier
            .verify(&token("secret", "user-1", far_future()))
            .unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn rejects_wrong_secret() {
        let verifier = JwtVerifier::new("secret");
        assert!(verifier.verify(&token("other", "user-1", far_future())).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = JwtVerifier::new("secret");
        assert!(verifier.verify(&token("secret", "user-1", 1_000)).is_err());
    }
}
