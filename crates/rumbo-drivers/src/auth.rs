//! Driver bearer-token authentication.
//!
//! Tokens carry the driver id in the `sub` claim. HTTP handlers take the
//! [`AuthDriver`] extractor; the WebSocket endpoint verifies the token from
//! its query string before upgrading.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::StatusCode;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use rumbo_core::DriverId;
use serde::Deserialize;
use tracing::warn;

/// Verifies driver bearer tokens.
#[derive(Clone)]
pub struct DriverTokenVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

#[derive(Debug, Deserialize)]
struct DriverClaims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

impl DriverTokenVerifier {
    /// Build a verifier over the driver-service HS256 secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a token and extract the driver id from its subject.
    ///
    /// # Errors
    ///
    /// Returns a unit error for any invalid, expired or subject-less token;
    /// callers map it to 401 / a policy-violation close.
    pub fn verify(&self, token: &str) -> Result<DriverId, ()> {
        let claims = decode::<DriverClaims>(token, &self.decoding, &self.validation)
            .map_err(|error| {
                warn!(%error, "driver token rejected");
            })?
            .claims;
        claims.sub.parse().map_err(|_| {
            warn!("driver token subject is not a valid driver id");
        })
    }
}

impl std::fmt::Debug for DriverTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverTokenVerifier").finish_non_exhaustive()
    }
}

/// The authenticated driver, extracted per request.
#[derive(Debug, Clone, Copy)]
pub struct AuthDriver(pub DriverId);

impl<S> FromRequestParts<S> for AuthDriver
where
    DriverTokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = DriverTokenVerifier::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing authentication credentials"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or((StatusCode::UNAUTHORIZED, "invalid authorization scheme"))?;

        verifier
            .verify(token)
            .map(AuthDriver)
            .map_err(|()| (StatusCode::UNAUTHORIZED, "invalid token"))
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

    fn token(secret: &str, sub: &str) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub: sub.to_string(),
                exp: 4_102_444_800,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn extracts_driver_id_from_subject() {
        let driver_id = DriverId::new();
        let verifier = DriverTokenVerifier::new("secret");
        let verified = verifier
            .verify(&token("secret", &driver_id.to_string()))
            .unwrap();
        assert_eq!(verified, driver_id);
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let verifier = DriverTokenVerifier::new("secret");
        assert!(verifier.verify(&token("secret", "admin")).is_err());
    }

    #[test]
    fn rejects_forged_token() {
        let verifier = DriverTokenVerifier::new("secret");
        assert!(
            verifier
                .verify(&token("other", &DriverId::new().to_string()))
                .is_err()
        );
    }
}
