//! Provider webhook signature validation.
//!
//! The provider signs each webhook with HMAC-SHA256 over the public
//! webhook URL followed by the form parameters concatenated in sorted key
//! order (`key1value1key2value2…`), base64-encoded. Verification is
//! constant-time and fail-closed: no secret, no service.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Validates provider signatures against the shared secret.
#[derive(Clone)]
pub struct SignatureValidator {
    secret: Vec<u8>,
}

impl SignatureValidator {
    /// Build a validator over the shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Whether `signature` matches `url` + the sorted form parameters.
    #[must_use]
    pub fn validate(&self, url: &str, params: &BTreeMap<String, String>, signature: &str) -> bool {
        let Ok(expected) = BASE64.decode(signature) else {
            return false;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(url.as_bytes());
        // BTreeMap iterates in sorted key order.
        for (key, value) in params {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }
        mac.verify_slice(&expected).is_ok()
    }

    /// Sign a payload the way the provider would (used in tests and tools).
    #[must_use]
    pub fn sign(&self, url: &str, params: &BTreeMap<String, String>) -> String {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return String::new();
        };
        mac.update(url.as_bytes());
        for (key, value) in params {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }
        BASE64.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("From".to_string(), "whatsapp:+573001234567".to_string()),
            ("Body".to_string(), "necesito mototaxi".to_string()),
        ])
    }

    #[test]
    fn accepts_own_signature() {
        let validator = SignatureValidator::new("secret");
        let url = "https://bot.example/webhook";
        let signature = validator.sign(url, &params());
        assert!(validator.validate(url, &params(), &signature));
    }

    #[test]
    fn rejects_wrong_secret() {
        let signer = SignatureValidator::new("other");
        let validator = SignatureValidator::new("secret");
        let url = "https://bot.example/webhook";
        let signature = signer.sign(url, &params());
        assert!(!validator.validate(url, &params(), &signature));
    }

    #[test]
    fn rejects_tampered_params() {
        let validator = SignatureValidator::new("secret");
        let url = "https://bot.example/webhook";
        let signature = validator.sign(url, &params());

        let mut tampered = params();
        tampered.insert("Body".to_string(), "otro mensaje".to_string());
        assert!(!validator.validate(url, &tampered, &signature));
    }

    #[test]
    fn rejects_garbage_signature() {
        let validator = SignatureValidator::new("secret");
        assert!(!validator.validate("https://bot.example/webhook", &params(), "!!!not-base64"));
        assert!(!validator.validate("https://bot.example/webhook", &params(), ""));
    }
}
