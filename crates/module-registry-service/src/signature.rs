//! Webhook signature verification
//!
//! The sender signs the raw request body with HMAC-SHA1 under a shared secret
//! and sends `sha1=<lowercase hex>` in the `x-hub-signature` header.

use module_registry_db::SecretStore;
use ring::hmac;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{ServiceError, ServiceResult};

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Algorithm prefix of the header value
pub const SIGNATURE_PREFIX: &str = "sha1=";

/// Secret store key of the shared webhook secret
pub const WEBHOOK_SECRET_KEY: &str = "github_secret";

fn signing_key(secret: &[u8]) -> hmac::Key {
    hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret)
}

/// Header value the sender would produce for `body`
pub fn compute_signature(secret: &[u8], body: &[u8]) -> String {
    let tag = hmac::sign(&signing_key(secret), body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(tag.as_ref()))
}

/// Check a header value against `body` and `secret`
///
/// A missing, malformed or non-matching header is an authentication failure.
/// The comparison is constant-time.
pub fn verify(header: Option<&str>, body: &[u8], secret: &[u8]) -> ServiceResult<()> {
    if secret.is_empty() {
        return Err(ServiceError::Authentication(
            "webhook secret is empty".to_string(),
        ));
    }
    let header = header
        .ok_or_else(|| ServiceError::Authentication("missing signature header".to_string()))?;
    let digest = header
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| ServiceError::Authentication("unsupported signature format".to_string()))?;
    // The sender emits lowercase digits only
    if digest.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(ServiceError::Authentication("malformed signature".to_string()));
    }
    let tag = hex::decode(digest)
        .map_err(|_| ServiceError::Authentication("malformed signature".to_string()))?;

    hmac::verify(&signing_key(secret), body, &tag)
        .map_err(|_| ServiceError::Authentication("invalid signature".to_string()))
}

/// Verifies webhook signatures against the secret held in the secret store
///
/// Fails closed: if the secret cannot be fetched every request is rejected.
#[derive(Clone)]
pub struct SignatureVerifier {
    secrets: Arc<dyn SecretStore>,
    debug: bool,
}

impl SignatureVerifier {
    /// Create a verifier reading the secret from `secrets`
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            secrets,
            debug: false,
        }
    }

    /// Log received and expected signatures on mismatch
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Verify `header` against `body`
    #[instrument(skip(self, header, body), fields(body_len = body.len()))]
    pub async fn verify(&self, header: Option<&str>, body: &[u8]) -> ServiceResult<()> {
        let secret = match self.secrets.get_secret(WEBHOOK_SECRET_KEY).await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                warn!("Webhook secret is not configured; rejecting request");
                return Err(ServiceError::Authentication(
                    "webhook secret unavailable".to_string(),
                ));
            }
            Err(e) => {
                warn!("Failed to read webhook secret: {}", e);
                return Err(ServiceError::Authentication(
                    "webhook secret unavailable".to_string(),
                ));
            }
        };

        let result = verify(header, body, secret.as_bytes());
        if result.is_err() && self.debug {
            debug!(
                received = header.unwrap_or("<none>"),
                expected = %compute_signature(secret.as_bytes(), body),
                "Signature mismatch"
            );
        }
        result
    }
}
