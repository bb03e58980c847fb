//! Signed retrieval handles
//!
//! A handle is a URL of the form
//! `{base}/artifacts/{key}?expires={unix_seconds}&signature={hex}` where the
//! signature is HMAC-SHA256 over `"{key}\n{expires}"`. Anyone holding the URL
//! can read that one object until it expires. Key segments are
//! percent-encoded in the URL; the signature covers the raw key.

use chrono::{DateTime, Duration, Utc};
use module_registry_core::{ArtifactKey, RetrievalHandle};
use ring::hmac;
use ring::rand::SystemRandom;
use url::Url;

use crate::error::{DbError, DbResult};

/// Path prefix under which handles are redeemed
pub const ARTIFACT_ROUTE_PREFIX: &str = "artifacts";

/// Issues and checks signed retrieval handles
#[derive(Debug, Clone)]
pub struct HandleSigner {
    key: hmac::Key,
    base_url: Url,
}

impl HandleSigner {
    /// Create a signer from a shared secret and the public base URL
    pub fn new(secret: &[u8], base_url: &str) -> DbResult<Self> {
        if secret.is_empty() {
            return Err(DbError::Configuration(
                "Handle signing secret cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            base_url: normalize_base(base_url)?,
        })
    }

    /// Create a signer with a random per-process key
    ///
    /// Handles issued by one process cannot be redeemed by another.
    pub fn generate(base_url: &str) -> DbResult<Self> {
        let rng = SystemRandom::new();
        let key = hmac::Key::generate(hmac::HMAC_SHA256, &rng)
            .map_err(|_| DbError::Internal("Failed to generate signing key".to_string()))?;
        Ok(Self {
            key,
            base_url: normalize_base(base_url)?,
        })
    }

    /// Issue a handle for `key` valid for `ttl_secs` from `now`
    pub fn sign(
        &self,
        key: &ArtifactKey,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> DbResult<RetrievalHandle> {
        let expires_at = now + Duration::seconds(ttl_secs);
        let expires = expires_at.timestamp();
        let tag = hmac::sign(&self.key, message(key.as_str(), expires).as_bytes());

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DbError::Configuration(format!("Base URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .push(ARTIFACT_ROUTE_PREFIX)
            .extend(key.as_str().split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &hex::encode(tag.as_ref()));

        Ok(RetrievalHandle {
            url: url.to_string(),
            expires_at: DateTime::from_timestamp(expires, 0).unwrap_or(expires_at),
        })
    }

    /// Check a presented handle
    ///
    /// # Errors
    /// Returns `DbError::InvalidHandle` when the handle has expired or the
    /// signature does not match.
    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        if now.timestamp() > expires {
            return Err(DbError::InvalidHandle("handle has expired".to_string()));
        }
        let tag = hex::decode(signature)
            .map_err(|e| DbError::InvalidHandle(e.to_string()))?;
        hmac::verify(&self.key, message(key, expires).as_bytes(), &tag)
            .map_err(|_| DbError::InvalidHandle("signature mismatch".to_string()))
    }

    /// Public base URL handles are issued under
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

fn message(key: &str, expires: i64) -> String {
    format!("{}\n{}", key, expires)
}

// Handle paths are appended below the base path, never in place of its last segment
fn normalize_base(base_url: &str) -> DbResult<Url> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use module_registry_core::{ModuleCoordinate, Version};

    fn key() -> ArtifactKey {
        let coordinate = ModuleCoordinate::new("acme", "widget", "aws").unwrap();
        ArtifactKey::for_version(&coordinate, &Version::new("2.0.0")).unwrap()
    }

    fn query_value(url: &str, name: &str) -> String {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = HandleSigner::new(b"secret", "http://registry.local:8080").unwrap();
        let now = Utc::now();
        let handle = signer.sign(&key(), 3600, now).unwrap();

        assert!(handle
            .url
            .starts_with("http://registry.local:8080/artifacts/acme/widget/aws/2.0.0.zip?"));
        let expires: i64 = query_value(&handle.url, "expires").parse().unwrap();
        let signature = query_value(&handle.url, "signature");

        assert!(signer.verify(key().as_str(), expires, &signature, now).is_ok());
    }

    #[test]
    fn test_expired_handle_rejected() {
        let signer = HandleSigner::new(b"secret", "http://localhost").unwrap();
        let now = Utc::now();
        let handle = signer.sign(&key(), 3600, now).unwrap();
        let expires: i64 = query_value(&handle.url, "expires").parse().unwrap();
        let signature = query_value(&handle.url, "signature");

        let later = now + Duration::seconds(3601);
        let err = signer.verify(key().as_str(), expires, &signature, later).unwrap_err();
        assert!(matches!(err, DbError::InvalidHandle(_)));
    }

    #[test]
    fn test_tampered_handle_rejected() {
        let signer = HandleSigner::new(b"secret", "http://localhost").unwrap();
        let now = Utc::now();
        let handle = signer.sign(&key(), 3600, now).unwrap();
        let expires: i64 = query_value(&handle.url, "expires").parse().unwrap();
        let signature = query_value(&handle.url, "signature");

        assert!(signer
            .verify("acme/widget/aws/1.0.0.zip", expires, &signature, now)
            .is_err());
        assert!(signer
            .verify(key().as_str(), expires + 60, &signature, now)
            .is_err());

        let other = HandleSigner::new(b"other", "http://localhost").unwrap();
        assert!(other.verify(key().as_str(), expires, &signature, now).is_err());
    }

    #[test]
    fn test_base_path_preserved() {
        let signer = HandleSigner::new(b"secret", "https://example.com/registry").unwrap();
        let handle = signer.sign(&key(), 60, Utc::now()).unwrap();
        assert!(handle
            .url
            .starts_with("https://example.com/registry/artifacts/acme/widget/aws/2.0.0.zip?"));
    }

    #[test]
    fn test_reserved_characters_escaped() {
        let signer = HandleSigner::new(b"secret", "http://localhost").unwrap();
        let coordinate = ModuleCoordinate::new("acme", "widget", "aws").unwrap();
        let now = Utc::now();

        for (version, path) in [
            ("1.0#hotfix", "/artifacts/acme/widget/aws/1.0%23hotfix.zip"),
            ("1.0%41", "/artifacts/acme/widget/aws/1.0%2541.zip"),
            ("1.0?rc", "/artifacts/acme/widget/aws/1.0%3Frc.zip"),
        ] {
            let key = ArtifactKey::for_version(&coordinate, &Version::new(version)).unwrap();
            let handle = signer.sign(&key, 3600, now).unwrap();
            let parsed = Url::parse(&handle.url).unwrap();

            assert_eq!(parsed.path(), path);
            assert!(parsed.fragment().is_none());
            let expires: i64 = query_value(&handle.url, "expires").parse().unwrap();
            let signature = query_value(&handle.url, "signature");
            assert!(signer.verify(key.as_str(), expires, &signature, now).is_ok());
        }
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(HandleSigner::new(b"", "http://localhost").is_err());
        assert!(HandleSigner::generate("http://localhost").is_ok());
    }
}
