//! Webhook signature validation (`X-Twilio-Signature`).
//!
//! The signature is base64(HMAC-SHA1(auth_token, url || k1 v1 || k2 v2 ...))
//! with POST parameters sorted by key.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

/// Checks inbound webhook signatures against the account auth token.
#[derive(Clone)]
pub struct SignatureValidator {
    auth_token: String,
}

impl SignatureValidator {
    pub fn new(auth_token: &str) -> Self {
        Self {
            auth_token: auth_token.to_string(),
        }
    }

    /// Compute the signature Twilio would send for `url` and `params`.
    pub fn expected_signature(&self, url: &str, params: &BTreeMap<String, String>) -> String {
        let mut mac =
            HmacSha1::new_from_slice(self.auth_token.as_bytes()).expect("HMAC key length");
        mac.update(url.as_bytes());
        for (key, value) in params {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Whether `signature` matches the request.
    pub fn validate(&self, url: &str, params: &BTreeMap<String, String>, signature: &str) -> bool {
        let expected = self.expected_signature(url, params);
        constant_time_eq(&expected, signature)
    }
}

/// Rebuild the URL Twilio signed.
///
/// Behind a proxy the server only sees the path, so prefer the configured
/// public base URL; otherwise fall back to `Host` and `X-Forwarded-Proto`.
pub fn request_url(
    public_url: &str,
    host: Option<&str>,
    forwarded_proto: Option<&str>,
    path_and_query: &str,
) -> Option<String> {
    let public_url = public_url.trim().trim_end_matches('/');
    if !public_url.is_empty() {
        return Some(format!("{public_url}{path_and_query}"));
    }
    let host = host.filter(|h| !h.is_empty())?;
    let proto = forwarded_proto
        .and_then(|p| p.split(',').next())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("http");
    Some(format!("{proto}://{host}{path_and_query}"))
}

/// Constant-time string comparison so secret checks do not leak timing.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
