//! Signed object URLs.
//!
//! A signed URL authorizes one method on one key until it expires, and only
//! once: every nonce is remembered until its URL would have expired anyway.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::{FileDeckError, Result as FileDeckResult};

type HmacSha256 = Hmac<Sha256>;

/// Path prefix under which signed objects are served.
pub const OBJECTS_PATH: &str = "/objects";

/// Method a signed URL authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedMethod {
    Put,
    Get,
}

impl SignedMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignedMethod::Put => "PUT",
            SignedMethod::Get => "GET",
        }
    }
}

impl fmt::Display for SignedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignedMethod {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PUT" => Ok(SignedMethod::Put),
            "GET" => Ok(SignedMethod::Get),
            _ => Err(SignatureError::Invalid),
        }
    }
}

/// Query parameters carried by a signed URL.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedParams {
    pub method: String,
    pub expires: i64,
    pub nonce: String,
    pub signature: String,
}

/// Why a signed URL was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signed URL has expired")]
    Expired,
    #[error("signature is invalid")]
    Invalid,
    #[error("signed URL does not authorize this method")]
    MethodMismatch,
    #[error("signed URL has already been used")]
    AlreadyUsed,
}

/// Issues and checks signed object URLs.
pub struct UrlSigner {
    /// MAC keyed with the signing secret, cloned per signature.
    keyed: HmacSha256,
    public_url: String,
    ttl_secs: i64,
    /// nonce -> expiry of the URL that carried it
    used: Mutex<HashMap<String, i64>>,
}

impl fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSigner")
            .field("public_url", &self.public_url)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(
        secret: impl AsRef<[u8]>,
        public_url: &str,
        ttl_secs: u64,
    ) -> FileDeckResult<Self> {
        let keyed = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| FileDeckError::Config(format!("invalid signing secret: {e}")))?;
        Ok(Self {
            keyed,
            public_url: public_url.trim_end_matches('/').to_string(),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            used: Mutex::new(HashMap::new()),
        })
    }

    /// Signed URL for `method` on `key`, valid from now.
    pub fn sign(&self, method: SignedMethod, key: &str) -> String {
        self.sign_at(method, key, Utc::now().timestamp())
    }

    fn sign_at(&self, method: SignedMethod, key: &str, now: i64) -> String {
        let expires = now.saturating_add(self.ttl_secs);
        let nonce = Uuid::new_v4().simple().to_string();
        let signature = self.signature(method.as_str(), key, expires, &nonce);

        format!(
            "{}{}/{}?method={}&expires={}&nonce={}&signature={}",
            self.public_url,
            OBJECTS_PATH,
            encode_key(key),
            method,
            expires,
            nonce,
            signature
        )
    }

    /// Check a request for `method` on `key` and consume its nonce.
    pub fn verify(
        &self,
        method: SignedMethod,
        key: &str,
        params: &SignedParams,
    ) -> Result<(), SignatureError> {
        self.verify_at(method, key, params, Utc::now().timestamp())
    }

    fn verify_at(
        &self,
        method: SignedMethod,
        key: &str,
        params: &SignedParams,
        now: i64,
    ) -> Result<(), SignatureError> {
        let expected = self.mac(
            params.method.as_str(),
            key,
            params.expires,
            &params.nonce,
        );
        let signature = hex::decode(&params.signature).map_err(|_| SignatureError::Invalid)?;
        expected
            .verify_slice(&signature)
            .map_err(|_| SignatureError::Invalid)?;

        if params.method.parse::<SignedMethod>()? != method {
            return Err(SignatureError::MethodMismatch);
        }
        if now > params.expires {
            return Err(SignatureError::Expired);
        }

        let mut used = self.used.lock().unwrap_or_else(PoisonError::into_inner);
        used.retain(|_, expires| *expires >= now);
        if used.contains_key(&params.nonce) {
            return Err(SignatureError::AlreadyUsed);
        }
        used.insert(params.nonce.clone(), params.expires);
        Ok(())
    }

    fn mac(&self, method: &str, key: &str, expires: i64, nonce: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(format!("{method}\n{key}\n{expires}\n{nonce}").as_bytes());
        mac
    }

    fn signature(&self, method: &str, key: &str, expires: i64, nonce: &str) -> String {
        hex::encode(self.mac(method, key, expires, nonce).finalize().into_bytes())
    }
}

/// Percent-encode each key segment, keeping the `/` separators.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
