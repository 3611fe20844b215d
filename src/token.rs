//! Token Service
//!
//! Issues and verifies stateless, HS256-signed access tokens. There is no
//! server-side session store: a token stays valid until its `exp` claim passes,
//! and revocation before expiry is not supported.

use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifetime of tokens handed out by the login endpoint.
pub const LOGIN_TOKEN_TTL: Duration = Duration::from_secs(600);

/// Role claim value granted to the seeded administrator.
pub const ADMIN_ROLE: &str = "admin";

/// Claims
///
/// The payload carried inside every token. `role` is absent for plain users
/// and present for elevated accounts, so it is skipped on the wire when `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the email of the account the token was issued to.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Absolute expiry, in unix seconds.
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("token signature or algorithm mismatch")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("claim `{0}` missing from token")]
    MissingClaim(&'static str),
}

/// Source of "now" for expiry checks, in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to. Lets tests step past a token's expiry
/// without sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(secs(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// TokenService
///
/// Cheap to clone; the keys and the clock are shared. Held in `AppState` and
/// projected into the access gate through `FromRef`.
#[derive(Clone)]
pub struct TokenService {
    inner: Arc<Inner>,
}

struct Inner {
    secret_usable: bool,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                secret_usable: !secret.is_empty(),
                encoding_key: EncodingKey::from_secret(secret.as_bytes()),
                decoding_key: DecodingKey::from_secret(secret.as_bytes()),
                clock,
            }),
        }
    }

    /// Convenience constructor backed by the wall clock.
    pub fn with_system_clock(secret: &str) -> Self {
        Self::new(secret, Arc::new(SystemClock))
    }

    /// Issues a token for `email` that expires `ttl` from now.
    pub fn issue_token(&self, email: &str, ttl: Duration) -> Result<String, TokenError> {
        self.sign(Claims {
            email: email.to_string(),
            role: None,
            exp: self.expiry(ttl),
        })
    }

    /// Issues a token that additionally carries a `role` claim.
    pub fn issue_token_with_role(
        &self,
        email: &str,
        role: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.sign(Claims {
            email: email.to_string(),
            role: Some(role.to_string()),
            exp: self.expiry(ttl),
        })
    }

    /// verify_token
    ///
    /// Checks the header's `alg` first, then the signature, then the expiry against the
    /// injected clock with zero leeway: a token is expired once `now >= exp`.
    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        check_algorithm(token)?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against `self.inner.clock`.
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.inner.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;

        if self.inner.clock.now() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    /// Verifies `token` and returns its role claim.
    pub fn extract_role(&self, token: &str) -> Result<String, TokenError> {
        self.verify_token(token)?
            .role
            .ok_or(TokenError::MissingClaim("role"))
    }

    fn sign(&self, claims: Claims) -> Result<String, TokenError> {
        if !self.inner.secret_usable {
            tracing::error!(op = "token.sign", "signing secret is empty");
            return Err(TokenError::Signing("empty secret".to_string()));
        }

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.inner.encoding_key,
        )
        .map_err(|e| {
            tracing::error!(op = "token.sign", error = %e, "failed to sign token");
            TokenError::Signing(e.to_string())
        })
    }

    fn expiry(&self, ttl: Duration) -> i64 {
        self.inner.clock.now().saturating_add(secs(ttl))
    }
}

/// Only the `alg` field of the JOSE header matters here.
#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Rejects any token whose header names an algorithm other than HS256,
/// including `none` and names the jwt library does not know. A header that is
/// not base64url JSON with an `alg` string is malformed.
fn check_algorithm(token: &str) -> Result<(), TokenError> {
    let segment = token.split('.').next().unwrap_or_default();
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("header: {e}")))?;
    let header: RawHeader = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("header: {e}")))?;

    if header.alg != "HS256" {
        tracing::warn!(op = "token.verify", alg = %header.alg, "rejected token algorithm");
        return Err(TokenError::InvalidSignature);
    }
    Ok(())
}

fn secs(d: Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
}
