//! Identity boundary.
//!
//! The app never talks to the identity provider itself; it receives an
//! already-resolved [`UserIdentity`] and derives the persistence key from
//! it. The dev server decodes the bearer token's payload without verifying
//! the signature, which is enough to key records per user locally.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;

/// Who is using the app right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIdentity {
    pub is_authenticated: bool,
    pub is_guest: bool,
    pub username: Option<String>,
    pub sub: Option<String>,
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn guest() -> Self {
        Self {
            is_guest: true,
            ..Self::default()
        }
    }

    /// The key records are stored under: subject id first, then email, then
    /// username. Guests and unauthenticated users have none.
    pub fn user_key(&self) -> Option<String> {
        if !self.is_authenticated || self.is_guest {
            return None;
        }
        self.sub
            .clone()
            .or_else(|| self.email.clone())
            .or_else(|| self.username.clone())
    }

    /// Per-user area allow-lists only exist for signed-in users.
    pub fn can_configure_areas(&self) -> bool {
        self.user_key().is_some()
    }
}

/// The claims the server cares about.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Decode a JWT's payload segment without verifying the signature. Good
/// enough to key records in the dev server, nothing more.
pub fn decode_token_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Pull the claims out of an `Authorization: Bearer ...` header value.
pub fn claims_from_authorization(header: &str) -> Option<TokenClaims> {
    let token = header.strip_prefix("Bearer ")?;
    decode_token_claims(token.trim())
}
