//! Token authority: mints, parses and rotates signed tokens.
//!
//! Four kinds of token share one compact JWS format (HMAC-SHA-256). The kind
//! is carried in `sub`. Access, refresh and admin tokens are signed with
//! separate secrets from API keys, so a token minted for one purpose never
//! verifies under another purpose's key.

use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::UserClaims;

/// `iss` of every token.
pub const ISSUER: &str = "rishop-api";

/// Audience accepted when parsing.
const AUDIENCE: [&str; 2] = ["customer", "admin"];

/// Lifetime of an admin token, in seconds.
pub const ADMIN_TOKEN_TTL: i64 = 300;

/// Token purpose, encoded as the `sub` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
    Admin,
    ApiKey,
}

impl TokenKind {
    pub const ALL: [Self; 4] = [Self::Access, Self::Refresh, Self::Admin, Self::ApiKey];

    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::Access => "access-token",
            Self::Refresh => "refresh-token",
            Self::Admin => "admin-token",
            Self::ApiKey => "api-key",
        }
    }

    /// Key this kind is signed and verified with.
    #[must_use]
    pub const fn key(self) -> SigningKey {
        match self {
            Self::Access | Self::Refresh => SigningKey::User,
            Self::Admin => SigningKey::Admin,
            Self::ApiKey => SigningKey::ApiKey,
        }
    }

    const fn audience(self) -> &'static [&'static str] {
        match self {
            Self::Admin => &["admin"],
            Self::Access | Self::Refresh | Self::ApiKey => &AUDIENCE,
        }
    }

    /// Whether the token carries `{id, role}`.
    const fn carries_user(self) -> bool {
        matches!(self, Self::Access | Self::Refresh)
    }

    fn from_subject(sub: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.subject() == sub)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subject())
    }
}

/// The three secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningKey {
    /// `JWT_SECRET_KEY`: access and refresh tokens.
    User,
    /// `JWT_ADMIN_KEY`: admin tokens.
    Admin,
    /// `JWT_API_KEY`: API keys.
    ApiKey,
}

/// Token payload: registered claims plus the application `claims` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// `{id, role}` for access and refresh tokens, `null` otherwise.
    pub claims: Option<UserClaims>,
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    /// Unique per mint, so two tokens minted in the same second still differ.
    #[serde(default)]
    pub jti: String,
}

impl TokenClaims {
    /// Kind named by `sub`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::UnknownKind` for an unrecognized subject.
    pub fn kind(&self) -> Result<TokenKind, TokenError> {
        TokenKind::from_subject(&self.sub).ok_or(TokenError::UnknownKind)
    }
}

/// A signed token and its expiry (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Token failures.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token format is invalid")]
    Malformed,

    #[error("token had expired")]
    Expired,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token signing method is invalid")]
    InvalidAlgorithm,

    #[error("token claims are invalid: {0}")]
    InvalidClaims(String),

    #[error("unknown token kind")]
    UnknownKind,

    #[error("sign token failed: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::InvalidAlgorithm
            }
            ErrorKind::Json(_)
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject => Self::InvalidClaims(e.to_string()),
            _ => Self::Malformed,
        }
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Holds the secrets and lifetimes; read-only after start-up.
pub struct TokenAuthority {
    user: KeyPair,
    admin: KeyPair,
    api_key: KeyPair,
    access_ttl: i64,
    refresh_ttl: i64,
    api_key_ttl: i64,
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("api_key_ttl", &self.api_key_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            user: KeyPair::from_secret(config.secret_key.expose_secret().as_bytes()),
            admin: KeyPair::from_secret(config.admin_key.expose_secret().as_bytes()),
            api_key: KeyPair::from_secret(config.api_key.expose_secret().as_bytes()),
            access_ttl: config.access_expires,
            refresh_ttl: config.refresh_expires,
            api_key_ttl: config.api_key_expires,
        }
    }

    const fn keys(&self, key: SigningKey) -> &KeyPair {
        match key {
            SigningKey::User => &self.user,
            SigningKey::Admin => &self.admin,
            SigningKey::ApiKey => &self.api_key,
        }
    }

    const fn ttl(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
            TokenKind::Admin => ADMIN_TOKEN_TTL,
            TokenKind::ApiKey => self.api_key_ttl,
        }
    }

    /// Mint a token of `kind`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidClaims` if an access or refresh token is
    /// requested without user claims, or `TokenError::Sign` if signing fails.
    pub fn mint(
        &self,
        kind: TokenKind,
        claims: Option<&UserClaims>,
    ) -> Result<SignedToken, TokenError> {
        self.mint_at(kind, claims, chrono::Utc::now().timestamp())
    }

    /// Mint a token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// See [`Self::mint`].
    pub fn mint_at(
        &self,
        kind: TokenKind,
        claims: Option<&UserClaims>,
        now: i64,
    ) -> Result<SignedToken, TokenError> {
        let claims = if kind.carries_user() {
            Some(claims.cloned().ok_or_else(|| {
                TokenError::InvalidClaims(format!("{kind} requires user claims"))
            })?)
        } else {
            None
        };

        let payload = TokenClaims {
            claims,
            iss: ISSUER.to_owned(),
            sub: kind.subject().to_owned(),
            aud: kind.audience().iter().map(|a| (*a).to_owned()).collect(),
            exp: now + self.ttl(kind),
            nbf: now,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(kind.key(), &payload)
    }

    fn sign(&self, key: SigningKey, payload: &TokenClaims) -> Result<SignedToken, TokenError> {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            payload,
            &self.keys(key).encoding,
        )
        .map_err(TokenError::Sign)?;
        Ok(SignedToken {
            token,
            expires_at: payload.exp,
        })
    }

    /// Verify a token under `key` and return its payload.
    ///
    /// Any non-HMAC `alg` header is rejected before the signature is checked.
    ///
    /// # Errors
    ///
    /// Returns the `TokenError` class of the failure.
    pub fn parse(&self, token: &str, key: SigningKey) -> Result<TokenClaims, TokenError> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| TokenError::Malformed)?;
        if !matches!(
            header.alg,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(TokenError::InvalidAlgorithm);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_audience(&AUDIENCE);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub", "aud"]);

        let data =
            jsonwebtoken::decode::<TokenClaims>(token, &self.keys(key).decoding, &validation)?;
        let claims = data.claims;

        let kind = claims.kind()?;
        if kind.carries_user() && claims.claims.is_none() {
            return Err(TokenError::InvalidClaims(format!(
                "{kind} carries no user claims"
            )));
        }
        Ok(claims)
    }

    /// Verify a token that must be of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidClaims` if the token is valid but of
    /// another kind, or the parse failure otherwise.
    pub fn parse_kind(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let claims = self.parse(token, kind.key())?;
        if claims.sub != kind.subject() {
            return Err(TokenError::InvalidClaims(format!(
                "expected {kind}, got {}",
                claims.sub
            )));
        }
        Ok(claims)
    }

    /// Re-sign a refresh token for `claims` with the original `exp`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Sign` if signing fails.
    pub fn rotate_refresh(
        &self,
        old: &TokenClaims,
        claims: &UserClaims,
    ) -> Result<SignedToken, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let payload = TokenClaims {
            claims: Some(claims.clone()),
            iss: ISSUER.to_owned(),
            sub: TokenKind::Refresh.subject().to_owned(),
            aud: TokenKind::Refresh
                .audience()
                .iter()
                .map(|a| (*a).to_owned())
                .collect(),
            exp: old.exp,
            nbf: now,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(SigningKey::User, &payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ri_shop_core::{RoleMask, UserId};
    use secrecy::SecretString;

    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(&JwtConfig {
            secret_key: SecretString::from("user-secret-Zq8vR2mK4tW9xN1pL6sB3dF7hJ0cY5gE"),
            admin_key: SecretString::from("admin-secret-Hn4bT8wQ1zM6vK3rP9xC2fL7sD0jG5yA"),
            api_key: SecretString::from("api-secret-Rt5kW2nB8qZ4mX1vC7pL3sH9dF6jY0gU"),
            access_expires: 3600,
            refresh_expires: 7200,
            api_key_expires: 86_400,
        })
    }

    fn customer() -> UserClaims {
        UserClaims {
            id: UserId::new("U000001"),
            role: RoleMask::CUSTOMER,
        }
    }

    fn tamper(token: &str) -> String {
        let signature_start = token.rfind('.').unwrap() + 1;
        let mut chars: Vec<char> = token.chars().collect();
        chars[signature_start] = if chars[signature_start] == 'A' { 'B' } else { 'A' };
        chars.into_iter().collect()
    }

    #[test]
    fn test_round_trip_every_kind() {
        let tokens = authority();
        let admin = UserClaims {
            id: UserId::new("U000002"),
            role: RoleMask::ADMIN | RoleMask::CUSTOMER,
        };

        for user in [customer(), admin] {
            for kind in [TokenKind::Access, TokenKind::Refresh] {
                let signed = tokens.mint(kind, Some(&user)).unwrap();
                let parsed = tokens.parse(&signed.token, kind.key()).unwrap();
                assert_eq!(parsed.claims.as_ref(), Some(&user));
                assert_eq!(parsed.kind().unwrap(), kind);
                assert_eq!(parsed.exp, signed.expires_at);
            }
        }

        for kind in [TokenKind::Admin, TokenKind::ApiKey] {
            let signed = tokens.mint(kind, None).unwrap();
            let parsed = tokens.parse_kind(&signed.token, kind).unwrap();
            assert_eq!(parsed.claims, None);
            assert_eq!(parsed.iss, ISSUER);
        }
    }

    #[test]
    fn test_expired_after_exp() {
        let tokens = authority();
        let now = chrono::Utc::now().timestamp();

        let access = tokens
            .mint_at(TokenKind::Access, Some(&customer()), now - 3_700)
            .unwrap();
        assert!(matches!(
            tokens.parse(&access.token, SigningKey::User),
            Err(TokenError::Expired)
        ));

        let admin = tokens.mint_at(TokenKind::Admin, None, now - 400).unwrap();
        assert!(matches!(
            tokens.parse(&admin.token, SigningKey::Admin),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let tokens = authority();
        for kind in [TokenKind::Access, TokenKind::Refresh, TokenKind::Admin] {
            let signed = tokens.mint(kind, Some(&customer())).unwrap();
            assert!(matches!(
                tokens.parse(&tamper(&signed.token), kind.key()),
                Err(TokenError::InvalidSignature)
            ));
        }
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let tokens = authority();
        let api_key = tokens.mint(TokenKind::ApiKey, None).unwrap();

        assert!(tokens.parse(&api_key.token, SigningKey::ApiKey).is_ok());
        assert!(matches!(
            tokens.parse(&api_key.token, SigningKey::User),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_non_hmac_algorithm_rejected() {
        let tokens = authority();
        // {"alg":"RS256","typ":"JWT"}
        let forged = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.e30.c2lnbmF0dXJl";
        assert!(matches!(
            tokens.parse(forged, SigningKey::User),
            Err(TokenError::InvalidAlgorithm)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tokens = authority();
        assert!(matches!(
            tokens.parse("not-a-token", SigningKey::User),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_access_requires_user_claims() {
        let tokens = authority();
        assert!(matches!(
            tokens.mint(TokenKind::Access, None),
            Err(TokenError::InvalidClaims(_))
        ));
    }

    #[test]
    fn test_parse_kind_rejects_other_kind() {
        let tokens = authority();
        let refresh = tokens.mint(TokenKind::Refresh, Some(&customer())).unwrap();
        assert!(matches!(
            tokens.parse_kind(&refresh.token, TokenKind::Access),
            Err(TokenError::InvalidClaims(_))
        ));
    }

    #[test]
    fn test_admin_token_lifetime_is_fixed() {
        let tokens = authority();
        let now = chrono::Utc::now().timestamp();
        let admin = tokens.mint_at(TokenKind::Admin, None, now).unwrap();
        assert_eq!(admin.expires_at, now + ADMIN_TOKEN_TTL);
    }

    #[test]
    fn test_rotate_refresh_preserves_exp() {
        let tokens = authority();
        let now = chrono::Utc::now().timestamp();
        let original = tokens
            .mint_at(TokenKind::Refresh, Some(&customer()), now - 1_000)
            .unwrap();
        let old = tokens.parse(&original.token, SigningKey::User).unwrap();

        let rotated = tokens.rotate_refresh(&old, &customer()).unwrap();
        let parsed = tokens.parse_kind(&rotated.token, TokenKind::Refresh).unwrap();

        assert_eq!(parsed.exp, old.exp);
        assert_eq!(rotated.expires_at, original.expires_at);
        assert_ne!(rotated.token, original.token);
    }
}
