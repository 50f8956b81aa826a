//! Authentication service.
//!
//! Sign-up, sign-in, refresh and sign-out over the user repository, the
//! session store and the [`TokenAuthority`].

mod error;
mod password;
pub mod token;

pub use error::AuthError;
pub use token::{SignedToken, SigningKey, TokenAuthority, TokenClaims, TokenError, TokenKind};

use sqlx::PgPool;

use ri_shop_core::{Email, OauthId, UserId};

use crate::db::users::{EMAIL_TAKEN, USERNAME_TAKEN};
use crate::db::{RepositoryError, SessionRepository, UserRepository};
use crate::models::{
    Passport, RefreshRequest, RegisterRequest, SignInRequest, User, UserClaims, UserToken,
};
use password::{hash_password, validate_password, verify_password};

/// Which account kind a sign-up creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpStrategy {
    /// `role_id = 1`.
    Customer,
    /// `role_id = 2`.
    Admin,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    sessions: SessionRepository<'a>,
    tokens: &'a TokenAuthority,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tokens: &'a TokenAuthority) -> Self {
        Self {
            users: UserRepository::new(pool),
            sessions: SessionRepository::new(pool),
            tokens,
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Register an account and open its first session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::InvalidUsername` or
    /// `AuthError::WeakPassword` on invalid input.
    /// Returns `AuthError::EmailTaken` or `AuthError::UsernameTaken` on a
    /// uniqueness violation.
    pub async fn sign_up(
        &self,
        request: &RegisterRequest,
        strategy: SignUpStrategy,
    ) -> Result<Passport, AuthError> {
        let user = register(&self.users, request, strategy).await?;
        self.open_session(user).await
    }

    /// Verify credentials and open a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` or `AuthError::InvalidPassword` on
    /// bad credentials.
    pub async fn sign_in(&self, request: &SignInRequest) -> Result<Passport, AuthError> {
        let email = Email::parse(request.email.trim())?;
        let found = self
            .users
            .find_credentials(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        verify_password(&request.password, &found.password_hash)?;
        self.open_session(found.user).await
    }

    /// Profile of one user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no user has this id.
    pub async fn profile(&self, id: &UserId) -> Result<User, AuthError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    async fn open_session(&self, user: User) -> Result<Passport, AuthError> {
        let claims = UserClaims::from(&user);
        let access = self.tokens.mint(TokenKind::Access, Some(&claims))?;
        let refresh = self.tokens.mint(TokenKind::Refresh, Some(&claims))?;

        let id = self
            .sessions
            .insert(&user.id, &access.token, &refresh.token)
            .await?;

        Ok(Passport {
            user,
            token: UserToken {
                id,
                access_token: access.token,
                refresh_token: refresh.token,
            },
        })
    }

    /// Exchange a refresh token for a new access token and a rotated refresh
    /// token that keeps the original expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if the refresh token does not verify.
    /// Returns `AuthError::SessionNotFound` if no session holds it.
    pub async fn refresh(&self, request: &RefreshRequest) -> Result<Passport, AuthError> {
        let old = self
            .tokens
            .parse_kind(&request.refresh_token, TokenKind::Refresh)?;

        let mut session = self
            .sessions
            .find_by_refresh(&request.refresh_token)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::SessionNotFound,
                other => AuthError::Repository(other),
            })?;

        let user = self.profile(&session.user_id).await?;
        let claims = UserClaims::from(&user);

        let access = self.tokens.mint(TokenKind::Access, Some(&claims))?;
        let refresh = self.tokens.rotate_refresh(&old, &claims)?;

        session.access_token = access.token;
        session.refresh_token = refresh.token;
        self.sessions
            .update_tokens(&session)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::SessionNotFound,
                other => AuthError::Repository(other),
            })?;

        Ok(Passport {
            user,
            token: UserToken {
                id: session.id,
                access_token: session.access_token,
                refresh_token: session.refresh_token,
            },
        })
    }

    /// Delete a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionNotFound` if no session has this id.
    pub async fn sign_out(&self, id: &OauthId) -> Result<(), AuthError> {
        self.sessions.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::SessionNotFound,
            other => AuthError::Repository(other),
        })
    }

    /// Resolve a bearer access token to the claims of a live session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if the token does not verify as an access
    /// token. Returns `AuthError::SessionNotFound` if it was signed out.
    pub async fn authenticate(&self, access_token: &str) -> Result<UserClaims, AuthError> {
        let parsed = self.tokens.parse_kind(access_token, TokenKind::Access)?;
        let claims = parsed.claims.ok_or_else(|| {
            TokenError::InvalidClaims("access-token carries no user claims".to_owned())
        })?;

        if !self.sessions.find_by_access(&claims.id, access_token).await? {
            return Err(AuthError::SessionNotFound);
        }
        Ok(claims)
    }

    // =========================================================================
    // Service tokens
    // =========================================================================

    /// Mint a short-lived admin token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn admin_token(&self) -> Result<SignedToken, AuthError> {
        Ok(self.tokens.mint(TokenKind::Admin, None)?)
    }

    /// Mint an API key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if signing fails.
    pub fn api_key(&self) -> Result<SignedToken, AuthError> {
        Ok(self.tokens.mint(TokenKind::ApiKey, None)?)
    }
}

/// Create an account without opening a session.
///
/// Used by the command line to bootstrap the first admin.
///
/// # Errors
///
/// Same as [`AuthService::sign_up`].
pub async fn register_account(
    pool: &PgPool,
    request: &RegisterRequest,
    strategy: SignUpStrategy,
) -> Result<User, AuthError> {
    register(&UserRepository::new(pool), request, strategy).await
}

async fn register(
    users: &UserRepository<'_>,
    request: &RegisterRequest,
    strategy: SignUpStrategy,
) -> Result<User, AuthError> {
    let email = Email::parse(request.email.trim())?;
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidUsername);
    }
    validate_password(&request.password)?;
    let password_hash = hash_password(&request.password)?;

    let inserted = match strategy {
        SignUpStrategy::Customer => users.insert_customer(&email, &password_hash, username).await,
        SignUpStrategy::Admin => users.insert_admin(&email, &password_hash, username).await,
    };

    let user = inserted.map_err(|e| match e {
        RepositoryError::Conflict(msg) if msg == EMAIL_TAKEN => AuthError::EmailTaken,
        RepositoryError::Conflict(msg) if msg == USERNAME_TAKEN => AuthError::UsernameTaken,
        other => AuthError::Repository(other),
    })?;
    tracing::info!(user_id = %user.id, role = %user.role_id, "user signed up");
    Ok(user)
}

