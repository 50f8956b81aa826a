//! User, session and token payload types.

use serde::{Deserialize, Serialize};

use ri_shop_core::{Email, OauthId, RoleMask, UserId};

/// A shop account as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub username: String,
    /// Role bitmask: 1 customer, 2 admin.
    pub role_id: RoleMask,
}

/// A user row together with its password hash, for sign-in.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentialCheck {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// Application claims carried inside access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub id: UserId,
    pub role: RoleMask,
}

impl From<&User> for UserClaims {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role_id,
        }
    }
}

/// The session token pair handed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    /// Session (`oauth` row) id; needed to sign out.
    pub id: OauthId,
    pub access_token: String,
    pub refresh_token: String,
}

/// The bundle returned on sign-up, sign-in and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passport {
    pub user: User,
    pub token: UserToken,
}

/// `POST /users/signup` and `/users/signup-admin` body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

/// `POST /users/signin` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// `POST /users/refresh` body.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `POST /users/signout` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SignOutRequest {
    pub oauth_id: OauthId,
}
