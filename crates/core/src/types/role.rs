//! Role bitmask and the authorization evaluator.
//!
//! A user's `role_id` is a positional bitmask: bit 0 is customer, bit 1 is
//! admin. A request is authorized when the user's mask shares at least one
//! bit with the union of the required roles.

use core::fmt;
use core::ops::BitOr;

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// A single role bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Role {
    /// Storefront customer.
    Customer = 1,
    /// Back-office staff.
    Admin = 2,
}

impl Role {
    /// The bit value of this role.
    #[must_use]
    pub const fn bit(self) -> i32 {
        self as i32
    }

    /// This role as a single-bit mask.
    #[must_use]
    pub const fn mask(self) -> RoleMask {
        RoleMask(self.bit())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => f.write_str("customer"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

/// A set of roles encoded as an integer bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMask(i32);

impl RoleMask {
    /// No roles.
    pub const NONE: Self = Self(0);
    /// Customers only.
    pub const CUSTOMER: Self = Self(Role::Customer as i32);
    /// Admins only.
    pub const ADMIN: Self = Self(Role::Admin as i32);
    /// Either customers or admins.
    pub const ANY: Self = Self(Role::Customer as i32 | Role::Admin as i32);

    /// Wrap a raw `role_id`.
    #[must_use]
    pub const fn new(bits: i32) -> Self {
        Self(bits)
    }

    /// Union of a set of required roles.
    #[must_use]
    pub fn of(roles: &[Role]) -> Self {
        roles.iter().fold(Self::NONE, |acc, role| acc | *role)
    }

    /// The raw bitmask.
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Whether a specific role bit is set.
    #[must_use]
    pub const fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    /// Whether the two masks share any bit.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for RoleMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<Role> for RoleMask {
    type Output = Self;

    fn bitor(self, rhs: Role) -> Self {
        Self(self.0 | rhs.bit())
    }
}

impl From<Role> for RoleMask {
    fn from(role: Role) -> Self {
        role.mask()
    }
}

impl From<i32> for RoleMask {
    fn from(bits: i32) -> Self {
        Self(bits)
    }
}

impl fmt::Display for RoleMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for RoleMask {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i32 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i32 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for RoleMask {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<i32 as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for RoleMask {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i32 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// Grant access iff the user's mask overlaps the required mask.
#[must_use]
pub const fn authorize(user: RoleMask, required: RoleMask) -> bool {
    user.intersects(required)
}

/// Guard for `:user_id` path parameters: the path must name the caller.
#[must_use]
pub fn params_check(path_user_id: &str, claimed: &UserId) -> bool {
    !path_user_id.is_empty() && path_user_id == claimed.as_str()
}
