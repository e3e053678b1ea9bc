//! App user model.
//!
//! Authentication material lives outside the core; a user here is the
//! stable identity the access grants hang off.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable user identifier supplied by the auth layer.
pub type UserId = i64;

static KIU_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid kiu id regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Mobile app student; subject to category grants.
    User,
    /// Admin panel operator; has no access matrix.
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// University student number, digits only.
    pub kiu_id: String,
    pub name: String,
    pub whatsapp_number: Option<String>,
    pub role: UserRole,
    pub created_at: i64,
}

/// Registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub kiu_id: String,
    pub name: String,
    pub whatsapp_number: Option<String>,
    pub role: UserRole,
}

impl NewUser {
    /// Returns a trimmed copy, or the first invariant violation.
    pub fn normalized(&self) -> Result<Self, UserValidationError> {
        let kiu_id = self.kiu_id.trim();
        if !KIU_ID_RE.is_match(kiu_id) {
            return Err(UserValidationError::InvalidKiuId(self.kiu_id.clone()));
        }
        let name = self.name.trim();
        if name.is_empty() {
            return Err(UserValidationError::BlankName);
        }
        Ok(Self {
            kiu_id: kiu_id.to_string(),
            name: name.to_string(),
            whatsapp_number: self
                .whatsapp_number
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            role: self.role,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    InvalidKiuId(String),
    BlankName,
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKiuId(value) => write!(f, "kiu id must contain digits only: `{value}`"),
            Self::BlankName => write!(f, "user name must not be blank"),
        }
    }
}

impl Error for UserValidationError {}
