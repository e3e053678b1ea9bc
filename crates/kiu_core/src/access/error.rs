//! Error surface of the app-facing read services.

use crate::config::DenialPolicy;
use crate::db::DbError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum AccessError {
    /// Row is missing, or hidden under `DenialPolicy::Conceal`.
    NotFound { entity: &'static str, id: i64 },
    /// Row exists but the user cannot read it (`DenialPolicy::Explicit`).
    Forbidden { entity: &'static str, id: i64 },
    /// Caller input rejected before any lookup.
    InvalidQuery(String),
    Repo(RepoError),
}

impl AccessError {
    /// Error for a row that exists but is not readable by the caller.
    pub fn denied(policy: DenialPolicy, entity: &'static str, id: i64) -> Self {
        match policy {
            DenialPolicy::Conceal => Self::NotFound { entity, id },
            DenialPolicy::Explicit => Self::Forbidden { entity, id },
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Forbidden { entity, id } => write!(f, "access to {entity} {id} is denied"),
            Self::InvalidQuery(reason) => write!(f, "invalid query: {reason}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AccessError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for AccessError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
