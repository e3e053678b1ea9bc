//! Study material (content) model.
//!
//! Content carries no access grant of its own; visibility derives from the
//! resolved access of its owning category.

use crate::model::category::CategoryId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable content identifier.
pub type ContentId = i64;

/// Kind of external material a content row points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Pdf,
    Audio,
    Video,
    Image,
    Document,
}

impl ContentType {
    /// Stable storage/wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Image => "image",
            Self::Document => "document",
        }
    }

    /// Parses a storage/wire value. Matching is case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            "image" => Some(Self::Image),
            "document" => Some(Self::Document),
            _ => None,
        }
    }
}

/// Content read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub category_id: CategoryId,
    pub content_type: ContentType,
    /// External object-storage URL.
    pub url: String,
    pub title: String,
    pub is_active: bool,
    pub created_at: i64,
}

/// Admin input for content creation and full updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContent {
    pub category_id: CategoryId,
    pub content_type: ContentType,
    pub url: String,
    pub title: String,
    pub is_active: bool,
}

impl NewContent {
    /// Checks title and URL shape before persistence.
    pub fn validate(&self) -> Result<(), ContentValidationError> {
        if self.title.trim().is_empty() {
            return Err(ContentValidationError::BlankTitle);
        }
        let url = self.url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ContentValidationError::InvalidUrl(self.url.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentValidationError {
    BlankTitle,
    InvalidUrl(String),
}

impl Display for ContentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "content title must not be blank"),
            Self::InvalidUrl(url) => write!(f, "content url must be http(s): `{url}`"),
        }
    }
}

impl Error for ContentValidationError {}

#[cfg(test)]
mod tests {
    use super::{ContentType, ContentValidationError, NewContent};

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ContentType::parse(" PDF "), Some(ContentType::Pdf));
        assert_eq!(ContentType::parse("audio"), Some(ContentType::Audio));
        assert_eq!(ContentType::parse("slides"), None);
    }

    #[test]
    fn validate_requires_http_url() {
        let mut input = NewContent {
            category_id: 1,
            content_type: ContentType::Pdf,
            url: "ftp://files/lecture.pdf".to_string(),
            title: "Lecture 1".to_string(),
            is_active: true,
        };
        assert!(matches!(
            input.validate(),
            Err(ContentValidationError::InvalidUrl(_))
        ));

        input.url = "https://cdn.example.com/lecture.pdf".to_string();
        assert!(input.validate().is_ok());
    }
}
