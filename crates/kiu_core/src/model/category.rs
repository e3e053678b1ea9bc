//! Category domain model.
//!
//! # Responsibility
//! - Define the three-tier category record and its level arithmetic.
//!
//! # Invariants
//! - `parent_id == None` if and only if `level == CategoryLevel::Main`.
//! - A child's level is exactly its parent's level plus one.
//! - No category is deeper than `MAX_CATEGORY_DEPTH`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable category identifier.
pub type CategoryId = i64;

/// Deepest allowed level in the category forest.
pub const MAX_CATEGORY_DEPTH: u8 = 3;

/// Position of a category in the three-tier hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryLevel {
    /// Level 1, root of one tree.
    Main,
    /// Level 2.
    Sub,
    /// Level 3, cannot have children.
    Leaf,
}

impl CategoryLevel {
    /// Maps a stored depth (`1..=3`) to a level.
    pub fn from_depth(depth: i64) -> Option<Self> {
        match depth {
            1 => Some(Self::Main),
            2 => Some(Self::Sub),
            3 => Some(Self::Leaf),
            _ => None,
        }
    }

    /// Stored depth value.
    pub fn depth(self) -> u8 {
        match self {
            Self::Main => 1,
            Self::Sub => 2,
            Self::Leaf => 3,
        }
    }

    /// Level of a direct child, or `None` when children would exceed max depth.
    pub fn child(self) -> Option<Self> {
        Self::from_depth(i64::from(self.depth()) + 1)
    }

    /// Admin-facing label used in announcements.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Main => "Main Category",
            Self::Sub => "Sub Category",
            Self::Leaf => "3rd Level Category",
        }
    }
}

/// Category read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    /// Opaque image reference managed by external file storage.
    pub image: Option<String>,
    /// `None` for level-1 categories.
    pub parent_id: Option<CategoryId>,
    pub level: CategoryLevel,
    /// Admin visibility switch, orthogonal to per-user grants.
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Category {
    /// Returns whether this category is the root of its tree.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Checks parent/level consistency of a loaded record.
    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        let consistent = match (self.parent_id, self.level) {
            (None, CategoryLevel::Main) => true,
            (None, _) | (Some(_), CategoryLevel::Main) => false,
            (Some(parent_id), _) => parent_id != self.id,
        };
        if !consistent {
            return Err(CategoryValidationError::InconsistentLevel {
                id: self.id,
                level: self.level,
                parent_id: self.parent_id,
            });
        }
        Ok(())
    }
}

/// Admin input for category creation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewCategory {
    pub title: String,
    pub image: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub is_active: bool,
}

/// Admin input for in-place category edits. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoryPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the image reference.
    pub image: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Category model validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryValidationError {
    /// Title is empty after trim.
    BlankTitle,
    /// Stored level does not match parent presence.
    InconsistentLevel {
        id: CategoryId,
        level: CategoryLevel,
        parent_id: Option<CategoryId>,
    },
}

impl Display for CategoryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "category title must not be blank"),
            Self::InconsistentLevel {
                id,
                level,
                parent_id,
            } => write!(
                f,
                "category {id} has level {} inconsistent with parent {parent_id:?}",
                level.depth()
            ),
        }
    }
}

impl Error for CategoryValidationError {}

/// Trims a category title and rejects blank values.
pub fn normalize_category_title(value: &str) -> Result<String, CategoryValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CategoryValidationError::BlankTitle);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: CategoryId, parent_id: Option<CategoryId>, level: CategoryLevel) -> Category {
        Category {
            id,
            title: "Science".to_string(),
            image: None,
            parent_id,
            level,
            is_active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn child_level_stops_at_max_depth() {
        assert_eq!(CategoryLevel::Main.child(), Some(CategoryLevel::Sub));
        assert_eq!(CategoryLevel::Sub.child(), Some(CategoryLevel::Leaf));
        assert_eq!(CategoryLevel::Leaf.child(), None);
        assert_eq!(CategoryLevel::Leaf.depth(), MAX_CATEGORY_DEPTH);
    }

    #[test]
    fn validate_rejects_root_with_deep_level_and_child_with_main_level() {
        assert!(category(1, None, CategoryLevel::Main).validate().is_ok());
        assert!(category(2, Some(1), CategoryLevel::Sub).validate().is_ok());
        assert!(category(3, None, CategoryLevel::Sub).validate().is_err());
        assert!(category(4, Some(1), CategoryLevel::Main).validate().is_err());
        assert!(category(5, Some(5), CategoryLevel::Sub).validate().is_err());
    }

    #[test]
    fn normalize_title_trims_and_rejects_blank() {
        assert_eq!(normalize_category_title("  Physics ").unwrap(), "Physics");
        assert_eq!(
            normalize_category_title("   ").unwrap_err(),
            CategoryValidationError::BlankTitle
        );
    }
}
