//! Notification model and time-driven validity state machine.
//!
//! # Responsibility
//! - Define notification records and per-user read state.
//! - Evaluate notification validity as a pure function of time and flags.
//!
//! # Invariants
//! - `Inactive` dominates every time window.
//! - `scheduled_at` is inclusive (live at exactly `scheduled_at`), `expires_at`
//!   is inclusive (still live at exactly `expires_at`).
//! - No state is stored; every read recomputes it.

use crate::model::category::CategoryId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable notification identifier.
pub type NotificationId = i64;

/// Display flavor of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
    Announcement,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Announcement => "announcement",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "info" => Some(Self::Info),
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "announcement" => Some(Self::Announcement),
            _ => None,
        }
    }
}

/// Validity of a notification at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationState {
    /// Active but `now < scheduled_at`.
    Scheduled,
    /// Active and inside its window; the only state shown to clients.
    Live,
    /// Active but `now > expires_at`.
    Expired,
    /// Switched off by an admin.
    Inactive,
}

/// Notification read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    /// `None` means global: visible to every authenticated user.
    pub category_id: Option<CategoryId>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub is_active: bool,
    pub scheduled_at: Option<i64>,
    pub expires_at: Option<i64>,
    /// Higher values are shown first.
    pub priority: i64,
    pub created_at: i64,
}

impl Notification {
    /// Evaluates validity at `now_ms`.
    pub fn state_at(&self, now_ms: i64) -> NotificationState {
        if !self.is_active {
            return NotificationState::Inactive;
        }
        if matches!(self.scheduled_at, Some(start) if now_ms < start) {
            return NotificationState::Scheduled;
        }
        if matches!(self.expires_at, Some(end) if now_ms > end) {
            return NotificationState::Expired;
        }
        NotificationState::Live
    }

    /// Shorthand for `state_at(now_ms) == Live`.
    pub fn is_live_at(&self, now_ms: i64) -> bool {
        self.state_at(now_ms) == NotificationState::Live
    }

    /// Returns whether the notification targets every user.
    pub fn is_global(&self) -> bool {
        self.category_id.is_none()
    }
}

/// Admin input for notification creation and full updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub category_id: Option<CategoryId>,
    pub kind: NotificationType,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub is_active: bool,
    pub scheduled_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub priority: i64,
}

impl NewNotification {
    /// Global, immediately live notification with default priority.
    pub fn global(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            category_id: None,
            kind: NotificationType::Info,
            action_url: None,
            action_text: None,
            is_active: true,
            scheduled_at: None,
            expires_at: None,
            priority: 0,
        }
    }

    pub fn validate(&self) -> Result<(), NotificationValidationError> {
        if self.title.trim().is_empty() {
            return Err(NotificationValidationError::BlankTitle);
        }
        if self.message.trim().is_empty() {
            return Err(NotificationValidationError::BlankMessage);
        }
        if let (Some(start), Some(end)) = (self.scheduled_at, self.expires_at) {
            if end < start {
                return Err(NotificationValidationError::WindowInverted {
                    scheduled_at: start,
                    expires_at: end,
                });
            }
        }
        Ok(())
    }
}

/// Per-user read marker for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadState {
    pub is_read: bool,
    pub read_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationValidationError {
    BlankTitle,
    BlankMessage,
    WindowInverted { scheduled_at: i64, expires_at: i64 },
}

impl Display for NotificationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "notification title must not be blank"),
            Self::BlankMessage => write!(f, "notification message must not be blank"),
            Self::WindowInverted {
                scheduled_at,
                expires_at,
            } => write!(
                f,
                "notification expires_at {expires_at} is earlier than scheduled_at {scheduled_at}"
            ),
        }
    }
}

impl Error for NotificationValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(
        is_active: bool,
        scheduled_at: Option<i64>,
        expires_at: Option<i64>,
    ) -> Notification {
        Notification {
            id: 1,
            title: "Exam".to_string(),
            message: "Midterm moved".to_string(),
            category_id: None,
            kind: NotificationType::Info,
            action_url: None,
            action_text: None,
            is_active,
            scheduled_at,
            expires_at,
            priority: 0,
            created_at: 0,
        }
    }

    #[test]
    fn state_follows_schedule_window() {
        let item = notification(true, Some(1_000), Some(2_000));
        assert_eq!(item.state_at(999), NotificationState::Scheduled);
        assert_eq!(item.state_at(1_000), NotificationState::Live);
        assert_eq!(item.state_at(2_000), NotificationState::Live);
        assert_eq!(item.state_at(2_001), NotificationState::Expired);
    }

    #[test]
    fn inactive_dominates_time() {
        let item = notification(false, None, None);
        assert_eq!(item.state_at(0), NotificationState::Inactive);
        let scheduled = notification(false, Some(10), None);
        assert_eq!(scheduled.state_at(0), NotificationState::Inactive);
    }

    #[test]
    fn open_window_is_always_live() {
        assert!(notification(true, None, None).is_live_at(i64::MAX));
    }

    #[test]
    fn validate_rejects_inverted_window() {
        let mut input = NewNotification::global("Exam", "Moved");
        input.scheduled_at = Some(10);
        input.expires_at = Some(5);
        assert!(matches!(
            input.validate(),
            Err(NotificationValidationError::WindowInverted { .. })
        ));
    }
}
