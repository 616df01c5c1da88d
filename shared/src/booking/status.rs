//! Booking status machine
//!
//! ```text
//!             confirm              complete
//!   pending ───────────▶ confirmed ───────────▶ completed
//!      │  └──────────── complete ─────────────▶    ▲ terminal
//!      │ cancel              │ cancel
//!      ▼                     ▼
//!   cancelled ◀──────────────┘                      terminal
//! ```
//!
//! Repeating the action that produced the current status is a no-op
//! ([`Transition::Unchanged`]). Everything else not in [`TRANSITIONS`] is
//! rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    /// Any status string the bookings API sends that we do not know
    #[serde(other)]
    Unknown,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Sort rank for the approval list (lower first)
    pub fn priority(&self) -> u8 {
        match self {
            Self::Pending => 1,
            Self::Confirmed => 2,
            Self::Completed => 3,
            Self::Cancelled => 4,
            Self::Unknown => 5,
        }
    }

    /// How far along the lifecycle a status is.
    ///
    /// Used when merging a remote copy with a locally advanced one: the
    /// higher rank wins.
    pub fn progress_rank(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Pending => 1,
            Self::Confirmed => 2,
            Self::Completed | Self::Cancelled => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Apply an admin action to this status
    pub fn apply(self, action: BookingAction) -> Result<Transition, TransitionError> {
        if action.target() == self {
            return Ok(Transition::Unchanged(self));
        }
        TRANSITIONS
            .iter()
            .find(|(from, act, _)| *from == self && *act == action)
            .map(|(from, _, to)| Transition::Changed {
                from: *from,
                to: *to,
            })
            .ok_or(TransitionError::Invalid { from: self, action })
    }

    /// Actions that would change this status
    pub fn available_actions(&self) -> Vec<BookingAction> {
        TRANSITIONS
            .iter()
            .filter(|(from, _, _)| from == self)
            .map(|(_, action, _)| *action)
            .collect()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        if key == "canceled" {
            return Ok(Self::Cancelled);
        }
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == key)
            .ok_or(TransitionError::UnknownStatus(key))
    }
}

/// Admin action on a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingAction {
    Confirm,
    Complete,
    Cancel,
}

impl BookingAction {
    /// Status this action leads to
    pub fn target(&self) -> BookingStatus {
        match self {
            Self::Confirm => BookingStatus::Confirmed,
            Self::Complete => BookingStatus::Completed,
            Self::Cancel => BookingStatus::Cancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for BookingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingAction {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirm" => Ok(Self::Confirm),
            "complete" => Ok(Self::Complete),
            "cancel" => Ok(Self::Cancel),
            other => Err(TransitionError::UnknownAction(other.to_string())),
        }
    }
}

/// Allowed transitions: (from, action, to)
pub const TRANSITIONS: &[(BookingStatus, BookingAction, BookingStatus)] = &[
    (
        BookingStatus::Pending,
        BookingAction::Confirm,
        BookingStatus::Confirmed,
    ),
    (
        BookingStatus::Pending,
        BookingAction::Complete,
        BookingStatus::Completed,
    ),
    (
        BookingStatus::Pending,
        BookingAction::Cancel,
        BookingStatus::Cancelled,
    ),
    (
        BookingStatus::Confirmed,
        BookingAction::Complete,
        BookingStatus::Completed,
    ),
    (
        BookingStatus::Confirmed,
        BookingAction::Cancel,
        BookingStatus::Cancelled,
    ),
];

/// Result of applying an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed {
        from: BookingStatus,
        to: BookingStatus,
    },
    /// The booking is already in the action's target status
    Unchanged(BookingStatus),
}

impl Transition {
    pub fn status(&self) -> BookingStatus {
        match self {
            Self::Changed { to, .. } => *to,
            Self::Unchanged(status) => *status,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} a booking that is {from}")]
    Invalid {
        from: BookingStatus,
        action: BookingAction,
    },

    #[error("unknown booking status: {0}")]
    UnknownStatus(String),

    #[error("unknown booking action: {0}")]
    UnknownAction(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_pending() {
        let t = BookingStatus::Pending.apply(BookingAction::Confirm).unwrap();
        assert_eq!(
            t,
            Transition::Changed {
                from: BookingStatus::Pending,
                to: BookingStatus::Confirmed
            }
        );
    }

    #[test]
    fn test_complete_from_pending_and_confirmed() {
        for from in [BookingStatus::Pending, BookingStatus::Confirmed] {
            let t = from.apply(BookingAction::Complete).unwrap();
            assert_eq!(t.status(), BookingStatus::Completed);
            assert!(t.is_changed());
        }
    }

    #[test]
    fn test_repeat_action_is_unchanged() {
        let t = BookingStatus::Confirmed
            .apply(BookingAction::Confirm)
            .unwrap();
        assert_eq!(t, Transition::Unchanged(BookingStatus::Confirmed));

        let t = BookingStatus::Cancelled
            .apply(BookingAction::Cancel)
            .unwrap();
        assert!(!t.is_changed());
    }

    #[test]
    fn test_terminal_states_reject_other_actions() {
        let err = BookingStatus::Completed
            .apply(BookingAction::Confirm)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::Invalid {
                from: BookingStatus::Completed,
                action: BookingAction::Confirm
            }
        );
        assert!(BookingStatus::Cancelled
            .apply(BookingAction::Complete)
            .is_err());
        assert!(BookingStatus::Completed
            .apply(BookingAction::Cancel)
            .is_err());
    }

    #[test]
    fn test_confirmed_cannot_go_back() {
        // confirm on confirmed is a no-op, but nothing leads back to pending
        assert!(TRANSITIONS
            .iter()
            .all(|(_, _, to)| *to != BookingStatus::Pending));
    }

    #[test]
    fn test_unknown_status_accepts_nothing() {
        for action in [
            BookingAction::Confirm,
            BookingAction::Complete,
            BookingAction::Cancel,
        ] {
            assert!(BookingStatus::Unknown.apply(action).is_err());
        }
        assert!(BookingStatus::Unknown.available_actions().is_empty());
    }

    #[test]
    fn test_priority_order() {
        let mut statuses = vec![
            BookingStatus::Unknown,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
            BookingStatus::Confirmed,
            BookingStatus::Pending,
        ];
        statuses.sort_by_key(|s| s.priority());
        assert_eq!(
            statuses,
            vec![
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Completed,
                BookingStatus::Cancelled,
                BookingStatus::Unknown,
            ]
        );
    }

    #[test]
    fn test_serde_unknown_status() {
        let s: BookingStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(s, BookingStatus::Unknown);
        let s: BookingStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(s, BookingStatus::Confirmed);
        assert_eq!(
            serde_json::to_string(&BookingStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn test_parse_action_and_status() {
        assert_eq!(
            "Complete".parse::<BookingAction>().unwrap(),
            BookingAction::Complete
        );
        assert!("approve".parse::<BookingAction>().is_err());
        assert_eq!(
            "canceled".parse::<BookingStatus>().unwrap(),
            BookingStatus::Cancelled
        );
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().to_uppercase().parse::<BookingStatus>().unwrap(), status);
        }
        assert!(matches!(
            " Unknown ".parse::<BookingStatus>(),
            Err(TransitionError::UnknownStatus(s)) if s == "unknown"
        ));
    }

    #[test]
    fn test_available_actions() {
        assert_eq!(
            BookingStatus::Confirmed.available_actions(),
            vec![BookingAction::Complete, BookingAction::Cancel]
        );
        assert!(BookingStatus::Completed.available_actions().is_empty());
    }
}
