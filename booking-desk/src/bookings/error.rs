use crate::store::StorageError;
use booking_client::ClientError;
use shared::booking::{BookingAction, BookingStatus, TransitionError};
use shared::error::{AppError, ErrorCode};
use shared::models::FormError;
use thiserror::Error;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Bookings API error: {0}")]
    Client(#[from] ClientError),

    #[error("Booking not found: {0}")]
    BookingNotFound(i64),

    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Invalid booking form: {0}")]
    InvalidForm(#[from] FormError),

    #[error("No reminder for a booking that is {status}: {id}")]
    NotRemindable { id: i64, status: BookingStatus },

    #[error("Nothing to update")]
    NothingToUpdate,
}

impl ManagerError {
    pub fn invalid_transition(from: BookingStatus, action: BookingAction) -> Self {
        Self::Transition(TransitionError::Invalid { from, action })
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::Storage(e) => AppError::storage(e.to_string()),
            ManagerError::Client(e) => e.into(),
            ManagerError::BookingNotFound(id) => AppError::booking_not_found(id),
            ManagerError::Transition(e) => {
                let code = match &e {
                    TransitionError::Invalid { .. } => ErrorCode::InvalidTransition,
                    TransitionError::UnknownStatus(_) => ErrorCode::UnknownStatus,
                    TransitionError::UnknownAction(_) => ErrorCode::UnknownAction,
                };
                AppError::with_message(code, e.to_string())
            }
            ManagerError::InvalidForm(e) => {
                AppError::with_message(ErrorCode::InvalidBookingForm, e.to_string())
            }
            e @ ManagerError::NotRemindable { .. } => {
                AppError::with_message(ErrorCode::BusinessRule, e.to_string())
            }
            ManagerError::NothingToUpdate => {
                AppError::with_message(ErrorCode::InvalidRequest, "Nothing to update")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: AppError = ManagerError::BookingNotFound(42).into();
        assert_eq!(err.code, ErrorCode::BookingNotFound);

        let err: AppError =
            ManagerError::invalid_transition(BookingStatus::Cancelled, BookingAction::Complete).into();
        assert_eq!(err.code, ErrorCode::InvalidTransition);
        assert!(err.message.contains("cancelled"));
    }
}
