use crate::bookings::ManagerError;
use crate::export::ExportError;
use crate::points::LedgerError;
use crate::preferences::PreferenceError;
use crate::store::StorageError;
use booking_client::ClientError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// 后台错误
#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Preference(#[from] PreferenceError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("配置错误: {0}")]
    Config(String),
}

pub type Result<T, E = DeskError> = std::result::Result<T, E>;

impl From<DeskError> for AppError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::Storage(e) => AppError::storage(e.to_string()),
            DeskError::Client(e) => e.into(),
            DeskError::Manager(e) => e.into(),
            DeskError::Ledger(e) => e.into(),
            DeskError::Preference(e) => e.into(),
            DeskError::Export(ExportError::NothingToExport) => {
                AppError::with_message(ErrorCode::NothingToExport, "Nothing to export")
            }
            DeskError::Export(e) => AppError::internal(e.to_string()),
            DeskError::Config(msg) => AppError::with_message(ErrorCode::ConfigError, msg),
        }
    }
}

/// Recover the coded error behind a CLI failure, if it came from the desk
pub fn classify(err: anyhow::Error) -> std::result::Result<AppError, anyhow::Error> {
    let err = match err.downcast::<DeskError>() {
        Ok(e) => return Ok(e.into()),
        Err(e) => e,
    };
    let err = match err.downcast::<ManagerError>() {
        Ok(e) => return Ok(e.into()),
        Err(e) => e,
    };
    let err = match err.downcast::<LedgerError>() {
        Ok(e) => return Ok(e.into()),
        Err(e) => e,
    };
    let err = match err.downcast::<PreferenceError>() {
        Ok(e) => return Ok(e.into()),
        Err(e) => e,
    };
    match err.downcast::<ExportError>() {
        Ok(e) => Ok(DeskError::Export(e).into()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_survive_wrapping() {
        let err: AppError = DeskError::from(ManagerError::BookingNotFound(7)).into();
        assert_eq!(err.code, ErrorCode::BookingNotFound);

        let err: AppError = DeskError::from(LedgerError::CustomerNotFound("0900".into())).into();
        assert_eq!(err.code, ErrorCode::CustomerNotFound);

        let err: AppError = DeskError::from(PreferenceError::UnknownTheme("neon".into())).into();
        assert_eq!(err.code, ErrorCode::UnknownTheme);

        let err: AppError = DeskError::from(ExportError::NothingToExport).into();
        assert_eq!(err.code, ErrorCode::NothingToExport);
    }

    #[test]
    fn test_classify_cli_failures() {
        let err = anyhow::Error::from(LedgerError::CustomerNotFound("0901234567".into()))
            .context("points adjust");
        let app = classify(err).unwrap();
        assert_eq!(app.code, ErrorCode::CustomerNotFound);
        assert_eq!(app.code.tag(), "E2001");

        let other = classify(anyhow::anyhow!("no such file")).unwrap_err();
        assert_eq!(other.to_string(), "no such file");
    }
}
