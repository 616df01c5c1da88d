//! 错误码按千位分组

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Which part of the desk an error code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    General,
    Booking,
    Points,
    Preference,
    Notification,
    System,
}

impl ErrorCategory {
    /// By the thousands digit; anything past 4xxx counts as system
    pub fn from_code(code: u16) -> Self {
        match code / 1000 {
            0 => Self::General,
            1 => Self::Booking,
            2 => Self::Points,
            3 => Self::Preference,
            4 => Self::Notification,
            _ => Self::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Booking => "booking",
            Self::Points => "points",
            Self::Preference => "preference",
            Self::Notification => "notification",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_group() {
        let cases = [
            (ErrorCode::RequiredField, ErrorCategory::General),
            (ErrorCode::NothingToExport, ErrorCategory::Booking),
            (ErrorCode::InvalidDirection, ErrorCategory::Points),
            (ErrorCode::UnsupportedSchema, ErrorCategory::Preference),
            (ErrorCode::TemplateMissing, ErrorCategory::Notification),
            (ErrorCode::ConfigError, ErrorCategory::System),
        ];
        for (code, category) in cases {
            assert_eq!(code.category(), category, "{}", code);
        }
    }

    #[test]
    fn test_serialized_name() {
        let json = serde_json::to_string(&ErrorCategory::Preference).unwrap();
        assert_eq!(json, "\"preference\"");
        assert_eq!(ErrorCategory::from_code(9999).as_str(), "system");
    }
}
