//! Customer Model (points ledger)

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Customer entry on the points adjustment screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub phone: String,
    pub name: String,
    pub points: i64,
}

impl Customer {
    pub fn new(phone: impl Into<String>, name: impl Into<String>, points: i64) -> Self {
        Self {
            phone: phone.into(),
            name: name.into(),
            points,
        }
    }
}

/// Customers present the first time the ledger is opened
pub fn seed_customers() -> Vec<Customer> {
    vec![
        Customer::new("0901234567", "Vicky", 120),
        Customer::new("0907654321", "An", 80),
        Customer::new("0912345678", "Minh", 200),
    ]
}

/// Direction of a manual adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointsDirection {
    Add,
    Subtract,
}

impl PointsDirection {
    /// History reason recorded for a manual adjustment
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Add => "Điều chỉnh thêm điểm",
            Self::Subtract => "Điều chỉnh trừ điểm",
        }
    }

    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            Self::Add => amount,
            Self::Subtract => -amount,
        }
    }
}

impl fmt::Display for PointsDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Subtract => f.write_str("subtract"),
        }
    }
}

impl FromStr for PointsDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" | "+" => Ok(Self::Add),
            "subtract" | "sub" | "-" => Ok(Self::Subtract),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// One line of points history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsRecord {
    pub id: i64,
    pub phone: String,
    pub name: String,
    /// Signed change
    pub change: i64,
    /// Balance after the change
    pub new_total: i64,
    pub reason: String,
    /// Unix millis
    pub timestamp: i64,
}

impl PointsRecord {
    /// `+15` / `-20`
    pub fn change_label(&self) -> String {
        if self.change > 0 {
            format!("+{}", self.change)
        } else {
            self.change.to_string()
        }
    }

    /// Local time, `dd/mm/yyyy HH:MM`
    pub fn time_label(&self) -> String {
        Local
            .timestamp_millis_opt(self.timestamp)
            .single()
            .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(change: i64) -> PointsRecord {
        PointsRecord {
            id: 1,
            phone: "0901234567".into(),
            name: "Vicky".into(),
            change,
            new_total: 120 + change,
            reason: "test".into(),
            timestamp: 1_761_800_000_000,
        }
    }

    #[test]
    fn test_change_label() {
        assert_eq!(record(15).change_label(), "+15");
        assert_eq!(record(-20).change_label(), "-20");
        assert_eq!(record(0).change_label(), "0");
    }

    #[test]
    fn test_time_label_shape() {
        let label = record(1).time_label();
        assert_eq!(label.len(), 16);
        assert_eq!(&label[2..3], "/");
        assert_eq!(&label[10..11], " ");
    }

    #[test]
    fn test_direction() {
        assert_eq!("add".parse::<PointsDirection>(), Ok(PointsDirection::Add));
        assert_eq!(
            "Subtract".parse::<PointsDirection>(),
            Ok(PointsDirection::Subtract)
        );
        assert!("double".parse::<PointsDirection>().is_err());
        assert_eq!(PointsDirection::Subtract.signed(30), -30);
        assert_eq!(PointsDirection::Add.reason(), "Điều chỉnh thêm điểm");
    }

    #[test]
    fn test_seed_customers() {
        let seed = seed_customers();
        assert_eq!(seed.len(), 3);
        assert_eq!(seed[2].name, "Minh");
        assert_eq!(seed[2].points, 200);
    }
}
