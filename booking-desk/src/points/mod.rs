//! 积分账本

pub mod ledger;

pub use ledger::{
    HistoryFilter, LedgerError, LedgerResult, PointsLedger, REMINDER_INTERVAL_MS,
    history_cutoff_ms, parse_amount, parse_direction,
};
