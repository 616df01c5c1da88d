//! Loyalty points arithmetic
//!
//! Customers earn 5% of the booking total, expressed in thousands of VND:
//! `floor(total × 0.05 / 1000)`, i.e. one point per 20 000 ₫.

/// VND per earned point
pub const VND_PER_POINT: i64 = 20_000;

/// Points earned for a booking total (integer VND).
///
/// Negative totals earn nothing.
pub fn points_for_total(total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    total / VND_PER_POINT
}

/// Apply a signed change to a balance, clamping at zero
pub fn apply_delta(balance: i64, delta: i64) -> i64 {
    balance.saturating_add(delta).max(0)
}
