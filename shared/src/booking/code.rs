use crate::util::parse_booking_date;
use chrono::Datelike;

/// Booking code shown to customers: `ddmmyy-NNN`.
///
/// The id is zero-padded to three digits. Dates that cannot be parsed
/// produce `000000-NNN`.
pub fn booking_code(date: &str, id: i64) -> String {
    match parse_booking_date(date) {
        Some(d) => format!(
            "{:02}{:02}{:02}-{:03}",
            d.day(),
            d.month(),
            d.year().rem_euclid(100),
            id
        ),
        None => format!("000000-{:03}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_code() {
        assert_eq!(booking_code("30/10/2025", 1), "301025-001");
        assert_eq!(booking_code("2025-11-03", 42), "031125-042");
        assert_eq!(booking_code("2025-11-03", 1234), "031125-1234");
        assert_eq!(booking_code("soon", 7), "000000-007");
    }
}
