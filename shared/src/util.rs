use chrono::{Months, NaiveDate};

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a Snowflake-style i64 for locally synthesized booking ids.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms)
///
/// Used when the bookings API is unreachable and a booking has to be
/// created offline. Plain millisecond ids collide when two bookings are
/// created in the same millisecond.
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    (ts << 12) | rand_bits
}

/// Parse a booking date as entered by customers.
///
/// Accepts `dd/mm/yyyy` (the mini app's locale format), ISO `yyyy-mm-dd`
/// and RFC 3339 timestamps (date part only).
pub fn parse_booking_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Calendar cutoff `months` before `today` (same day of month, clamped).
pub fn months_before(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_booking_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 10, 30).unwrap();
        assert_eq!(parse_booking_date("30/10/2025"), Some(expected));
        assert_eq!(parse_booking_date("2025-10-30"), Some(expected));
        assert_eq!(
            parse_booking_date("2025-10-30T08:00:00+07:00"),
            Some(expected)
        );
        assert_eq!(parse_booking_date(""), None);
        assert_eq!(parse_booking_date("next tuesday"), None);
    }

    #[test]
    fn test_months_before_clamps_day() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 31).unwrap();
        assert_eq!(
            months_before(today, 6),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
    }

    #[test]
    fn test_snowflake_ids_are_positive_and_distinct() {
        let a = snowflake_id();
        let b = snowflake_id();
        assert!(a > 0);
        assert!(b > 0);
        // Same millisecond is possible; random bits make a clash unlikely
        // but not impossible, so only check the timestamp part ordering.
        assert!((b >> 12) >= (a >> 12));
    }
}
