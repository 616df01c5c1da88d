//! CSV 导出 - bookings and points history

use chrono::NaiveDate;
use serde::Serialize;
use shared::models::{Booking, PointsRecord};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing to export")]
    NothingToExport,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Serialize)]
struct BookingRow<'a> {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Phone")]
    phone: &'a str,
    #[serde(rename = "Service")]
    service: &'a str,
    #[serde(rename = "Date")]
    date: &'a str,
    #[serde(rename = "Time")]
    time: &'a str,
    #[serde(rename = "Staff")]
    staff: u32,
    #[serde(rename = "Measure")]
    measure: String,
    #[serde(rename = "Total")]
    total: i64,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Points")]
    points: i64,
}

impl<'a> From<&'a Booking> for BookingRow<'a> {
    fn from(b: &'a Booking) -> Self {
        Self {
            code: b.code(),
            name: &b.core.name,
            phone: &b.core.phone,
            service: &b.core.service,
            date: &b.core.date,
            time: &b.core.time,
            staff: b.core.staff,
            measure: b.core.detail.label(),
            total: b.core.total,
            status: b.status.as_str(),
            points: b.points(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PointsRow<'a> {
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Phone")]
    phone: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Change")]
    change: String,
    #[serde(rename = "Total")]
    total: i64,
    #[serde(rename = "Reason")]
    reason: &'a str,
}

impl<'a> From<&'a PointsRecord> for PointsRow<'a> {
    fn from(r: &'a PointsRecord) -> Self {
        Self {
            time: r.time_label(),
            phone: &r.phone,
            name: &r.name,
            change: r.change_label(),
            total: r.new_total,
            reason: if r.reason.is_empty() { "N/A" } else { &r.reason },
        }
    }
}

/// Header `Code,Name,Phone,Service,Date,Time,Staff,Measure,Total,Status,Points`
pub fn write_bookings_csv<W: Write>(writer: W, bookings: &[Booking]) -> ExportResult<usize> {
    if bookings.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let mut csv_writer = csv::Writer::from_writer(writer);
    for booking in bookings {
        csv_writer.serialize(BookingRow::from(booking))?;
    }
    csv_writer.flush()?;
    Ok(bookings.len())
}

/// Header `Time,Phone,Name,Change,Total,Reason`
pub fn write_points_csv<W: Write>(writer: W, records: &[PointsRecord]) -> ExportResult<usize> {
    if records.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(PointsRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(records.len())
}

/// Write to `path`, creating the parent directory
pub fn export_to_file<T>(
    path: &Path,
    items: &[T],
    write: fn(std::fs::File, &[T]) -> ExportResult<usize>,
) -> ExportResult<usize> {
    if items.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let count = write(file, items)?;
    tracing::info!(path = %path.display(), rows = count, "CSV exported");
    Ok(count)
}

/// Filter text as one file-name segment: path separators and characters
/// Windows rejects become `-`
fn file_part(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

/// `bookings_<yyyy-mm-dd>[_<status>].csv`
pub fn bookings_file_name(today: NaiveDate, status: Option<&str>) -> String {
    let mut name = format!("bookings_{}", today.format("%Y-%m-%d"));
    if let Some(status) = status {
        name.push('_');
        name.push_str(&file_part(status));
    }
    name.push_str(".csv");
    name
}

/// `lich-su-diem_<yyyy-mm-dd>[_filtered[_name-X][_phone-Y]].csv`
pub fn points_file_name(today: NaiveDate, name: Option<&str>, phone: Option<&str>) -> String {
    let name = name.map(str::trim).filter(|s| !s.is_empty());
    let phone = phone.map(str::trim).filter(|s| !s.is_empty());

    let mut file = format!("lich-su-diem_{}", today.format("%Y-%m-%d"));
    if name.is_some() || phone.is_some() {
        file.push_str("_filtered");
        if let Some(n) = name {
            file.push_str(&format!("_name-{}", file_part(n)));
        }
        if let Some(p) = phone {
            file.push_str(&format!("_phone-{}", file_part(p)));
        }
    }
    file.push_str(".csv");
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking_client::mock_bookings;

    fn reparse(bytes: &[u8]) -> (Vec<String>, usize) {
        let mut reader = csv::Reader::from_reader(bytes);
        let headers = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader.records().map(|r| r.unwrap()).count();
        (headers, rows)
    }

    #[test]
    fn test_bookings_csv_reparses_to_same_row_count() {
        let mut bookings = mock_bookings();
        // commas and quotes must survive
        bookings[0].core.note = "phòng khách, bếp \"kỹ\"".into();
        bookings[1].core.address = "456 Lê Văn Việt,\nQuận 9".into();

        let mut out = Vec::new();
        let written = write_bookings_csv(&mut out, &bookings).unwrap();
        assert_eq!(written, 5);

        let (headers, rows) = reparse(&out);
        assert_eq!(
            headers,
            vec![
                "Code", "Name", "Phone", "Service", "Date", "Time", "Staff", "Measure", "Total",
                "Status", "Points"
            ]
        );
        assert_eq!(rows, bookings.len());
    }

    #[test]
    fn test_booking_row_values() {
        let bookings = mock_bookings();
        let row = BookingRow::from(&bookings[0]);
        assert_eq!(row.code, "301025-001");
        assert_eq!(row.measure, "4h");
        assert_eq!(row.status, "pending");
        assert_eq!(row.points, 40);
    }

    #[test]
    fn test_points_csv() {
        let records = vec![PointsRecord {
            id: 1,
            phone: "0901234567".into(),
            name: "Vicky".into(),
            change: -20,
            new_total: 100,
            reason: String::new(),
            timestamp: 1_700_000_000_000,
        }];
        let mut out = Vec::new();
        write_points_csv(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Time,Phone,Name,Change,Total,Reason"));
        assert!(text.contains(",0901234567,Vicky,-20,100,N/A"));
    }

    #[test]
    fn test_empty_export_is_an_error() {
        let mut out = Vec::new();
        assert!(matches!(
            write_points_csv(&mut out, &[]),
            Err(ExportError::NothingToExport)
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("b.csv");
        let n = export_to_file(&path, &mock_bookings(), write_bookings_csv).unwrap();
        assert_eq!(n, 5);
        let (_, rows) = reparse(&std::fs::read(&path).unwrap());
        assert_eq!(rows, 5);
    }

    #[test]
    fn test_file_names() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        assert_eq!(points_file_name(today, None, None), "lich-su-diem_2025-11-03.csv");
        assert_eq!(
            points_file_name(today, Some("An"), Some("")),
            "lich-su-diem_2025-11-03_filtered_name-An.csv"
        );
        assert_eq!(
            points_file_name(today, Some("An"), Some("0907")),
            "lich-su-diem_2025-11-03_filtered_name-An_phone-0907.csv"
        );
        assert_eq!(bookings_file_name(today, Some("pending")), "bookings_2025-11-03_pending.csv");
        assert_eq!(bookings_file_name(today, None), "bookings_2025-11-03.csv");
    }

    #[test]
    fn test_file_names_stay_in_one_segment() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let name = points_file_name(today, Some("../../etc/passwd"), Some("09\\07"));
        assert_eq!(
            name,
            "lich-su-diem_2025-11-03_filtered_name-..-..-etc-passwd_phone-09-07.csv"
        );
        assert_eq!(std::path::Path::new(&name).components().count(), 1);
        assert!(!bookings_file_name(today, Some("a/b")).contains('/'));
    }
}
