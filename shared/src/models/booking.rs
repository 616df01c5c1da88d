//! Booking Model
//!
//! The bookings API speaks a flat, loosely typed JSON shape (numbers may
//! arrive as strings, the service measurement is whichever of `hours`,
//! `duration`, `area` or `quantity` happens to be set). [`BookingWire`] is
//! that shape; [`Booking`] and [`BookingCore`] convert to and from it at the
//! serde boundary so the rest of the code works with typed values.

use crate::booking::{BookingStatus, booking_code, points_for_total};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// How the service is measured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceDetail {
    /// Hourly cleaning, billed per staff-hour
    Hourly { hours: f64 },
    /// Fixed-duration service (air conditioner, sofa ...)
    Timed { duration: f64 },
    /// Area based (offices), in m²
    Area { area: f64 },
    /// Counted items
    Count { quantity: u32 },
    #[default]
    Unspecified,
}

impl ServiceDetail {
    /// Short label used in listings and exports (`4h`, `100 m²`, `x2`)
    pub fn label(&self) -> String {
        match self {
            Self::Hourly { hours } => format!("{}h", trim_float(*hours)),
            Self::Timed { duration } => format!("{}h", trim_float(*duration)),
            Self::Area { area } => format!("{} m²", trim_float(*area)),
            Self::Count { quantity } => format!("x{}", quantity),
            Self::Unspecified => String::new(),
        }
    }

    /// Wire `type` discriminator
    fn wire_type(&self) -> Option<&'static str> {
        match self {
            Self::Hourly { .. } => Some("hourly"),
            Self::Unspecified => None,
            _ => Some("other"),
        }
    }
}

fn trim_float(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Fields shared by a submitted draft and a stored booking
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookingCore {
    pub name: String,
    pub phone: String,
    pub address: String,
    /// As entered, `dd/mm/yyyy` or `yyyy-mm-dd`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub service: String,
    /// Integer VND
    pub total: i64,
    pub staff: u32,
    pub note: String,
    pub detail: ServiceDetail,
    /// Free-text size (other-service form)
    pub size: Option<String>,
    /// Customer's chat platform id
    pub zalo_id: Option<String>,
}

/// Booking record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BookingWire", into = "BookingWire")]
pub struct Booking {
    pub id: i64,
    pub core: BookingCore,
    pub status: BookingStatus,
    /// Stamped when the booking is completed
    pub points: Option<i64>,
    /// RFC 3339, set on locally synthesized bookings
    pub created_at: Option<String>,
}

impl Booking {
    /// A fresh pending booking built from a draft
    pub fn from_draft(id: i64, draft: BookingDraft, created_at: Option<String>) -> Self {
        Self {
            id,
            core: draft.0,
            status: BookingStatus::Pending,
            points: None,
            created_at,
        }
    }

    /// Stamped points, or recomputed from the total
    pub fn points(&self) -> i64 {
        self.points
            .unwrap_or_else(|| points_for_total(self.core.total))
    }

    /// Customer-facing code, `ddmmyy-NNN`
    pub fn code(&self) -> String {
        booking_code(&self.core.date, self.id)
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn phone(&self) -> &str {
        &self.core.phone
    }

    pub fn date(&self) -> &str {
        &self.core.date
    }
}

/// Body of a booking submission
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "BookingWire", into = "BookingWire")]
pub struct BookingDraft(pub BookingCore);

impl From<BookingCore> for BookingDraft {
    fn from(core: BookingCore) -> Self {
        Self(core)
    }
}

/// Admin edit of booking details; status is never part of it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub service: Option<String>,
    pub total: Option<i64>,
    pub staff: Option<u32>,
    pub note: Option<String>,
}

impl BookingUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to a booking, returning the names of the fields that changed
    pub fn apply_to(&self, core: &mut BookingCore) -> Vec<&'static str> {
        let mut changed = Vec::new();
        macro_rules! set {
            ($field:ident) => {
                if let Some(v) = &self.$field {
                    if core.$field != *v {
                        core.$field = v.clone();
                        changed.push(stringify!($field));
                    }
                }
            };
        }
        set!(name);
        set!(phone);
        set!(address);
        set!(date);
        set!(time);
        set!(service);
        set!(total);
        set!(staff);
        set!(note);
        changed
    }
}

// ========== Wire format ==========

/// Flat JSON record as the bookings API sends it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWire {
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub service: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub hours: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub area: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub staff: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zalo_id: Option<String>,
}

impl BookingWire {
    fn into_core(self) -> BookingCore {
        let detail = if let Some(hours) = self.hours {
            ServiceDetail::Hourly { hours }
        } else if let Some(duration) = self.duration {
            ServiceDetail::Timed { duration }
        } else if let Some(area) = self.area {
            ServiceDetail::Area { area }
        } else if let Some(quantity) = self.quantity {
            ServiceDetail::Count {
                quantity: u32::try_from(quantity).unwrap_or(0),
            }
        } else {
            ServiceDetail::Unspecified
        };
        BookingCore {
            name: self.name,
            phone: self.phone,
            address: self.address,
            date: self.date,
            time: self.time,
            service: self.service,
            total: self.total.unwrap_or(0),
            staff: self
                .staff
                .and_then(|s| u32::try_from(s).ok())
                .unwrap_or(1),
            note: self.note.unwrap_or_default(),
            detail,
            size: self.size.filter(|s| !s.is_empty()),
            zalo_id: self.zalo_id.filter(|s| !s.is_empty()),
        }
    }

    fn from_core(core: BookingCore) -> Self {
        let mut wire = Self {
            kind: core.detail.wire_type().map(str::to_string),
            name: core.name,
            phone: core.phone,
            address: core.address,
            date: core.date,
            time: core.time,
            service: core.service,
            total: Some(core.total),
            staff: Some(i64::from(core.staff)),
            note: (!core.note.is_empty()).then_some(core.note),
            size: core.size,
            zalo_id: core.zalo_id,
            ..Default::default()
        };
        match core.detail {
            ServiceDetail::Hourly { hours } => wire.hours = Some(hours),
            ServiceDetail::Timed { duration } => wire.duration = Some(duration),
            ServiceDetail::Area { area } => wire.area = Some(area),
            ServiceDetail::Count { quantity } => wire.quantity = Some(i64::from(quantity)),
            ServiceDetail::Unspecified => {}
        }
        wire
    }
}

impl TryFrom<BookingWire> for Booking {
    type Error = String;

    fn try_from(mut wire: BookingWire) -> Result<Self, Self::Error> {
        let id = wire.id.ok_or_else(|| "booking record has no id".to_string())?;
        let status = wire.status.take().unwrap_or_default();
        let points = wire.points.take();
        let created_at = wire.created_at.take();
        Ok(Self {
            id,
            core: wire.into_core(),
            status,
            points,
            created_at,
        })
    }
}

impl From<Booking> for BookingWire {
    fn from(b: Booking) -> Self {
        let mut wire = BookingWire::from_core(b.core);
        wire.id = Some(b.id);
        wire.status = Some(b.status);
        wire.points = b.points;
        wire.created_at = b.created_at;
        wire
    }
}

impl From<BookingWire> for BookingDraft {
    fn from(wire: BookingWire) -> Self {
        Self(wire.into_core())
    }
}

impl From<BookingDraft> for BookingWire {
    fn from(draft: BookingDraft) -> Self {
        BookingWire::from_core(draft.0)
    }
}

// ========== Lenient number/string decoding ==========

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "id": 3,
            "name": "Lê Thị Mai",
            "phone": "0912345678",
            "service": "Vệ sinh văn phòng",
            "date": "01/11/2025",
            "time": "08:00",
            "address": "789 Võ Văn Tần, Quận 3, TP.HCM",
            "status": "completed",
            "type": "other",
            "area": 100,
            "staff": 3,
            "total": 5000000,
            "points": 250,
            "note": "Văn phòng 100m²"
        }"#
    }

    #[test]
    fn test_decode_flat_record() {
        let b: Booking = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(b.id, 3);
        assert_eq!(b.status, BookingStatus::Completed);
        assert_eq!(b.core.detail, ServiceDetail::Area { area: 100.0 });
        assert_eq!(b.core.staff, 3);
        assert_eq!(b.points(), 250);
        assert_eq!(b.code(), "011125-003");
    }

    #[test]
    fn test_encode_keeps_flat_shape() {
        let b: Booking = serde_json::from_str(sample_json()).unwrap();
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["area"], 100.0);
        assert_eq!(v["type"], "other");
        assert_eq!(v["status"], "completed");
        assert!(v.get("hours").is_none());
        assert!(v.get("core").is_none());
    }

    #[test]
    fn test_lenient_numbers() {
        let json = r#"{"id":"17","name":"A","total":"800000","staff":"2","hours":"4","status":"pending"}"#;
        let b: Booking = serde_json::from_str(json).unwrap();
        assert_eq!(b.id, 17);
        assert_eq!(b.core.total, 800_000);
        assert_eq!(b.core.staff, 2);
        assert_eq!(b.core.detail, ServiceDetail::Hourly { hours: 4.0 });
        // not stamped, recomputed
        assert_eq!(b.points, None);
        assert_eq!(b.points(), 40);
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let json = r#"{"name":"A","status":"pending"}"#;
        assert!(serde_json::from_str::<Booking>(json).is_err());
    }

    #[test]
    fn test_unknown_status_and_camel_case_fields() {
        let json = r#"{"id":1,"status":"in_review","createdAt":"2025-10-01T00:00:00Z","zaloId":"z1"}"#;
        let b: Booking = serde_json::from_str(json).unwrap();
        assert_eq!(b.status, BookingStatus::Unknown);
        assert_eq!(b.created_at.as_deref(), Some("2025-10-01T00:00:00Z"));
        assert_eq!(b.core.zalo_id.as_deref(), Some("z1"));
        assert_eq!(b.core.staff, 1);
    }

    #[test]
    fn test_draft_has_no_id_or_status() {
        let draft = BookingDraft(BookingCore {
            name: "Vicky".into(),
            detail: ServiceDetail::Count { quantity: 2 },
            ..Default::default()
        });
        let v = serde_json::to_value(&draft).unwrap();
        assert!(v.get("id").is_none());
        assert!(v.get("status").is_none());
        assert_eq!(v["quantity"], 2);
        assert_eq!(v["type"], "other");
    }

    #[test]
    fn test_update_apply_reports_changes() {
        let mut core = BookingCore {
            name: "An".into(),
            total: 100_000,
            ..Default::default()
        };
        let update = BookingUpdate {
            name: Some("An".into()),
            total: Some(200_000),
            note: Some("gate code 12".into()),
            ..Default::default()
        };
        let changed = update.apply_to(&mut core);
        assert_eq!(changed, vec!["total", "note"]);
        assert_eq!(core.total, 200_000);
        assert!(BookingUpdate::default().is_empty());
    }

    #[test]
    fn test_detail_labels() {
        assert_eq!(ServiceDetail::Hourly { hours: 4.0 }.label(), "4h");
        assert_eq!(ServiceDetail::Timed { duration: 1.5 }.label(), "1.5h");
        assert_eq!(ServiceDetail::Area { area: 100.0 }.label(), "100 m²");
        assert_eq!(ServiceDetail::Count { quantity: 3 }.label(), "x3");
        assert_eq!(ServiceDetail::Unspecified.label(), "");
    }
}
