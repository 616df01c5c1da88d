//! Customer notifications
//!
//! Notifications go out through the messaging platform's template API
//! (ZNS). This module only knows the message shape: which template, the
//! recipient in the platform's phone format and the template variables.
//! Sending lives in `booking-client`, queueing in the desk's outbox.

use crate::models::{Booking, PointsRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_HOTLINE: &str = "1900 2024";
pub const FEEDBACK_URL: &str = "https://booking.nscare.vn/feedback";
pub const REBOOKING_URL: &str = "https://booking.nscare.vn";
pub const DEFAULT_CANCEL_REASON: &str = "Theo yêu cầu";
pub const PREPARATION_NOTE: &str = "Vui lòng chuẩn bị đầy đủ thiết bị và không gian làm việc";

/// Template variables, sorted for stable payloads
pub type TemplateData = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingConfirmed,
    ServiceCompleted,
    BookingCancelled,
    BookingReminder,
    PointsUpdated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookingConfirmed => "booking_confirmed",
            Self::ServiceCompleted => "service_completed",
            Self::BookingCancelled => "booking_cancelled",
            Self::BookingReminder => "booking_reminder",
            Self::PointsUpdated => "points_updated",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Template ids registered with the messaging platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateIds {
    pub confirmed: String,
    pub completed: String,
    pub cancelled: String,
    pub reminder: String,
    /// No template is registered for points changes by default
    pub points_updated: Option<String>,
}

impl Default for TemplateIds {
    fn default() -> Self {
        Self {
            confirmed: "331977".to_string(),
            completed: "331978".to_string(),
            cancelled: "331979".to_string(),
            reminder: "331980".to_string(),
            points_updated: None,
        }
    }
}

impl TemplateIds {
    pub fn for_kind(&self, kind: NotificationKind) -> Option<&str> {
        match kind {
            NotificationKind::BookingConfirmed => Some(&self.confirmed),
            NotificationKind::ServiceCompleted => Some(&self.completed),
            NotificationKind::BookingCancelled => Some(&self.cancelled),
            NotificationKind::BookingReminder => Some(&self.reminder),
            NotificationKind::PointsUpdated => self.points_updated.as_deref(),
        }
    }
}

/// Shop details that appear in every template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateContext {
    pub hotline: String,
    pub feedback_url: String,
    pub rebooking_url: String,
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self {
            hotline: DEFAULT_HOTLINE.to_string(),
            feedback_url: FEEDBACK_URL.to_string(),
            rebooking_url: REBOOKING_URL.to_string(),
        }
    }
}

/// A message ready to be queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub booking_id: Option<i64>,
    /// As stored on the booking; normalized when sent
    pub phone: String,
    pub template_data: TemplateData,
}

/// Normalize a Vietnamese phone number to the platform's `84…` form.
///
/// `0901 234-567` → `84901234567`, `+84901234567` → `84901234567`.
pub fn format_phone_for_zns(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();
    if cleaned.is_empty() {
        return cleaned;
    }
    if let Some(rest) = cleaned.strip_prefix('0') {
        format!("84{}", rest)
    } else if let Some(rest) = cleaned.strip_prefix('+') {
        if rest.starts_with("84") {
            rest.to_string()
        } else {
            format!("84{}", cleaned)
        }
    } else if cleaned.starts_with("84") {
        cleaned
    } else {
        format!("84{}", cleaned)
    }
}

/// `800000` → `800.000 ₫`
pub fn format_vnd(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{} ₫", sign, grouped)
}

fn base_data(booking: &Booking) -> TemplateData {
    let mut data = TemplateData::new();
    data.insert("customer_name".into(), booking.core.name.clone());
    data.insert("service_name".into(), booking.core.service.clone());
    data.insert("booking_code".into(), booking.code());
    data
}

fn schedule_data(data: &mut TemplateData, booking: &Booking) {
    data.insert("booking_date".into(), booking.core.date.clone());
    data.insert("booking_time".into(), booking.core.time.clone());
}

fn request(kind: NotificationKind, booking: &Booking, data: TemplateData) -> NotificationRequest {
    NotificationRequest {
        kind,
        booking_id: Some(booking.id),
        phone: booking.core.phone.clone(),
        template_data: data,
    }
}

pub fn confirmation(booking: &Booking, ctx: &TemplateContext) -> NotificationRequest {
    let mut data = base_data(booking);
    schedule_data(&mut data, booking);
    data.insert("address".into(), booking.core.address.clone());
    data.insert("total_amount".into(), format_vnd(booking.core.total));
    data.insert("hotline".into(), ctx.hotline.clone());
    request(NotificationKind::BookingConfirmed, booking, data)
}

pub fn completion(
    booking: &Booking,
    points_earned: i64,
    completed_on: NaiveDate,
    ctx: &TemplateContext,
) -> NotificationRequest {
    let mut data = base_data(booking);
    data.insert(
        "completion_date".into(),
        completed_on.format("%d/%m/%Y").to_string(),
    );
    data.insert("points_earned".into(), points_earned.to_string());
    data.insert("total_amount".into(), format_vnd(booking.core.total));
    data.insert("feedback_url".into(), ctx.feedback_url.clone());
    request(NotificationKind::ServiceCompleted, booking, data)
}

pub fn cancellation(booking: &Booking, reason: &str, ctx: &TemplateContext) -> NotificationRequest {
    let mut data = base_data(booking);
    schedule_data(&mut data, booking);
    let reason = reason.trim();
    data.insert(
        "cancellation_reason".into(),
        if reason.is_empty() {
            DEFAULT_CANCEL_REASON.to_string()
        } else {
            reason.to_string()
        },
    );
    data.insert("rebooking_url".into(), ctx.rebooking_url.clone());
    data.insert("hotline".into(), ctx.hotline.clone());
    request(NotificationKind::BookingCancelled, booking, data)
}

pub fn reminder(booking: &Booking, ctx: &TemplateContext) -> NotificationRequest {
    let mut data = base_data(booking);
    schedule_data(&mut data, booking);
    data.insert("address".into(), booking.core.address.clone());
    data.insert("preparation_note".into(), PREPARATION_NOTE.to_string());
    data.insert("hotline".into(), ctx.hotline.clone());
    request(NotificationKind::BookingReminder, booking, data)
}

pub fn points_updated(record: &PointsRecord, ctx: &TemplateContext) -> NotificationRequest {
    let mut data = TemplateData::new();
    data.insert("customer_name".into(), record.name.clone());
    data.insert("points_change".into(), record.change_label());
    data.insert("points_total".into(), record.new_total.to_string());
    data.insert("reason".into(), record.reason.clone());
    data.insert("hotline".into(), ctx.hotline.clone());
    NotificationRequest {
        kind: NotificationKind::PointsUpdated,
        booking_id: None,
        phone: record.phone.clone(),
        template_data: data,
    }
}
