//! v1 → v2: flat legacy keys to typed keys
//!
//! The v1 layout stored every value as a plain string under the mini app's
//! original key names (`appTheme`, `bannerImages`, `zalo_phone` ...).

use super::keys::{
    BANNER_SLOTS, BannerImages, HourlyDraft, IsAdmin, LastPointsExport, LastPointsReminder,
    ManualAdminOverride, OtherDraft, Profile, Theme, ThemeColor, ThemeName,
};
use super::store::{PreferenceResult, PreferenceStore};
use chrono::{Local, NaiveDateTime, TimeZone};
use redb::WriteTransaction;
use serde::Deserialize;
use shared::models::PointsRecord;
use std::collections::BTreeMap;

pub const LEGACY_KEYS: [&str; 14] = [
    "zalo_user_id",
    "zalo_name",
    "zalo_avatar",
    "zalo_phone",
    "is_admin",
    "appTheme",
    "themeColor",
    "bannerImages",
    "hourlyBookingForm",
    "otherBookingForm",
    "manual_admin_override",
    "lastPointsReminder",
    "lastPointsExport",
    "pointsHistory",
];

/// What a migration or import carried over
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Legacy keys converted
    pub migrated: Vec<String>,
    /// Keys that were unknown or undecodable
    pub skipped: Vec<String>,
    /// History records appended to the points table
    pub points_records: usize,
}

impl MigrationReport {
    fn ok(&mut self, key: &str) {
        self.migrated.push(key.to_string());
    }

    fn skip(&mut self, key: &str, why: &str) {
        tracing::warn!(key, why, "Legacy preference skipped");
        self.skipped.push(key.to_string());
    }
}

/// History entry as the mini app stored it
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LegacyPointsRecord {
    phone: String,
    name: String,
    /// `"+15"` / `"-20"`, sometimes a bare number
    change: serde_json::Value,
    new_total: i64,
    reason: String,
    /// vi-VN locale string, used when `timestamp` is missing
    time: Option<String>,
    timestamp: Option<i64>,
}

impl LegacyPointsRecord {
    fn into_record(self) -> Option<PointsRecord> {
        let change = match &self.change {
            serde_json::Value::Number(n) => n.as_i64()?,
            serde_json::Value::String(s) => s.trim().trim_start_matches('+').parse().ok()?,
            _ => return None,
        };
        let timestamp = match self.timestamp {
            Some(ts) => ts,
            None => parse_vi_time(self.time.as_deref()?)?,
        };
        Some(PointsRecord {
            id: 0,
            phone: self.phone,
            name: self.name,
            change,
            new_total: self.new_total,
            reason: self.reason,
            timestamp,
        })
    }
}

/// `HH:MM dd/mm/yyyy` or `dd/mm/yyyy HH:MM`, local time
fn parse_vi_time(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let naive = NaiveDateTime::parse_from_str(raw, "%H:%M %d/%m/%Y")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%d/%m/%Y %H:%M"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

fn parse_flag(raw: &str) -> bool {
    raw.trim() == "true"
}

/// Write the typed equivalents of `entries` within `txn`
pub(super) fn apply(
    prefs: &PreferenceStore,
    txn: &WriteTransaction,
    entries: &BTreeMap<String, String>,
) -> PreferenceResult<MigrationReport> {
    let mut report = MigrationReport::default();
    let mut profile = prefs.profile()?;
    let mut profile_touched = false;

    for (key, raw) in entries {
        match key.as_str() {
            "zalo_user_id" | "zalo_name" | "zalo_avatar" | "zalo_phone" => {
                let field = match key.as_str() {
                    "zalo_user_id" => &mut profile.user_id,
                    "zalo_name" => &mut profile.name,
                    "zalo_avatar" => &mut profile.avatar,
                    _ => &mut profile.phone,
                };
                *field = raw.clone();
                profile_touched = true;
                report.ok(key);
            }
            "is_admin" => {
                prefs.set_txn::<IsAdmin>(txn, &parse_flag(raw))?;
                report.ok(key);
            }
            "manual_admin_override" => {
                prefs.set_txn::<ManualAdminOverride>(txn, &parse_flag(raw))?;
                report.ok(key);
            }
            "appTheme" => match raw.parse::<ThemeName>() {
                Ok(theme) => {
                    prefs.set_txn::<Theme>(txn, &theme)?;
                    report.ok(key);
                }
                Err(_) => report.skip(key, "unknown theme"),
            },
            "themeColor" => {
                prefs.set_txn::<ThemeColor>(txn, raw)?;
                report.ok(key);
            }
            "bannerImages" => match serde_json::from_str::<Vec<Option<String>>>(raw) {
                Ok(list) => {
                    let mut banners: [Option<String>; BANNER_SLOTS] = Default::default();
                    for (slot, banner) in list.into_iter().take(BANNER_SLOTS).enumerate() {
                        banners[slot] = banner;
                    }
                    prefs.set_txn::<BannerImages>(txn, &banners)?;
                    report.ok(key);
                }
                Err(_) => report.skip(key, "not a banner list"),
            },
            "hourlyBookingForm" => match serde_json::from_str(raw) {
                Ok(form) => {
                    prefs.set_txn::<HourlyDraft>(txn, &form)?;
                    report.ok(key);
                }
                Err(_) => report.skip(key, "not a form"),
            },
            "otherBookingForm" => match serde_json::from_str(raw) {
                Ok(form) => {
                    prefs.set_txn::<OtherDraft>(txn, &form)?;
                    report.ok(key);
                }
                Err(_) => report.skip(key, "not a form"),
            },
            "lastPointsReminder" | "lastPointsExport" => match raw.trim().parse::<i64>() {
                Ok(ms) if key == "lastPointsReminder" => {
                    prefs.set_txn::<LastPointsReminder>(txn, &Some(ms))?;
                    report.ok(key);
                }
                Ok(ms) => {
                    prefs.set_txn::<LastPointsExport>(txn, &Some(ms))?;
                    report.ok(key);
                }
                Err(_) => report.skip(key, "not a timestamp"),
            },
            "pointsHistory" => match serde_json::from_str::<Vec<LegacyPointsRecord>>(raw) {
                Ok(list) => {
                    let total = list.len();
                    let mut records: Vec<PointsRecord> =
                        list.into_iter().filter_map(LegacyPointsRecord::into_record).collect();
                    if records.len() < total {
                        tracing::warn!(
                            dropped = total - records.len(),
                            "Legacy history records without a usable change or time"
                        );
                    }
                    records.sort_by_key(|r| r.timestamp);
                    for record in records {
                        prefs.storage().append_points_record(txn, record)?;
                        report.points_records += 1;
                    }
                    report.ok(key);
                }
                Err(_) => report.skip(key, "not a history list"),
            },
            other => report.skip(other, "unknown key"),
        }
    }

    if profile_touched {
        prefs.set_txn::<Profile>(txn, &profile)?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::store::CURRENT_SCHEMA_VERSION;
    use crate::store::DeskStorage;

    fn store() -> PreferenceStore {
        PreferenceStore::new(DeskStorage::open_in_memory().unwrap())
    }

    fn put_raw(prefs: &PreferenceStore, pairs: &[(&str, &str)]) {
        let txn = prefs.storage().begin_write().unwrap();
        for (k, v) in pairs {
            prefs.storage().put_preference(&txn, k, v.as_bytes()).unwrap();
        }
        txn.commit().unwrap();
    }

    #[test]
    fn test_migrate_v1_layout() {
        let prefs = store();
        put_raw(
            &prefs,
            &[
                ("zalo_name", "Vicky"),
                ("zalo_phone", "0901234567"),
                ("appTheme", "rose"),
                ("themeColor", "#fb7185"),
                ("bannerImages", r#"["data:a",null,"data:c"]"#),
                ("manual_admin_override", "true"),
                ("lastPointsReminder", "1700000000000"),
                (
                    "hourlyBookingForm",
                    r#"{"date":"2025-11-03","hour":9,"duration":3,"staff":2,"name":"Vicky"}"#,
                ),
            ],
        );

        let report = prefs.migrate().unwrap();
        assert_eq!(report.migrated.len(), 8);
        assert!(report.skipped.is_empty());
        assert_eq!(prefs.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);

        let profile = prefs.get::<Profile>().unwrap();
        assert_eq!(profile.name, "Vicky");
        assert_eq!(profile.phone, "0901234567");
        assert_eq!(prefs.get::<Theme>().unwrap(), ThemeName::Rose);
        assert_eq!(prefs.get::<ThemeColor>().unwrap(), "#fb7185");
        assert_eq!(
            prefs.get::<BannerImages>().unwrap(),
            [Some("data:a".to_string()), None, Some("data:c".to_string())]
        );
        assert!(prefs.get::<ManualAdminOverride>().unwrap());
        assert_eq!(
            prefs.get::<LastPointsReminder>().unwrap(),
            Some(1_700_000_000_000)
        );
        let draft = prefs.get::<HourlyDraft>().unwrap();
        assert_eq!(draft.duration, 3);
        assert_eq!(draft.staff, 2);
        // missing fields take the form defaults
        assert_eq!(draft.minute, 0);

        // legacy keys are gone
        let keys = prefs.storage().get_preference_keys().unwrap();
        assert!(!keys.iter().any(|k| k == "appTheme" || k == "zalo_name"));
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let prefs = store();
        put_raw(&prefs, &[("appTheme", "sky")]);
        prefs.migrate().unwrap();
        prefs.set_theme("amber").unwrap();

        let again = prefs.migrate().unwrap();
        assert_eq!(again, MigrationReport::default());
        assert_eq!(prefs.get::<Theme>().unwrap(), ThemeName::Amber);
    }

    #[test]
    fn test_migrate_points_history() {
        let prefs = store();
        put_raw(
            &prefs,
            &[(
                "pointsHistory",
                r#"[
                    {"id":2,"phone":"0901234567","name":"Vicky","change":"-20","newTotal":100,"reason":"Điều chỉnh trừ điểm","timestamp":1700000100000},
                    {"id":"history_1","phone":"0907654321","name":"An","change":"+15","newTotal":95,"reason":"Khuyến mãi","time":"14:30 15/10/2025"},
                    {"id":"broken","phone":"0907654321","name":"An","change":"lots","newTotal":0}
                ]"#,
            )],
        );

        let report = prefs.migrate().unwrap();
        assert_eq!(report.points_records, 2);
        let history = prefs.storage().get_points_history().unwrap();
        assert_eq!(history.len(), 2);
        // oldest first by timestamp
        assert_eq!(history[0].change, -20);
        assert_eq!(history[1].change, 15);
        assert_eq!(history[1].new_total, 95);
    }

    #[test]
    fn test_import_legacy_dump() {
        let prefs = store();
        let report = prefs
            .import_legacy(r#"{"appTheme":"neon","is_admin":"true","mystery":"1","lastPointsExport":1700000000000}"#)
            .unwrap();
        assert_eq!(report.migrated, vec!["is_admin", "lastPointsExport"]);
        assert_eq!(report.skipped, vec!["appTheme", "mystery"]);
        assert!(prefs.get::<IsAdmin>().unwrap());
        assert_eq!(
            prefs.get::<LastPointsExport>().unwrap(),
            Some(1_700_000_000_000)
        );
        assert_eq!(prefs.get::<Theme>().unwrap(), ThemeName::Teal);
    }

    #[test]
    fn test_import_rejects_non_object() {
        let prefs = store();
        assert!(matches!(
            prefs.import_legacy("[1,2]"),
            Err(crate::preferences::PreferenceError::InvalidLegacyDump)
        ));
    }
}
