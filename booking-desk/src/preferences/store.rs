//! PreferenceStore - 类型化偏好读写

use super::keys::{
    BANNER_SLOTS, BannerImages, IsAdmin, ManualAdminOverride, PreferenceKey, Profile,
    SessionProfile, Theme, ThemeName,
};
use super::legacy::{self, MigrationReport};
use crate::store::{DeskStorage, SCHEMA_VERSION_KEY, StorageError};
use redb::WriteTransaction;
use shared::error::{AppError, ErrorCode};
use std::collections::BTreeMap;
use thiserror::Error;

/// Typed keys (v2). v1 is the flat legacy key layout.
pub const CURRENT_SCHEMA_VERSION: u64 = 2;

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Banner slot must be 0..2, got {slot}")]
    InvalidBannerSlot { slot: usize },

    #[error("Unknown theme: {0}")]
    UnknownTheme(String),

    #[error("Legacy dump must be a JSON object of key/value pairs")]
    InvalidLegacyDump,
}

pub type PreferenceResult<T> = Result<T, PreferenceError>;

impl From<PreferenceError> for AppError {
    fn from(err: PreferenceError) -> Self {
        match err {
            PreferenceError::Storage(e) => AppError::storage(e.to_string()),
            PreferenceError::Serialization(e) => AppError::internal(e.to_string()),
            e @ PreferenceError::InvalidBannerSlot { .. } => {
                AppError::with_message(ErrorCode::InvalidBannerSlot, e.to_string())
            }
            PreferenceError::UnknownTheme(theme) => {
                AppError::new(ErrorCode::UnknownTheme).with_detail("theme", theme)
            }
            e @ PreferenceError::InvalidLegacyDump => {
                AppError::with_message(ErrorCode::UnsupportedSchema, e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    storage: DeskStorage,
}

impl PreferenceStore {
    pub fn new(storage: DeskStorage) -> Self {
        Self { storage }
    }

    /// Value of `K`, or its default when absent or undecodable
    pub fn get<K: PreferenceKey>(&self) -> PreferenceResult<K::Value> {
        let Some(raw) = self.storage.get_preference(K::KEY)? else {
            return Ok(K::default_value());
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(key = K::KEY, error = %e, "Undecodable preference, using default");
                Ok(K::default_value())
            }
        }
    }

    pub fn set<K: PreferenceKey>(&self, value: &K::Value) -> PreferenceResult<()> {
        let txn = self.storage.begin_write()?;
        self.set_txn::<K>(&txn, value)?;
        txn.commit().map_err(StorageError::from)?;
        tracing::debug!(key = K::KEY, "Preference saved");
        Ok(())
    }

    /// Write within a caller's transaction
    pub fn set_txn<K: PreferenceKey>(
        &self,
        txn: &WriteTransaction,
        value: &K::Value,
    ) -> PreferenceResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.storage.put_preference(txn, K::KEY, &bytes)?;
        Ok(())
    }

    /// Back to the default
    pub fn clear<K: PreferenceKey>(&self) -> PreferenceResult<()> {
        let txn = self.storage.begin_write()?;
        self.storage.remove_preference(&txn, K::KEY)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    /// Raw JSON of every stored key
    pub fn dump(&self) -> PreferenceResult<BTreeMap<String, serde_json::Value>> {
        let mut out = BTreeMap::new();
        for key in self.storage.get_preference_keys()? {
            if let Some(raw) = self.storage.get_preference(&key)? {
                let value = serde_json::from_slice(&raw)
                    .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&raw).into()));
                out.insert(key, value);
            }
        }
        Ok(out)
    }

    // ========== UI ==========

    pub fn set_theme(&self, name: &str) -> PreferenceResult<ThemeName> {
        let theme: ThemeName = name.parse().map_err(PreferenceError::UnknownTheme)?;
        self.set::<Theme>(&theme)?;
        crate::audit_log!("theme_changed", theme = theme.as_str());
        Ok(theme)
    }

    pub fn set_banner(&self, slot: usize, data_uri: impl Into<String>) -> PreferenceResult<()> {
        self.update_banner(slot, Some(data_uri.into()))
    }

    pub fn clear_banner(&self, slot: usize) -> PreferenceResult<()> {
        self.update_banner(slot, None)
    }

    fn update_banner(&self, slot: usize, value: Option<String>) -> PreferenceResult<()> {
        if slot >= BANNER_SLOTS {
            return Err(PreferenceError::InvalidBannerSlot { slot });
        }
        let mut banners = self.get::<BannerImages>()?;
        let set = value.is_some();
        banners[slot] = value;
        self.set::<BannerImages>(&banners)?;
        crate::audit_log!("banner_updated", slot = slot, set = set);
        Ok(())
    }

    // ========== Session ==========

    pub fn profile(&self) -> PreferenceResult<SessionProfile> {
        self.get::<Profile>()
    }

    /// Store the logged-in user and forget the previous admin result
    pub fn sign_in(&self, profile: &SessionProfile) -> PreferenceResult<()> {
        let txn = self.storage.begin_write()?;
        self.set_txn::<Profile>(&txn, profile)?;
        self.set_txn::<IsAdmin>(&txn, &false)?;
        txn.commit().map_err(StorageError::from)?;
        tracing::info!(user_id = %profile.user_id, "Session profile saved");
        Ok(())
    }

    pub fn sign_out(&self) -> PreferenceResult<()> {
        let txn = self.storage.begin_write()?;
        self.storage.remove_preference(&txn, Profile::KEY)?;
        self.storage.remove_preference(&txn, IsAdmin::KEY)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    /// Decide admin from the profile phone and the manual override, and
    /// remember the result in `session.is_admin`
    pub fn resolve_admin(&self, admin_phones: &[String]) -> PreferenceResult<bool> {
        let profile = self.profile()?;
        let by_phone = !profile.phone.trim().is_empty()
            && phone_variants(&profile.phone)
                .iter()
                .any(|v| admin_phones.iter().any(|a| a.trim() == v));
        let is_admin = by_phone || self.get::<ManualAdminOverride>()?;
        self.set::<IsAdmin>(&is_admin)?;
        tracing::info!(phone = %profile.phone, by_phone, is_admin, "Admin check");
        Ok(is_admin)
    }

    // ========== Schema ==========

    /// Stored schema version (1 when never migrated)
    pub fn schema_version(&self) -> PreferenceResult<u64> {
        Ok(self.storage.get_meta(SCHEMA_VERSION_KEY)?.unwrap_or(1))
    }

    /// Upgrade legacy flat keys to typed keys. No-op once at the current version.
    pub fn migrate(&self) -> PreferenceResult<MigrationReport> {
        let version = self.schema_version()?;
        if version >= CURRENT_SCHEMA_VERSION {
            return Ok(MigrationReport::default());
        }

        let mut entries = BTreeMap::new();
        for key in legacy::LEGACY_KEYS {
            if let Some(raw) = self.storage.get_preference(key)? {
                entries.insert(key.to_string(), String::from_utf8_lossy(&raw).into_owned());
            }
        }

        let txn = self.storage.begin_write()?;
        let report = legacy::apply(self, &txn, &entries)?;
        for key in legacy::LEGACY_KEYS {
            self.storage.remove_preference(&txn, key)?;
        }
        self.storage
            .set_meta(&txn, SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            from = version,
            to = CURRENT_SCHEMA_VERSION,
            migrated = report.migrated.len(),
            points_records = report.points_records,
            "Preferences migrated"
        );
        Ok(report)
    }

    /// Import a legacy key/value dump (a JSON object as exported from the
    /// mini app's storage)
    pub fn import_legacy(&self, json: &str) -> PreferenceResult<MigrationReport> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(map) = value else {
            return Err(PreferenceError::InvalidLegacyDump);
        };
        let entries: BTreeMap<String, String> = map
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();

        let txn = self.storage.begin_write()?;
        let report = legacy::apply(self, &txn, &entries)?;
        txn.commit().map_err(StorageError::from)?;

        crate::audit_log!(
            "legacy_preferences_imported",
            migrated = report.migrated.len(),
            skipped = report.skipped.len(),
            points_records = report.points_records,
        );
        Ok(report)
    }

    pub(crate) fn storage(&self) -> &DeskStorage {
        &self.storage
    }
}

/// `0…`, `+84…` and `84…` spellings of one number
pub fn phone_variants(phone: &str) -> Vec<String> {
    let phone: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    let national = if let Some(rest) = phone.strip_prefix("+84") {
        format!("0{}", rest)
    } else if let Some(rest) = phone.strip_prefix("84").filter(|r| r.len() >= 9) {
        format!("0{}", rest)
    } else {
        phone.clone()
    };

    let mut variants = vec![phone.clone(), national.clone()];
    if let Some(rest) = national.strip_prefix('0') {
        variants.push(format!("+84{}", rest));
        variants.push(format!("84{}", rest));
    }
    variants.dedup();
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::keys::{LastPointsExport, ThemeColor};

    fn store() -> PreferenceStore {
        PreferenceStore::new(DeskStorage::open_in_memory().unwrap())
    }

    #[test]
    fn test_defaults_when_absent() {
        let prefs = store();
        assert_eq!(prefs.get::<Theme>().unwrap(), ThemeName::Teal);
        assert_eq!(prefs.get::<ThemeColor>().unwrap(), "#91eae4");
        assert_eq!(prefs.get::<LastPointsExport>().unwrap(), None);
        assert!(!prefs.get::<IsAdmin>().unwrap());
    }

    #[test]
    fn test_undecodable_value_falls_back_to_default() {
        let prefs = store();
        let txn = prefs.storage().begin_write().unwrap();
        prefs
            .storage()
            .put_preference(&txn, Theme::KEY, b"not json")
            .unwrap();
        txn.commit().unwrap();
        assert_eq!(prefs.get::<Theme>().unwrap(), ThemeName::Teal);
    }

    #[test]
    fn test_set_theme() {
        let prefs = store();
        assert_eq!(prefs.set_theme("purple").unwrap(), ThemeName::Purple);
        assert_eq!(prefs.get::<Theme>().unwrap(), ThemeName::Purple);
        assert!(matches!(
            prefs.set_theme("neon"),
            Err(PreferenceError::UnknownTheme(t)) if t == "neon"
        ));
        assert_eq!(prefs.get::<Theme>().unwrap(), ThemeName::Purple);
    }

    #[test]
    fn test_banner_slots() {
        let prefs = store();
        prefs.set_banner(1, "data:image/png;base64,AAAA").unwrap();
        let banners = prefs.get::<BannerImages>().unwrap();
        assert_eq!(banners[0], None);
        assert_eq!(banners[1].as_deref(), Some("data:image/png;base64,AAAA"));

        prefs.clear_banner(1).unwrap();
        assert_eq!(prefs.get::<BannerImages>().unwrap(), [None, None, None]);

        assert!(matches!(
            prefs.set_banner(3, "x"),
            Err(PreferenceError::InvalidBannerSlot { slot: 3 })
        ));
    }

    #[test]
    fn test_clear_restores_default() {
        let prefs = store();
        prefs.set::<ThemeColor>(&"#000000".to_string()).unwrap();
        prefs.clear::<ThemeColor>().unwrap();
        assert_eq!(prefs.get::<ThemeColor>().unwrap(), "#91eae4");
    }

    #[test]
    fn test_phone_variants() {
        let v = phone_variants("0909123456");
        assert!(v.contains(&"0909123456".to_string()));
        assert!(v.contains(&"+84909123456".to_string()));
        assert!(v.contains(&"84909123456".to_string()));

        let v = phone_variants("+84909123456");
        assert!(v.contains(&"0909123456".to_string()));
    }

    #[test]
    fn test_resolve_admin_by_phone_variant() {
        let prefs = store();
        let admins = vec!["0909123456".to_string()];
        prefs
            .sign_in(&SessionProfile {
                user_id: "u1".into(),
                name: "Chủ tiệm".into(),
                avatar: String::new(),
                phone: "+84909123456".into(),
            })
            .unwrap();
        assert!(prefs.resolve_admin(&admins).unwrap());
        assert!(prefs.get::<IsAdmin>().unwrap());
    }

    #[test]
    fn test_resolve_admin_manual_override() {
        let prefs = store();
        let admins = vec!["0909123456".to_string()];
        prefs
            .sign_in(&SessionProfile {
                phone: "0901234567".into(),
                ..Default::default()
            })
            .unwrap();
        assert!(!prefs.resolve_admin(&admins).unwrap());

        prefs.set::<ManualAdminOverride>(&true).unwrap();
        assert!(prefs.resolve_admin(&admins).unwrap());
    }

    #[test]
    fn test_fresh_store_migrates_to_current() {
        let prefs = store();
        assert_eq!(prefs.schema_version().unwrap(), 1);
        let report = prefs.migrate().unwrap();
        assert!(report.migrated.is_empty());
        assert_eq!(prefs.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
