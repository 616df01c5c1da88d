//! 偏好 / 会话存储
//!
//! Typed keys with defaults over the `preferences` table, plus the one-time
//! migration from the mini app's flat key layout.

pub mod keys;
pub mod legacy;
pub mod store;

pub use keys::{
    ALL_KEYS, BANNER_SLOTS, BannerImages, Banners, HourlyDraft, IsAdmin, LastPointsExport,
    LastPointsReminder, ManualAdminOverride, OtherDraft, PreferenceKey, Profile, SessionProfile,
    Theme, ThemeColor, ThemeName,
};
pub use legacy::MigrationReport;
pub use store::{
    CURRENT_SCHEMA_VERSION, PreferenceError, PreferenceResult, PreferenceStore, phone_variants,
};
