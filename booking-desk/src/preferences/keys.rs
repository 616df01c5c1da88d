//! 偏好键定义
//!
//! Every key knows its storage name, value type and default. Values are
//! stored as JSON under the key name.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::models::{HourlyBookingForm, OtherBookingForm};
use std::fmt;
use std::str::FromStr;

/// Number of home-screen banner slots
pub const BANNER_SLOTS: usize = 3;

/// Default accent colour of the mini app
pub const DEFAULT_THEME_COLOR: &str = "#91eae4";

/// A typed preference key
pub trait PreferenceKey {
    /// Storage key
    const KEY: &'static str;
    type Value: Serialize + DeserializeOwned;

    fn default_value() -> Self::Value;
}

macro_rules! preference_key {
    ($(#[$doc:meta])* $name:ident, $key:literal, $value:ty, $default:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl PreferenceKey for $name {
            const KEY: &'static str = $key;
            type Value = $value;

            fn default_value() -> Self::Value {
                $default
            }
        }
    };
}

/// Logged-in user as reported by the platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionProfile {
    pub user_id: String,
    pub name: String,
    pub avatar: String,
    pub phone: String,
}

impl SessionProfile {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_empty() && self.name.is_empty() && self.phone.is_empty()
    }
}

/// Colour theme of the mini app
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Teal,
    Rose,
    Purple,
    Amber,
    Emerald,
    Sky,
}

impl ThemeName {
    pub const ALL: [ThemeName; 6] = [
        ThemeName::Teal,
        ThemeName::Rose,
        ThemeName::Purple,
        ThemeName::Amber,
        ThemeName::Emerald,
        ThemeName::Sky,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teal => "teal",
            Self::Rose => "rose",
            Self::Purple => "purple",
            Self::Amber => "amber",
            Self::Emerald => "emerald",
            Self::Sky => "sky",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Teal => "Teal Ocean",
            Self::Rose => "Rose Garden",
            Self::Purple => "Purple Dream",
            Self::Amber => "Golden Sunset",
            Self::Emerald => "Emerald Forest",
            Self::Sky => "Sky Blue",
        }
    }

    pub fn primary_color(&self) -> &'static str {
        match self {
            Self::Teal => "#4fd1c7",
            Self::Rose => "#fb7185",
            Self::Purple => "#a78bfa",
            Self::Amber => "#fbbf24",
            Self::Emerald => "#34d399",
            Self::Sky => "#0ea5e9",
        }
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| s.to_string())
    }
}

/// Banner data-URIs, one per slot
pub type Banners = [Option<String>; BANNER_SLOTS];

preference_key!(
    /// `session.profile`
    Profile,
    "session.profile",
    SessionProfile,
    SessionProfile::default()
);
preference_key!(
    /// `session.is_admin`, result of the last admin check
    IsAdmin,
    "session.is_admin",
    bool,
    false
);
preference_key!(Theme, "ui.theme", ThemeName, ThemeName::Teal);
preference_key!(BannerImages, "ui.banners", Banners, Default::default());
preference_key!(
    ThemeColor,
    "ui.theme_color",
    String,
    DEFAULT_THEME_COLOR.to_string()
);
preference_key!(
    HourlyDraft,
    "drafts.hourly",
    HourlyBookingForm,
    HourlyBookingForm::default()
);
preference_key!(
    OtherDraft,
    "drafts.other",
    OtherBookingForm,
    OtherBookingForm::default()
);
preference_key!(
    /// Treat the current user as admin regardless of phone
    ManualAdminOverride,
    "override.manual_admin",
    bool,
    false
);
preference_key!(
    /// Unix millis of the last acknowledged points reminder
    LastPointsReminder,
    "points.last_reminder",
    Option<i64>,
    None
);
preference_key!(
    /// Unix millis of the last points history export
    LastPointsExport,
    "points.last_export",
    Option<i64>,
    None
);

/// Every typed key, for listing
pub const ALL_KEYS: [&str; 10] = [
    Profile::KEY,
    IsAdmin::KEY,
    Theme::KEY,
    BannerImages::KEY,
    ThemeColor::KEY,
    HourlyDraft::KEY,
    OtherDraft::KEY,
    ManualAdminOverride::KEY,
    LastPointsReminder::KEY,
    LastPointsExport::KEY,
];
