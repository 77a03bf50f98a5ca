//! Application settings for Busly.
//!
//! Settings are persisted to the SQLite database as JSON.

use serde::{Deserialize, Serialize};

// =============================================================================
// Language Selection
// =============================================================================

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    De,
    It,
    Sq,
    Mk,
}

impl Language {
    /// Get all available languages.
    pub fn all() -> &'static [Language] {
        &[Self::En, Self::De, Self::It, Self::Sq, Self::Mk]
    }

    /// ISO 639-1 code sent to the backend.
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
            Self::It => "it",
            Self::Sq => "sq",
            Self::Mk => "mk",
        }
    }

    /// Name of the language in the language itself.
    pub fn native_name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::De => "Deutsch",
            Self::It => "Italiano",
            Self::Sq => "Shqip",
            Self::Mk => "Македонски",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.native_name())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown language: {}", s))
    }
}

// =============================================================================
// Currency Selection
// =============================================================================

/// Currency codes offered for fare display.
pub const SUPPORTED_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "SEK", "NOK",
];

/// Currency used when none is selected.
pub const DEFAULT_CURRENCY: &str = "USD";

// =============================================================================
// Application Settings
// =============================================================================

/// Application settings - persisted to database as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Interface language.
    #[serde(default)]
    pub language: Language,

    /// Currency code for fares (one of [`SUPPORTED_CURRENCIES`]).
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Backend base URL override. The environment still wins over this.
    #[serde(default)]
    pub api_base_url: Option<String>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            currency: default_currency(),
            api_base_url: None,
        }
    }
}

impl Settings {
    const KEY: &'static str = "settings";

    /// Load settings from database, using defaults for missing values.
    ///
    /// If settings don't exist or can't be parsed, returns defaults.
    pub fn load(db: &crate::db::Database) -> Self {
        let mut settings = Self::default();

        if let Ok(Some(json)) = db.get_setting(Self::KEY) {
            match serde_json::from_str::<Settings>(&json) {
                Ok(loaded) => settings = loaded,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse settings, using defaults");
                }
            }
        }

        settings.validate();
        settings
    }

    /// Save settings to database.
    pub fn save(&self, db: &crate::db::Database) -> anyhow::Result<()> {
        let json = serde_json::to_string(self)?;
        db.set_setting(Self::KEY, &json)?;
        Ok(())
    }

    /// Coerce out-of-range values back to defaults.
    pub fn validate(&mut self) {
        self.currency = self.currency.trim().to_ascii_uppercase();
        if !SUPPORTED_CURRENCIES.contains(&self.currency.as_str()) {
            self.currency = default_currency();
        }

        if self
            .api_base_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            self.api_base_url = None;
        }
    }
}
