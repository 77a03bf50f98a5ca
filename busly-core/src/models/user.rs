//! User profile and preference records.
//!
//! The backend has grown these records field by field, so every field that
//! has not always been present carries a serde default.

use serde::{Deserialize, Serialize};

/// Email/push notification preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotifications {
    #[serde(default = "enabled")]
    pub booking_confirmations: bool,
    #[serde(default = "enabled")]
    pub departure_reminders: bool,
    #[serde(default)]
    pub promotions: bool,
    #[serde(default = "enabled")]
    pub account_updates: bool,
    #[serde(default = "enabled")]
    pub security_alerts: bool,
    /// SMS channel, only sent by newer backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsNotifications>,
}

fn enabled() -> bool {
    true
}

impl Default for UserNotifications {
    fn default() -> Self {
        Self {
            booking_confirmations: true,
            departure_reminders: true,
            promotions: false,
            account_updates: true,
            security_alerts: true,
            sms: None,
        }
    }
}

impl UserNotifications {
    /// Read a single preference.
    pub fn get(&self, key: NotificationKey) -> bool {
        match key {
            NotificationKey::BookingConfirmations => self.booking_confirmations,
            NotificationKey::DepartureReminders => self.departure_reminders,
            NotificationKey::Promotions => self.promotions,
            NotificationKey::AccountUpdates => self.account_updates,
            NotificationKey::SecurityAlerts => self.security_alerts,
        }
    }

    /// Update a single preference.
    pub fn set(&mut self, key: NotificationKey, value: bool) {
        let slot = match key {
            NotificationKey::BookingConfirmations => &mut self.booking_confirmations,
            NotificationKey::DepartureReminders => &mut self.departure_reminders,
            NotificationKey::Promotions => &mut self.promotions,
            NotificationKey::AccountUpdates => &mut self.account_updates,
            NotificationKey::SecurityAlerts => &mut self.security_alerts,
        };
        *slot = value;
    }
}

/// SMS notification preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsNotifications {
    pub booking_confirmations: bool,
    pub departure_reminders: bool,
    pub promotions: bool,
    pub account_updates: bool,
}

/// Names of the toggleable notification preferences, as the backend spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKey {
    BookingConfirmations,
    DepartureReminders,
    Promotions,
    AccountUpdates,
    SecurityAlerts,
}

impl NotificationKey {
    /// All keys, in display order.
    pub fn all() -> &'static [NotificationKey] {
        &[
            Self::BookingConfirmations,
            Self::DepartureReminders,
            Self::Promotions,
            Self::AccountUpdates,
            Self::SecurityAlerts,
        ]
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookingConfirmations => "booking_confirmations",
            Self::DepartureReminders => "departure_reminders",
            Self::Promotions => "promotions",
            Self::AccountUpdates => "account_updates",
            Self::SecurityAlerts => "security_alerts",
        }
    }
}

impl std::fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privacy preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacySettings {
    /// Let operators contact the traveller directly about a trip.
    pub share_contact_with_operators: bool,
    pub location_based_recommendations: bool,
    pub travel_history_analytics: bool,
    pub marketing_communications: bool,
    pub data_analytics: bool,
    pub emergency_contact_sharing: bool,
}

/// An authenticated user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub is_phone_verified: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub notifications: UserNotifications,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_settings: Option<PrivacySettings>,
}

impl User {
    /// Best human-readable name for greetings.
    pub fn display_name(&self) -> &str {
        if !self.name.trim().is_empty() {
            &self.name
        } else if let Some(first) = self.first_name.as_deref().filter(|s| !s.is_empty()) {
            first
        } else {
            self.email.as_deref().unwrap_or(&self.id)
        }
    }
}

/// A partial update to a [`User`]. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<UserNotifications>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_settings: Option<PrivacySettings>,
}

impl UserPatch {
    /// Whether applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply every present field onto `user`.
    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = Some(email);
        }
        if let Some(phone) = self.phone {
            user.phone = Some(phone);
        }
        if let Some(first_name) = self.first_name {
            user.first_name = Some(first_name);
        }
        if let Some(last_name) = self.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(avatar) = self.avatar {
            user.avatar = Some(avatar);
        }
        if let Some(notifications) = self.notifications {
            user.notifications = notifications;
        }
        if let Some(privacy) = self.privacy_settings {
            user.privacy_settings = Some(privacy);
        }
    }
}
