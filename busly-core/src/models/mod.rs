//! Backend data records.
//!
//! This module provides:
//! - `User` with notification and privacy preferences
//! - `Station` with optional coordinates

mod station;
mod user;

pub use station::{GeoPoint, Location, Station};
pub use user::{
    NotificationKey, PrivacySettings, SmsNotifications, User, UserNotifications, UserPatch,
};
