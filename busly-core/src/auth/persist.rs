//! Versioned on-disk copy of the signed-in user's profile.
//!
//! The profile is stored next to the tokens so the app can show the user
//! before the network is reachable. Older records are upgraded on read.

use super::secure_store::{SecureStore, StorageError};
use crate::models::User;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

pub const PROFILE_KEY: &str = "auth_session";

/// Current record layout.
///
/// Version 1 stored the user with an `id` key and without notification
/// preferences; version 2 uses the backend's `_id` and always carries them.
pub const CURRENT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct StoredProfile {
    version: u32,
    user: Value,
}

/// Bring a stored user object up to [`CURRENT_VERSION`].
fn migrate_user(version: u32, mut user: Map<String, Value>) -> Map<String, Value> {
    if version < 2 {
        if !user.contains_key("_id") {
            if let Some(id) = user.remove("id") {
                user.insert("_id".to_string(), id);
            }
        }
        if !user.get("notifications").is_some_and(Value::is_object) {
            user.remove("notifications");
        }
    }
    user
}

/// Load the persisted profile, or `None` if nothing usable is stored.
pub fn load_profile(store: &dyn SecureStore) -> Option<User> {
    let raw = match store.get_item(PROFILE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "Failed to read persisted profile");
            return None;
        }
    };

    // Records written before versioning are a bare user object.
    let stored = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(obj)) if obj.contains_key("version") => {
            serde_json::from_value::<StoredProfile>(Value::Object(obj)).ok()
        }
        Ok(Value::Object(obj)) => Some(StoredProfile {
            version: 1,
            user: Value::Object(obj),
        }),
        _ => None,
    };

    let Some(StoredProfile {
        version,
        user: Value::Object(user),
    }) = stored
    else {
        warn!("Persisted profile is corrupt, ignoring");
        return None;
    };

    if version > CURRENT_VERSION {
        warn!(version, "Persisted profile is from a newer release, ignoring");
        return None;
    }
    if version < CURRENT_VERSION {
        info!(from = version, to = CURRENT_VERSION, "Upgrading persisted profile");
    }

    match serde_json::from_value::<User>(Value::Object(migrate_user(version, user))) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(error = %e, "Persisted profile does not match the user schema");
            None
        }
    }
}

/// Persist `user` at the current version.
pub fn save_profile(store: &dyn SecureStore, user: &User) -> Result<(), StorageError> {
    let record = StoredProfile {
        version: CURRENT_VERSION,
        user: serde_json::to_value(user)?,
    };
    store.set_item(PROFILE_KEY, &serde_json::to_string(&record)?)
}

pub fn clear_profile(store: &dyn SecureStore) -> Result<(), StorageError> {
    store.delete_item(PROFILE_KEY)
}
