//! Profile and account endpoints.

use super::client::{ApiClient, ApiRequest, ApiResponse};
use super::envelope::{decode_payload, MessageResponse};
use super::error::ApiError;
use crate::models::{NotificationKey, PrivacySettings, UserNotifications, UserPatch};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Data exports are generated on demand and can be slow.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(60);

/// What the profile endpoints send back.
///
/// Endpoints disagree on what they echo, so every field is optional. Success
/// is decided by the HTTP status alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateResponse {
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub notifications: Option<UserNotifications>,
    #[serde(default)]
    pub privacy_settings: Option<PrivacySettings>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProfileUpdateResponse {
    /// The profile fields this response reports, as a patch for the local user.
    pub fn into_patch(self) -> UserPatch {
        UserPatch {
            name: self.name,
            email: self.email,
            phone: self.phone,
            first_name: self.first_name,
            last_name: self.last_name,
            avatar: self.avatar,
            notifications: self.notifications,
            privacy_settings: self.privacy_settings,
        }
    }
}

/// Editable profile fields for [`ProfileService::update_profile`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

fn decode_update(response: ApiResponse) -> Result<ProfileUpdateResponse, ApiError> {
    let response = response.error_for_status()?;
    if response.bytes().iter().all(u8::is_ascii_whitespace) {
        return Ok(ProfileUpdateResponse::default());
    }
    Ok(decode_payload(response.bytes())?)
}

#[derive(Clone)]
pub struct ProfileService {
    client: Arc<ApiClient>,
}

impl ProfileService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    async fn call(&self, request: ApiRequest) -> Result<ProfileUpdateResponse, ApiError> {
        let path = request.path().to_string();
        let response = decode_update(self.client.execute(request).await?)?;
        debug!(path = %path, "Profile request accepted");
        Ok(response)
    }

    pub async fn profile(&self, user_id: &str) -> Result<ProfileUpdateResponse, ApiError> {
        self.call(ApiRequest::get(format!("/profile/{user_id}")))
            .await
    }

    pub async fn edit_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<ProfileUpdateResponse, ApiError> {
        let request =
            ApiRequest::post(format!("/auth/name/edit/{user_id}")).json(&json!({ "name": name }))?;
        self.call(request).await
    }

    pub async fn edit_phone(
        &self,
        user_id: &str,
        phone: &str,
    ) -> Result<ProfileUpdateResponse, ApiError> {
        let request = ApiRequest::post(format!("/auth/phone/edit/{user_id}"))
            .json(&json!({ "phone": phone }))?;
        self.call(request).await
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfileUpdateResponse, ApiError> {
        let request = ApiRequest::put(format!("/profile/{user_id}")).json(update)?;
        self.call(request).await
    }

    pub async fn update_language(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<ProfileUpdateResponse, ApiError> {
        let request = ApiRequest::post(format!("/auth/language/update/{user_id}"))
            .json(&json!({ "language": language }))?;
        self.call(request).await
    }

    /// Toggle one notification preference.
    pub async fn edit_notification(
        &self,
        user_id: &str,
        key: NotificationKey,
        value: bool,
    ) -> Result<ProfileUpdateResponse, ApiError> {
        let mut body = Map::new();
        body.insert("notification_key".to_string(), json!(key.as_str()));
        body.insert(key.as_str().to_string(), json!(value));

        let request = ApiRequest::post(format!("/auth/notifications/update/{user_id}"))
            .json(&Value::Object(body))?;
        self.call(request).await
    }

    pub async fn edit_privacy_settings(
        &self,
        user_id: &str,
        privacy: &PrivacySettings,
    ) -> Result<ProfileUpdateResponse, ApiError> {
        let request = ApiRequest::post("/privacy/update")
            .query("user_id", user_id)
            .json(&json!({ "privacySettings": privacy }))?;
        self.call(request).await
    }

    pub async fn delete_account(
        &self,
        user_id: &str,
        reason: &str,
        feedback: Option<&str>,
    ) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::delete(format!("/profile/{user_id}"))
            .json(&json!({ "reason": reason, "feedback": feedback }))?;
        let response = self.client.execute(request).await?.error_for_status()?;
        if response.bytes().is_empty() {
            return Ok(MessageResponse::default());
        }
        response.payload()
    }

    /// Download the user's data export as raw bytes.
    pub async fn export_user_data(&self, user_id: &str) -> Result<Vec<u8>, ApiError> {
        let request =
            ApiRequest::get(format!("/auth/export-profile-data/{user_id}")).timeout(EXPORT_TIMEOUT);
        let response = self.client.execute(request).await?.error_for_status()?;
        Ok(response.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_lenient_update_response() {
        let response: ProfileUpdateResponse = decode_payload(
            br#"{ "_id": "u1", "phone": "+389", "message": "Phone updated successfully", "extra": 1 }"#,
        )
        .unwrap();
        assert_eq!(response.id.as_deref(), Some("u1"));

        let patch = response.into_patch();
        assert_eq!(patch.phone.as_deref(), Some("+389"));
        assert!(patch.name.is_none());
    }

    #[test]
    fn test_message_only_response_is_an_empty_patch() {
        let response: ProfileUpdateResponse =
            decode_payload(br#"{ "message": "Notification updated successfully" }"#).unwrap();
        assert!(response.id.is_none());
        assert!(response.into_patch().is_empty());
    }

    #[test]
    fn test_empty_body_is_accepted() {
        let response = ApiResponse::for_test(StatusCode::OK, b"");
        assert_eq!(
            decode_update(response).unwrap(),
            ProfileUpdateResponse::default()
        );
    }

    #[test]
    fn test_error_status_is_rejected() {
        let response = ApiResponse::for_test(StatusCode::BAD_REQUEST, br#"{"message":"bad"}"#);
        let err = decode_update(response).unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.server_message().as_deref(), Some("bad"));
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            first_name: Some("Ana".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "firstName": "Ana" })
        );
    }
}
