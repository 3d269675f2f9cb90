//! User profile and settings endpoints.

use reqwest::multipart::Form;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use super::constants::{self, user as paths};
use super::{ApiResult, labels, normalize};
use crate::client::ChatdeskClient;
use crate::error::Error;
use crate::models::PasswordChange;
use crate::transport::{ProgressFn, RequestDescriptor, UPLOAD_TIMEOUT, UploadFile, upload};

pub struct UserApi<'a> {
    client: &'a ChatdeskClient,
}

impl<'a> UserApi<'a> {
    pub(crate) fn new(client: &'a ChatdeskClient) -> Self {
        Self { client }
    }

    pub async fn profile(&self) -> ApiResult {
        normalize(
            labels("Profile loaded", "Failed to load profile"),
            self.client.http().get(paths::PROFILE, None),
        )
        .await
    }

    /// Update the profile and merge the server's answer into the stored
    /// user.
    pub async fn update_profile(&self, profile: Value) -> ApiResult {
        let call = async {
            let data = self.client.http().put(paths::PROFILE, profile).await?;
            self.client.session().update_user(data.clone()).await?;
            Ok::<_, Error>(data)
        };
        normalize(labels("Profile updated", "Failed to update profile"), call).await
    }

    /// Upload a new avatar image (JPEG, PNG, GIF or WebP, at most 5 MB).
    pub async fn upload_avatar(&self, file: &UploadFile) -> ApiResult {
        let call = async {
            let allowed = &self.client.config().upload.allowed_types;
            upload::validate(file, constants::AVATAR_MAX_SIZE, Some(allowed.as_slice()))
                .map_err(image_type_hint)?;

            let progress: ProgressFn =
                Arc::new(|p: u8| debug!(progress = p, "Avatar upload progress"));
            let form = Form::new().part("avatar", upload::file_part(file, Some(progress))?);
            let data = self
                .client
                .http()
                .send(
                    RequestDescriptor::post(paths::AVATAR)
                        .multipart(form)
                        .timeout(UPLOAD_TIMEOUT),
                )
                .await?;

            match data.get("avatarUrl") {
                Some(url) => {
                    self.client
                        .session()
                        .update_user(json!({ "avatar": url }))
                        .await?;
                }
                None => warn!("Avatar upload response has no avatarUrl"),
            }
            Ok::<_, Error>(data)
        };
        normalize(labels("Avatar uploaded", "Avatar upload failed"), call).await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> ApiResult {
        let call = async {
            let body = serde_json::to_value(change)?;
            self.client.http().put(paths::CHANGE_PASSWORD, body).await
        };
        normalize(labels("Password changed", "Failed to change password"), call).await
    }

    pub async fn stats(&self) -> ApiResult {
        normalize(
            labels("Statistics loaded", "Failed to load statistics"),
            self.client.http().get(paths::STATS, None),
        )
        .await
    }

    pub async fn settings(&self) -> ApiResult {
        normalize(
            labels("Settings loaded", "Failed to load settings"),
            self.client.http().get(paths::SETTINGS, None),
        )
        .await
    }

    pub async fn update_settings(&self, settings: Value) -> ApiResult {
        normalize(
            labels("Settings updated", "Failed to update settings"),
            self.client.http().put(paths::SETTINGS, settings),
        )
        .await
    }

    /// Delete the account; the local session is cleared on success.
    pub async fn delete_account(&self, password: &str) -> ApiResult {
        let call = async {
            let data = self
                .client
                .http()
                .delete(paths::DELETE_ACCOUNT, json!({ "password": password }))
                .await?;
            self.client.session().clear().await?;
            Ok::<_, Error>(data)
        };
        normalize(labels("Account deleted", "Failed to delete account"), call).await
    }

    pub async fn check_username(&self, username: &str) -> ApiResult {
        let result = normalize(
            labels("", "Username check failed"),
            self.client
                .http()
                .get(paths::CHECK_USERNAME, Some(&json!({ "username": username }))),
        )
        .await;
        availability(result, "Username is available", "Username is already taken")
    }

    pub async fn check_email(&self, email: &str) -> ApiResult {
        let result = normalize(
            labels("", "Email check failed"),
            self.client
                .http()
                .get(paths::CHECK_EMAIL, Some(&json!({ "email": email }))),
        )
        .await;
        availability(result, "Email is available", "Email is already in use")
    }

    pub async fn activity_log(&self, params: &Value) -> ApiResult {
        normalize(
            labels("Activity log loaded", "Failed to load activity log"),
            self.client.http().get(paths::ACTIVITY_LOG, Some(params)),
        )
        .await
    }
}

/// Spell out the accepted formats when an image has the wrong type.
pub(crate) fn image_type_hint(err: Error) -> Error {
    match err {
        Error::Validation(msg) if msg == "Unsupported file type" => Error::Validation(
            "Unsupported file type, please upload a JPG, PNG, GIF or WebP image".into(),
        ),
        other => other,
    }
}

fn availability(result: ApiResult, free: &str, taken: &str) -> ApiResult {
    let available = result
        .data()
        .and_then(|d| d.get("available"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    result.with_success_message(if available { free } else { taken })
}
