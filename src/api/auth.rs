//! Authentication endpoints.

use serde_json::{Value, json};
use tracing::{info, warn};

use super::constants::auth as paths;
use super::{ApiResult, from_result, labels, normalize};
use crate::client::ChatdeskClient;
use crate::error::{Error, Result};
use crate::models::Credentials;

/// Login, logout, registration and account recovery.
pub struct AuthApi<'a> {
    client: &'a ChatdeskClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ChatdeskClient) -> Self {
        Self { client }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.client.http().post(path, body).await
    }

    /// Log in. When the response carries a string `token`, the token, user
    /// and logged-in flag are stored; otherwise the session is left alone.
    pub async fn login(&self, credentials: &Credentials) -> ApiResult {
        let call = async {
            let body = serde_json::to_value(credentials)?;
            let data = self.post(paths::LOGIN, body).await?;

            if let Some(token) = data.get("token").and_then(Value::as_str) {
                let user = data.get("user").cloned().filter(|u| !u.is_null());
                self.client.session().establish(token, user).await?;
                self.client.unauthorized().rearm();
                info!(username = %credentials.username, "Logged in");
            }
            Ok::<_, Error>(data)
        };
        normalize(labels("Login successful", "Login failed"), call).await
    }

    /// Log out on the server. Local state is cleared whatever the server
    /// says.
    pub async fn logout(&self) -> ApiResult {
        let result = self.post(paths::LOGOUT, Value::Null).await;
        if let Err(e) = self.client.session().clear().await {
            warn!(error = %e, "Failed to clear stored session on logout");
        }
        info!("Logged out");
        from_result(labels("Logout successful", "Logout failed"), result)
    }

    pub async fn register(&self, user: Value) -> ApiResult {
        normalize(
            labels("Registration successful", "Registration failed"),
            self.post(paths::REGISTER, user),
        )
        .await
    }

    /// Exchange the current token for a new one and store it.
    pub async fn refresh_token(&self) -> ApiResult {
        let call = async {
            let data = self.post(paths::REFRESH_TOKEN, Value::Null).await?;
            match data.get("token").and_then(Value::as_str) {
                Some(token) => self.client.session().set_token(token).await?,
                None => return Err(Error::Decode("refresh response has no token".into())),
            }
            Ok::<_, Error>(data)
        };
        normalize(labels("Token refreshed", "Token refresh failed"), call).await
    }

    pub async fn forgot_password(&self, email: &str) -> ApiResult {
        normalize(
            labels("Password reset email sent", "Failed to send password reset email"),
            self.post(paths::FORGOT_PASSWORD, json!({ "email": email })),
        )
        .await
    }

    pub async fn reset_password(&self, reset: Value) -> ApiResult {
        normalize(
            labels("Password reset successful", "Password reset failed"),
            self.post(paths::RESET_PASSWORD, reset),
        )
        .await
    }

    pub async fn verify_email(&self, token: &str) -> ApiResult {
        normalize(
            labels("Email verified", "Email verification failed"),
            self.post(paths::VERIFY_EMAIL, json!({ "token": token })),
        )
        .await
    }

    pub async fn send_verification_code(&self, request: Value) -> ApiResult {
        normalize(
            labels("Verification code sent", "Failed to send verification code"),
            self.post(paths::SEND_CODE, request),
        )
        .await
    }

    /// Logged-in flag set and the stored token unexpired.
    pub async fn is_logged_in(&self) -> bool {
        self.client.session().is_logged_in().await
    }

    /// Stored token present and unexpired.
    pub async fn is_token_valid(&self) -> bool {
        self.client.session().is_valid().await
    }

    pub async fn current_user(&self) -> Option<Value> {
        self.client.session().user().await
    }
}
