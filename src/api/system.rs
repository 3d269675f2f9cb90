//! System information, feedback and client-side logging endpoints.

use serde_json::{Value, json};
use tracing::error;

use super::constants::system as paths;
use super::{ApiResult, labels, normalize};
use crate::client::ChatdeskClient;

/// Sent as `userAgent` with reported errors.
const CLIENT_AGENT: &str = concat!("chatdesk/", env!("CARGO_PKG_VERSION"));

pub struct SystemApi<'a> {
    client: &'a ChatdeskClient,
}

impl<'a> SystemApi<'a> {
    pub(crate) fn new(client: &'a ChatdeskClient) -> Self {
        Self { client }
    }

    pub async fn info(&self) -> ApiResult {
        normalize(
            labels("System info loaded", "Failed to load system info"),
            self.client.http().get(paths::INFO, None),
        )
        .await
    }

    pub async fn health(&self) -> ApiResult {
        normalize(
            labels("Health check passed", "Health check failed"),
            self.client.http().get(paths::HEALTH, None),
        )
        .await
    }

    pub async fn config(&self) -> ApiResult {
        normalize(
            labels("System config loaded", "Failed to load system config"),
            self.client.http().get(paths::CONFIG, None),
        )
        .await
    }

    pub async fn submit_feedback(&self, feedback: Value) -> ApiResult {
        normalize(
            labels("Feedback submitted", "Failed to submit feedback"),
            self.client.http().post(paths::FEEDBACK, feedback),
        )
        .await
    }

    pub async fn submit_contact(&self, contact: Value) -> ApiResult {
        normalize(
            labels("Contact details submitted", "Failed to submit contact details"),
            self.client.http().post(paths::CONTACT, contact),
        )
        .await
    }

    pub async fn version(&self) -> ApiResult {
        normalize(
            labels("Version info loaded", "Failed to load version info"),
            self.client.http().get(paths::VERSION, None),
        )
        .await
    }

    pub async fn check_update(&self) -> ApiResult {
        let result = normalize(
            labels("", "Update check failed"),
            self.client.http().get(paths::CHECK_UPDATE, None),
        )
        .await;
        let has_update = result
            .data()
            .and_then(|d| d.get("hasUpdate"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        result.with_success_message(if has_update {
            "A new version is available"
        } else {
            "Already up to date"
        })
    }

    pub async fn announcements(&self, params: &Value) -> ApiResult {
        normalize(
            labels("Announcements loaded", "Failed to load announcements"),
            self.client.http().get(paths::ANNOUNCEMENTS, Some(params)),
        )
        .await
    }

    /// Help documents, optionally narrowed to a category.
    pub async fn help(&self, category: &str) -> ApiResult {
        normalize(
            labels("Help documents loaded", "Failed to load help documents"),
            self.client
                .http()
                .get(paths::HELP, Some(&json!({ "category": category }))),
        )
        .await
    }

    pub async fn faq(&self, keyword: &str) -> ApiResult {
        normalize(
            labels("FAQ loaded", "Failed to load FAQ"),
            self.client
                .http()
                .get(paths::FAQ, Some(&json!({ "keyword": keyword }))),
        )
        .await
    }

    pub async fn log_action(&self, action: Value) -> ApiResult {
        normalize(
            labels("Action recorded", "Failed to record action"),
            self.client.http().post(paths::LOG_ACTION, action),
        )
        .await
    }

    /// Report a client error. A timestamp and the client agent are added;
    /// a failure to report is only logged.
    pub async fn log_error(&self, report: Value) -> ApiResult {
        let mut body = match report {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("error".to_string(), other);
                map
            }
        };
        body.insert(
            "timestamp".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        body.insert("userAgent".to_string(), Value::String(CLIENT_AGENT.to_string()));

        let result = normalize(
            labels("Error recorded", "Failed to record error"),
            self.client.http().post(paths::LOG_ERROR, Value::Object(body)),
        )
        .await;
        if let Some(e) = result.error() {
            error!(error = e, "Failed to report client error");
        }
        result
    }

    pub async fn stats(&self, params: &Value) -> ApiResult {
        normalize(
            labels("System statistics loaded", "Failed to load system statistics"),
            self.client.http().get(paths::STATS, Some(params)),
        )
        .await
    }
}
