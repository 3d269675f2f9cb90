//! Endpoint groups and the normalized result they all return.
//!
//! Every wrapper resolves to an [`ApiResult`]; no error escapes a wrapper.

pub mod auth;
pub mod chat;
pub mod constants;
pub mod file;
pub mod system;
pub mod user;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use std::future::Future;
use tracing::debug;

use crate::error::Result;

pub use auth::AuthApi;
pub use chat::ChatApi;
pub use file::FileApi;
pub use system::SystemApi;
pub use user::UserApi;

/// Normalized outcome of an API call.
///
/// Serializes as `{"success": true, "data": .., "message": ..}` or
/// `{"success": false, "error": .., "message": ..}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T = Value> {
    Success { data: T, message: String },
    /// `error` is the technical text, `message` the endpoint's label.
    Failure { error: String, message: String },
}

impl<T> ApiResult<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self::Success {
            data,
            message: message.into(),
        }
    }

    pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            Self::Success { data, message } => ApiResult::Success {
                data: f(data),
                message,
            },
            Self::Failure { error, message } => ApiResult::Failure { error, message },
        }
    }

    /// Replace the label of a success.
    pub fn with_success_message(self, message: impl Into<String>) -> Self {
        match self {
            Self::Success { data, .. } => Self::Success {
                data,
                message: message.into(),
            },
            failure => failure,
        }
    }
}

impl<T: Serialize> Serialize for ApiResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ApiResult", 3)?;
        match self {
            Self::Success { data, message } => {
                s.serialize_field("success", &true)?;
                s.serialize_field("data", data)?;
                s.serialize_field("message", message)?;
            }
            Self::Failure { error, message } => {
                s.serialize_field("success", &false)?;
                s.serialize_field("error", error)?;
                s.serialize_field("message", message)?;
            }
        }
        s.end()
    }
}

/// User-facing labels for the two outcomes of an endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    pub ok: &'static str,
    pub failed: &'static str,
}

pub(crate) const fn labels(ok: &'static str, failed: &'static str) -> Labels {
    Labels { ok, failed }
}

/// Await `call` and fold its outcome into an [`ApiResult`].
pub async fn normalize<T, F>(labels: Labels, call: F) -> ApiResult<T>
where
    F: Future<Output = Result<T>>,
{
    from_result(labels, call.await)
}

pub(crate) fn from_result<T>(labels: Labels, result: Result<T>) -> ApiResult<T> {
    match result {
        Ok(data) => ApiResult::success(data, labels.ok),
        Err(e) => {
            debug!(error = %e, label = labels.failed, "API call failed");
            ApiResult::failure(e.to_string(), labels.failed)
        }
    }
}
