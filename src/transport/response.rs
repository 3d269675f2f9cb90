//! Response-phase normalization: envelope unwrapping and error
//! classification.
//!
//! The backend wraps every JSON payload as `{ code, message, data }`. Codes
//! `0` and `200` both mean success.

use serde_json::Value;

use crate::error::{Error, Result};

const UNAUTHORIZED: &str = "Unauthorized access";
const FORBIDDEN: &str = "Access forbidden";
const NOT_FOUND: &str = "The requested resource does not exist";
const SERVER_ERROR: &str = "Internal server error";

/// Decoded `{ code, message, data }` wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub code: Option<i64>,
    pub message: Option<String>,
    pub data: Value,
}

impl Envelope {
    /// Read the envelope fields out of a JSON body. Non-object bodies yield
    /// an envelope with no code.
    pub fn from_value(body: Value) -> Self {
        let Value::Object(mut map) = body else {
            return Self {
                code: None,
                message: None,
                data: body,
            };
        };
        let code = map.get("code").and_then(code_of);
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        let data = map.remove("data").unwrap_or(Value::Null);
        Self {
            code,
            message,
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        is_success_code(self.code)
    }
}

fn code_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `0` and `200` are both success codes.
pub fn is_success_code(code: Option<i64>) -> bool {
    matches!(code, Some(0) | Some(200))
}

/// Default text for a non-success business code.
pub fn business_message(code: i64) -> &'static str {
    match code {
        401 => UNAUTHORIZED,
        403 => FORBIDDEN,
        404 => NOT_FOUND,
        c if c >= 500 => SERVER_ERROR,
        _ => "Request failed",
    }
}

/// Unwrap a 2xx body: the envelope's `data` on success, a business error
/// otherwise. The server's `message` wins over the default text.
pub fn unwrap_envelope(body: Value) -> Result<Value> {
    let envelope = Envelope::from_value(body);
    match envelope.code {
        None => Err(Error::Decode("response envelope has no code".into())),
        Some(_) if envelope.is_success() => Ok(envelope.data),
        Some(code) => Err(Error::Business {
            code,
            message: envelope
                .message
                .unwrap_or_else(|| business_message(code).to_string()),
        }),
    }
}

/// Classify a non-2xx response.
///
/// `body` is the decoded JSON body when there was one. The server message
/// is used for 400 and for statuses without a fixed text.
pub fn classify_status(status: u16, body: Option<&Value>) -> Error {
    let server_message = body
        .and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let message = match status {
        400 => server_message.unwrap_or_else(|| "Invalid request parameters".to_string()),
        401 => UNAUTHORIZED.to_string(),
        403 => FORBIDDEN.to_string(),
        404 => NOT_FOUND.to_string(),
        408 => "Request timed out".to_string(),
        429 => "Too many requests, please try again later".to_string(),
        500 => SERVER_ERROR.to_string(),
        502 => "Bad gateway".to_string(),
        503 => "Service temporarily unavailable".to_string(),
        504 => "Gateway timeout".to_string(),
        _ => server_message.unwrap_or_else(|| format!("Request failed ({})", status)),
    };
    Error::Http { status, message }
}

/// Whether a response must trigger the unauthorized handler: HTTP 401, or an
/// envelope carrying code 401 under any status.
pub fn is_unauthorized(status: u16, body: Option<&Value>) -> bool {
    status == 401 || body.and_then(|b| b.get("code")).and_then(code_of) == Some(401)
}
