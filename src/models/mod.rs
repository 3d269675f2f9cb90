//! Request and result types shared by the endpoint groups.

pub mod auth;
pub mod file;

pub use auth::{Credentials, PasswordChange};
pub use file::{BatchSummary, BatchUploadOptions, BatchUploadResult, FileProgressFn, UploadOptions};
