//! # chatdesk
//!
//! Client library for the chatdesk backend: authenticated JSON calls
//! through a shared request/response pipeline, streamed AI replies,
//! multipart uploads and a persisted login session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatdesk::{ChatdeskClient, StreamEvent, Result};
//! use chatdesk::models::Credentials;
//! use futures::StreamExt;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ChatdeskClient::builder()
//!         .base_url("http://localhost:8080/api")
//!         .build()
//!         .await?;
//!
//!     let login = client.auth().login(&Credentials::new("alice", "secret")).await;
//!     if !login.is_success() {
//!         eprintln!("{}", login.message());
//!         return Ok(());
//!     }
//!
//!     let mut stream = client.chat().reply_stream(&json!({ "message": "Hello" })).await?;
//!     while let Some(event) = stream.next().await {
//!         if let StreamEvent::Message(frame) = event {
//!             print!("{}", chatdesk::state::extract_text(&frame).unwrap_or_default());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod transport;

// Re-exports for ergonomic usage
pub use api::ApiResult;
pub use auth::{Navigator, RouteState, Session};
pub use client::{ChatdeskClient, ChatdeskClientBuilder};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use state::ChatState;
pub use storage::SessionStorage;
pub use transport::{ReplyStream, RetryPolicy, StreamController, StreamEvent, UploadFile};
