//! HTTP transport, request/response pipeline and the reply stream.

pub mod headers;
mod http;
pub mod interceptor;
pub mod request;
pub mod response;
pub mod retry;
pub mod sse;
pub mod stream;
pub mod upload;

pub use http::{HttpClient, UPLOAD_TIMEOUT};
pub use interceptor::{HookId, RequestHook, RequestHooks};
pub use request::{RequestBody, RequestDescriptor};
pub use retry::{RetryPolicy, retry, retry_notify};
pub use stream::{ReplyStream, StreamController, StreamEvent, StreamStart};
pub use upload::{ProgressFn, UploadFile};
