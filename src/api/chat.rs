//! Chat, conversation and AI-reply endpoints.

use reqwest::multipart::Form;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use super::constants::{self, chat as paths};
use super::user::image_type_hint;
use super::{ApiResult, labels, normalize};
use crate::client::ChatdeskClient;
use crate::error::{Error, Result};
use crate::transport::stream::spawn_consumer;
use crate::transport::{
    ProgressFn, ReplyStream, RequestDescriptor, StreamController, StreamStart, UPLOAD_TIMEOUT,
    UploadFile, upload,
};

pub struct ChatApi<'a> {
    client: &'a ChatdeskClient,
}

impl<'a> ChatApi<'a> {
    pub(crate) fn new(client: &'a ChatdeskClient) -> Self {
        Self { client }
    }

    pub async fn send_message(&self, message: Value) -> ApiResult {
        normalize(
            labels("Message sent", "Failed to send message"),
            self.client.http().post(paths::SEND_MESSAGE, message),
        )
        .await
    }

    pub async fn history(&self, params: &Value) -> ApiResult {
        normalize(
            labels("Chat history loaded", "Failed to load chat history"),
            self.client.http().get(paths::HISTORY, Some(params)),
        )
        .await
    }

    pub async fn conversations(&self, params: &Value) -> ApiResult {
        normalize(
            labels("Conversations loaded", "Failed to load conversations"),
            self.client.http().get(paths::CONVERSATIONS, Some(params)),
        )
        .await
    }

    pub async fn create_conversation(&self, conversation: Value) -> ApiResult {
        let body = if conversation.is_null() {
            json!({})
        } else {
            conversation
        };
        normalize(
            labels("Conversation created", "Failed to create conversation"),
            self.client.http().post(paths::CONVERSATIONS, body),
        )
        .await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> ApiResult {
        let path = constants::with_id(paths::CONVERSATIONS, conversation_id);
        normalize(
            labels("Conversation deleted", "Failed to delete conversation"),
            self.client.http().delete(&path, Value::Null),
        )
        .await
    }

    pub async fn rename_conversation(&self, conversation_id: &str, title: &str) -> ApiResult {
        let path = constants::with_id(paths::CONVERSATIONS, conversation_id);
        normalize(
            labels("Conversation renamed", "Failed to rename conversation"),
            self.client.http().put(&path, json!({ "title": title })),
        )
        .await
    }

    /// Upload an image into a conversation (configured image types, at most
    /// 10 MB).
    pub async fn upload_image(&self, file: &UploadFile, conversation_id: &str) -> ApiResult {
        let call = async {
            let allowed = &self.client.config().upload.allowed_types;
            upload::validate(file, constants::CHAT_IMAGE_MAX_SIZE, Some(allowed.as_slice()))
                .map_err(image_type_hint)?;

            let progress: ProgressFn =
                Arc::new(|p: u8| debug!(progress = p, "Chat image upload progress"));
            let form = Form::new()
                .part("image", upload::file_part(file, Some(progress))?)
                .text("conversationId", conversation_id.to_string());
            self.client
                .http()
                .send(
                    RequestDescriptor::post(paths::UPLOAD_IMAGE)
                        .multipart(form)
                        .timeout(UPLOAD_TIMEOUT),
                )
                .await
        };
        normalize(labels("Image uploaded", "Image upload failed"), call).await
    }

    pub async fn images(&self, params: &Value) -> ApiResult {
        normalize(
            labels("Images loaded", "Failed to load images"),
            self.client.http().get(paths::IMAGES, Some(params)),
        )
        .await
    }

    /// Non-streamed AI reply.
    pub async fn ai_reply(&self, request: Value) -> ApiResult {
        normalize(
            labels("AI reply received", "AI reply failed"),
            self.client.http().post(paths::AI_REPLY, request),
        )
        .await
    }

    pub async fn stop_generation(&self, conversation_id: &str) -> ApiResult {
        normalize(
            labels("AI generation stopped", "Failed to stop AI generation"),
            self.client
                .http()
                .post(paths::STOP_GENERATION, json!({ "conversationId": conversation_id })),
        )
        .await
    }

    /// Open a streamed AI reply.
    ///
    /// Frames bypass envelope normalization; each `data:` payload is
    /// delivered as-is.
    pub async fn reply_stream(&self, request: &Value) -> Result<ReplyStream> {
        let response = self
            .client
            .http()
            .open_stream(paths::AI_REPLY_STREAM, request)
            .await?;
        Ok(ReplyStream::from_response(response, StreamController::new()))
    }

    /// Callback flavour of [`reply_stream`](Self::reply_stream).
    ///
    /// Resolves once the stream is open (or failed to open). Messages are
    /// then delivered from a spawned task; exactly one of `on_error` and
    /// `on_complete` runs unless the returned controller is cancelled first.
    pub async fn start_reply_stream<M, E, C>(
        &self,
        request: &Value,
        on_message: M,
        on_error: E,
        on_complete: C,
    ) -> StreamStart
    where
        M: FnMut(Value) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        match self.reply_stream(request).await {
            Ok(stream) => {
                let controller = stream.controller().clone();
                let task = spawn_consumer(stream, on_message, on_error, on_complete);
                StreamStart {
                    success: true,
                    controller: Some(controller),
                    error: None,
                    message: "AI reply stream started".to_string(),
                    task: Some(task),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to open AI reply stream");
                let error = e.to_string();
                on_error(e);
                StreamStart {
                    success: false,
                    controller: None,
                    error: Some(error),
                    message: "AI reply stream failed".to_string(),
                    task: None,
                }
            }
        }
    }
}
