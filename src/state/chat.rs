//! In-memory chat transcript.
//!
//! Owned by the UI layer (or the CLI); not shared across tasks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::transport::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Ai,
    Image,
}

/// Image attached to an [`MessageKind::Image`] message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: Option<String>,
    /// AI reply still receiving stream frames.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

/// One tile of the photo wall.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoEntry {
    pub message_id: u64,
    pub url: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
    current_conversation: Option<String>,
    loading: bool,
    show_welcome: bool,
    last_id: u64,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            current_conversation: None,
            loading: false,
            show_welcome: true,
            last_id: 0,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn current_conversation(&self) -> Option<&str> {
        self.current_conversation.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn show_welcome(&self) -> bool {
        self.show_welcome
    }

    pub fn set_show_welcome(&mut self, show: bool) {
        self.show_welcome = show;
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Millisecond-based id, strictly increasing within this state.
    fn next_id(&mut self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.last_id = now.max(self.last_id + 1);
        self.last_id
    }

    /// Start a new conversation and make it current.
    pub fn new_conversation(&mut self) -> String {
        let id = format!("conv_{}", self.next_id());
        debug!(conversation = %id, "New conversation");
        self.current_conversation = Some(id.clone());
        self.show_welcome = true;
        self.loading = false;
        id
    }

    fn ensure_conversation(&mut self) -> String {
        match &self.current_conversation {
            Some(id) => id.clone(),
            None => self.new_conversation(),
        }
    }

    fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        self.messages.push(message);
        let last = self.messages.len() - 1;
        &self.messages[last]
    }

    pub fn add_user_message(&mut self, content: &str) -> &ChatMessage {
        let conversation_id = self.ensure_conversation();
        let message = ChatMessage {
            id: self.next_id(),
            kind: MessageKind::User,
            content: content.trim().to_string(),
            image: None,
            timestamp: Utc::now(),
            conversation_id: Some(conversation_id),
            pending: false,
        };
        self.show_welcome = false;
        self.push(message)
    }

    pub fn add_image_message(&mut self, image: ImageRef, caption: &str) -> &ChatMessage {
        let conversation_id = self.ensure_conversation();
        let message = ChatMessage {
            id: self.next_id(),
            kind: MessageKind::Image,
            content: caption.to_string(),
            image: Some(image),
            timestamp: Utc::now(),
            conversation_id: Some(conversation_id),
            pending: false,
        };
        self.show_welcome = false;
        self.push(message)
    }

    /// Append a finished AI reply to the current conversation.
    pub fn add_ai_message(&mut self, content: &str) -> &ChatMessage {
        let message = self.ai_message(content.to_string(), false);
        self.push(message)
    }

    fn ai_message(&mut self, content: String, pending: bool) -> ChatMessage {
        ChatMessage {
            id: self.next_id(),
            kind: MessageKind::Ai,
            content,
            image: None,
            timestamp: Utc::now(),
            conversation_id: self.current_conversation.clone(),
            pending,
        }
    }

    /// Fold a reply-stream event into the transcript.
    ///
    /// Text goes to the pending AI message, which is created on the first
    /// frame. `Complete` and `Error` finish it and clear `loading`; an
    /// error with no text received yet leaves the error's user message as
    /// the reply. Returns the id of the affected message.
    pub fn apply_stream_event(&mut self, event: &StreamEvent) -> Option<u64> {
        match event {
            StreamEvent::Message(frame) => {
                self.loading = true;
                let text = extract_text(frame).unwrap_or_default();
                let idx = match self.pending_index() {
                    Some(idx) => idx,
                    None => {
                        let message = self.ai_message(String::new(), true);
                        self.messages.push(message);
                        self.messages.len() - 1
                    }
                };
                let message = &mut self.messages[idx];
                message.content.push_str(&text);
                Some(message.id)
            }
            StreamEvent::Complete => {
                self.loading = false;
                let idx = self.pending_index()?;
                let message = &mut self.messages[idx];
                message.pending = false;
                Some(message.id)
            }
            StreamEvent::Error(err) => {
                self.loading = false;
                let idx = match self.pending_index() {
                    Some(idx) => idx,
                    None => {
                        let message = self.ai_message(String::new(), true);
                        self.messages.push(message);
                        self.messages.len() - 1
                    }
                };
                let message = &mut self.messages[idx];
                if message.content.is_empty() {
                    message.content = err.user_message();
                }
                message.pending = false;
                Some(message.id)
            }
        }
    }

    fn pending_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.pending && m.conversation_id == self.current_conversation)
    }

    pub fn current_messages(&self) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.conversation_id == self.current_conversation)
            .collect()
    }

    pub fn image_messages(&self) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.kind == MessageKind::Image)
            .collect()
    }

    pub fn current_image_messages(&self) -> Vec<&ChatMessage> {
        self.current_messages()
            .into_iter()
            .filter(|m| m.kind == MessageKind::Image)
            .collect()
    }

    /// Every image across conversations, newest first.
    pub fn photo_wall(&self) -> Vec<PhotoEntry> {
        let mut entries: Vec<PhotoEntry> = self
            .messages
            .iter()
            .filter_map(|m| {
                let image = m.image.as_ref()?;
                Some(PhotoEntry {
                    message_id: m.id,
                    url: image.url.clone(),
                    name: image.name.clone(),
                    timestamp: m.timestamp,
                    conversation_id: m.conversation_id.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.message_id.cmp(&a.message_id))
        });
        entries
    }

    /// Drop the current conversation's messages and show the welcome view.
    pub fn clear_current_conversation(&mut self) {
        if let Some(current) = &self.current_conversation {
            self.messages
                .retain(|m| m.conversation_id.as_ref() != Some(current));
        }
        self.show_welcome = true;
    }

    /// Find a message, switching to its conversation if needed.
    pub fn focus_message(&mut self, message_id: u64) -> Option<&ChatMessage> {
        let idx = self.messages.iter().position(|m| m.id == message_id)?;
        let conversation = self.messages[idx].conversation_id.clone();
        if conversation != self.current_conversation {
            self.current_conversation = conversation;
            self.show_welcome = false;
        }
        Some(&self.messages[idx])
    }
}

/// Text carried by one reply-stream frame.
///
/// Looks at `content`, then `delta`, then the chat-completions shape
/// `choices[0].delta.content`.
pub fn extract_text(frame: &Value) -> Option<String> {
    if let Some(s) = frame.as_str() {
        return Some(s.to_string());
    }
    ["content", "delta"]
        .iter()
        .find_map(|key| frame.get(*key).and_then(Value::as_str))
        .or_else(|| frame.pointer("/choices/0/delta/content").and_then(Value::as_str))
        .map(str::to_string)
}
