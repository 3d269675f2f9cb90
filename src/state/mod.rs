//! Client-side view state.

mod chat;

pub use chat::{ChatMessage, ChatState, ImageRef, MessageKind, PhotoEntry, extract_text};
