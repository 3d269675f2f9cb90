//! Endpoint paths, relative to the API base URL.

pub mod auth {
    pub const LOGIN: &str = "/auth/login";
    pub const LOGOUT: &str = "/auth/logout";
    pub const REGISTER: &str = "/auth/register";
    pub const REFRESH_TOKEN: &str = "/auth/refresh";
    pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
    pub const RESET_PASSWORD: &str = "/auth/reset-password";
    pub const VERIFY_EMAIL: &str = "/auth/verify-email";
    pub const SEND_CODE: &str = "/auth/send-code";
}

pub mod user {
    pub const PROFILE: &str = "/user/profile";
    pub const AVATAR: &str = "/user/avatar";
    pub const CHANGE_PASSWORD: &str = "/user/change-password";
    pub const STATS: &str = "/user/stats";
    pub const SETTINGS: &str = "/user/settings";
    pub const DELETE_ACCOUNT: &str = "/user/delete";
    pub const CHECK_USERNAME: &str = "/user/check-username";
    pub const CHECK_EMAIL: &str = "/user/check-email";
    pub const ACTIVITY_LOG: &str = "/user/activity-log";
}

pub mod chat {
    pub const SEND_MESSAGE: &str = "/chat/send";
    pub const HISTORY: &str = "/chat/history";
    /// List, create, delete (`/{id}`) and rename (`/{id}`).
    pub const CONVERSATIONS: &str = "/chat/conversations";
    pub const UPLOAD_IMAGE: &str = "/chat/upload/image";
    pub const IMAGES: &str = "/chat/images";
    pub const AI_REPLY: &str = "/chat/ai/reply";
    pub const AI_REPLY_STREAM: &str = "/chat/ai/reply/stream";
    pub const STOP_GENERATION: &str = "/chat/ai/stop";
}

pub mod file {
    pub const UPLOAD: &str = "/file/upload";
    pub const DOWNLOAD: &str = "/file/download";
    pub const DELETE: &str = "/file/delete";
    pub const INFO: &str = "/file/info";
    pub const LIST: &str = "/file/list";
    pub const PREVIEW: &str = "/file/preview";
    pub const RENAME: &str = "/file/rename";
    pub const MOVE: &str = "/file/move";
    pub const CATEGORIES: &str = "/file/categories";
    pub const CHECK_EXISTS: &str = "/file/check-exists";
}

pub mod system {
    pub const INFO: &str = "/system/info";
    pub const HEALTH: &str = "/system/health";
    pub const CONFIG: &str = "/system/config";
    pub const FEEDBACK: &str = "/system/feedback";
    pub const CONTACT: &str = "/system/contact";
    pub const VERSION: &str = "/system/version";
    pub const CHECK_UPDATE: &str = "/system/check-update";
    pub const ANNOUNCEMENTS: &str = "/system/announcements";
    pub const HELP: &str = "/system/help";
    pub const FAQ: &str = "/system/faq";
    pub const LOG_ACTION: &str = "/system/log/action";
    pub const LOG_ERROR: &str = "/system/log/error";
    pub const STATS: &str = "/system/stats";
}

/// Size limit for avatar images.
pub const AVATAR_MAX_SIZE: u64 = 5 * 1024 * 1024;

/// Size limit for chat images.
pub const CHAT_IMAGE_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// `<base>/<id>` path helper.
pub fn with_id(base: &str, id: impl std::fmt::Display) -> String {
    format!("{}/{}", base, id)
}
