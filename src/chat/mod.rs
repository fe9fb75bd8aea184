//! Chat screen state: conversation controller and mention suggestions

mod controller;
pub mod mentions;

pub use controller::{
    ChatError, ChatSessionController, PendingQuery, SessionState, NEW_CHAT_NAME,
};
pub use mentions::{MentionEngine, MentionKey, MentionOutcome};
