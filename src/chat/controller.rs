//! Chat session controller
//!
//! Owns one screen's conversation state: the sidebar chat list, the active
//! chat, its message turns, and the submission lifecycle. All mutation goes
//! through `&mut self`, so a single event loop is the only writer.
//!
//! The local chat list is a cache. Anything destructive is followed by a
//! refetch so the server stays the source of truth.

use crate::api::{
    ApiError, ApiResult, ChatApi, ChatMessageTurn, ChatSummary, QueryRequest, QueryResponse,
};
use std::sync::Arc;
use thiserror::Error;

/// Name shown before a chat exists
pub const NEW_CHAT_NAME: &str = "New Chat";

/// Where the session is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    LoadingHistory,
    /// Last submission failed; behaves like `Idle` until dismissed
    Error(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Please enter a query")]
    EmptyQuery,

    #[error("A query is already being processed")]
    Busy,

    #[error("{0}")]
    Api(#[from] ApiError),
}

/// A validated query waiting for its backend response
#[derive(Debug, Clone)]
pub struct PendingQuery {
    pub request: QueryRequest,
}

pub struct ChatSessionController {
    api: Arc<dyn ChatApi>,
    chats: Vec<ChatSummary>,
    active: Option<ChatSummary>,
    chat_name: String,
    messages: Vec<ChatMessageTurn>,
    state: SessionState,
    /// Transient banner text (validation or delete failures)
    notice: Option<String>,
}

impl ChatSessionController {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            chats: Vec::new(),
            active: None,
            chat_name: NEW_CHAT_NAME.to_string(),
            messages: Vec::new(),
            state: SessionState::Idle,
            notice: None,
        }
    }

    pub fn api(&self) -> Arc<dyn ChatApi> {
        Arc::clone(&self.api)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.state == SessionState::Submitting
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            SessionState::Submitting | SessionState::LoadingHistory
        )
    }

    pub fn chats(&self) -> &[ChatSummary] {
        &self.chats
    }

    /// Chats whose name contains `term`, ignoring case
    pub fn filter_chats(&self, term: &str) -> Vec<&ChatSummary> {
        let term = term.trim().to_lowercase();
        self.chats
            .iter()
            .filter(|chat| term.is_empty() || chat.display_name().to_lowercase().contains(&term))
            .collect()
    }

    pub fn active_chat(&self) -> Option<&ChatSummary> {
        self.active.as_ref()
    }

    pub fn active_chat_id(&self) -> Option<&str> {
        self.active
            .as_ref()
            .map(|chat| chat.chat_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn chat_name(&self) -> &str {
        &self.chat_name
    }

    pub fn messages(&self) -> &[ChatMessageTurn] {
        &self.messages
    }

    /// Most recent turn, shown as the current result
    pub fn latest_turn(&self) -> Option<&ChatMessageTurn> {
        self.messages.last()
    }

    /// Error text to show in the banner, if any
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SessionState::Error(message) => Some(message),
            _ => self.notice.as_deref(),
        }
    }

    pub fn dismiss_error(&mut self) {
        self.notice = None;
        if matches!(self.state, SessionState::Error(_)) {
            self.state = SessionState::Idle;
        }
    }

    /// Reload the chat list from the server
    pub async fn refresh_chats(&mut self) -> ApiResult<&[ChatSummary]> {
        match self.api.chat_list().await {
            Ok(chats) => {
                self.chats = chats;
                Ok(&self.chats)
            }
            Err(e) => {
                tracing::warn!("Error fetching chat list: {}", e);
                Err(e)
            }
        }
    }

    /// Start a fresh conversation; the next submit creates the chat
    pub fn new_chat(&mut self) {
        self.active = None;
        self.messages.clear();
        self.chat_name = NEW_CHAT_NAME.to_string();
        self.dismiss_error();
    }

    /// Validate input and enter `Submitting`
    ///
    /// Rejects blank input locally and refuses while another submission is
    /// in flight. Nothing is sent to the network here.
    pub fn begin_submit(&mut self, text: &str) -> Result<PendingQuery, ChatError> {
        if self.is_busy() {
            return Err(ChatError::Busy);
        }
        if text.trim().is_empty() {
            self.notice = Some(ChatError::EmptyQuery.to_string());
            return Err(ChatError::EmptyQuery);
        }

        self.notice = None;
        self.state = SessionState::Submitting;
        let chat_id = self.active_chat_id().map(str::to_string);
        Ok(PendingQuery {
            request: QueryRequest::new(text, chat_id),
        })
    }

    /// Apply the backend's answer to a pending query
    ///
    /// Always leaves `Submitting`, whatever the outcome.
    pub async fn finish_submit(
        &mut self,
        pending: PendingQuery,
        result: ApiResult<QueryResponse>,
    ) -> Result<ChatMessageTurn, ChatError> {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Query request failed: {}", e);
                self.state = SessionState::Error(e.to_string());
                return Err(ChatError::Api(e));
            }
        };
        self.state = SessionState::Idle;

        let new_chat_id = response.chat_id.clone().filter(|id| !id.is_empty());
        if let Some(chat_id) = &new_chat_id {
            if self.active_chat_id() != Some(chat_id.as_str()) {
                let name = response.chat_name.clone().unwrap_or_default();
                tracing::debug!("Switching to chat {} ({})", chat_id, name);
                self.chat_name = name.clone();
                self.active = Some(ChatSummary::new(chat_id.clone(), name));
            }
        }

        let turn = response.into_turn(pending.request.query);
        self.messages.push(turn.clone());

        if new_chat_id.is_some() {
            let _ = self.refresh_chats().await;
        }
        Ok(turn)
    }

    /// Send a query and append its answer as a new turn
    pub async fn submit_query(&mut self, text: &str) -> Result<ChatMessageTurn, ChatError> {
        let pending = self.begin_submit(text)?;
        let result = self.api.query(&pending.request).await;
        self.finish_submit(pending, result).await
    }

    /// Make `chat` active and load its history
    ///
    /// Any history failure leaves an empty message list rather than the
    /// previous chat's turns.
    pub async fn select_chat(&mut self, chat: ChatSummary) -> Result<(), ChatError> {
        if self.is_busy() {
            return Err(ChatError::Busy);
        }

        self.chat_name = chat.display_name().to_string();
        let chat_id = chat.chat_id.clone();
        self.active = Some(chat);
        self.dismiss_error();

        if chat_id.is_empty() {
            tracing::warn!("Selected chat has no chat_id; not loading history");
            self.messages.clear();
            return Ok(());
        }

        self.state = SessionState::LoadingHistory;
        let history = self.api.chat_history(&chat_id).await;
        self.state = SessionState::Idle;

        match history {
            Ok(turns) => {
                tracing::debug!("Loaded {} turns for chat {}", turns.len(), chat_id);
                self.messages = turns;
            }
            Err(e) => {
                tracing::warn!("Error fetching chat history for {}: {}", chat_id, e);
                self.messages.clear();
            }
        }
        Ok(())
    }

    /// Delete a chat, optimistically removing it from the list
    ///
    /// Deleting the active chat clears the screen and selects the first chat
    /// left on the server. A failed delete refetches the list to undo the
    /// optimistic removal.
    pub async fn delete_chat(&mut self, chat_id: &str) -> Result<(), ChatError> {
        if self.is_busy() {
            return Err(ChatError::Busy);
        }

        self.chats.retain(|chat| chat.chat_id != chat_id);
        let was_active = self.active_chat_id() == Some(chat_id);

        if let Err(e) = self.api.delete_chat(chat_id).await {
            tracing::error!("Error deleting chat {}: {}", chat_id, e);
            self.notice = Some(format!("Failed to delete chat: {}", e));
            let _ = self.refresh_chats().await;
            return Err(ChatError::Api(e));
        }
        tracing::info!("Deleted chat {}", chat_id);

        if was_active {
            self.new_chat();
            // On refetch failure the optimistically trimmed list still stands
            let _ = self.refresh_chats().await;
            if let Some(next) = self.chats.first().cloned() {
                self.select_chat(next).await?;
            }
        }
        Ok(())
    }
}
