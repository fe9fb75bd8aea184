//! Chat screen state and key handling
//!
//! `ChatApp` composes the controllers behind the chat screen. It never
//! touches the terminal itself, so key handling can be driven directly in
//! tests; see [`super::run_chat_screen`] for the terminal loop.

use super::clipboard::{ClipboardSink, CopyTarget, SystemClipboard};
use super::events::Event;
use super::input::QueryInput;
use crate::api::{
    ApiError, ApiResult, ChatApi, ChatSummary, LinkMetadata, LogApi, ProductApi, QueryResponse,
};
use crate::chat::{
    ChatError, ChatSessionController, MentionEngine, MentionKey, MentionOutcome, PendingQuery,
};
use crate::config::Config;
use crate::metadata::{LinkPrefetcher, MetadataCache, ResolverChain};
use crate::products::ProductCatalog;
use crate::session::{sample_queries, SessionContext};
use crate::status::{StatusBanner, StatusPoller};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::Arc;
use tokio::task::JoinHandle;

const SUGGESTION_COUNT: usize = 3;

/// Which pane receives keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Sidebar,
}

/// A query whose request runs on a background task
struct InFlightQuery {
    pending: PendingQuery,
    /// Input text as submitted, put back if the request fails
    draft: String,
    handle: JoinHandle<ApiResult<QueryResponse>>,
}

pub struct ChatApp {
    chat: ChatSessionController,
    mentions: MentionEngine,
    input: QueryInput,
    catalog: ProductCatalog,
    session: SessionContext,
    metadata: Arc<MetadataCache>,
    prefetcher: Option<LinkPrefetcher>,
    status: Option<StatusPoller>,
    in_flight: Option<InFlightQuery>,
    clipboard: Box<dyn ClipboardSink>,
    /// One-shot message for the banner, cleared by the next key
    notice: Option<String>,
    focus: Focus,
    sidebar_filter: String,
    sidebar_index: usize,
    /// Chat id waiting for y/n
    pending_delete: Option<String>,
    seed: u64,
    suggestion_index: usize,
    /// Lines scrolled up from the bottom of the transcript
    scroll_back: u16,
    citation_base: String,
    should_quit: bool,
}

impl ChatApp {
    /// Build the screen over any backend that serves chats, products and logs
    ///
    /// Must be called inside a tokio runtime when status polling is enabled.
    pub fn new<B>(
        backend: Arc<B>,
        config: &Config,
        session: SessionContext,
        seed: u64,
    ) -> Result<Self>
    where
        B: ChatApi + ProductApi + LogApi + 'static,
    {
        let chat_api: Arc<dyn ChatApi> = backend.clone();
        let product_api: Arc<dyn ProductApi> = backend.clone();
        let log_api: Arc<dyn LogApi> = backend;

        let metadata = Arc::new(MetadataCache::new());
        let prefetcher = if config.metadata.enabled {
            let chain = Arc::new(ResolverChain::from_config(&config.metadata)?);
            Some(LinkPrefetcher::new(
                Arc::clone(&metadata),
                chain,
                config.metadata.stagger(),
            ))
        } else {
            None
        };
        let status = config
            .status
            .enabled
            .then(|| StatusPoller::spawn(log_api, &config.status));

        Ok(Self {
            chat: ChatSessionController::new(chat_api),
            mentions: MentionEngine::new(),
            input: QueryInput::new(),
            catalog: ProductCatalog::new(product_api),
            session,
            metadata,
            prefetcher,
            status,
            in_flight: None,
            clipboard: Box::new(SystemClipboard::new()),
            notice: None,
            focus: Focus::Input,
            sidebar_filter: String::new(),
            sidebar_index: 0,
            pending_delete: None,
            seed,
            suggestion_index: 0,
            scroll_back: 0,
            citation_base: config.backend.base_url.clone(),
            should_quit: false,
        })
    }

    pub fn with_clipboard(mut self, clipboard: Box<dyn ClipboardSink>) -> Self {
        self.clipboard = clipboard;
        self
    }

    /// Initial fetch of chats and products; failures leave the lists empty
    pub async fn load(&mut self) {
        let _ = self.chat.refresh_chats().await;
        match self.catalog.refresh().await {
            Ok(products) => self.mentions.set_products(products.to_vec()),
            Err(e) => tracing::warn!("Error fetching products: {}", e),
        }
    }

    /// Prefill the query input
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input.set_text(text);
        self.text_changed();
    }

    pub fn chat(&self) -> &ChatSessionController {
        &self.chat
    }

    pub fn input(&self) -> &QueryInput {
        &self.input
    }

    pub fn mentions(&self) -> &MentionEngine {
        &self.mentions
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn sidebar_filter(&self) -> &str {
        &self.sidebar_filter
    }

    pub fn sidebar_index(&self) -> usize {
        self.sidebar_index
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn scroll_back(&self) -> u16 {
        self.scroll_back
    }

    pub fn citation_base(&self) -> &str {
        &self.citation_base
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_waiting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn visible_chats(&self) -> Vec<&ChatSummary> {
        self.chat.filter_chats(&self.sidebar_filter)
    }

    pub fn banner(&self) -> Option<StatusBanner> {
        self.status.as_ref().map(StatusPoller::banner)
    }

    pub fn link_preview(&self, url: &str) -> Option<LinkMetadata> {
        self.metadata.get(url)
    }

    /// Follow-up questions for the current chat, or samples for a new one
    pub fn suggestions(&self) -> Vec<String> {
        match self.chat.latest_turn() {
            Some(turn) if !turn.related_queries.is_empty() => turn.related_queries.clone(),
            Some(_) => Vec::new(),
            None => sample_queries(self.seed, SUGGESTION_COUNT)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub async fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key).await,
            Event::Paste(text) if self.focus == Focus::Input => {
                self.input.insert_str(&text);
                self.text_changed();
                true
            }
            Event::Resize(..) => true,
            _ => false,
        }
    }

    /// Apply one key press; returns whether the screen changed
    pub async fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        self.notice = None;
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
                self.should_quit = true;
                return true;
            }
            KeyCode::Char('n') if ctrl => {
                if !self.chat.is_busy() {
                    self.chat.new_chat();
                    self.scroll_back = 0;
                    self.suggestion_index = 0;
                }
                return true;
            }
            KeyCode::Char('y') if ctrl => {
                self.copy_latest_answer();
                return true;
            }
            KeyCode::PageUp => {
                self.scroll_back = self.scroll_back.saturating_add(10);
                return true;
            }
            KeyCode::PageDown => {
                self.scroll_back = self.scroll_back.saturating_sub(10);
                return true;
            }
            _ => {}
        }

        match self.focus {
            Focus::Input => self.handle_input_key(key),
            Focus::Sidebar => self.handle_sidebar_key(key).await,
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        let mention_key = match key.code {
            KeyCode::Up => Some(MentionKey::Up),
            KeyCode::Down => Some(MentionKey::Down),
            KeyCode::Enter => Some(MentionKey::Enter),
            KeyCode::Esc => Some(MentionKey::Escape),
            _ => None,
        };
        if let Some(mention_key) = mention_key {
            let outcome = self
                .mentions
                .handle_key(mention_key, self.input.text(), self.input.caret());
            match outcome {
                MentionOutcome::Ignored => {}
                MentionOutcome::Moved | MentionOutcome::Dismissed => return true,
                MentionOutcome::Inserted { text, caret } => {
                    self.input.set(text, caret);
                    return true;
                }
            }
        }

        match key.code {
            KeyCode::Tab => {
                self.mentions.hide();
                self.focus = Focus::Sidebar;
            }
            KeyCode::Enter => self.submit(),
            KeyCode::Esc => self.chat.dismiss_error(),
            KeyCode::Up => self.input.history_previous(self.session.recent_queries()),
            KeyCode::Down => self.input.history_next(self.session.recent_queries()),
            KeyCode::Char('r') if ctrl => self.next_suggestion(),
            KeyCode::Char('w') if ctrl => {
                self.input.delete_word_before();
                self.text_changed();
            }
            KeyCode::Char(c) if !ctrl => {
                self.input.insert_char(c);
                self.text_changed();
            }
            KeyCode::Backspace => {
                self.input.delete_char_before();
                self.text_changed();
            }
            KeyCode::Delete => {
                self.input.delete_char_at();
                self.text_changed();
            }
            KeyCode::Left => {
                self.input.move_left();
                self.text_changed();
            }
            KeyCode::Right => {
                self.input.move_right();
                self.text_changed();
            }
            KeyCode::Home => {
                self.input.move_to_start();
                self.text_changed();
            }
            KeyCode::End => {
                self.input.move_to_end();
                self.text_changed();
            }
            _ => return false,
        }
        true
    }

    async fn handle_sidebar_key(&mut self, key: KeyEvent) -> bool {
        if let Some(chat_id) = self.pending_delete.clone() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.pending_delete = None;
                    if let Err(e) = self.chat.delete_chat(&chat_id).await {
                        tracing::warn!("Delete of chat {} failed: {}", chat_id, e);
                    }
                    self.clamp_sidebar();
                    self.prefetch_all();
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.pending_delete = None;
                }
                _ => return false,
            }
            return true;
        }

        match key.code {
            KeyCode::Tab | KeyCode::Esc => self.focus = Focus::Input,
            KeyCode::Up => self.sidebar_index = self.sidebar_index.saturating_sub(1),
            KeyCode::Down => {
                if self.sidebar_index + 1 < self.visible_chats().len() {
                    self.sidebar_index += 1;
                }
            }
            KeyCode::Enter => {
                let selected = self.visible_chats().get(self.sidebar_index).map(|c| (*c).clone());
                let Some(chat) = selected else {
                    return false;
                };
                match self.chat.select_chat(chat).await {
                    Ok(()) => {
                        self.scroll_back = 0;
                        self.suggestion_index = 0;
                        self.focus = Focus::Input;
                        self.prefetch_all();
                    }
                    Err(ChatError::Busy) => tracing::debug!("Ignoring chat switch while busy"),
                    Err(e) => tracing::warn!("Failed to open chat: {}", e),
                }
            }
            KeyCode::Delete => {
                self.pending_delete = self
                    .visible_chats()
                    .get(self.sidebar_index)
                    .map(|c| c.chat_id.clone());
            }
            KeyCode::Backspace => {
                self.sidebar_filter.pop();
                self.sidebar_index = 0;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.sidebar_filter.push(c);
                self.sidebar_index = 0;
            }
            _ => return false,
        }
        true
    }

    fn text_changed(&mut self) {
        self.mentions
            .on_text_change(self.input.text(), self.input.caret());
    }

    fn copy_latest_answer(&mut self) {
        let Some(answer) = self.chat.latest_turn().map(|turn| turn.answer.clone()) else {
            self.notice = Some("No answer to copy".to_string());
            return;
        };
        self.notice = Some(match self.clipboard.copy_text(&answer) {
            Ok(CopyTarget::System) => "Answer copied to clipboard".to_string(),
            Ok(CopyTarget::Terminal) => "Answer sent to terminal clipboard".to_string(),
            Err(e) => {
                tracing::warn!("Copy failed: {}", e);
                format!("Copy failed: {}", e)
            }
        });
    }

    fn clamp_sidebar(&mut self) {
        let len = self.visible_chats().len();
        if self.sidebar_index >= len {
            self.sidebar_index = len.saturating_sub(1);
        }
    }

    fn next_suggestion(&mut self) {
        let suggestions = self.suggestions();
        if suggestions.is_empty() {
            return;
        }
        let index = self.suggestion_index % suggestions.len();
        self.input.set_text(suggestions[index].clone());
        self.suggestion_index = index + 1;
        self.mentions.hide();
    }

    /// Validate the input and start the request in the background
    fn submit(&mut self) {
        let pending = match self.chat.begin_submit(self.input.text()) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::debug!("Submit rejected: {}", e);
                return;
            }
        };

        let draft = self.input.take();
        self.mentions.hide();
        self.scroll_back = 0;

        let api = self.chat.api();
        let request = pending.request.clone();
        let handle = tokio::spawn(async move { api.query(&request).await });
        self.in_flight = Some(InFlightQuery {
            pending,
            draft,
            handle,
        });
    }

    /// Collect a finished background query; returns whether anything changed
    pub async fn poll_background(&mut self) -> bool {
        let finished = self
            .in_flight
            .as_ref()
            .is_some_and(|query| query.handle.is_finished());
        if !finished {
            return false;
        }
        let Some(InFlightQuery {
            pending,
            draft,
            handle,
        }) = self.in_flight.take()
        else {
            return false;
        };

        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(ApiError::Other(anyhow::Error::new(e))),
        };
        let query = pending.request.query.clone();
        match self.chat.finish_submit(pending, result).await {
            Ok(turn) => {
                self.session.record_query(&query);
                self.suggestion_index = 0;
                if let Some(prefetcher) = &self.prefetcher {
                    prefetcher.schedule(&turn.online_links);
                }
            }
            Err(e) => {
                tracing::warn!("Query failed: {}", e);
                // Keep anything typed while waiting
                if self.input.is_empty() {
                    self.input.set_text(draft);
                    self.text_changed();
                }
            }
        }
        true
    }

    fn prefetch_all(&self) {
        let Some(prefetcher) = &self.prefetcher else {
            return;
        };
        let links: Vec<String> = self
            .chat
            .messages()
            .iter()
            .flat_map(|turn| turn.online_links.iter().cloned())
            .collect();
        prefetcher.schedule(&links);
    }

    /// Stop background work owned by the screen
    pub fn shutdown(&mut self) {
        if let Some(query) = self.in_flight.take() {
            query.handle.abort();
        }
        if let Some(prefetcher) = &self.prefetcher {
            prefetcher.shutdown();
        }
        if let Some(status) = self.status.as_mut() {
            status.stop();
        }
    }
}

impl Drop for ChatApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeBackend;
    use crate::api::{ChatMessageTurn, Product, ProductColor};
    use std::io;
    use std::sync::Mutex;

    /// Keeps copied text instead of touching the real clipboard
    #[derive(Clone, Default)]
    struct RecordingClipboard {
        copied: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl ClipboardSink for RecordingClipboard {
        fn copy_text(&mut self, text: &str) -> io::Result<CopyTarget> {
            if self.fail {
                return Err(io::Error::other("no display"));
            }
            self.copied.lock().unwrap().push(text.to_string());
            Ok(CopyTarget::System)
        }
    }

    fn two_products() -> Vec<Product> {
        vec![
            Product {
                id: serde_json::json!(1),
                title: "Product X".to_string(),
                info: String::new(),
                color: ProductColor::Red,
            },
            Product {
                id: serde_json::json!(2),
                title: "Pump Y".to_string(),
                info: String::new(),
                color: ProductColor::Blue,
            },
        ]
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.metadata.enabled = false;
        config.status.enabled = false;
        config
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    async fn type_text(app: &mut ChatApp, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c))).await;
        }
    }

    async fn wait_for_answer(app: &mut ChatApp) {
        while !app.poll_background().await {
            tokio::task::yield_now().await;
        }
    }

    async fn app_with(backend: &Arc<FakeBackend>) -> ChatApp {
        let mut app =
            ChatApp::new(backend.clone(), &quiet_config(), SessionContext::in_memory(), 0)
                .unwrap();
        app.load().await;
        app
    }

    #[tokio::test]
    async fn test_typed_query_is_answered_in_background() {
        let backend = Arc::new(FakeBackend::new());
        let mut app = app_with(&backend).await;

        type_text(&mut app, "What is MDR?").await;
        app.handle_key(key(KeyCode::Enter)).await;
        assert!(app.is_waiting());
        assert!(app.input().is_empty());

        wait_for_answer(&mut app).await;
        assert_eq!(app.chat().messages().len(), 1);
        assert_eq!(app.chat().messages()[0].answer, "answer to What is MDR?");
        assert_eq!(app.session().recent_queries(), &["What is MDR?".to_string()]);
    }

    #[tokio::test]
    async fn test_enter_while_waiting_sends_nothing() {
        let backend = Arc::new(FakeBackend::new());
        let mut app = app_with(&backend).await;

        type_text(&mut app, "first").await;
        app.handle_key(key(KeyCode::Enter)).await;
        type_text(&mut app, "second").await;
        app.handle_key(key(KeyCode::Enter)).await;

        wait_for_answer(&mut app).await;
        assert_eq!(backend.query_requests.lock().unwrap().len(), 1);
        assert_eq!(app.input().text(), "second");
    }

    #[tokio::test]
    async fn test_blank_submit_shows_validation_error() {
        let backend = Arc::new(FakeBackend::new());
        let mut app = app_with(&backend).await;

        app.handle_key(key(KeyCode::Enter)).await;
        assert_eq!(app.chat().error(), Some("Please enter a query"));
        assert!(!app.is_waiting());

        app.handle_key(key(KeyCode::Esc)).await;
        assert_eq!(app.chat().error(), None);
    }

    #[tokio::test]
    async fn test_mention_flow_through_keys() {
        let backend = Arc::new(FakeBackend::new());
        *backend.products.lock().unwrap() = two_products();
        let mut app = app_with(&backend).await;

        type_text(&mut app, "Please review @p").await;
        assert!(app.mentions().is_visible());
        assert_eq!(app.mentions().len(), 2);

        app.handle_key(key(KeyCode::Down)).await;
        app.handle_key(key(KeyCode::Enter)).await;
        assert_eq!(app.input().text(), "Please review @Pump Y ");
        assert_eq!(app.input().caret(), 22);
        assert!(!app.mentions().is_visible());
        // Enter was consumed by the panel, nothing submitted
        assert!(!app.is_waiting());
    }

    #[tokio::test]
    async fn test_sidebar_filter_select_and_delete() {
        let backend = Arc::new(FakeBackend::new().with_chats(vec![
            ChatSummary::new("c1", "GDPR audit"),
            ChatSummary::new("c2", "ISO 27001"),
        ]));
        backend.set_history(
            "c2",
            vec![ChatMessageTurn {
                query: "controls?".to_string(),
                answer: "Annex A".to_string(),
                ..Default::default()
            }],
        );
        let mut app = app_with(&backend).await;

        app.handle_key(key(KeyCode::Tab)).await;
        assert_eq!(app.focus(), Focus::Sidebar);
        type_text(&mut app, "iso").await;
        assert_eq!(app.visible_chats().len(), 1);

        app.handle_key(key(KeyCode::Enter)).await;
        assert_eq!(app.chat().active_chat_id(), Some("c2"));
        assert_eq!(app.chat().messages().len(), 1);
        assert_eq!(app.focus(), Focus::Input);

        app.handle_key(key(KeyCode::Tab)).await;
        app.handle_key(key(KeyCode::Delete)).await;
        assert_eq!(app.pending_delete(), Some("c2"));
        app.handle_key(key(KeyCode::Char('n'))).await;
        assert_eq!(app.pending_delete(), None);
        assert_eq!(app.chat().chats().len(), 2);

        app.handle_key(key(KeyCode::Delete)).await;
        app.handle_key(key(KeyCode::Char('y'))).await;
        let ids: Vec<_> = app.chat().chats().iter().map(|c| c.chat_id.as_str()).collect();
        assert_eq!(ids, vec!["c1"]);
        // Active chat deleted: first remaining chat is opened
        assert_eq!(app.chat().active_chat_id(), Some("c1"));
    }

    #[tokio::test]
    async fn test_suggestions_fill_the_input() {
        let backend = Arc::new(FakeBackend::new());
        let mut app = app_with(&backend).await;

        let samples = app.suggestions();
        assert_eq!(samples.len(), 3);
        app.handle_key(ctrl('r')).await;
        assert_eq!(app.input().text(), samples[0]);
        app.handle_key(ctrl('r')).await;
        assert_eq!(app.input().text(), samples[1]);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits() {
        let backend = Arc::new(FakeBackend::new());
        let mut app = app_with(&backend).await;
        app.handle_key(ctrl('c')).await;
        assert!(app.should_quit());
    }

    #[tokio::test]
    async fn test_home_and_end_update_mention_popup() {
        let backend = Arc::new(FakeBackend::new());
        *backend.products.lock().unwrap() = two_products();
        let mut app = app_with(&backend).await;

        type_text(&mut app, "Check @pu").await;
        assert!(app.mentions().is_visible());
        assert_eq!(app.mentions().len(), 1);

        app.handle_key(key(KeyCode::Home)).await;
        assert_eq!(app.input().caret(), 0);
        assert!(!app.mentions().is_visible());

        app.handle_key(key(KeyCode::End)).await;
        assert!(app.mentions().is_visible());
        assert_eq!(app.mentions().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_query_restores_input() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_query_response(Err(ApiError::Network("connection refused".to_string())));
        let mut app = app_with(&backend).await;

        type_text(&mut app, "Is this Class II?").await;
        app.handle_key(key(KeyCode::Enter)).await;
        assert!(app.input().is_empty());

        wait_for_answer(&mut app).await;
        assert_eq!(app.input().text(), "Is this Class II?");
        assert!(app.chat().messages().is_empty());
        assert!(app.chat().error().is_some());
        assert!(app.session().recent_queries().is_empty());
    }

    #[tokio::test]
    async fn test_failed_query_keeps_text_typed_while_waiting() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_query_response(Err(ApiError::Network("connection refused".to_string())));
        let mut app = app_with(&backend).await;

        type_text(&mut app, "first").await;
        app.handle_key(key(KeyCode::Enter)).await;
        type_text(&mut app, "second").await;

        wait_for_answer(&mut app).await;
        assert_eq!(app.input().text(), "second");
    }

    #[tokio::test]
    async fn test_ctrl_y_copies_latest_answer() {
        let backend = Arc::new(FakeBackend::new());
        let clipboard = RecordingClipboard::default();
        let mut app = app_with(&backend)
            .await
            .with_clipboard(Box::new(clipboard.clone()));

        app.handle_key(ctrl('y')).await;
        assert_eq!(app.notice(), Some("No answer to copy"));
        assert!(clipboard.copied.lock().unwrap().is_empty());

        type_text(&mut app, "first").await;
        app.handle_key(key(KeyCode::Enter)).await;
        wait_for_answer(&mut app).await;
        type_text(&mut app, "second").await;
        app.handle_key(key(KeyCode::Enter)).await;
        wait_for_answer(&mut app).await;

        app.handle_key(ctrl('y')).await;
        assert_eq!(*clipboard.copied.lock().unwrap(), vec!["answer to second"]);
        assert_eq!(app.notice(), Some("Answer copied to clipboard"));
        // Copying leaves the draft alone
        assert!(app.input().is_empty());

        app.handle_key(key(KeyCode::Char('x'))).await;
        assert_eq!(app.notice(), None);
    }

    #[tokio::test]
    async fn test_copy_failure_is_reported() {
        let backend = Arc::new(FakeBackend::new());
        let clipboard = RecordingClipboard {
            fail: true,
            ..Default::default()
        };
        let mut app = app_with(&backend).await.with_clipboard(Box::new(clipboard));

        type_text(&mut app, "q").await;
        app.handle_key(key(KeyCode::Enter)).await;
        wait_for_answer(&mut app).await;

        app.handle_key(ctrl('y')).await;
        assert_eq!(app.notice(), Some("Copy failed: no display"));
    }
}
