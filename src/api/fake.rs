//! In-memory backend used by unit tests

use super::error::{ApiError, ApiResult};
use super::types::*;
use super::{AuthApi, ChatApi, DocumentApi, LogApi, ProductApi, ProgressCallback};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scriptable stand-in for the REST backend
#[derive(Default)]
pub struct FakeBackend {
    pub chats: Mutex<Vec<ChatSummary>>,
    pub histories: Mutex<HashMap<String, Vec<ChatMessageTurn>>>,
    pub query_responses: Mutex<VecDeque<ApiResult<QueryResponse>>>,
    pub query_requests: Mutex<Vec<QueryRequest>>,
    pub fail_delete_chat: Mutex<Option<String>>,
    pub fail_history: Mutex<bool>,
    pub products: Mutex<Vec<Product>>,
    pub documents: Mutex<Vec<LoadedDocument>>,
    pub failing_uploads: Mutex<HashSet<String>>,
    pub uploaded: Mutex<Vec<String>>,
    pub fail_delete_document: Mutex<bool>,
    pub logs: Mutex<Vec<LogEntry>>,
    pub organizations: Mutex<Vec<String>>,
    pub login_result: Mutex<Option<ApiResult<LoginResponse>>>,
    pub signups: Mutex<Vec<SignupRequest>>,
    pub chat_list_calls: AtomicUsize,
    pub document_list_calls: AtomicUsize,
    pub log_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chats(self, chats: Vec<ChatSummary>) -> Self {
        *self.chats.lock().unwrap() = chats;
        self
    }

    pub fn push_query_response(&self, response: ApiResult<QueryResponse>) {
        self.query_responses.lock().unwrap().push_back(response);
    }

    pub fn set_history(&self, chat_id: &str, turns: Vec<ChatMessageTurn>) {
        self.histories
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), turns);
    }

    pub fn push_log(&self, id: u64, message: &str) {
        self.logs.lock().unwrap().push(LogEntry {
            id,
            message: message.to_string(),
        });
    }
}

fn status_error(status: u16, message: &str) -> ApiError {
    ApiError::Status {
        status,
        message: message.to_string(),
        server_message: Some(message.to_string()),
    }
}

#[async_trait]
impl ChatApi for FakeBackend {
    async fn query(&self, request: &QueryRequest) -> ApiResult<QueryResponse> {
        self.query_requests.lock().unwrap().push(request.clone());
        let next = self.query_responses.lock().unwrap().pop_front();
        let response = next.unwrap_or_else(|| {
            Ok(QueryResponse {
                answer: format!("answer to {}", request.query),
                ..Default::default()
            })
        })?;

        if let Some(chat_id) = &response.chat_id {
            let mut chats = self.chats.lock().unwrap();
            if !chats.iter().any(|c| &c.chat_id == chat_id) {
                chats.insert(
                    0,
                    ChatSummary::new(
                        chat_id.clone(),
                        response.chat_name.clone().unwrap_or_default(),
                    ),
                );
            }
        }
        Ok(response)
    }

    async fn chat_list(&self) -> ApiResult<Vec<ChatSummary>> {
        self.chat_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chats.lock().unwrap().clone())
    }

    async fn delete_chat(&self, chat_id: &str) -> ApiResult<()> {
        if let Some(message) = self.fail_delete_chat.lock().unwrap().clone() {
            return Err(ApiError::Network(message));
        }
        self.chats.lock().unwrap().retain(|c| c.chat_id != chat_id);
        Ok(())
    }

    async fn chat_history(&self, chat_id: &str) -> ApiResult<Vec<ChatMessageTurn>> {
        if *self.fail_history.lock().unwrap() {
            return Err(status_error(500, "history unavailable"));
        }
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(chat_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProductApi for FakeBackend {
    async fn products(&self) -> ApiResult<Vec<Product>> {
        Ok(self.products.lock().unwrap().clone())
    }

    async fn create_product(&self, draft: &ProductDraft) -> ApiResult<()> {
        let mut products = self.products.lock().unwrap();
        let id = products.len() as u64 + 1;
        products.push(Product {
            id: serde_json::json!(id),
            title: draft.title.clone(),
            info: draft.info.clone(),
            color: draft.color,
        });
        Ok(())
    }

    async fn update_product(&self, id: &str, draft: &ProductDraft) -> ApiResult<()> {
        let mut products = self.products.lock().unwrap();
        let product = products
            .iter_mut()
            .find(|p| p.id_string() == id)
            .ok_or_else(|| status_error(404, "Product not found"))?;
        product.title = draft.title.clone();
        product.info = draft.info.clone();
        product.color = draft.color;
        Ok(())
    }

    async fn delete_product(&self, id: &str) -> ApiResult<()> {
        self.products.lock().unwrap().retain(|p| p.id_string() != id);
        Ok(())
    }
}

#[async_trait]
impl DocumentApi for FakeBackend {
    async fn documents(&self) -> ApiResult<Vec<LoadedDocument>> {
        self.document_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn upload_document(
        &self,
        file_name: &str,
        data: Vec<u8>,
        progress: ProgressCallback,
    ) -> ApiResult<()> {
        progress(0);
        if self.failing_uploads.lock().unwrap().contains(file_name) {
            return Err(status_error(500, "Upload failed with status 500"));
        }
        progress(50);
        tokio::task::yield_now().await;
        progress(100);

        self.uploaded.lock().unwrap().push(file_name.to_string());
        self.documents.lock().unwrap().push(LoadedDocument {
            name: file_name.to_string(),
            size: serde_json::json!(data.len()),
            chunks: serde_json::json!(1),
        });
        Ok(())
    }

    async fn delete_document(&self, name: &str) -> ApiResult<()> {
        if *self.fail_delete_document.lock().unwrap() {
            return Err(status_error(500, "delete failed"));
        }
        self.documents.lock().unwrap().retain(|d| d.name != name);
        Ok(())
    }
}

#[async_trait]
impl LogApi for FakeBackend {
    async fn logs(&self, last_id: u64) -> ApiResult<Vec<LogEntry>> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.id > last_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuthApi for FakeBackend {
    async fn organizations(&self) -> ApiResult<Vec<String>> {
        Ok(self.organizations.lock().unwrap().clone())
    }

    async fn signup(&self, request: &SignupRequest) -> ApiResult<()> {
        self.signups.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn login(&self, _request: &LoginRequest) -> ApiResult<LoginResponse> {
        self.login_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(status_error(401, "Invalid credentials")))
    }
}
