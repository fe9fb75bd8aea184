//! Client for the GCN REST backend
//!
//! Each screen talks to the backend through the narrow trait it needs, so
//! controllers can be driven by the HTTP client in production and by an
//! in-memory double in tests.

mod error;
mod http;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use error::{error_message_from_body, ApiError, ApiResult};
pub use http::HttpBackend;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Upload progress sink, called with a percentage in `0..=100`
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Query answering and chat persistence
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn query(&self, request: &QueryRequest) -> ApiResult<QueryResponse>;

    async fn chat_list(&self) -> ApiResult<Vec<ChatSummary>>;

    async fn delete_chat(&self, chat_id: &str) -> ApiResult<()>;

    /// Full history of one chat; an empty or non-array body yields `[]`
    async fn chat_history(&self, chat_id: &str) -> ApiResult<Vec<ChatMessageTurn>>;
}

/// Product (mention tag) CRUD
#[async_trait]
pub trait ProductApi: Send + Sync {
    async fn products(&self) -> ApiResult<Vec<Product>>;

    async fn create_product(&self, draft: &ProductDraft) -> ApiResult<()>;

    async fn update_product(&self, id: &str, draft: &ProductDraft) -> ApiResult<()>;

    async fn delete_product(&self, id: &str) -> ApiResult<()>;
}

/// Document registry of the retrieval service
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn documents(&self) -> ApiResult<Vec<LoadedDocument>>;

    /// Multipart upload of one file, reporting progress as bytes go out
    async fn upload_document(
        &self,
        file_name: &str,
        data: Vec<u8>,
        progress: ProgressCallback,
    ) -> ApiResult<()>;

    async fn delete_document(&self, name: &str) -> ApiResult<()>;
}

/// Backend progress log feed
#[async_trait]
pub trait LogApi: Send + Sync {
    /// Entries with an id greater than `last_id`, oldest first
    async fn logs(&self, last_id: u64) -> ApiResult<Vec<LogEntry>>;
}

/// Account endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn organizations(&self) -> ApiResult<Vec<String>>;

    async fn signup(&self, request: &SignupRequest) -> ApiResult<()>;

    async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse>;
}

/// Everything the full client needs
pub trait Backend: ChatApi + ProductApi + DocumentApi + LogApi + AuthApi {}

impl<T> Backend for T where T: ChatApi + ProductApi + DocumentApi + LogApi + AuthApi {}
