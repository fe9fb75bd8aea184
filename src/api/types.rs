//! Wire types for the GCN backend
//!
//! All list fields are lenient: a missing or `null` array deserializes as
//! empty so partially populated history entries still render.

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize `null` or a missing field as `T::default()`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize an opaque id sent as either a string or a number
fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {}",
            other
        ))),
    }
}

fn id_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_id(deserializer)?.unwrap_or_default())
}

/// A saved conversation as listed in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    #[serde(default, deserialize_with = "id_or_empty")]
    pub chat_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chat_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_colors: Vec<ProductColorTag>,
}

impl ChatSummary {
    pub fn new(chat_id: impl Into<String>, chat_name: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            chat_name: chat_name.into(),
            product_colors: Vec::new(),
        }
    }

    /// Name shown in the chat list
    pub fn display_name(&self) -> &str {
        if self.chat_name.trim().is_empty() {
            "Unnamed Chat"
        } else {
            &self.chat_name
        }
    }
}

/// Colour dot attached to a chat for each product it mentions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductColorTag {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub color: ProductColor,
}

/// A document page cited by an answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfReference {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub page_number: Vec<u32>,
}

impl PdfReference {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "Unnamed Document",
        }
    }

    /// Pages in ascending order, without duplicates
    pub fn sorted_pages(&self) -> Vec<u32> {
        let mut pages = self.page_number.clone();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    /// Viewer links for every cited page
    pub fn citation_links(&self, base_url: &str) -> Vec<String> {
        let encoded: String =
            url::form_urlencoded::byte_serialize(self.display_name().as_bytes()).collect();
        let base = base_url.trim_end_matches('/');
        self.sorted_pages()
            .into_iter()
            .map(|page| format!("{base}/api/pdf/pdf?name={encoded}#page={page}"))
            .collect()
    }
}

/// One query/answer exchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageTurn {
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pdf_references: Vec<PdfReference>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub online_images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub online_videos: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub online_links: Vec<String>,
    #[serde(
        default,
        alias = "relevant_queries",
        deserialize_with = "null_as_default"
    )]
    pub related_queries: Vec<String>,
}

impl ChatMessageTurn {
    /// Embeddable player URLs for the turn's video ids
    pub fn video_embed_urls(&self) -> Vec<String> {
        self.online_videos
            .iter()
            .map(|id| format!("https://www.youtube-nocookie.com/embed/{id}?modestbranding=1&rel=0"))
            .collect()
    }
}

/// Body of `POST /api/query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub query: String,
    pub org_query: String,
    pub chat_id: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, chat_id: Option<String>) -> Self {
        let query = query.into();
        Self {
            org_query: query.clone(),
            query,
            chat_id,
        }
    }
}

/// Response of `POST /api/query`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryResponse {
    #[serde(default, alias = "chatId", deserialize_with = "optional_id")]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub chat_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pdf_references: Vec<PdfReference>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub online_images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub online_videos: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub online_links: Vec<String>,
    #[serde(
        default,
        alias = "relevant_queries",
        deserialize_with = "null_as_default"
    )]
    pub related_queries: Vec<String>,
}

impl QueryResponse {
    /// Build the turn appended to the message list
    pub fn into_turn(self, query: impl Into<String>) -> ChatMessageTurn {
        ChatMessageTurn {
            query: query.into(),
            answer: self.answer,
            pdf_references: self.pdf_references,
            online_images: self.online_images,
            online_videos: self.online_videos,
            online_links: self.online_links,
            related_queries: self.related_queries,
        }
    }
}

/// Fixed colour palette for products
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductColor {
    Red,
    Purple,
    Orange,
    Green,
    #[default]
    Blue,
    White,
}

impl ProductColor {
    pub const ALL: [ProductColor; 6] = [
        ProductColor::Red,
        ProductColor::Purple,
        ProductColor::Orange,
        ProductColor::Green,
        ProductColor::Blue,
        ProductColor::White,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductColor::Red => "red",
            ProductColor::Purple => "purple",
            ProductColor::Orange => "orange",
            ProductColor::Green => "green",
            ProductColor::Blue => "blue",
            ProductColor::White => "white",
        }
    }
}

impl std::fmt::Display for ProductColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Unknown colours from the server fall back to the default instead of
// failing the whole list.
impl<'de> Deserialize<'de> for ProductColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
    }
}

impl std::str::FromStr for ProductColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductColor::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown color '{}'. Expected one of: red, purple, orange, green, blue, white",
                    s
                )
            })
    }
}

/// A user-defined tag usable as an `@mention`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub info: String,
    #[serde(default)]
    pub color: ProductColor,
}

impl Product {
    /// Identifier as it appears in `/api/products/{id}`
    pub fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Body of product create/update requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub title: String,
    pub info: String,
    pub color: ProductColor,
}

/// Page metadata shown next to a bare link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadata {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
}

/// A document held by the retrieval service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub name: String,
    #[serde(default)]
    pub size: serde_json::Value,
    #[serde(default)]
    pub chunks: serde_json::Value,
}

impl LoadedDocument {
    pub fn size_label(&self) -> String {
        value_label(&self.size)
    }

    pub fn chunks_label(&self) -> String {
        value_label(&self.chunks)
    }
}

fn value_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A backend progress log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    #[serde(default)]
    pub message: String,
}

/// Body of `POST /api/login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response of `POST /api/login`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default, alias = "userId")]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

/// Body of `POST /api/signup`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub organization: String,
}
