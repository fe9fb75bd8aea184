//! Persisted client session
//!
//! Holds the signed-in identity and the recent query list. The context is
//! loaded once at start-up, handed to the screens that need it, and written
//! back whenever it changes. Stored as `session.json` in the data directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Session storage filename
const SESSION_FILENAME: &str = "session.json";

/// Default cap on remembered queries
pub const DEFAULT_MAX_RECENT_QUERIES: usize = 20;

/// Sample questions offered on an empty chat screen
pub const SAMPLE_QUERIES: [&str; 20] = [
    "What are the key requirements for ISO 27001?",
    "Explain IEC 62304 compliance",
    "How to implement MISRA coding standards?",
    "What is GDPR and how do I comply?",
    "Explain the main requirements for HIPAA compliance",
    "What are the steps to achieve FDA compliance for medical devices?",
    "How do CE marking requirements affect my products?",
    "What is 21 CFR Part 11 compliance?",
    "Explain the compliance process for ISO 13485",
    "What are the key security controls in ISO 27001?",
    "How to prepare for a GDPR audit?",
    "What are the main requirements for SOC 2 compliance?",
    "Explain NIST Cybersecurity Framework requirements",
    "How do I create a HIPAA-compliant application?",
    "What documentation is required for FDA submission?",
    "How to implement a Quality Management System for medical devices?",
    "What are the security requirements for PCI DSS compliance?",
    "Explain the difference between ISO 9001 and ISO 13485",
    "How to conduct a risk assessment for medical devices?",
    "What are the key aspects of CMMC compliance?",
];

/// Pick `count` distinct sample queries starting from a seed-derived offset
pub fn sample_queries(seed: u64, count: usize) -> Vec<&'static str> {
    let len = SAMPLE_QUERIES.len();
    let count = count.min(len);
    // 7 is coprime with 20, so the stride visits distinct entries
    let start = (seed % len as u64) as usize;
    (0..count)
        .map(|i| SAMPLE_QUERIES[(start + i * 7) % len])
        .collect()
}

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionData {
    #[serde(default)]
    identity: Option<Identity>,
    #[serde(default)]
    recent_queries: Vec<String>,
}

/// Identity and recent queries with load-at-start, save-on-change lifecycle
#[derive(Debug)]
pub struct SessionContext {
    data: SessionData,
    max_recent: usize,
    storage_path: Option<PathBuf>,
}

impl SessionContext {
    /// Load from `path`, starting empty when the file is missing or unreadable
    pub fn load(storage_path: PathBuf) -> Self {
        let data = match Self::load_from_disk(&storage_path) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file: {:#}", e);
                SessionData::default()
            }
        };

        Self {
            data,
            max_recent: DEFAULT_MAX_RECENT_QUERIES,
            storage_path: Some(storage_path),
        }
    }

    /// Load from the standard file inside `data_dir`
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self::load(data_dir.join(SESSION_FILENAME))
    }

    /// Session that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            data: SessionData::default(),
            max_recent: DEFAULT_MAX_RECENT_QUERIES,
            storage_path: None,
        }
    }

    pub fn with_max_recent(mut self, max_recent: usize) -> Self {
        self.max_recent = max_recent.max(1);
        self.trim_recent();
        self
    }

    fn load_from_disk(path: &Path) -> Result<SessionData> {
        if !path.exists() {
            return Ok(SessionData::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read session file")?;
        let data = serde_json::from_str(&content).context("Failed to parse session file")?;
        Ok(data)
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write session file {}", path.display()))?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            tracing::warn!("Failed to save session: {:#}", e);
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.data.identity.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.data.identity.is_some()
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.data.identity = Some(identity);
        self.persist();
    }

    pub fn clear_identity(&mut self) {
        if self.data.identity.take().is_some() {
            self.persist();
        }
    }

    /// Remember a submitted query (most recent last)
    ///
    /// Blank input and repeats of the most recent entry are ignored.
    pub fn record_query(&mut self, query: &str) {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.data.recent_queries.last().map(String::as_str) == Some(trimmed) {
            return;
        }

        self.data.recent_queries.push(trimmed.to_string());
        self.trim_recent();
        self.persist();
    }

    fn trim_recent(&mut self) {
        let len = self.data.recent_queries.len();
        if len > self.max_recent {
            self.data.recent_queries.drain(..len - self.max_recent);
        }
    }

    pub fn recent_queries(&self) -> &[String] {
        &self.data.recent_queries
    }
}
