//! Document upload and registry management
//!
//! Files are queued locally, then sent one at a time. The registry of
//! documents the backend already holds is a cached copy that is refetched
//! after every upload batch.

use crate::api::{ApiError, ApiResult, DocumentApi, LoadedDocument, ProgressCallback};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub const PDF_ONLY_NOTICE: &str = "Only PDF files are allowed";
pub const DELETE_FAILED_NOTICE: &str = "Failed to delete document";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Called with the file name and its progress whenever an upload advances
pub type UploadObserver = Arc<dyn Fn(&str, u8) + Send + Sync>;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("An upload is already in progress")]
    Busy,

    #[error("No document is marked for deletion")]
    NothingMarked,

    #[error("{0}")]
    Api(#[from] ApiError),
}

/// A local file waiting to be uploaded
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    progress: Arc<AtomicU8>,
}

impl UploadItem {
    fn new(path: PathBuf, size: u64) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            size,
            progress: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Percent sent, 0..=100
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    pub fn size_label(&self) -> String {
        format_megabytes(self.size)
    }
}

/// What happened to one file of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub name: String,
    pub outcome: UploadOutcome,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.outcome == UploadOutcome::Uploaded
    }
}

/// `1_572_864` bytes -> `"1.50 MB"`
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// PDF by extension (any case) or by the `%PDF-` header
pub fn is_pdf(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    by_extension || has_pdf_magic(path)
}

fn has_pdf_magic(path: &Path) -> bool {
    let mut header = [0u8; 5];
    std::fs::File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map(|_| header == PDF_MAGIC)
        .unwrap_or(false)
}

pub struct UploadController {
    api: Arc<dyn DocumentApi>,
    queue: Vec<UploadItem>,
    documents: Vec<LoadedDocument>,
    uploading: bool,
    marked_for_delete: Option<String>,
    notices: Vec<String>,
}

impl UploadController {
    pub fn new(api: Arc<dyn DocumentApi>) -> Self {
        Self {
            api,
            queue: Vec::new(),
            documents: Vec::new(),
            uploading: false,
            marked_for_delete: None,
            notices: Vec::new(),
        }
    }

    pub fn queue(&self) -> &[UploadItem] {
        &self.queue
    }

    pub fn documents(&self) -> &[LoadedDocument] {
        &self.documents
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub fn clear_notices(&mut self) {
        self.notices.clear();
    }

    /// Queue a batch of files, returning how many were accepted
    ///
    /// Non-PDF files are dropped with a single notice for the batch; the
    /// rest of the batch is still queued.
    pub fn add_files<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut accepted = 0;
        let mut rejected = false;

        for path in paths {
            let path = path.into();
            if !is_pdf(&path) {
                tracing::warn!("Rejected non-PDF file {}", path.display());
                rejected = true;
                continue;
            }
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            self.queue.push(UploadItem::new(path, size));
            accepted += 1;
        }

        if rejected {
            self.notices.push(PDF_ONLY_NOTICE.to_string());
        }
        accepted
    }

    pub fn remove_file(&mut self, index: usize) -> Option<UploadItem> {
        if self.uploading || index >= self.queue.len() {
            return None;
        }
        Some(self.queue.remove(index))
    }

    /// Upload every queued file in order
    ///
    /// A failing file is reported and skipped. The queue is emptied and the
    /// registry refetched once the batch is done.
    pub async fn upload_all(
        &mut self,
        observer: Option<UploadObserver>,
    ) -> Result<Vec<UploadReport>, UploadError> {
        if self.uploading {
            return Err(UploadError::Busy);
        }
        if self.queue.is_empty() {
            return Ok(Vec::new());
        }

        self.uploading = true;
        let mut reports = Vec::with_capacity(self.queue.len());

        for item in &self.queue {
            let result = self.upload_one(item, observer.clone()).await;
            let outcome = match result {
                Ok(()) => {
                    tracing::info!("Uploaded {}", item.name);
                    UploadOutcome::Uploaded
                }
                Err(e) => {
                    tracing::error!("Error uploading {}: {}", item.name, e);
                    self.notices.push(format!("Failed to upload {}", item.name));
                    UploadOutcome::Failed(e.to_string())
                }
            };
            reports.push(UploadReport {
                name: item.name.clone(),
                outcome,
            });
        }

        self.queue.clear();
        self.uploading = false;

        if let Err(e) = self.refresh_documents().await {
            tracing::warn!("Failed to refresh documents after upload: {}", e);
        }
        Ok(reports)
    }

    async fn upload_one(
        &self,
        item: &UploadItem,
        observer: Option<UploadObserver>,
    ) -> ApiResult<()> {
        let data = tokio::fs::read(&item.path).await?;

        let progress = Arc::clone(&item.progress);
        let name = item.name.clone();
        let callback: ProgressCallback = Arc::new(move |percent: u8| {
            let percent = percent.min(100);
            progress.fetch_max(percent, Ordering::SeqCst);
            if let Some(observer) = &observer {
                observer(&name, percent);
            }
        });

        self.api.upload_document(&item.name, data, callback).await
    }

    pub async fn refresh_documents(&mut self) -> ApiResult<&[LoadedDocument]> {
        let documents = self.api.documents().await?;
        tracing::debug!("Loaded {} document(s)", documents.len());
        self.documents = documents;
        Ok(&self.documents)
    }

    /// Registry entries whose name contains `term`, ignoring case
    pub fn filtered_documents(&self, term: &str) -> Vec<&LoadedDocument> {
        let term = term.trim().to_lowercase();
        self.documents
            .iter()
            .filter(|doc| term.is_empty() || doc.name.to_lowercase().contains(&term))
            .collect()
    }

    pub fn mark_for_delete(&mut self, name: impl Into<String>) {
        self.marked_for_delete = Some(name.into());
    }

    pub fn marked_for_delete(&self) -> Option<&str> {
        self.marked_for_delete.as_deref()
    }

    pub fn cancel_delete(&mut self) {
        self.marked_for_delete = None;
    }

    /// Delete the marked document, returning its name
    ///
    /// Success only touches the local registry; failure leaves it as is.
    pub async fn confirm_delete(&mut self) -> Result<String, UploadError> {
        let name = self
            .marked_for_delete
            .take()
            .ok_or(UploadError::NothingMarked)?;

        match self.api.delete_document(&name).await {
            Ok(()) => {
                self.documents.retain(|doc| doc.name != name);
                Ok(name)
            }
            Err(e) => {
                tracing::error!("Error deleting document {}: {}", name, e);
                self.notices.push(DELETE_FAILED_NOTICE.to_string());
                Err(UploadError::Api(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeBackend;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn doc(name: &str) -> LoadedDocument {
        LoadedDocument {
            name: name.to_string(),
            size: serde_json::json!(10),
            chunks: serde_json::json!(2),
        }
    }

    fn controller(backend: &Arc<FakeBackend>) -> UploadController {
        UploadController::new(backend.clone())
    }

    #[test]
    fn test_pdf_detection() {
        let dir = TempDir::new().unwrap();
        assert!(is_pdf(&write(&dir, "Report.PDF", b"whatever")));
        assert!(is_pdf(&write(&dir, "scan", b"%PDF-1.7\n...")));
        assert!(!is_pdf(&write(&dir, "notes.txt", b"plain text")));
        assert!(!is_pdf(&dir.path().join("missing.bin")));
    }

    #[test]
    fn test_mixed_batch_keeps_pdfs_and_notifies_once() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::new());
        let mut uploads = controller(&backend);

        let accepted = uploads.add_files([
            write(&dir, "a.pdf", b"%PDF-1.4"),
            write(&dir, "b.docx", b"PK"),
            write(&dir, "c.png", b"\x89PNG"),
            write(&dir, "d.pdf", b"%PDF-1.4"),
        ]);

        assert_eq!(accepted, 2);
        let names: Vec<_> = uploads.queue().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "d.pdf"]);
        assert_eq!(uploads.notices(), &[PDF_ONLY_NOTICE.to_string()]);
    }

    #[test]
    fn test_remove_file() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::new());
        let mut uploads = controller(&backend);
        uploads.add_files([write(&dir, "a.pdf", b""), write(&dir, "b.pdf", b"")]);

        assert_eq!(uploads.remove_file(0).unwrap().name, "a.pdf");
        assert!(uploads.remove_file(5).is_none());
        assert_eq!(uploads.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_queue_is_a_no_op() {
        let backend = Arc::new(FakeBackend::new());
        let mut uploads = controller(&backend);

        let reports = uploads.upload_all(None).await.unwrap();
        assert!(reports.is_empty());
        assert_eq!(backend.document_list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_in_the_middle_does_not_stop_the_batch() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::new());
        backend
            .failing_uploads
            .lock()
            .unwrap()
            .insert("two.pdf".to_string());
        let mut uploads = controller(&backend);
        uploads.add_files([
            write(&dir, "one.pdf", b"%PDF-1"),
            write(&dir, "two.pdf", b"%PDF-2"),
            write(&dir, "three.pdf", b"%PDF-3"),
        ]);

        let reports = uploads.upload_all(None).await.unwrap();

        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_success());
        assert!(!reports[1].is_success());
        assert!(reports[2].is_success());
        assert_eq!(
            *backend.uploaded.lock().unwrap(),
            vec!["one.pdf".to_string(), "three.pdf".to_string()]
        );
        assert!(uploads.queue().is_empty());
        assert!(!uploads.is_uploading());
        assert_eq!(uploads.notices(), &["Failed to upload two.pdf".to_string()]);
        // Registry refetched after the batch
        assert_eq!(backend.document_list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(uploads.documents().len(), 2);
    }

    #[tokio::test]
    async fn test_progress_is_reported_per_file_and_never_decreases() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::new());
        let mut uploads = controller(&backend);
        uploads.add_files([
            write(&dir, "one.pdf", b"%PDF-1"),
            write(&dir, "two.pdf", b"%PDF-2"),
        ]);

        let seen: Arc<Mutex<Vec<(String, u8)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: UploadObserver = Arc::new(move |name: &str, percent: u8| {
            sink.lock().unwrap().push((name.to_string(), percent));
        });

        uploads.upload_all(Some(observer)).await.unwrap();

        let seen = seen.lock().unwrap();
        for name in ["one.pdf", "two.pdf"] {
            let steps: Vec<u8> = seen
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, p)| *p)
                .collect();
            assert_eq!(steps.first(), Some(&0));
            assert_eq!(steps.last(), Some(&100));
            assert!(steps.windows(2).all(|w| w[0] <= w[1]));
        }
        // Files go strictly one after the other
        let first_two = seen.iter().position(|(n, _)| n == "two.pdf").unwrap();
        let last_one = seen.iter().rposition(|(n, _)| n == "one.pdf").unwrap();
        assert!(last_one < first_two);
    }

    #[tokio::test]
    async fn test_two_step_delete() {
        let backend = Arc::new(FakeBackend::new());
        *backend.documents.lock().unwrap() = vec![doc("keep.pdf"), doc("drop.pdf")];
        let mut uploads = controller(&backend);
        uploads.refresh_documents().await.unwrap();

        assert!(matches!(
            uploads.confirm_delete().await,
            Err(UploadError::NothingMarked)
        ));

        uploads.mark_for_delete("drop.pdf");
        uploads.cancel_delete();
        assert!(uploads.marked_for_delete().is_none());

        uploads.mark_for_delete("drop.pdf");
        assert_eq!(uploads.confirm_delete().await.unwrap(), "drop.pdf");
        let names: Vec<_> = uploads.documents().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["keep.pdf"]);
        // Local removal only
        assert_eq!(backend.document_list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_registry_unchanged() {
        let backend = Arc::new(FakeBackend::new());
        *backend.documents.lock().unwrap() = vec![doc("a.pdf")];
        *backend.fail_delete_document.lock().unwrap() = true;
        let mut uploads = controller(&backend);
        uploads.refresh_documents().await.unwrap();

        uploads.mark_for_delete("a.pdf");
        assert!(uploads.confirm_delete().await.is_err());
        assert_eq!(uploads.documents().len(), 1);
        assert_eq!(uploads.notices(), &[DELETE_FAILED_NOTICE.to_string()]);
    }

    #[tokio::test]
    async fn test_filtered_documents() {
        let backend = Arc::new(FakeBackend::new());
        *backend.documents.lock().unwrap() =
            vec![doc("ISO-13485.pdf"), doc("MDR Annex I.pdf"), doc("iso-14971.pdf")];
        let mut uploads = controller(&backend);
        uploads.refresh_documents().await.unwrap();

        assert_eq!(uploads.filtered_documents("iso").len(), 2);
        assert_eq!(uploads.filtered_documents("  ").len(), 3);
        assert!(uploads.filtered_documents("fda").is_empty());
    }

    #[test]
    fn test_megabyte_labels() {
        assert_eq!(format_megabytes(0), "0.00 MB");
        assert_eq!(format_megabytes(1_572_864), "1.50 MB");
    }
}
