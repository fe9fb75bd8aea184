//! Product catalog
//!
//! Local mirror of `/api/products`. Products are the targets of `@` mentions
//! in the chat input and carry a colour tag shown next to chats that
//! reference them.

use crate::api::{ApiError, ApiResult, Product, ProductApi, ProductDraft};
use std::sync::Arc;
use thiserror::Error;

const PREVIEW_WORDS: usize = 50;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product title cannot be empty")]
    EmptyTitle,

    #[error("{0}")]
    Api(#[from] ApiError),
}

/// First 50 words of `info`, with `...` when anything was cut
pub fn info_preview(info: &str) -> String {
    let words: Vec<&str> = info.split_whitespace().collect();
    if words.len() > PREVIEW_WORDS {
        format!("{}...", words[..PREVIEW_WORDS].join(" "))
    } else {
        words.join(" ")
    }
}

pub struct ProductCatalog {
    api: Arc<dyn ProductApi>,
    products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new(api: Arc<dyn ProductApi>) -> Self {
        Self {
            api,
            products: Vec::new(),
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id_string() == id)
    }

    pub async fn refresh(&mut self) -> ApiResult<&[Product]> {
        self.products = self.api.products().await?;
        tracing::debug!("Loaded {} product(s)", self.products.len());
        Ok(&self.products)
    }

    pub async fn create(&mut self, draft: ProductDraft) -> Result<(), ProductError> {
        let draft = validate(draft)?;
        self.api.create_product(&draft).await?;
        tracing::info!("Created product {}", draft.title);
        self.refetch().await;
        Ok(())
    }

    pub async fn update(&mut self, id: &str, draft: ProductDraft) -> Result<(), ProductError> {
        let draft = validate(draft)?;
        self.api.update_product(id, &draft).await?;
        tracing::info!("Updated product {}", id);
        self.refetch().await;
        Ok(())
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), ProductError> {
        self.api.delete_product(id).await?;
        tracing::info!("Deleted product {}", id);
        self.refetch().await;
        Ok(())
    }

    async fn refetch(&mut self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!("Error fetching products: {}", e);
        }
    }
}

fn validate(mut draft: ProductDraft) -> Result<ProductDraft, ProductError> {
    draft.title = draft.title.trim().to_string();
    if draft.title.is_empty() {
        return Err(ProductError::EmptyTitle);
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeBackend;
    use crate::api::ProductColor;

    fn draft(title: &str, color: ProductColor) -> ProductDraft {
        ProductDraft {
            title: title.to_string(),
            info: "Class II infusion pump".to_string(),
            color,
        }
    }

    #[test]
    fn test_info_preview_truncates_at_fifty_words() {
        let long: Vec<String> = (1..=60).map(|i| format!("w{}", i)).collect();
        let preview = info_preview(&long.join(" "));
        assert!(preview.ends_with("w50..."));
        assert_eq!(preview.split_whitespace().count(), 50);

        assert_eq!(info_preview("short  text\nhere"), "short text here");
        let exact: Vec<String> = (1..=50).map(|i| i.to_string()).collect();
        assert!(!info_preview(&exact.join(" ")).ends_with("..."));
    }

    #[tokio::test]
    async fn test_crud_refetches_after_each_change() {
        let backend = Arc::new(FakeBackend::new());
        let mut catalog = ProductCatalog::new(backend.clone());

        catalog
            .create(draft("Pump X", ProductColor::Red))
            .await
            .unwrap();
        assert_eq!(catalog.products().len(), 1);
        let id = catalog.products()[0].id_string();

        catalog
            .update(&id, draft("Pump X2", ProductColor::Green))
            .await
            .unwrap();
        let product = catalog.find(&id).unwrap();
        assert_eq!(product.title, "Pump X2");
        assert_eq!(product.color, ProductColor::Green);

        catalog.delete(&id).await.unwrap();
        assert!(catalog.products().is_empty());
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected_locally() {
        let backend = Arc::new(FakeBackend::new());
        let mut catalog = ProductCatalog::new(backend.clone());

        let err = catalog
            .create(draft("   ", ProductColor::Blue))
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::EmptyTitle));
        assert!(backend.products.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_missing_product_surfaces_error() {
        let backend = Arc::new(FakeBackend::new());
        let mut catalog = ProductCatalog::new(backend);

        let err = catalog
            .update("404", draft("Ghost", ProductColor::White))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Product not found");
    }
}
