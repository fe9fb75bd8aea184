//! Metadata resolver strategies
//!
//! A resolver turns a URL into [`LinkMetadata`] or fails. The chain tries
//! its resolvers in order and falls back to hostname-only metadata, so
//! resolution as a whole never fails.

use super::html::extract_metadata;
use crate::api::LinkMetadata;
use crate::config::{MetadataConfig, ProxyConfig, ProxyFormat};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const CORS_RESTRICTED_DESCRIPTION: &str = "Content not accessible due to CORS restrictions";
pub const UNREACHABLE_DESCRIPTION: &str = "Unable to fetch content";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("rate limited")]
    RateLimited,

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Network(String),

    #[error("unusable response: {0}")]
    Invalid(String),
}

impl ResolveError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        ResolveError::Network(e.to_string())
    }
}

/// One way of obtaining page metadata
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(&self, url: &str) -> Result<LinkMetadata, ResolveError>;
}

/// Host part of a URL, or the raw string when it does not parse
pub fn hostname_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Metadata derived from the URL alone
pub fn hostname_fallback(url: &str) -> LinkMetadata {
    LinkMetadata {
        title: hostname_of(url),
        description: UNREACHABLE_DESCRIPTION.to_string(),
        image: None,
    }
}

/// Reads the page through a CORS proxy and parses its HTML
pub struct ProxyResolver {
    name: String,
    template: String,
    format: ProxyFormat,
    client: reqwest::Client,
}

impl ProxyResolver {
    pub fn new(config: &ProxyConfig, client: reqwest::Client) -> Self {
        Self {
            name: config.name.clone(),
            template: config.template.clone(),
            format: config.format,
            client,
        }
    }

    fn proxy_url(&self, url: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        self.template
            .replace("{url_encoded}", &encoded)
            .replace("{url}", url)
    }
}

#[async_trait]
impl MetadataResolver for ProxyResolver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, url: &str) -> Result<LinkMetadata, ResolveError> {
        let response = self
            .client
            .get(self.proxy_url(url))
            .header("x-requested-with", "XMLHttpRequest")
            .send()
            .await
            .map_err(ResolveError::from_reqwest)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ResolveError::RateLimited);
        }
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }

        let html = match self.format {
            ProxyFormat::Raw => response.text().await.map_err(ResolveError::from_reqwest)?,
            ProxyFormat::Json => {
                let body: serde_json::Value =
                    response.json().await.map_err(ResolveError::from_reqwest)?;
                body.get("contents")
                    .and_then(|c| c.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| ResolveError::Invalid("missing 'contents' field".to_string()))?
            }
        };

        Ok(extract_metadata(&html))
    }
}

/// Checks that the page answers at all; cannot read its content
pub struct DirectResolver {
    client: reqwest::Client,
}

impl DirectResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataResolver for DirectResolver {
    fn name(&self) -> &str {
        "direct"
    }

    async fn resolve(&self, url: &str) -> Result<LinkMetadata, ResolveError> {
        // Any response counts: the body is treated as opaque
        self.client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html")
            .send()
            .await
            .map_err(ResolveError::from_reqwest)?;

        Ok(LinkMetadata {
            title: hostname_of(url),
            description: CORS_RESTRICTED_DESCRIPTION.to_string(),
            image: None,
        })
    }
}

/// Ordered resolvers with a hostname fallback
#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn MetadataResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Arc<dyn MetadataResolver>>) -> Self {
        Self { resolvers }
    }

    /// Proxies from the config, then the direct lookup if enabled
    pub fn from_config(config: &MetadataConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        let mut resolvers: Vec<Arc<dyn MetadataResolver>> = config
            .proxies
            .iter()
            .map(|proxy| {
                Arc::new(ProxyResolver::new(proxy, client.clone())) as Arc<dyn MetadataResolver>
            })
            .collect();
        if config.direct_lookup {
            resolvers.push(Arc::new(DirectResolver::new(client)));
        }
        Ok(Self::new(resolvers))
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// First successful resolver wins; never fails
    pub async fn resolve(&self, url: &str) -> LinkMetadata {
        for resolver in &self.resolvers {
            match resolver.resolve(url).await {
                Ok(metadata) => {
                    tracing::debug!("Resolved {} via {}", url, resolver.name());
                    return metadata;
                }
                Err(ResolveError::RateLimited) => {
                    tracing::debug!("{} rate limited for {}, trying next", resolver.name(), url);
                }
                Err(e) => {
                    tracing::warn!("{} failed for {}: {}", resolver.name(), url, e);
                }
            }
        }
        hostname_fallback(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        result: fn(&str) -> Result<LinkMetadata, ResolveError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            result: fn(&str) -> Result<LinkMetadata, ResolveError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MetadataResolver for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn resolve(&self, url: &str) -> Result<LinkMetadata, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)(url)
        }
    }

    fn found(url: &str) -> Result<LinkMetadata, ResolveError> {
        Ok(LinkMetadata {
            title: format!("Page {}", url),
            description: "found".to_string(),
            image: None,
        })
    }

    #[tokio::test]
    async fn test_rate_limit_and_errors_fall_through() {
        let limited = Scripted::new("limited", |_| Err(ResolveError::RateLimited));
        let broken = Scripted::new("broken", |_| Err(ResolveError::Status(500)));
        let good = Scripted::new("good", found);
        let never = Scripted::new("never", found);
        let chain = ResolverChain::new(vec![
            limited.clone(),
            broken.clone(),
            good.clone(),
            never.clone(),
        ]);

        let meta = chain.resolve("https://example.com").await;
        assert_eq!(meta.description, "found");
        assert_eq!(limited.calls.load(Ordering::SeqCst), 1);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_total_failure_yields_hostname() {
        let chain = ResolverChain::new(vec![Scripted::new("down", |_| {
            Err(ResolveError::Network("refused".to_string()))
        })]);

        let meta = chain.resolve("https://www.fda.gov/medical-devices").await;
        assert_eq!(meta.title, "www.fda.gov");
        assert_eq!(meta.description, UNREACHABLE_DESCRIPTION);
        assert_eq!(meta.image, None);
    }

    #[test]
    fn test_unparseable_url_keeps_raw_text() {
        assert_eq!(hostname_of("not a url"), "not a url");
    }

    #[test]
    fn test_proxy_url_templates() {
        let client = reqwest::Client::new();
        let json = ProxyResolver::new(
            &ProxyConfig {
                name: "allorigins".to_string(),
                template: "https://api.allorigins.win/get?url={url_encoded}".to_string(),
                format: ProxyFormat::Json,
            },
            client.clone(),
        );
        assert_eq!(
            json.proxy_url("https://a.com/x?y=1"),
            "https://api.allorigins.win/get?url=https%3A%2F%2Fa.com%2Fx%3Fy%3D1"
        );

        let raw = ProxyResolver::new(
            &ProxyConfig {
                name: "cors.sh".to_string(),
                template: "https://proxy.cors.sh/{url}".to_string(),
                format: ProxyFormat::Raw,
            },
            client,
        );
        assert_eq!(
            raw.proxy_url("https://a.com/x"),
            "https://proxy.cors.sh/https://a.com/x"
        );
    }

    #[test]
    fn test_chain_from_default_config() {
        let chain = ResolverChain::from_config(&MetadataConfig::default()).unwrap();
        assert_eq!(chain.len(), 4);
    }
}
