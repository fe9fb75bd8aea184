//! Link previews
//!
//! Bare links in an answer are shown with a title and short description
//! read from the target page. Resolution goes through a [`ResolverChain`]
//! and lands in a shared [`MetadataCache`]; a [`LinkPrefetcher`] spreads
//! the fetches for one message out over time.

mod cache;
mod html;
mod resolver;

pub use cache::{Claim, LinkPrefetcher, MetadataCache};
pub use html::{extract_metadata, NO_DESCRIPTION, UNKNOWN_TITLE};
pub use resolver::{
    hostname_fallback, hostname_of, DirectResolver, MetadataResolver, ProxyResolver,
    ResolveError, ResolverChain, CORS_RESTRICTED_DESCRIPTION, UNREACHABLE_DESCRIPTION,
};
