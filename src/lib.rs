//! gcn: terminal client for the GCN compliance assistant
//!
//! This library provides:
//! - A typed client for the GCN REST backend
//! - Controllers for chats, products, documents, accounts and status logs
//! - Link preview resolution with a shared cache
//! - A ratatui chat screen and scriptable subcommands

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod metadata;
pub mod products;
pub mod session;
pub mod status;
pub mod transport;
pub mod tui;
pub mod upload;

pub use config::Config;
