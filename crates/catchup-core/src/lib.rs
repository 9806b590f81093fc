//! catchup-core - Core library for Catchup Feed clients
//!
//! This crate contains the token lifecycle (storage, JWT introspection,
//! cross-instance sync, refresh), the authenticated request pipeline, the
//! query cache with optimistic mutations, and the API models shared by every
//! Catchup Feed interface.

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod util;

pub use api::{ApiClient, ApiError, ErrorKind, Navigator, RequestOptions};
pub use auth::{AuthService, TokenStore};
pub use cache::{MutationCache, QueryCache, QueryKey};
pub use client::{FeedClient, FeedClientBuilder};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use models::{Article, ArticleId, Source, SourceId};
