//! HTTP fetching for elementkit
//!
//! A mockable, configurable client that downloads whole response bodies.
//!
//! ## Features
//!
//! - **Trait-based design**: Mockable via `HttpClientTrait`
//! - **Configurable**: Timeouts, retries, proxy, user-agent
//! - **Retry middleware**: Exponential backoff for transient failures
//! - **Cache directives**: Bypass intermediate HTTP caches on reload

pub mod client;
pub mod config;
pub mod error;
pub mod middleware;

pub use client::{shared_client, CacheDirective, HttpClient, HttpClientTrait};
pub use config::HttpConfig;
pub use error::{HttpError, Result};
pub use middleware::{RetryConfig, RetryMiddleware};

/// Re-export commonly used types
pub use reqwest::StatusCode;
