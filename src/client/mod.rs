//! HTTP client for API sources.
//!
//! This module provides the [`ApiClient`] used by the API extractor to fetch
//! JSON payloads from configured endpoints.

mod http;

pub use http::ApiClient;
