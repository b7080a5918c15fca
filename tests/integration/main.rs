//! Integration tests for tenacious-fetch
//!
//! `fetch_engine` drives the fetcher through an in-memory transport;
//! `http_integration` uses wiremock servers and the real reqwest transport.

mod common;
mod fetch_engine;
mod http_integration;
