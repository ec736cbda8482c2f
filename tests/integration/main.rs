//! Integration tests for the relocation pipeline
//!
//! These tests use wiremock to stand in for resource hosts and the HTTP
//! content store, and tempfile for configuration files and local stores.

mod config_tests;
mod fetch_tests;
mod pipeline_tests;
mod store_tests;
