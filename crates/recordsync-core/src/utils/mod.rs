//! HTTP client helpers.

pub mod http;
