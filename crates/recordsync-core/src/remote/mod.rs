//! Remote CRM over its REST API.

pub mod http;
pub mod soql;

pub use http::{HttpRemoteStore, RetryConfig};
