//! HTTP client utilities.

use reqwest::Client;

/// Strip credentials and query from a URL before it reaches the logs.
pub fn redact_url(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| {
            let port = u.port().map(|p| format!(":{p}")).unwrap_or_default();
            if u.username().is_empty() && u.password().is_none() {
                format!("{}://{}{}{}", u.scheme(), u.host_str().unwrap_or("?"), port, u.path())
            } else {
                format!("{}://***@{}{}{}", u.scheme(), u.host_str().unwrap_or("?"), port, u.path())
            }
        })
        .unwrap_or_else(|_| "<invalid-url>".to_string())
}

/// Create HTTP client with the given request timeout.
pub fn create_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    base_builder(timeout_secs).build()
}

/// Shared builder with keepalive settings.
fn base_builder(timeout_secs: u64) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .tcp_nodelay(true)
        .http2_keep_alive_interval(std::time::Duration::from_secs(25))
        .http2_keep_alive_timeout(std::time::Duration::from_secs(10))
        .http2_keep_alive_while_idle(true)
}
