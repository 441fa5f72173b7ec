use reqwest::Client;
use std::time::Duration;

/// Shared client for provider and extraction calls.
///
/// Only the connect phase is bounded: streamed LLM answers may legitimately
/// run for minutes.
pub fn build_http_client() -> Client {
    base_builder().build().unwrap_or_else(|_| Client::new())
}

/// Client whose whole request (connect + body) is bounded by `timeout_secs`.
pub fn build_http_client_with_timeout(timeout_secs: u64, user_agent: &str) -> Client {
    base_builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn base_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
}
