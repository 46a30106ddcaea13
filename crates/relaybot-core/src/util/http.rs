use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("relaybot/", env!("CARGO_PKG_VERSION"));

/// Global HTTP client with connection pooling and keep-alive.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    base_builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client")
});

fn base_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(50)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(USER_AGENT)
}

/// Get the global HTTP client.
pub fn client() -> &'static Client {
    &HTTP_CLIENT
}

/// A client whose requests fail once `secs` elapse end to end.
pub fn client_with_timeout(secs: u64) -> reqwest::Result<Client> {
    base_builder().timeout(Duration::from_secs(secs)).build()
}
