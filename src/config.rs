use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use crate::auth::REFRESH_PATH;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = concat!("eventix-client/", env!("CARGO_PKG_VERSION"));

/// Settings for [`AuthenticatedHttpClient`](crate::http::AuthenticatedHttpClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub refresh_path: String,
    /// Routes besides login/register that never carry a token.
    pub public_routes: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            refresh_path: REFRESH_PATH.to_string(),
            public_routes: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = api_url {
            config.api_url = url;
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_public_route(mut self, route: impl Into<String>) -> Self {
        self.public_routes.push(route.into());
        self
    }

    /// Builds the reqwest client. The cookie store carries the HTTP-only
    /// refresh cookie between login and refresh calls.
    pub fn build_http_client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(&self.user_agent)
            .cookie_store(true)
            .timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client")
    }
}
