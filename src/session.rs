// src/session.rs
use crate::types::{Config, ReconError};
use governor::{Jitter, Quota};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type DirectRateLimiter = governor::DefaultDirectRateLimiter;

#[derive(Clone)]
pub struct Session {
    /// Client for third-party APIs.
    pub client: Client,
    /// Client for probing targets directly: no redirects, any certificate,
    /// peer certificates kept on the response.
    pub probe_client: Client,
    rate_limiters: Arc<HashMap<String, Arc<DirectRateLimiter>>>,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self, ReconError> {
        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ReconError::ConfigError(format!("Invalid proxy URL: {}", e)))?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder
            .build()
            .map_err(|e| ReconError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let probe_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(true)
            .tls_info(true)
            .build()
            .map_err(|e| ReconError::ConfigError(format!("Failed to build probe client: {}", e)))?;

        let mut rate_limiters = HashMap::new();
        for (source, rate_limit) in &config.rate_limits {
            if let Some(limit) = rate_limit.and_then(NonZeroU32::new) {
                let quota = Quota::per_second(limit).allow_burst(NonZeroU32::MIN);
                rate_limiters.insert(source.clone(), Arc::new(governor::RateLimiter::direct(quota)));
            }
        }

        Ok(Session {
            client,
            probe_client,
            rate_limiters: Arc::new(rate_limiters),
        })
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response, ReconError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| ReconError::NetworkError(e.to_string()))
    }

    pub async fn get_text(&self, url: &str) -> Result<String, ReconError> {
        let response = self.get(url).await?;
        success_text(response).await
    }

    pub async fn get_json<T>(&self, url: &str) -> Result<T, ReconError>
    where
        T: serde::de::DeserializeOwned,
    {
        let text = self.get_text(url).await?;
        serde_json::from_str(&text).map_err(|e| ReconError::ParseError(e.to_string()))
    }

    /// `get_json` with extra request headers, for APIs keyed by header.
    pub async fn get_json_with_headers<T>(&self, url: &str, headers: &[(&str, &str)]) -> Result<T, ReconError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ReconError::NetworkError(e.to_string()))?;

        let text = success_text(response).await?;
        serde_json::from_str(&text).map_err(|e| ReconError::ParseError(e.to_string()))
    }

    pub async fn wait_for_rate_limit(&self, source: &str) {
        if let Some(limiter) = self.rate_limiters.get(source) {
            limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;
        }
    }
}

async fn success_text(response: reqwest::Response) -> Result<String, ReconError> {
    if !response.status().is_success() {
        return Err(ReconError::NetworkError(format!(
            "HTTP error: {}",
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| ReconError::NetworkError(e.to_string()))
}
