//! Polite, retried page fetching.
//!
//! Every request waits a politeness delay first, scaled by the attempt number
//! on retry, so a struggling server sees us back off rather than hammer it.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::error::FetchError;

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Immutable fetcher configuration, passed in at construction.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Minimum wait before every request; multiplied by the attempt number.
    pub politeness_delay: Duration,
    /// Hard upper bound per request.
    pub timeout: Duration,
    /// Retries after the first attempt, for 429 and network-level errors only.
    pub max_retries: u32,
    /// Pool to rotate user agents from; one is picked at random per request.
    pub user_agents: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            politeness_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Fetches a page as raw markup. The seam that tests stub out.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Rate-limited, retrying HTTP fetcher over a shared reqwest client.
pub struct PoliteFetcher {
    client: Client,
    config: FetcherConfig,
}

impl PoliteFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("sk,cs;q=0.8,en;q=0.6"),
        );
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self { client, config })
    }

    fn random_user_agent(&self) -> &str {
        self.config
            .user_agents
            .choose(&mut rand::thread_rng())
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }

    /// 429 and network-level problems get retried; other HTTP errors do not.
    fn is_retryable(err: &FetchError) -> bool {
        match err {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::Http(status) => *status == StatusCode::TOO_MANY_REQUESTS,
            FetchError::Exhausted { .. } => false,
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.random_user_agent())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status));
        }

        response.text().await.map_err(classify_reqwest_error)
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err)
    }
}

#[async_trait]
impl PageFetcher for PoliteFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt: u32 = 1;
        loop {
            // delay scales with the attempt number
            tokio::time::sleep(self.config.politeness_delay * attempt).await;

            debug!(url, attempt, "fetching page");
            match self.try_fetch(url).await {
                Ok(body) => {
                    debug!(url, bytes = body.len(), "fetched page");
                    return Ok(body);
                }
                Err(err) if Self::is_retryable(&err) => {
                    if attempt > self.config.max_retries {
                        warn!(url, attempt, %err, "retry budget exhausted");
                        return Err(FetchError::Exhausted { attempts: attempt });
                    }
                    warn!(url, attempt, %err, "fetch failed, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    warn!(url, %err, "fetch failed");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_network_errors_are_retryable() {
        assert!(PoliteFetcher::is_retryable(&FetchError::Timeout));
        assert!(PoliteFetcher::is_retryable(&FetchError::Http(
            StatusCode::TOO_MANY_REQUESTS
        )));
    }

    #[test]
    fn other_http_statuses_fail_immediately() {
        assert!(!PoliteFetcher::is_retryable(&FetchError::Http(
            StatusCode::NOT_FOUND
        )));
        assert!(!PoliteFetcher::is_retryable(&FetchError::Http(
            StatusCode::INTERNAL_SERVER_ERROR
        )));
        assert!(!PoliteFetcher::is_retryable(&FetchError::Exhausted {
            attempts: 4
        }));
    }

    #[test]
    fn user_agent_always_comes_from_the_pool() {
        let fetcher = PoliteFetcher::new(FetcherConfig::default()).unwrap();
        for _ in 0..20 {
            let ua = fetcher.random_user_agent();
            assert!(DEFAULT_USER_AGENTS.contains(&ua));
        }
    }

    #[test]
    fn empty_pool_falls_back_to_a_default_agent() {
        let config = FetcherConfig {
            user_agents: vec![],
            ..FetcherConfig::default()
        };
        let fetcher = PoliteFetcher::new(config).unwrap();
        assert_eq!(fetcher.random_user_agent(), DEFAULT_USER_AGENTS[0]);
    }
}
