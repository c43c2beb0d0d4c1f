//! Session adapter
//!
//! The downloader talks to the site through the [`Session`] trait. The
//! shipped [`HttpSession`] wraps a reqwest client and handles:
//! - User agent rotation on every reset
//! - Retries with exponential backoff for 500/502/504 and timeouts
//! - Mapping of refusal and "gone" statuses onto [`PageError`]

use crate::config::SessionConfig;
use crate::downloader::page::{Document, PageError};
use crate::ScrapeError;
use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Statuses worth retrying before giving up on a load
const RETRY_STATUSES: [StatusCode; 3] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::GATEWAY_TIMEOUT,
];

/// A reusable browsing session
#[async_trait]
pub trait Session: Send {
    /// Whether the session can be used for the next load
    fn is_alive(&self) -> bool;

    /// Discards the session state and starts afresh
    async fn reset(&mut self) -> Result<(), ScrapeError>;

    /// Marks the session as burned; the next dequeue resets it
    fn trip(&mut self);

    /// Loads `url`, sending `referer` when given
    async fn load(&mut self, url: &Url, referer: Option<&str>) -> Result<Document, PageError>;
}

/// reqwest-backed session
pub struct HttpSession {
    config: SessionConfig,
    client: Option<Client>,
    agent: usize,
    tripped: bool,
}

impl HttpSession {
    /// Creates a session using the first configured user agent
    pub fn new(config: SessionConfig) -> Result<Self, ScrapeError> {
        let client = build_http_client(&config, 0)?;
        Ok(Self {
            config,
            client: Some(client),
            agent: 0,
            tripped: false,
        })
    }

    /// The user agent currently in use
    pub fn user_agent(&self) -> &str {
        self.config
            .user_agents
            .get(self.agent)
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.backoff_ms.saturating_mul(1 << attempt.min(16)))
    }
}

/// Builds an HTTP client for the given user agent slot
pub fn build_http_client(config: &SessionConfig, agent: usize) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true);

    if let Some(user_agent) = config.user_agents.get(agent) {
        builder = builder.user_agent(user_agent.clone());
    }

    builder.build()
}

#[async_trait]
impl Session for HttpSession {
    fn is_alive(&self) -> bool {
        self.client.is_some() && !self.tripped
    }

    async fn reset(&mut self) -> Result<(), ScrapeError> {
        self.client = None;
        if !self.config.user_agents.is_empty() {
            self.agent = (self.agent + 1) % self.config.user_agents.len();
        }

        let client = build_http_client(&self.config, self.agent)?;
        tracing::info!("Session reset with user agent #{}", self.agent);
        self.client = Some(client);
        self.tripped = false;
        Ok(())
    }

    fn trip(&mut self) {
        tracing::debug!("Session tripped");
        self.tripped = true;
    }

    async fn load(&mut self, url: &Url, referer: Option<&str>) -> Result<Document, PageError> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| ScrapeError::Session("session used after it was closed".into()))?;

        let mut attempt = 0;
        loop {
            let mut request = client.get(url.clone());
            if let Some(referer) = referer {
                request = request.header(REFERER, referer);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if RETRY_STATUSES.contains(&status) && attempt < self.config.retries {
                        let wait = self.backoff(attempt);
                        tracing::warn!("HTTP {} from {}, retrying in {:?}", status, url, wait);
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        continue;
                    }

                    return classify(url, response).await;
                }
                Err(e) if e.is_timeout() && attempt < self.config.retries => {
                    let wait = self.backoff(attempt);
                    tracing::warn!("Timeout loading {}, retrying in {:?}", url, wait);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) if e.is_timeout() => {
                    return Err(ScrapeError::Timeout {
                        url: url.to_string(),
                    }
                    .into());
                }
                Err(e) => {
                    return Err(ScrapeError::Http {
                        url: url.to_string(),
                        source: e,
                    }
                    .into());
                }
            }
        }
    }
}

/// Maps a final response onto a document or a page condition
async fn classify(url: &Url, response: Response) -> Result<Document, PageError> {
    let status = response.status();
    let final_url = response.url().clone();

    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            return Err(PageError::BadRequest {
                url: final_url.to_string(),
            })
        }
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            return Err(PageError::Refusal {
                url: final_url.to_string(),
            })
        }
        _ if !status.is_success() => {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into())
        }
        _ => {}
    }

    let body = response.text().await.map_err(|e| ScrapeError::Http {
        url: url.to_string(),
        source: e,
    })?;

    Ok(Document {
        url: final_url,
        status: status.as_u16(),
        body,
    })
}
