//! Business contact research backed by Tavily web search and Groq extraction.
//!
//! [`ResearchClient`] runs a layered search for one company and asks the LLM
//! to pull an email, phone, and website out of the top hits. Without both API
//! keys it falls back to demo mode and fabricates plausible results so the
//! rest of the workflow can be exercised offline.

mod batch;
mod client;
pub mod demo;
pub mod extract;
mod groq;
mod tavily;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use tradescout_shared::{Result, TradeScoutError};

pub use batch::{BatchOutcome, BatchProgress, SilentProgress, run_batch};
pub use client::{ResearchClient, ResearchMode, SearchLayer, layers_for};
pub use groq::{GroqClient, LlmMessage};
pub use tavily::{SearchHit, TavilyClient};

/// Default timeout in seconds for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("TradeScout/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// How often and how patiently to retry transient API failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op`, retrying while it fails with a transient error.
    pub(crate) async fn run<T, F, Fut>(&self, service: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(service, attempt, error = %e, "transient API failure, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                other => return other,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| TradeScoutError::Network(format!("failed to build HTTP client: {e}")))
}

/// Turn a non-success response into an `Api` error carrying the body text.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TradeScoutError::Api {
        service,
        status: status.as_u16(),
        message: truncate_chars(body.trim(), 200),
    })
}

/// First `max` characters of `s`.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_stops_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        };
        let result: Result<()> = policy
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TradeScoutError::Network("reset".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::default()
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TradeScoutError::Api {
                    service: "tavily",
                    status: 401,
                    message: "bad key".into(),
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }
}
