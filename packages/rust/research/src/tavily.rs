//! Tavily search API client.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tradescout_shared::{Result, TavilyConfig, TradeScoutError};

use crate::{RetryPolicy, build_client, check_status};

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Client for `POST {base_url}/search`.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl TavilyClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            retry,
        })
    }

    pub fn from_config(config: &TavilyConfig, api_key: String, retry: RetryPolicy) -> Result<Self> {
        Self::new(&config.base_url, api_key, retry)
    }

    /// Run one search. `depth` is `basic` or `advanced`.
    #[instrument(skip(self), fields(service = "tavily"))]
    pub async fn search(&self, query: &str, max_results: u32, depth: &str) -> Result<Vec<SearchHit>> {
        let url = format!("{}/search", self.base_url);
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: depth,
        };

        let (url, body) = (&url, &body);
        let hits = self
            .retry
            .run("tavily", || async move {
                let response = self
                    .client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| TradeScoutError::Network(format!("tavily: {e}")))?;
                let response = check_status("tavily", response).await?;
                let parsed: SearchResponse = response.json().await.map_err(|e| {
                    TradeScoutError::parse(format!("tavily response: {e}"))
                })?;
                Ok(parsed.results)
            })
            .await?;

        debug!(hits = hits.len(), "search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn search_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({
                "api_key": "tvly-test",
                "query": "Acme Timber contact email phone",
                "max_results": 5,
                "search_depth": "advanced"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "Acme Timber contact email phone",
                "results": [
                    {"title": "Acme Timber", "url": "https://acme.example", "content": "Call us", "score": 0.9},
                    {"title": "Directory", "url": "https://dir.example", "content": "Acme listing"}
                ]
            })))
            .mount(&server)
            .await;

        let client = TavilyClient::new(&server.uri(), "tvly-test", fast_retry()).unwrap();
        let hits = client
            .search("Acme Timber contact email phone", 5, "advanced")
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://acme.example");
    }

    #[tokio::test]
    async fn unauthorized_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = TavilyClient::new(&server.uri(), "bad", fast_retry()).unwrap();
        let err = client.search("q", 1, "basic").await.unwrap_err();
        match err {
            TradeScoutError::Api { status, message, .. } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})),
            )
            .mount(&server)
            .await;

        let client = TavilyClient::new(&server.uri(), "k", fast_retry()).unwrap();
        let hits = client.search("q", 1, "basic").await.unwrap();
        assert!(hits.is_empty());
    }
}
