//! Layered company research: web search, then LLM extraction.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument, warn};

use tradescout_shared::{
    AppConfig, Contact, GroqConfig, Result, ResearchResult, ResearchStatus, TavilyConfig, api_key,
};

use crate::extract::{build_prompt, parse_contacts};
use crate::{GroqClient, LlmMessage, RetryPolicy, SearchHit, TavilyClient, demo, truncate_chars};

/// Confidence reported when a layer yields a contact.
const FOUND_CONFIDENCE: f64 = 0.8;

/// Confidence reported when every layer comes back empty.
const NOT_FOUND_CONFIDENCE: f64 = 0.2;

/// Whether lookups hit the real APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchMode {
    Live,
    Demo,
}

impl std::fmt::Display for ResearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResearchMode::Live => f.write_str("live"),
            ResearchMode::Demo => f.write_str("demo"),
        }
    }
}

/// One search pass. Later layers run only when earlier ones find nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLayer {
    General,
    Government,
    Industry,
}

impl SearchLayer {
    pub fn label(self) -> &'static str {
        match self {
            SearchLayer::General => "General Business Search",
            SearchLayer::Government => "Government Database Search",
            SearchLayer::Industry => "Timber Industry Directory Search",
        }
    }

    /// Search query for a company, with the city appended when known.
    pub fn query(self, company: &str, city: Option<&str>) -> String {
        let mut query = match self {
            SearchLayer::General => format!("{company} contact email phone"),
            SearchLayer::Government => {
                format!("{company} company registration registry official contact details")
            }
            SearchLayer::Industry => {
                format!("{company} timber wood industry directory contact email")
            }
        };
        if let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) {
            query.push(' ');
            query.push_str(city);
        }
        query
    }
}

#[derive(Debug, Clone)]
struct Extraction {
    temperature: f32,
    max_tokens: u32,
}

struct LiveBackend {
    tavily: TavilyClient,
    groq: GroqClient,
    max_results: u32,
    search_depth: String,
    extraction: Extraction,
}

/// Research entry point built from config.
pub struct ResearchClient {
    live: Option<LiveBackend>,
    layers: Vec<SearchLayer>,
    rng: Mutex<StdRng>,
}

impl ResearchClient {
    /// Build from config, reading API keys from the configured env vars.
    /// Missing keys select demo mode.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let keys = api_key(&config.tavily.api_key_env).zip(api_key(&config.groq.api_key_env));
        let retry = RetryPolicy {
            max_retries: config.research.max_retries,
            backoff: Duration::from_millis(config.research.retry_backoff_ms),
        };
        let layers = layers_for(
            config.research.enable_government_search,
            config.research.enable_industry_search,
        );
        match keys {
            Some((tavily_key, groq_key)) => {
                Self::live(&config.tavily, tavily_key, &config.groq, groq_key, retry, layers)
            }
            None => {
                warn!("API keys not found - using demo mode");
                Ok(Self::demo(StdRng::from_entropy()))
            }
        }
    }

    /// Live client against explicit endpoints.
    pub fn live(
        tavily: &TavilyConfig,
        tavily_key: String,
        groq: &GroqConfig,
        groq_key: String,
        retry: RetryPolicy,
        layers: Vec<SearchLayer>,
    ) -> Result<Self> {
        info!(model = %groq.model, layers = layers.len(), "research client initialised with Tavily and Groq");
        Ok(Self {
            live: Some(LiveBackend {
                tavily: TavilyClient::from_config(tavily, tavily_key, retry)?,
                groq: GroqClient::from_config(groq, groq_key, retry)?,
                max_results: tavily.max_results,
                search_depth: tavily.search_depth.clone(),
                extraction: Extraction {
                    temperature: groq.temperature,
                    max_tokens: groq.max_tokens,
                },
            }),
            layers,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Demo client with a caller-supplied RNG.
    pub fn demo(rng: StdRng) -> Self {
        Self {
            live: None,
            layers: vec![SearchLayer::General],
            rng: Mutex::new(rng),
        }
    }

    pub fn mode(&self) -> ResearchMode {
        if self.live.is_some() {
            ResearchMode::Live
        } else {
            ResearchMode::Demo
        }
    }

    pub fn layers(&self) -> &[SearchLayer] {
        &self.layers
    }

    /// The chat-capable LLM client, when live.
    pub fn groq(&self) -> Option<&GroqClient> {
        self.live.as_ref().map(|l| &l.groq)
    }

    /// Probe the search API. Returns `(ok, message)` for display.
    pub async fn test_connection(&self) -> (bool, String) {
        let Some(live) = &self.live else {
            return (false, "API keys not configured".into());
        };
        match live.tavily.search("test query", 1, "basic").await {
            Ok(hits) if !hits.is_empty() => (true, "API connections successful".into()),
            Ok(_) => (false, "API test failed".into()),
            Err(e) => (false, format!("API test error: {e}")),
        }
    }

    /// Research one company. Failures become an `Error` result.
    #[instrument(skip(self), fields(mode = %self.mode()))]
    pub async fn research_company(&self, company: &str, city: Option<&str>) -> ResearchResult {
        let Some(live) = &self.live else {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            return demo::demo_result(company, &mut *rng);
        };

        match self.research_live(live, company, city).await {
            Ok(result) => result,
            Err(e) => {
                warn!(company, error = %e, "research failed");
                error_result(&e.to_string())
            }
        }
    }

    async fn research_live(
        &self,
        live: &LiveBackend,
        company: &str,
        city: Option<&str>,
    ) -> Result<ResearchResult> {
        for layer in &self.layers {
            let query = layer.query(company, city);
            let hits = live
                .tavily
                .search(&query, live.max_results, &live.search_depth)
                .await?;
            if hits.is_empty() {
                debug!(layer = layer.label(), "no search hits");
                continue;
            }

            let contacts = self.extract(live, company, &hits).await;
            if !contacts.is_empty() {
                info!(company, layer = layer.label(), "contact found");
                return Ok(ResearchResult {
                    status: ResearchStatus::Found,
                    contacts,
                    description: format!("Contact information found for {company}"),
                    confidence_score: FOUND_CONFIDENCE,
                    search_results: hits.len(),
                    researched_at: Utc::now(),
                });
            }
        }

        Ok(ResearchResult {
            status: ResearchStatus::NotFound,
            contacts: Vec::new(),
            description: format!("Limited information found for {company}"),
            confidence_score: NOT_FOUND_CONFIDENCE,
            search_results: 0,
            researched_at: Utc::now(),
        })
    }

    /// Extraction failures are logged and treated as "no contact".
    async fn extract(&self, live: &LiveBackend, company: &str, hits: &[SearchHit]) -> Vec<Contact> {
        let prompt = build_prompt(company, hits);
        let reply = live
            .groq
            .chat(
                &[LlmMessage::user(prompt)],
                live.extraction.temperature,
                live.extraction.max_tokens,
            )
            .await;
        match reply.and_then(|text| parse_contacts(&text)) {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!(company, error = %e, "contact extraction failed");
                Vec::new()
            }
        }
    }
}

/// Search layers in the order they run.
pub fn layers_for(government: bool, industry: bool) -> Vec<SearchLayer> {
    let mut layers = vec![SearchLayer::General];
    if government {
        layers.push(SearchLayer::Government);
    }
    if industry {
        layers.push(SearchLayer::Industry);
    }
    layers
}

pub(crate) fn error_result(message: &str) -> ResearchResult {
    ResearchResult {
        status: ResearchStatus::Error,
        contacts: Vec::new(),
        description: format!("Research error: {}", truncate_chars(message, 100)),
        confidence_score: 0.0,
        search_results: 0,
        researched_at: Utc::now(),
    }
}
