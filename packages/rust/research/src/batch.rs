//! Sequential batch research with a pause between companies.

use std::time::Duration;

use tracing::{info, instrument};

use tradescout_shared::ResearchResult;

use crate::ResearchClient;

/// Progress callback for batch research (CLI spinner, TUI, or silent).
pub trait BatchProgress: Send + Sync {
    /// Called before company `current` (1-based) of `total` is researched.
    fn started(&self, company: &str, current: usize, total: usize);
    /// Called with each finished result.
    fn finished(&self, company: &str, result: &ResearchResult);
}

/// No-op progress reporter.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn started(&self, _company: &str, _current: usize, _total: usize) {}
    fn finished(&self, _company: &str, _result: &ResearchResult) {}
}

/// Results of one batch, in input order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<(String, ResearchResult)>,
    pub successful: usize,
}

/// Research `companies` one at a time, sleeping `delay` between them.
///
/// Each entry is a company name plus an optional city hint. Failures are
/// already folded into `Error` results by [`ResearchClient::research_company`],
/// so one bad company never aborts the batch.
#[instrument(skip_all, fields(companies = companies.len(), mode = %client.mode()))]
pub async fn run_batch(
    client: &ResearchClient,
    companies: &[(String, Option<String>)],
    delay: Duration,
    progress: &dyn BatchProgress,
) -> BatchOutcome {
    let total = companies.len();
    let mut results = Vec::with_capacity(total);

    for (i, (company, city)) in companies.iter().enumerate() {
        progress.started(company, i + 1, total);
        let result = client.research_company(company, city.as_deref()).await;
        progress.finished(company, &result);
        results.push((company.clone(), result));

        if i + 1 < total && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    let successful = results.iter().filter(|(_, r)| r.is_found()).count();
    info!(successful, total, "batch research complete");
    BatchOutcome {
        results,
        successful,
    }
}
