//! Business research workflow: pick pending companies, research them in
//! batches, and fold the results back into the dataset.

use std::collections::HashSet;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use tradescout_dataset::{Dataset, Value};
use tradescout_research::{BatchProgress, ResearchClient, run_batch};
use tradescout_shared::{
    ResearchConfig, ResearchResult, ResearchResults, ResearchStatus, Result, SessionId, Stage,
    TradeScoutError,
};

use crate::{ENHANCED_DATA, SessionManager};

pub const COMPANY_COLUMN_CANDIDATES: &[&str] = &[
    "Consignee Name",
    "Company Name",
    "Company",
    "Consignee",
    "Business Name",
];

pub const CITY_COLUMN_CANDIDATES: &[&str] = &["Consignee City", "City", "Location", "Place"];

pub const STATUS_COLUMN: &str = "Research_Status";
pub const EMAIL_COLUMN: &str = "Research_Email";
pub const PHONE_COLUMN: &str = "Research_Phone";
pub const WEBSITE_COLUMN: &str = "Research_Website";
pub const DESCRIPTION_COLUMN: &str = "Research_Description";
pub const CONFIDENCE_COLUMN: &str = "Research_Confidence";

// ---------------------------------------------------------------------------
// Column detection and progress
// ---------------------------------------------------------------------------

/// Known company column names, else the first text column.
pub fn detect_company_column(dataset: &Dataset) -> Option<&str> {
    dataset
        .find_column(COMPANY_COLUMN_CANDIDATES)
        .or_else(|| dataset.first_text_column())
}

pub fn detect_city_column(dataset: &Dataset) -> Option<&'static str> {
    dataset.find_column(CITY_COLUMN_CANDIDATES)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchOverview {
    pub company_column: Option<String>,
    pub total_records: usize,
    pub unique_companies: usize,
    pub researched: usize,
    pub pending: usize,
}

/// Distinct non-null company names in first-seen order.
fn companies(dataset: &Dataset, column: &str) -> Vec<String> {
    let Some(idx) = dataset.column_index(column) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    dataset
        .column_values(idx)
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

pub fn research_overview(dataset: &Dataset, results: &[(String, ResearchResult)]) -> ResearchOverview {
    let column = detect_company_column(dataset);
    let unique = column.map(|c| companies(dataset, c).len()).unwrap_or(0);
    let researched = results.len();
    ResearchOverview {
        company_column: column.map(str::to_string),
        total_records: dataset.row_count(),
        unique_companies: unique,
        researched,
        pending: unique.saturating_sub(researched),
    }
}

/// Companies not yet researched, in first-seen order.
pub fn pending_companies(dataset: &Dataset, results: &[(String, ResearchResult)]) -> Vec<String> {
    let Some(column) = detect_company_column(dataset) else {
        return Vec::new();
    };
    let done: HashSet<&str> = results.iter().map(|(c, _)| c.as_str()).collect();
    companies(dataset, column)
        .into_iter()
        .filter(|c| !done.contains(c.as_str()))
        .collect()
}

/// City of the first row naming `company`, when a city column exists.
fn city_for(dataset: &Dataset, company_column: &str, company: &str) -> Option<String> {
    let city_column = detect_city_column(dataset)?;
    let city_idx = dataset.column_index(city_column)?;
    let row = *dataset.rows_where(company_column, company).ok()?.first()?;
    dataset
        .get(row, city_idx)
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
}

// ---------------------------------------------------------------------------
// Running research
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ResearchOptions {
    pub batch_size: usize,
    pub delay: Duration,
    pub use_cache: bool,
}

impl ResearchOptions {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            batch_size: config.effective_batch_size(),
            delay: config.effective_delay(),
            use_cache: config.cache_results,
        }
    }
}

/// One batch's results plus what is left to do.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchRun {
    pub results: Vec<(String, ResearchResult)>,
    pub successful: usize,
    pub from_cache: usize,
    pub remaining: usize,
}

/// Cache key for a company lookup in a given research mode.
pub fn cache_key(company: &str, city: Option<&str>, mode: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(company.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(city.unwrap_or("").trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(mode.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct ResearchWorkflow<'a> {
    sessions: &'a SessionManager,
    client: &'a ResearchClient,
}

impl<'a> ResearchWorkflow<'a> {
    pub fn new(sessions: &'a SessionManager, client: &'a ResearchClient) -> Self {
        Self { sessions, client }
    }

    pub async fn results(&self, session: &SessionId) -> Result<Vec<(String, ResearchResult)>> {
        self.sessions.storage().list_research_results(session).await
    }

    pub async fn overview(&self, session: &SessionId) -> Result<ResearchOverview> {
        let dataset = self.sessions.require_data(session).await?;
        Ok(research_overview(&dataset, &self.results(session).await?))
    }

    /// Research the next batch of pending companies and refresh the
    /// enhanced dataset.
    #[instrument(skip_all, fields(session = %session, batch = options.batch_size, mode = %self.client.mode()))]
    pub async fn run_research(
        &self,
        session: &SessionId,
        options: &ResearchOptions,
        progress: &dyn BatchProgress,
    ) -> Result<ResearchRun> {
        let dataset = self.sessions.require_data(session).await?;
        let company_column = detect_company_column(&dataset)
            .ok_or_else(|| TradeScoutError::validation("No company column found in the data"))?
            .to_string();
        let storage = self.sessions.storage();

        let existing = storage.list_research_results(session).await?;
        let pending = pending_companies(&dataset, &existing);
        let batch: Vec<(String, Option<String>)> = pending
            .iter()
            .take(options.batch_size.max(1))
            .map(|c| (c.clone(), city_for(&dataset, &company_column, c)))
            .collect();

        if batch.is_empty() {
            info!("no pending companies");
            return Ok(ResearchRun {
                results: Vec::new(),
                successful: 0,
                from_cache: 0,
                remaining: 0,
            });
        }

        let mode = self.client.mode().to_string();
        let mut cached: Vec<Option<ResearchResult>> = Vec::with_capacity(batch.len());
        for (company, city) in &batch {
            let hit = if options.use_cache {
                storage
                    .get_research_cache(&cache_key(company, city.as_deref(), &mode))
                    .await?
            } else {
                None
            };
            cached.push(hit);
        }
        let from_cache = cached.iter().filter(|c| c.is_some()).count();
        debug!(from_cache, "consulted research cache");

        let to_fetch: Vec<(String, Option<String>)> = batch
            .iter()
            .zip(&cached)
            .filter(|(_, hit)| hit.is_none())
            .map(|(entry, _)| entry.clone())
            .collect();
        let mut fetched = run_batch(self.client, &to_fetch, options.delay, progress)
            .await
            .results
            .into_iter();

        let mut results = Vec::with_capacity(batch.len());
        for ((company, city), hit) in batch.into_iter().zip(cached) {
            let result = match hit {
                Some(result) => result,
                None => {
                    let Some((_, result)) = fetched.next() else {
                        break;
                    };
                    if options.use_cache && result.status != ResearchStatus::Error {
                        storage
                            .set_research_cache(&cache_key(&company, city.as_deref(), &mode), &company, &result)
                            .await?;
                    }
                    result
                }
            };
            storage.upsert_research_result(session, &company, &result).await?;
            results.push((company, result));
        }

        self.sessions.mark_stage_complete(session, Stage::Research).await?;

        let all = storage.list_research_results(session).await?;
        let enhanced = merge_with_dataset(&dataset, &all)?;
        self.sessions.store_dataset(session, ENHANCED_DATA, &enhanced).await?;

        let successful = results.iter().filter(|(_, r)| r.is_found()).count();
        let remaining = pending.len().saturating_sub(results.len());
        info!(successful, researched = results.len(), remaining, "research batch complete");
        Ok(ResearchRun {
            results,
            successful,
            from_cache,
            remaining,
        })
    }

    /// Forget all results for the session and drop the enhanced data.
    pub async fn clear(&self, session: &SessionId) -> Result<usize> {
        let storage = self.sessions.storage();
        let removed = storage.clear_research_results(session).await?;
        storage.delete_dataset(session, ENHANCED_DATA).await?;
        Ok(removed)
    }

    /// Empty the cross-session research cache so the next run looks every
    /// company up again.
    #[instrument(skip_all)]
    pub async fn clear_cache(&self) -> Result<usize> {
        let removed = self.sessions.storage().clear_research_cache().await?;
        info!(removed, "cleared research cache");
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Presentation and merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultRow {
    pub company: String,
    pub status: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub description: String,
    pub confidence: String,
}

fn status_title(status: ResearchStatus) -> &'static str {
    match status {
        ResearchStatus::Found => "Found",
        ResearchStatus::NotFound => "Not Found",
        ResearchStatus::Error => "Error",
        ResearchStatus::Pending => "Pending",
    }
}

pub fn format_results(results: &[(String, ResearchResult)]) -> Vec<ResultRow> {
    results
        .iter()
        .map(|(company, r)| {
            let (email, phone, website) = if r.is_found() {
                match r.primary_contact() {
                    Some(c) => (
                        c.email.clone().unwrap_or_else(|| "No email".into()),
                        c.phone.clone().unwrap_or_else(|| "No phone".into()),
                        c.website.clone().unwrap_or_else(|| "No website".into()),
                    ),
                    None => ("No email".into(), "No phone".into(), "No website".into()),
                }
            } else {
                ("Not found".into(), "Not found".into(), "Not found".into())
            };
            ResultRow {
                company: company.clone(),
                status: status_title(r.status).into(),
                email,
                phone,
                website,
                description: r.description.clone(),
                confidence: format!("{:.0}%", r.confidence_score * 100.0),
            }
        })
        .collect()
}

/// Display rows as a dataset, for CSV export.
pub fn results_table(rows: &[ResultRow]) -> Dataset {
    let columns = [
        "Company",
        "Status",
        "Email",
        "Phone",
        "Website",
        "Description",
        "Confidence",
    ];
    Dataset::new(
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|r| {
                [
                    &r.company,
                    &r.status,
                    &r.email,
                    &r.phone,
                    &r.website,
                    &r.description,
                    &r.confidence,
                ]
                .into_iter()
                .map(|s| Value::text(s.as_str()))
                .collect()
            })
            .collect(),
    )
}

/// Copy of `dataset` with `Research_*` columns filled from `results`.
/// Returned unchanged when no company column can be found.
pub fn merge_with_dataset(
    dataset: &Dataset,
    results: &[(String, ResearchResult)],
) -> Result<Dataset> {
    let mut enhanced = dataset.clone();
    let Some(company_column) = detect_company_column(dataset).map(str::to_string) else {
        return Ok(enhanced);
    };

    let status = enhanced.add_column(STATUS_COLUMN, Value::text("pending"));
    let email = enhanced.add_column(EMAIL_COLUMN, Value::text(""));
    let phone = enhanced.add_column(PHONE_COLUMN, Value::text(""));
    let website = enhanced.add_column(WEBSITE_COLUMN, Value::text(""));
    let description = enhanced.add_column(DESCRIPTION_COLUMN, Value::text(""));
    let confidence = enhanced.add_column(CONFIDENCE_COLUMN, Value::Number(0.0));

    let by_company: ResearchResults = results.iter().cloned().collect();
    for (company, result) in &by_company {
        let Ok(rows) = dataset.rows_where(&company_column, company) else {
            continue;
        };
        let contact = result
            .primary_contact()
            .filter(|_| result.is_found())
            .cloned()
            .unwrap_or_default();
        for row in rows {
            let cells = [
                (status, Value::text(result.status.as_str())),
                (email, Value::text(contact.email.clone().unwrap_or_default())),
                (phone, Value::text(contact.phone.clone().unwrap_or_default())),
                (website, Value::text(contact.website.clone().unwrap_or_default())),
                (description, Value::text(result.description.as_str())),
                (confidence, Value::Number(result.confidence_score)),
            ];
            for (col, value) in cells {
                enhanced.set_cell(row, col, value)?;
            }
        }
    }
    Ok(enhanced)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsSummary {
    pub total: usize,
    pub successful: usize,
    /// Percentage, 0.0 when nothing was researched.
    pub success_rate: f64,
}

pub fn results_summary(results: &[(String, ResearchResult)]) -> ResultsSummary {
    let total = results.len();
    let successful = results.iter().filter(|(_, r)| r.is_found()).count();
    let success_rate = if total > 0 {
        successful as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    ResultsSummary {
        total,
        successful,
        success_rate,
    }
}

pub fn results_export_filename(at: NaiveDateTime) -> String {
    format!("business_research_results_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

pub fn enhanced_export_filename(at: NaiveDateTime) -> String {
    format!("enhanced_business_data_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SampleKind;
    use crate::session::tests::{local_policy, test_manager};
    use chrono::{NaiveDate, Utc};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tradescout_dataset::sample;
    use tradescout_research::SilentProgress;
    use tradescout_shared::Contact;

    fn found(email: &str) -> ResearchResult {
        ResearchResult {
            status: ResearchStatus::Found,
            contacts: vec![Contact {
                email: Some(email.into()),
                phone: Some("+91-22-1234-5678".into()),
                website: None,
            }],
            description: "Contact information found".into(),
            confidence_score: 0.8,
            search_results: 3,
            researched_at: Utc::now(),
        }
    }

    fn not_found() -> ResearchResult {
        ResearchResult {
            status: ResearchStatus::NotFound,
            contacts: Vec::new(),
            description: "Limited information".into(),
            confidence_score: 0.2,
            search_results: 0,
            researched_at: Utc::now(),
        }
    }

    fn options(batch_size: usize) -> ResearchOptions {
        ResearchOptions {
            batch_size,
            delay: Duration::ZERO,
            use_cache: true,
        }
    }

    #[test]
    fn detects_columns() {
        let timber = sample::timber_sample();
        assert_eq!(detect_company_column(&timber), Some("Consignee Name"));
        assert_eq!(detect_city_column(&timber), Some("Consignee City"));

        let business = sample::business_sample();
        assert_eq!(detect_company_column(&business), Some("Company"));
        assert_eq!(detect_city_column(&business), Some("Location"));

        let numeric = Dataset::from_columns(vec![("n", vec![Value::Number(1.0)])]);
        assert_eq!(detect_company_column(&numeric), None);
    }

    #[test]
    fn pending_skips_researched_and_dupes() {
        let ds = Dataset::from_columns(vec![(
            "Company",
            vec![
                Value::text("Acme"),
                Value::text("Beta"),
                Value::Null,
                Value::text("Acme"),
                Value::text("Gamma"),
            ],
        )]);
        let done = vec![("Beta".to_string(), found("a@b.com"))];
        assert_eq!(pending_companies(&ds, &done), vec!["Acme", "Gamma"]);

        let ov = research_overview(&ds, &done);
        assert_eq!(ov.total_records, 5);
        assert_eq!(ov.unique_companies, 3);
        assert_eq!(ov.researched, 1);
        assert_eq!(ov.pending, 2);
    }

    #[test]
    fn format_rows() {
        let rows = format_results(&[
            ("Acme".into(), found("info@acme.in")),
            ("Beta".into(), not_found()),
        ]);
        assert_eq!(rows[0].status, "Found");
        assert_eq!(rows[0].email, "info@acme.in");
        assert_eq!(rows[0].website, "No website");
        assert_eq!(rows[0].confidence, "80%");
        assert_eq!(rows[1].status, "Not Found");
        assert_eq!(rows[1].phone, "Not found");
        assert_eq!(rows[1].confidence, "20%");

        let table = results_table(&rows);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[6], "Confidence");
    }

    #[test]
    fn merge_fills_matching_rows() {
        let ds = sample::timber_sample();
        let merged = merge_with_dataset(
            &ds,
            &[
                ("Acme Timber Corporation".into(), found("info@acme.com")),
                ("Premium Lumber LLC".into(), not_found()),
            ],
        )
        .unwrap();
        assert_eq!(merged.column_count(), ds.column_count() + 6);
        let status = merged.column_index(STATUS_COLUMN).unwrap();
        let email = merged.column_index(EMAIL_COLUMN).unwrap();
        let conf = merged.column_index(CONFIDENCE_COLUMN).unwrap();

        assert_eq!(merged.get(0, status).unwrap().to_string(), "found");
        assert_eq!(merged.get(0, email).unwrap().to_string(), "info@acme.com");
        assert_eq!(merged.get(0, conf).unwrap().as_f64(), Some(0.8));
        assert_eq!(merged.get(3, status).unwrap().to_string(), "not_found");
        assert_eq!(merged.get(3, email).unwrap().to_string(), "");
        assert_eq!(merged.get(1, status).unwrap().to_string(), "pending");
        assert_eq!(merged.get(1, conf).unwrap().as_f64(), Some(0.0));
    }

    #[test]
    fn merge_without_company_column_is_copy() {
        let ds = Dataset::from_columns(vec![("n", vec![Value::Number(1.0)])]);
        assert_eq!(merge_with_dataset(&ds, &[("x".into(), not_found())]).unwrap(), ds);
    }

    #[test]
    fn summary_and_filenames() {
        let summary = results_summary(&[
            ("a".into(), found("a@a.com")),
            ("b".into(), not_found()),
            ("c".into(), not_found()),
            ("d".into(), found("d@d.com")),
        ]);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.success_rate, 50.0);
        assert_eq!(results_summary(&[]).success_rate, 0.0);

        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();
        assert_eq!(
            results_export_filename(at),
            "business_research_results_20240309_140507.csv"
        );
        assert_eq!(
            enhanced_export_filename(at),
            "enhanced_business_data_20240309_140507.csv"
        );
    }

    #[test]
    fn cache_key_normalises_case() {
        assert_eq!(
            cache_key("Acme ", Some("Mumbai"), "demo"),
            cache_key("acme", Some("MUMBAI"), "demo")
        );
        assert_ne!(cache_key("Acme", None, "demo"), cache_key("Acme", None, "live"));
        assert_eq!(cache_key("Acme", None, "demo").len(), 64);
    }

    #[tokio::test]
    async fn run_research_in_batches() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.load_sample(&session.id, SampleKind::Timber).await.unwrap();
        let client = ResearchClient::demo(StdRng::seed_from_u64(3));
        let workflow = ResearchWorkflow::new(&mgr, &client);

        let run = workflow
            .run_research(&session.id, &options(3), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(run.results.len(), 3);
        assert_eq!(run.remaining, 2);
        assert_eq!(run.results[0].0, "Acme Timber Corporation");
        assert!(mgr.is_stage_complete(&session.id, Stage::Research).await.unwrap());

        let enhanced = mgr.working_dataset(&session.id).await.unwrap().unwrap();
        assert!(enhanced.column_index(STATUS_COLUMN).is_some());

        let run = workflow
            .run_research(&session.id, &options(3), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(run.results.len(), 2);
        assert_eq!(run.remaining, 0);

        let run = workflow
            .run_research(&session.id, &options(3), &SilentProgress)
            .await
            .unwrap();
        assert!(run.results.is_empty());
        assert_eq!(workflow.results(&session.id).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn cached_results_are_reused() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.load_sample(&session.id, SampleKind::Timber).await.unwrap();
        let client = ResearchClient::demo(StdRng::seed_from_u64(9));
        let workflow = ResearchWorkflow::new(&mgr, &client);

        let first = workflow
            .run_research(&session.id, &options(5), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(first.from_cache, 0);

        workflow.clear(&session.id).await.unwrap();
        let second = workflow
            .run_research(&session.id, &options(5), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(second.from_cache, 5);
        for ((_, a), (_, b)) in first.results.iter().zip(&second.results) {
            assert_eq!(a.status, b.status);
            assert_eq!(a.contacts, b.contacts);
        }
    }

    #[tokio::test]
    async fn cleared_cache_forces_fresh_lookup() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.load_sample(&session.id, SampleKind::Timber).await.unwrap();
        let client = ResearchClient::demo(StdRng::seed_from_u64(11));
        let workflow = ResearchWorkflow::new(&mgr, &client);

        workflow
            .run_research(&session.id, &options(2), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(workflow.clear_cache().await.unwrap(), 2);

        workflow.clear(&session.id).await.unwrap();
        let again = workflow
            .run_research(&session.id, &options(2), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(again.from_cache, 0);
        assert_eq!(again.results.len(), 2);
        assert_eq!(workflow.clear_cache().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn run_research_requires_data() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        let client = ResearchClient::demo(StdRng::seed_from_u64(1));
        let workflow = ResearchWorkflow::new(&mgr, &client);
        assert!(workflow
            .run_research(&session.id, &options(3), &SilentProgress)
            .await
            .is_err());
    }
}
