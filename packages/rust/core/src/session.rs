//! Session lifecycle, dataset persistence, and stage navigation.
//!
//! A [`SessionManager`] owns the [`Storage`] handle and the resolved
//! [`SessionPolicy`]. Every CLI invocation resolves one session (explicit id,
//! else the stored active pointer, else a fresh session) and works on it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use tradescout_dataset::{Dataset, sample};
use tradescout_shared::{
    AppConfig, DeploymentProfile, Result, SessionId, SessionMeta, SessionPolicy, Stage,
    TradeScoutError, database_path,
};
use tradescout_storage::Storage;

/// App-state key holding the active session id.
pub const ACTIVE_SESSION_KEY: &str = "active_session";

/// Dataset name for the uploaded data.
pub const MAIN_DATA: &str = "main_data";

/// Dataset name for upload data merged with research results.
pub const ENHANCED_DATA: &str = "enhanced_data";

/// Built-in datasets selectable by `sample`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Business,
    Timber,
}

impl SampleKind {
    pub fn dataset(self) -> Dataset {
        match self {
            SampleKind::Business => sample::business_sample(),
            SampleKind::Timber => sample::timber_sample(),
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            SampleKind::Business => sample::BUSINESS_SAMPLE_FILENAME,
            SampleKind::Timber => sample::TIMBER_SAMPLE_FILENAME,
        }
    }
}

/// What an upload produced, for display.
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub filename: String,
    pub rows: usize,
    pub columns: usize,
    pub size_bytes: u64,
    pub issues: Vec<String>,
}

/// Aggregate view over all stored sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub max_sessions: usize,
    pub total_memory_mb: f64,
    pub oldest_session: Option<DateTime<Utc>>,
    pub newest_session: Option<DateTime<Utc>>,
}

pub struct SessionManager {
    storage: Storage,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(storage: Storage, policy: SessionPolicy) -> Self {
        Self { storage, policy }
    }

    /// Open the configured database with limits for the detected profile.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let path = database_path(config)?;
        let storage = Storage::open(&path).await?;
        let profile = DeploymentProfile::detect();
        let policy = SessionPolicy::resolve(profile, &config.session);
        debug!(?path, ?profile, ?policy, "session manager ready");
        Ok(Self::new(storage, policy))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create a session after expiring timed-out sessions and evicting the
    /// least recently used ones while at capacity.
    #[instrument(skip_all)]
    pub async fn create_session(&self, id: Option<SessionId>) -> Result<SessionMeta> {
        self.enforce_limits().await?;
        let meta = SessionMeta::new(id.unwrap_or_default());
        self.storage.insert_session(&meta).await?;
        info!(session = %meta.id, "created session");
        Ok(meta)
    }

    async fn enforce_limits(&self) -> Result<()> {
        self.cleanup_expired().await?;
        while self.storage.list_sessions().await?.len() >= self.policy.max_sessions {
            let Some(oldest) = self.storage.oldest_session().await? else {
                break;
            };
            info!(session = %oldest, "removing oldest session to enforce limits");
            self.cleanup_session(&oldest).await?;
        }
        Ok(())
    }

    /// Fetch a session or fail with a session error.
    pub async fn get(&self, id: &SessionId) -> Result<SessionMeta> {
        self.storage
            .get_session(id)
            .await?
            .ok_or_else(|| TradeScoutError::session(format!("session {id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<SessionMeta>> {
        self.storage.list_sessions().await
    }

    /// The session the active pointer names, if it still exists.
    pub async fn active_session(&self) -> Result<Option<SessionMeta>> {
        let Some(raw) = self.storage.get_state(ACTIVE_SESSION_KEY).await? else {
            return Ok(None);
        };
        let Ok(id) = raw.parse::<SessionId>() else {
            warn!(value = %raw, "ignoring malformed active session pointer");
            return Ok(None);
        };
        self.storage.get_session(&id).await
    }

    pub async fn set_active(&self, id: &SessionId) -> Result<()> {
        self.get(id).await?;
        self.storage
            .set_state(ACTIVE_SESSION_KEY, &id.to_string())
            .await
    }

    /// Explicit session if given (must exist), else the active one, else a
    /// new session that becomes active.
    pub async fn resolve(&self, explicit: Option<&SessionId>) -> Result<SessionMeta> {
        if let Some(id) = explicit {
            return self.touch(id).await;
        }
        if let Some(active) = self.active_session().await? {
            return self.touch(&active.id).await;
        }
        let meta = self.create_session(None).await?;
        self.set_active(&meta.id).await?;
        Ok(meta)
    }

    async fn touch(&self, id: &SessionId) -> Result<SessionMeta> {
        self.storage
            .touch_session(id)
            .await?
            .ok_or_else(|| TradeScoutError::session(format!("session {id} not found")))
    }

    /// Load, modify, and persist session metadata.
    async fn update<F>(&self, id: &SessionId, f: F) -> Result<SessionMeta>
    where
        F: FnOnce(&mut SessionMeta),
    {
        let mut meta = self.get(id).await?;
        f(&mut meta);
        meta.last_accessed = Utc::now();
        self.storage.update_session_meta(&meta).await?;
        Ok(meta)
    }

    // -----------------------------------------------------------------------
    // Datasets
    // -----------------------------------------------------------------------

    /// Persist a dataset under `name`, creating the session when missing.
    #[instrument(skip(self, dataset), fields(session = %session, rows = dataset.row_count()))]
    pub async fn store_dataset(&self, session: &SessionId, name: &str, dataset: &Dataset) -> Result<()> {
        let size = dataset.estimated_size_bytes();
        if size > self.policy.max_file_size_bytes {
            let max_mb = self.policy.max_file_size_bytes / (1024 * 1024);
            return Err(TradeScoutError::validation(format!(
                "dataset too large: {:.1}MB > {max_mb}MB",
                size as f64 / (1024.0 * 1024.0)
            )));
        }

        if self.storage.get_session(session).await?.is_none() {
            self.create_session(Some(session.clone())).await?;
        }

        self.storage
            .put_dataset(
                session,
                name,
                &dataset.to_json()?,
                size,
                dataset.row_count(),
                dataset.column_count(),
            )
            .await?;

        let records = self.storage.list_datasets(session).await?;
        self.update(session, |meta| {
            meta.dataset_count = records.len();
            meta.total_size_bytes = records.iter().map(|r| r.size_bytes).sum();
        })
        .await?;
        info!(name, size_bytes = size, "stored dataset");
        Ok(())
    }

    pub async fn load_dataset(&self, session: &SessionId, name: &str) -> Result<Option<Dataset>> {
        match self.storage.get_dataset(session, name).await? {
            Some(json) => Ok(Some(Dataset::from_json(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn main_dataset(&self, session: &SessionId) -> Result<Option<Dataset>> {
        self.load_dataset(session, MAIN_DATA).await
    }

    /// Research-enhanced data when present, else the upload.
    pub async fn working_dataset(&self, session: &SessionId) -> Result<Option<Dataset>> {
        match self.load_dataset(session, ENHANCED_DATA).await? {
            Some(ds) => Ok(Some(ds)),
            None => self.main_dataset(session).await,
        }
    }

    /// The uploaded dataset, or the "no data" error every page shows.
    pub async fn require_data(&self, session: &SessionId) -> Result<Dataset> {
        let meta = self.get(session).await?;
        let data = if meta.data_loaded {
            self.main_dataset(session).await?
        } else {
            None
        };
        data.ok_or_else(|| {
            TradeScoutError::validation("No data loaded. Upload a file or load sample data first.")
        })
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    /// Merge keys into the session's free-form metadata.
    pub async fn store_metadata(
        &self,
        session: &SessionId,
        values: serde_json::Map<String, serde_json::Value>,
    ) -> Result<SessionMeta> {
        if self.storage.get_session(session).await?.is_none() {
            self.create_session(Some(session.clone())).await?;
        }
        self.update(session, |meta| meta.extra.extend(values)).await
    }

    /// Free-form metadata; empty for unknown sessions.
    pub async fn load_metadata(
        &self,
        session: &SessionId,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        Ok(self
            .storage
            .get_session(session)
            .await?
            .map(|m| m.extra)
            .unwrap_or_default())
    }

    /// Serialize a dataset for download. Only CSV is supported.
    pub fn export(dataset: &Dataset, filename: &str) -> Result<Vec<u8>> {
        if filename.to_lowercase().ends_with(".csv") {
            dataset.to_csv_bytes()
        } else {
            Err(TradeScoutError::validation(format!(
                "Unsupported export format: {filename} (use .csv)"
            )))
        }
    }

    /// Record the outcome of the last API connection test.
    pub async fn set_api_tested(&self, session: &SessionId, ok: bool) -> Result<SessionMeta> {
        self.update(session, |meta| meta.api_tested = ok).await
    }

    // -----------------------------------------------------------------------
    // Cleanup
    // -----------------------------------------------------------------------

    /// Remove one session and its data. Clears the active pointer if it
    /// named this session.
    pub async fn cleanup_session(&self, id: &SessionId) -> Result<bool> {
        let removed = self.storage.delete_session(id).await?;
        if let Some(active) = self.storage.get_state(ACTIVE_SESSION_KEY).await? {
            if active == id.to_string() {
                self.storage.delete_state(ACTIVE_SESSION_KEY).await?;
            }
        }
        if removed {
            info!(session = %id, "cleaned up session");
        }
        Ok(removed)
    }

    /// Remove sessions idle longer than the policy timeout.
    pub async fn cleanup_expired(&self) -> Result<Vec<SessionId>> {
        let timeout = chrono::Duration::from_std(self.policy.session_timeout)
            .map_err(|e| TradeScoutError::config(format!("invalid session timeout: {e}")))?;
        let expired = self.storage.expired_sessions(Utc::now() - timeout).await?;
        for id in &expired {
            self.cleanup_session(id).await?;
            info!(session = %id, "cleaned up expired session");
        }
        Ok(expired)
    }

    /// Remove every session and empty the research cache. Returns the
    /// number of sessions removed.
    pub async fn force_cleanup_all(&self) -> Result<usize> {
        let removed = self.storage.delete_all_sessions().await?;
        self.storage.delete_state(ACTIVE_SESSION_KEY).await?;
        let cached = self.storage.clear_research_cache().await?;
        warn!(removed, cached, "removed all sessions");
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<SessionStats> {
        let sessions = self.storage.list_sessions().await?;
        let total_bytes: u64 = sessions.iter().map(|s| s.total_size_bytes).sum();
        let total_mb = total_bytes as f64 / (1024.0 * 1024.0);
        Ok(SessionStats {
            active_sessions: sessions.len(),
            max_sessions: self.policy.max_sessions,
            total_memory_mb: (total_mb * 100.0).round() / 100.0,
            oldest_session: sessions.iter().map(|s| s.created_at).min(),
            newest_session: sessions.iter().map(|s| s.created_at).max(),
        })
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub async fn go_to_stage(&self, session: &SessionId, stage: Stage) -> Result<SessionMeta> {
        debug!(session = %session, stage = stage.as_key(), "navigating");
        self.update(session, |meta| meta.current_stage = stage).await
    }

    pub async fn current_stage(&self, session: &SessionId) -> Result<Stage> {
        Ok(self.get(session).await?.current_stage)
    }

    /// Mark a tracked stage (`upload`, `map`, `analyze`) complete.
    pub async fn mark_stage_complete(&self, session: &SessionId, stage: Stage) -> Result<SessionMeta> {
        let mut tracked = true;
        let meta = self
            .update(session, |meta| tracked = meta.stage_progress.set(stage, true))
            .await?;
        if !tracked {
            debug!(stage = stage.as_key(), "stage has no completion flag");
        }
        Ok(meta)
    }

    pub async fn is_stage_complete(&self, session: &SessionId, stage: Stage) -> Result<bool> {
        Ok(self.get(session).await?.stage_progress.get(stage))
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    /// Load, clean, and store a file as the session's main data, then move
    /// on to the chat page.
    #[instrument(skip(self, bytes), fields(session = %session, bytes = bytes.len()))]
    pub async fn upload(&self, session: &SessionId, filename: &str, bytes: &[u8]) -> Result<UploadSummary> {
        let max = self.policy.max_file_size_bytes;
        if bytes.len() as u64 > max {
            return Err(TradeScoutError::validation(format!(
                "File too large: {:.1}MB (max {}MB)",
                bytes.len() as f64 / (1024.0 * 1024.0),
                max / (1024 * 1024)
            )));
        }
        let mut dataset = tradescout_dataset::load_file(bytes, filename)?;
        dataset.clean();
        if dataset.is_empty() {
            warn!(filename, "uploaded file has no rows");
        }
        self.install_main_data(session, filename, dataset).await
    }

    /// Store one of the built-in datasets as the session's main data.
    pub async fn load_sample(&self, session: &SessionId, kind: SampleKind) -> Result<UploadSummary> {
        self.install_main_data(session, kind.filename(), kind.dataset())
            .await
    }

    async fn install_main_data(
        &self,
        session: &SessionId,
        filename: &str,
        dataset: Dataset,
    ) -> Result<UploadSummary> {
        self.store_dataset(session, MAIN_DATA, &dataset).await?;
        if self.storage.delete_dataset(session, ENHANCED_DATA).await? {
            debug!("dropped enhanced data from previous upload");
        }
        self.storage.clear_research_results(session).await?;

        let filename_owned = filename.to_string();
        self.update(session, |meta| {
            meta.uploaded_filename = Some(filename_owned);
            meta.data_loaded = true;
            meta.stage_progress.set(Stage::Upload, true);
            meta.current_stage = Stage::AiChat;
        })
        .await?;

        Ok(UploadSummary {
            filename: filename.to_string(),
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            size_bytes: dataset.estimated_size_bytes(),
            issues: dataset.validate().issues,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    pub(crate) async fn test_manager(policy: SessionPolicy) -> SessionManager {
        let tmp = std::env::temp_dir().join(format!("ts_core_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        SessionManager::new(storage, policy)
    }

    pub(crate) fn local_policy() -> SessionPolicy {
        SessionPolicy::for_profile(DeploymentProfile::Local)
    }

    #[tokio::test]
    async fn resolve_creates_and_reuses_active() {
        let mgr = test_manager(local_policy()).await;
        let first = mgr.resolve(None).await.unwrap();
        let second = mgr.resolve(None).await.unwrap();
        assert_eq!(first.id, second.id);

        let missing = SessionId::new();
        assert!(mgr.resolve(Some(&missing)).await.is_err());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let policy = SessionPolicy {
            max_sessions: 2,
            ..local_policy()
        };
        let mgr = test_manager(policy).await;
        let a = mgr.create_session(None).await.unwrap();
        let b = mgr.create_session(None).await.unwrap();
        // a becomes most recently used
        mgr.go_to_stage(&a.id, Stage::AiChat).await.unwrap();

        let c = mgr.create_session(None).await.unwrap();
        let ids: Vec<SessionId> = mgr.list().await.unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a.id));
        assert!(ids.contains(&c.id));
        assert!(!ids.contains(&b.id));
    }

    #[tokio::test]
    async fn expired_sessions_are_removed() {
        let policy = SessionPolicy {
            session_timeout: Duration::from_secs(3600),
            ..local_policy()
        };
        let mgr = test_manager(policy).await;
        let mut stale = SessionMeta::new(SessionId::new());
        stale.last_accessed = Utc::now() - chrono::Duration::hours(2);
        mgr.storage().insert_session(&stale).await.unwrap();
        mgr.storage()
            .set_state(ACTIVE_SESSION_KEY, &stale.id.to_string())
            .await
            .unwrap();

        let removed = mgr.cleanup_expired().await.unwrap();
        assert_eq!(removed, vec![stale.id]);
        assert!(mgr.active_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_dataset_rejected() {
        let policy = SessionPolicy {
            max_file_size_bytes: 10,
            ..local_policy()
        };
        let mgr = test_manager(policy).await;
        let session = mgr.create_session(None).await.unwrap();
        let err = mgr
            .store_dataset(&session.id, MAIN_DATA, &sample::business_sample())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn store_dataset_creates_missing_session() {
        let mgr = test_manager(local_policy()).await;
        let id = SessionId::new();
        mgr.store_dataset(&id, "scratch", &sample::timber_sample())
            .await
            .unwrap();
        let meta = mgr.get(&id).await.unwrap();
        assert_eq!(meta.dataset_count, 1);
        assert!(meta.total_size_bytes > 0);
        let loaded = mgr.load_dataset(&id, "scratch").await.unwrap().unwrap();
        assert_eq!(loaded, sample::timber_sample());
    }

    #[tokio::test]
    async fn upload_marks_progress_and_moves_to_chat() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        assert!(mgr.require_data(&session.id).await.is_err());

        let summary = mgr
            .upload(&session.id, "trade.csv", b"Company,Value\nAcme,10\nBeta,20\n")
            .await
            .unwrap();
        assert_eq!(summary.rows, 2);

        let meta = mgr.get(&session.id).await.unwrap();
        assert!(meta.data_loaded);
        assert_eq!(meta.current_stage, Stage::AiChat);
        assert!(mgr.is_stage_complete(&session.id, Stage::Upload).await.unwrap());
        assert_eq!(meta.uploaded_filename.as_deref(), Some("trade.csv"));

        let data = mgr.require_data(&session.id).await.unwrap();
        assert_eq!(data.numeric_columns(), vec!["Value"]);
    }

    #[tokio::test]
    async fn upload_rejects_excel() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        assert!(mgr.upload(&session.id, "book.xlsx", b"PK").await.is_err());
    }

    #[tokio::test]
    async fn working_dataset_prefers_enhanced() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.load_sample(&session.id, SampleKind::Timber).await.unwrap();
        let working = mgr.working_dataset(&session.id).await.unwrap().unwrap();
        assert_eq!(working, sample::timber_sample());

        mgr.store_dataset(&session.id, ENHANCED_DATA, &sample::business_sample())
            .await
            .unwrap();
        let working = mgr.working_dataset(&session.id).await.unwrap().unwrap();
        assert_eq!(working, sample::business_sample());
    }

    #[tokio::test]
    async fn metadata_merges() {
        let mgr = test_manager(local_policy()).await;
        let id = SessionId::new();
        let mut first = serde_json::Map::new();
        first.insert("a".into(), serde_json::json!(1));
        mgr.store_metadata(&id, first).await.unwrap();
        let mut second = serde_json::Map::new();
        second.insert("b".into(), serde_json::json!("x"));
        mgr.store_metadata(&id, second).await.unwrap();

        let meta = mgr.load_metadata(&id).await.unwrap();
        assert_eq!(meta.len(), 2);
        assert!(mgr.load_metadata(&SessionId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_and_force_cleanup() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.load_sample(&session.id, SampleKind::Business).await.unwrap();
        mgr.create_session(None).await.unwrap();

        let stats = mgr.stats().await.unwrap();
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.max_sessions, 20);
        assert!(stats.oldest_session <= stats.newest_session);

        let cached = tradescout_shared::ResearchResult {
            status: tradescout_shared::ResearchStatus::NotFound,
            contacts: Vec::new(),
            description: "Limited information".into(),
            confidence_score: 0.2,
            search_results: 0,
            researched_at: Utc::now(),
        };
        mgr.storage()
            .set_research_cache("acme-key", "Acme", &cached)
            .await
            .unwrap();

        assert_eq!(mgr.force_cleanup_all().await.unwrap(), 2);
        assert!(mgr.active_session().await.unwrap().is_none());
        assert!(mgr.storage().get_research_cache("acme-key").await.unwrap().is_none());
    }

    #[test]
    fn export_only_csv() {
        let ds = sample::business_sample();
        assert!(SessionManager::export(&ds, "out.csv").unwrap().starts_with(b"Company,"));
        assert!(SessionManager::export(&ds, "out.xlsx").is_err());
    }

    #[tokio::test]
    async fn navigation_roundtrip() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.go_to_stage(&session.id, Stage::Research).await.unwrap();
        assert_eq!(mgr.current_stage(&session.id).await.unwrap(), Stage::Research);
        mgr.mark_stage_complete(&session.id, Stage::Research).await.unwrap();
        assert!(mgr.is_stage_complete(&session.id, Stage::Research).await.unwrap());
        assert!(!mgr.is_stage_complete(&session.id, Stage::Outreach).await.unwrap());
    }
}
