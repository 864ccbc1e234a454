//! Point-in-time view of the active session, loaded on start and on `r`.

use std::path::Path;

use tracing::{debug, info};

use tradescout_core::outreach::{self, CampaignAnalytics, OutreachManager};
use tradescout_core::{SessionManager, SessionStats};
use tradescout_dataset::Dataset;
use tradescout_shared::{
    Campaign, ChatMessage, DeploymentProfile, ResearchResult, Result, SessionMeta, SessionPolicy,
    load_config, database_path,
};
use tradescout_storage::Storage;

#[derive(Default)]
pub(crate) struct Snapshot {
    pub session: Option<SessionMeta>,
    pub stats: Option<SessionStats>,
    /// The upload as stored.
    pub main: Option<Dataset>,
    /// Research-enhanced data, else the upload.
    pub working: Option<Dataset>,
    pub chat: Vec<ChatMessage>,
    pub research: Vec<(String, ResearchResult)>,
    pub campaigns: Vec<(Campaign, CampaignAnalytics)>,
}

impl Snapshot {
    /// Load from the configured database. A missing database is an empty
    /// snapshot, not an error.
    pub(crate) async fn load() -> Result<Self> {
        let config = load_config()?;
        let path = database_path(&config)?;
        if !path.exists() {
            debug!(?path, "no database yet");
            return Ok(Self::default());
        }
        let policy = SessionPolicy::resolve(DeploymentProfile::detect(), &config.session);
        Self::load_from(&path, policy).await
    }

    pub(crate) async fn load_from(path: &Path, policy: SessionPolicy) -> Result<Self> {
        let storage = Storage::open_readonly(path).await?;
        let sessions = SessionManager::new(storage, policy);
        let mut snap = Self {
            stats: Some(sessions.stats().await?),
            ..Self::default()
        };

        let Some(session) = sessions.active_session().await? else {
            return Ok(snap);
        };
        let id = session.id.clone();
        let storage = sessions.storage();

        snap.main = sessions.main_dataset(&id).await?;
        snap.working = sessions.working_dataset(&id).await?;
        snap.chat = storage.list_chat_messages(&id).await?;
        snap.research = storage.list_research_results(&id).await?;

        let outreach = OutreachManager::new(&sessions, "");
        for campaign in storage.list_campaigns(&id).await? {
            let analytics = outreach.analytics(&campaign.id).await?;
            snap.campaigns.push((campaign, analytics));
        }

        info!(session = %id, rows = snap.main.as_ref().map(Dataset::row_count), "loaded snapshot");
        snap.session = Some(session);
        Ok(snap)
    }

    pub(crate) fn email_columns(&self) -> Vec<&str> {
        self.working
            .as_ref()
            .map(outreach::email_columns)
            .unwrap_or_default()
    }
}
