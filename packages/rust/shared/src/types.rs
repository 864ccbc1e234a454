//! Core domain types for TradeScout sessions, research, and outreach.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for session identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new time-sortable session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// First eight characters, used in compact listings.
    pub fn short(&self) -> String {
        self.0.to_string().chars().take(8).collect()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// The five workflow pages, in navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Upload,
    AiChat,
    Visualizations,
    Research,
    Outreach,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Upload,
        Stage::AiChat,
        Stage::Visualizations,
        Stage::Research,
        Stage::Outreach,
    ];

    /// Persisted key. Research and outreach keep their historical
    /// `map`/`analyze` keys so stage progress stays compatible.
    pub fn as_key(self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::AiChat => "ai_chat",
            Stage::Visualizations => "visualizations",
            Stage::Research => "map",
            Stage::Outreach => "analyze",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_key() == key)
    }

    /// Human-readable title.
    pub fn title(self) -> &'static str {
        match self {
            Stage::Upload => "Upload & Data",
            Stage::AiChat => "AI Chat",
            Stage::Visualizations => "Visualizations",
            Stage::Research => "Business Research",
            Stage::Outreach => "Email Outreach",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Completion flags for the tracked stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    #[serde(default)]
    pub upload: bool,
    #[serde(default)]
    pub map: bool,
    #[serde(default)]
    pub analyze: bool,
}

impl StageProgress {
    /// Completion flag for a stage. Untracked stages report `false`.
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Upload => self.upload,
            Stage::Research => self.map,
            Stage::Outreach => self.analyze,
            Stage::AiChat | Stage::Visualizations => false,
        }
    }

    /// Mark a stage complete. Returns `false` for untracked stages.
    pub fn set(&mut self, stage: Stage, done: bool) -> bool {
        match stage {
            Stage::Upload => self.upload = done,
            Stage::Research => self.map = done,
            Stage::Outreach => self.analyze = done,
            Stage::AiChat | Stage::Visualizations => return false,
        }
        true
    }
}

// ---------------------------------------------------------------------------
// SessionMeta
// ---------------------------------------------------------------------------

/// Everything stored about a session besides its datasets and records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub current_stage: Stage,
    #[serde(default)]
    pub stage_progress: StageProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_filename: Option<String>,
    #[serde(default)]
    pub data_loaded: bool,
    #[serde(default)]
    pub dataset_count: usize,
    #[serde(default)]
    pub total_size_bytes: u64,
    #[serde(default)]
    pub api_tested: bool,
    /// Free-form metadata merged by `store_metadata`.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionMeta {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_accessed: now,
            current_stage: Stage::Upload,
            stage_progress: StageProgress::default(),
            uploaded_filename: None,
            data_loaded: false,
            dataset_count: 0,
            total_size_bytes: 0,
            api_tested: false,
            extra: serde_json::Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// Contact details extracted for a company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// Outcome of researching one company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    Found,
    NotFound,
    Error,
    Pending,
}

impl ResearchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResearchStatus::Found => "found",
            ResearchStatus::NotFound => "not_found",
            ResearchStatus::Error => "error",
            ResearchStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored research result for a single company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub status: ResearchStatus,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub description: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub search_results: usize,
    pub researched_at: DateTime<Utc>,
}

impl ResearchResult {
    /// The first contact, which is what tables and merges display.
    pub fn primary_contact(&self) -> Option<&Contact> {
        self.contacts.first()
    }

    pub fn is_found(&self) -> bool {
        self.status == ResearchStatus::Found
    }
}

/// Research results keyed by company name.
pub type ResearchResults = BTreeMap<String, ResearchResult>;

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(ChatRole::System),
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outreach
// ---------------------------------------------------------------------------

/// A saved email campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub session_id: SessionId,
    pub name: String,
    pub subject: String,
    pub template: String,
    pub email_column: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launched_at: Option<DateTime<Utc>>,
}

/// Tracking state of one recipient in a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Skipped,
    Queued,
    Opened,
    Clicked,
    Responded,
}

impl SendStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SendStatus::Skipped => "skipped",
            SendStatus::Queued => "queued",
            SendStatus::Opened => "opened",
            SendStatus::Clicked => "clicked",
            SendStatus::Responded => "responded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skipped" => Some(SendStatus::Skipped),
            "queued" => Some(SendStatus::Queued),
            "opened" => Some(SendStatus::Opened),
            "clicked" => Some(SendStatus::Clicked),
            "responded" => Some(SendStatus::Responded),
            _ => None,
        }
    }
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recipient row recorded at launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSend {
    pub id: String,
    pub campaign_id: String,
    pub row_index: usize,
    pub recipient: String,
    pub status: SendStatus,
    pub rendered_body: String,
    pub updated_at: DateTime<Utc>,
}
