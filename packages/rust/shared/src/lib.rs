//! Shared types, error model, and configuration for TradeScout.
//!
//! This crate is the foundation depended on by all other TradeScout crates.
//! It provides:
//! - [`TradeScoutError`] — the unified error type
//! - Domain types ([`SessionMeta`], [`ResearchResult`], [`Campaign`], [`SessionId`])
//! - Configuration ([`AppConfig`], [`SessionPolicy`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DeploymentInfo, DeploymentProfile, GroqConfig, OutreachConfig,
    ResearchConfig, SessionOverrides, SessionPolicy, TavilyConfig, api_key, config_dir,
    config_file_path, database_path, init_config, load_config, load_config_from,
    validate_api_keys,
};
pub use error::{Result, TradeScoutError};
pub use types::{
    Campaign, CampaignSend, ChatMessage, ChatRole, Contact, ResearchResult, ResearchResults,
    ResearchStatus, SendStatus, SessionId, SessionMeta, Stage, StageProgress,
};
