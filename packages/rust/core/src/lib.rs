//! Workflow logic for TradeScout.
//!
//! This crate ties the dataset, storage, and research layers together into
//! the five-stage flow: upload, chat, visualizations, research, outreach.

pub mod chat;
pub mod outreach;
pub mod research;
pub mod session;
pub mod visualize;

pub use session::{
    ACTIVE_SESSION_KEY, ENHANCED_DATA, MAIN_DATA, SampleKind, SessionManager, SessionStats,
    UploadSummary,
};
