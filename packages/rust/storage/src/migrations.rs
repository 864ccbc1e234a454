//! SQL migration definitions for the TradeScout database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: sessions, app_state, datasets, chat_messages",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per user session; the full SessionMeta lives in meta_json
CREATE TABLE IF NOT EXISTS sessions (
    id            TEXT PRIMARY KEY,
    created_at    TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    meta_json     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_last_accessed ON sessions(last_accessed);

-- Process-independent pointers such as the active session
CREATE TABLE IF NOT EXISTS app_state (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Named dataframes per session, stored as JSON
CREATE TABLE IF NOT EXISTS datasets (
    session_id   TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    name         TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    size_bytes   INTEGER NOT NULL,
    row_count    INTEGER NOT NULL,
    column_count INTEGER NOT NULL,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (session_id, name)
);

-- Chat transcript
CREATE TABLE IF NOT EXISTS chat_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    role       TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_session ON chat_messages(session_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Research results and cross-session research cache",
            sql: r#"
CREATE TABLE IF NOT EXISTS research_results (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    company     TEXT NOT NULL,
    result_json TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE(session_id, company)
);

CREATE INDEX IF NOT EXISTS idx_research_session ON research_results(session_id);

-- Keyed by a hash of company + city so repeated lookups skip the APIs
CREATE TABLE IF NOT EXISTS research_cache (
    cache_key   TEXT PRIMARY KEY,
    company     TEXT NOT NULL,
    result_json TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
        Migration {
            version: 3,
            description: "Outreach campaigns and per-recipient sends",
            sql: r#"
CREATE TABLE IF NOT EXISTS campaigns (
    id           TEXT PRIMARY KEY,
    session_id   TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    name         TEXT NOT NULL,
    subject      TEXT NOT NULL,
    template     TEXT NOT NULL,
    email_column TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    launched_at  TEXT
);

CREATE INDEX IF NOT EXISTS idx_campaigns_session ON campaigns(session_id);

CREATE TABLE IF NOT EXISTS campaign_sends (
    id            TEXT PRIMARY KEY,
    campaign_id   TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
    row_index     INTEGER NOT NULL,
    recipient     TEXT NOT NULL,
    status        TEXT NOT NULL,
    rendered_body TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sends_campaign ON campaign_sends(campaign_id);

INSERT INTO schema_migrations (version) VALUES (3);
"#,
        },
    ]
}
