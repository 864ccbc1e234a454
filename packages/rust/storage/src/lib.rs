//! libSQL storage layer for TradeScout sessions.
//!
//! The [`Storage`] struct wraps a local libSQL database holding sessions and
//! everything scoped to them: datasets, chat transcripts, research results,
//! and outreach campaigns. A small cross-session research cache and an
//! app-state key/value table live alongside.
//!
//! **Access rules:**
//! - CLI: read-write via [`Storage::open`]
//! - TUI: read-only via [`Storage::open_readonly`] once the database exists

mod migrations;

use std::fmt::Display;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, Row, params};

use tradescout_shared::{
    Campaign, CampaignSend, ChatMessage, ChatRole, Result, ResearchResult, SendStatus, SessionId,
    SessionMeta, TradeScoutError,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Summary row for a stored dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    pub name: String,
    pub size_bytes: u64,
    pub row_count: usize,
    pub column_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TradeScoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` without write access.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TradeScoutError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        TradeScoutError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    pub async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<i64>(0).map(|v| v as u32).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(TradeScoutError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    pub async fn insert_session(&self, meta: &SessionMeta) -> Result<()> {
        self.check_writable()?;
        let json = to_json(meta)?;
        self.conn
            .execute(
                "INSERT INTO sessions (id, created_at, last_accessed, meta_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    meta.id.to_string(),
                    ts(&meta.created_at),
                    ts(&meta.last_accessed),
                    json
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<Option<SessionMeta>> {
        let mut rows = self
            .conn
            .query(
                "SELECT meta_json FROM sessions WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(from_json(&row.get::<String>(0).map_err(storage_err)?)?)),
            None => Ok(None),
        }
    }

    /// All sessions, oldest first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionMeta>> {
        let mut rows = self
            .conn
            .query(
                "SELECT meta_json FROM sessions ORDER BY created_at",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            sessions.push(from_json(&row.get::<String>(0).map_err(storage_err)?)?);
        }
        Ok(sessions)
    }

    /// Replace the stored metadata for an existing session.
    pub async fn update_session_meta(&self, meta: &SessionMeta) -> Result<()> {
        self.check_writable()?;
        let json = to_json(meta)?;
        let changed = self
            .conn
            .execute(
                "UPDATE sessions SET last_accessed = ?1, meta_json = ?2 WHERE id = ?3",
                params![ts(&meta.last_accessed), json, meta.id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        if changed == 0 {
            return Err(TradeScoutError::session(format!(
                "session {} not found",
                meta.id
            )));
        }
        Ok(())
    }

    /// Bump `last_accessed` to now. Returns the updated metadata.
    pub async fn touch_session(&self, id: &SessionId) -> Result<Option<SessionMeta>> {
        let Some(mut meta) = self.get_session(id).await? else {
            return Ok(None);
        };
        meta.last_accessed = Utc::now();
        self.update_session_meta(&meta).await?;
        Ok(Some(meta))
    }

    /// Delete a session and everything scoped to it. Returns whether it existed.
    pub async fn delete_session(&self, id: &SessionId) -> Result<bool> {
        self.check_writable()?;
        let id = id.to_string();
        self.conn
            .execute(
                "DELETE FROM campaign_sends WHERE campaign_id IN
                   (SELECT id FROM campaigns WHERE session_id = ?1)",
                params![id.as_str()],
            )
            .await
            .map_err(storage_err)?;
        for table in ["campaigns", "research_results", "chat_messages", "datasets"] {
            self.conn
                .execute(
                    &format!("DELETE FROM {table} WHERE session_id = ?1"),
                    params![id.as_str()],
                )
                .await
                .map_err(storage_err)?;
        }
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(storage_err)?;
        Ok(removed > 0)
    }

    /// Delete every session. Returns how many were removed.
    pub async fn delete_all_sessions(&self) -> Result<usize> {
        self.check_writable()?;
        let ids: Vec<SessionId> = self.list_sessions().await?.into_iter().map(|m| m.id).collect();
        for id in &ids {
            self.delete_session(id).await?;
        }
        Ok(ids.len())
    }

    /// Sessions not accessed since `cutoff`.
    pub async fn expired_sessions(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM sessions WHERE last_accessed < ?1 ORDER BY last_accessed",
                params![ts(&cutoff)],
            )
            .await
            .map_err(storage_err)?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            ids.push(parse_session_id(&row.get::<String>(0).map_err(storage_err)?)?);
        }
        Ok(ids)
    }

    /// The least recently accessed session.
    pub async fn oldest_session(&self) -> Result<Option<SessionId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM sessions ORDER BY last_accessed ASC LIMIT 1",
                params![],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(parse_session_id(
                &row.get::<String>(0).map_err(storage_err)?,
            )?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // App state
    // -----------------------------------------------------------------------

    pub async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO app_state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn get_state(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM app_state WHERE key = ?1", params![key])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_state(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM app_state WHERE key = ?1", params![key])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Datasets
    // -----------------------------------------------------------------------

    /// Insert or replace a named dataset payload.
    pub async fn put_dataset(
        &self,
        session: &SessionId,
        name: &str,
        payload_json: &str,
        size_bytes: u64,
        row_count: usize,
        column_count: usize,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO datasets (session_id, name, payload_json, size_bytes, row_count, column_count, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(session_id, name) DO UPDATE SET
                   payload_json = excluded.payload_json,
                   size_bytes = excluded.size_bytes,
                   row_count = excluded.row_count,
                   column_count = excluded.column_count,
                   updated_at = excluded.updated_at",
                params![
                    session.to_string(),
                    name,
                    payload_json,
                    size_bytes as i64,
                    row_count as i64,
                    column_count as i64,
                    ts(&Utc::now())
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn get_dataset(&self, session: &SessionId, name: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload_json FROM datasets WHERE session_id = ?1 AND name = ?2",
                params![session.to_string(), name],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    pub async fn list_datasets(&self, session: &SessionId) -> Result<Vec<DatasetRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, size_bytes, row_count, column_count, updated_at
                 FROM datasets WHERE session_id = ?1 ORDER BY name",
                params![session.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            records.push(DatasetRecord {
                name: row.get::<String>(0).map_err(storage_err)?,
                size_bytes: row.get::<i64>(1).map_err(storage_err)? as u64,
                row_count: row.get::<i64>(2).map_err(storage_err)? as usize,
                column_count: row.get::<i64>(3).map_err(storage_err)? as usize,
                updated_at: parse_ts(&row.get::<String>(4).map_err(storage_err)?)?,
            });
        }
        Ok(records)
    }

    pub async fn delete_dataset(&self, session: &SessionId, name: &str) -> Result<bool> {
        self.check_writable()?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM datasets WHERE session_id = ?1 AND name = ?2",
                params![session.to_string(), name],
            )
            .await
            .map_err(storage_err)?;
        Ok(removed > 0)
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    pub async fn append_chat_message(&self, session: &SessionId, msg: &ChatMessage) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO chat_messages (session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.to_string(),
                    msg.role.as_str(),
                    msg.content.as_str(),
                    ts(&msg.created_at)
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Full transcript in the order messages were appended.
    pub async fn list_chat_messages(&self, session: &SessionId) -> Result<Vec<ChatMessage>> {
        let mut rows = self
            .conn
            .query(
                "SELECT role, content, created_at FROM chat_messages
                 WHERE session_id = ?1 ORDER BY id",
                params![session.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let role: String = row.get(0).map_err(storage_err)?;
            messages.push(ChatMessage {
                role: ChatRole::parse(&role).ok_or_else(|| {
                    TradeScoutError::Storage(format!("unknown chat role '{role}'"))
                })?,
                content: row.get::<String>(1).map_err(storage_err)?,
                created_at: parse_ts(&row.get::<String>(2).map_err(storage_err)?)?,
            });
        }
        Ok(messages)
    }

    // -----------------------------------------------------------------------
    // Research results
    // -----------------------------------------------------------------------

    pub async fn upsert_research_result(
        &self,
        session: &SessionId,
        company: &str,
        result: &ResearchResult,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO research_results (session_id, company, result_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(session_id, company) DO UPDATE SET
                   result_json = excluded.result_json,
                   updated_at = excluded.updated_at",
                params![
                    session.to_string(),
                    company,
                    to_json(result)?,
                    ts(&Utc::now())
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Results in the order companies were first researched.
    pub async fn list_research_results(
        &self,
        session: &SessionId,
    ) -> Result<Vec<(String, ResearchResult)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT company, result_json FROM research_results
                 WHERE session_id = ?1 ORDER BY id",
                params![session.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let company: String = row.get(0).map_err(storage_err)?;
            let result = from_json(&row.get::<String>(1).map_err(storage_err)?)?;
            results.push((company, result));
        }
        Ok(results)
    }

    pub async fn clear_research_results(&self, session: &SessionId) -> Result<usize> {
        self.check_writable()?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM research_results WHERE session_id = ?1",
                params![session.to_string()],
            )
            .await
            .map_err(storage_err)?;
        Ok(removed as usize)
    }

    // -----------------------------------------------------------------------
    // Research cache
    // -----------------------------------------------------------------------

    pub async fn get_research_cache(&self, cache_key: &str) -> Result<Option<ResearchResult>> {
        let mut rows = self
            .conn
            .query(
                "SELECT result_json FROM research_cache WHERE cache_key = ?1",
                params![cache_key],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(from_json(&row.get::<String>(0).map_err(storage_err)?)?)),
            None => Ok(None),
        }
    }

    pub async fn set_research_cache(
        &self,
        cache_key: &str,
        company: &str,
        result: &ResearchResult,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO research_cache (cache_key, company, result_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(cache_key) DO UPDATE SET
                   result_json = excluded.result_json,
                   created_at = excluded.created_at",
                params![cache_key, company, to_json(result)?, ts(&Utc::now())],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn clear_research_cache(&self) -> Result<usize> {
        self.check_writable()?;
        let removed = self
            .conn
            .execute("DELETE FROM research_cache", params![])
            .await
            .map_err(storage_err)?;
        Ok(removed as usize)
    }

    // -----------------------------------------------------------------------
    // Campaigns
    // -----------------------------------------------------------------------

    pub async fn insert_campaign(&self, campaign: &Campaign) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO campaigns (id, session_id, name, subject, template, email_column, created_at, launched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    campaign.id.as_str(),
                    campaign.session_id.to_string(),
                    campaign.name.as_str(),
                    campaign.subject.as_str(),
                    campaign.template.as_str(),
                    campaign.email_column.as_str(),
                    ts(&campaign.created_at),
                    campaign.launched_at.as_ref().map(ts)
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, session_id, name, subject, template, email_column, created_at, launched_at
                 FROM campaigns WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_campaign(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_campaigns(&self, session: &SessionId) -> Result<Vec<Campaign>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, session_id, name, subject, template, email_column, created_at, launched_at
                 FROM campaigns WHERE session_id = ?1 ORDER BY created_at",
                params![session.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut campaigns = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            campaigns.push(row_to_campaign(&row)?);
        }
        Ok(campaigns)
    }

    pub async fn mark_campaign_launched(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(MARK_LAUNCHED_SQL, params![ts(&at), id])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn insert_campaign_send(&self, send: &CampaignSend) -> Result<()> {
        self.check_writable()?;
        insert_send(&self.conn, send).await
    }

    /// Record a launch atomically: replace any sends left by an earlier
    /// failed attempt, insert `sends`, and set `launched_at`.
    pub async fn record_campaign_launch(
        &self,
        campaign_id: &str,
        at: DateTime<Utc>,
        sends: &[CampaignSend],
    ) -> Result<()> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute(
            "DELETE FROM campaign_sends WHERE campaign_id = ?1",
            params![campaign_id],
        )
        .await
        .map_err(storage_err)?;
        for send in sends {
            insert_send(&tx, send).await?;
        }
        tx.execute(MARK_LAUNCHED_SQL, params![ts(&at), campaign_id])
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(campaign = campaign_id, sends = sends.len(), "recorded campaign launch");
        Ok(())
    }

    pub async fn list_campaign_sends(&self, campaign_id: &str) -> Result<Vec<CampaignSend>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, campaign_id, row_index, recipient, status, rendered_body, updated_at
                 FROM campaign_sends WHERE campaign_id = ?1 ORDER BY row_index",
                params![campaign_id],
            )
            .await
            .map_err(storage_err)?;

        let mut sends = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            sends.push(row_to_send(&row)?);
        }
        Ok(sends)
    }

    pub async fn get_campaign_send(&self, send_id: &str) -> Result<Option<CampaignSend>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, campaign_id, row_index, recipient, status, rendered_body, updated_at
                 FROM campaign_sends WHERE id = ?1",
                params![send_id],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_send(&row)?)),
            None => Ok(None),
        }
    }

    /// Set a send's status. Returns `false` when the send does not exist.
    pub async fn update_send_status(&self, send_id: &str, status: SendStatus) -> Result<bool> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                "UPDATE campaign_sends SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), ts(&Utc::now()), send_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

const MARK_LAUNCHED_SQL: &str = "UPDATE campaigns SET launched_at = ?1 WHERE id = ?2";

async fn insert_send(conn: &Connection, send: &CampaignSend) -> Result<()> {
    conn.execute(
        "INSERT INTO campaign_sends (id, campaign_id, row_index, recipient, status, rendered_body, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            send.id.as_str(),
            send.campaign_id.as_str(),
            send.row_index as i64,
            send.recipient.as_str(),
            send.status.as_str(),
            send.rendered_body.as_str(),
            ts(&send.updated_at)
        ],
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}

fn storage_err(e: impl Display) -> TradeScoutError {
    TradeScoutError::Storage(e.to_string())
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TradeScoutError::Storage(format!("invalid date '{s}': {e}")))
}

fn parse_session_id(s: &str) -> Result<SessionId> {
    s.parse()
        .map_err(|e| TradeScoutError::Storage(format!("invalid session id '{s}': {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(storage_err)
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| TradeScoutError::Storage(format!("corrupt record: {e}")))
}

fn row_to_send(row: &Row) -> Result<CampaignSend> {
    let status: String = row.get(4).map_err(storage_err)?;
    Ok(CampaignSend {
        id: row.get::<String>(0).map_err(storage_err)?,
        campaign_id: row.get::<String>(1).map_err(storage_err)?,
        row_index: row.get::<i64>(2).map_err(storage_err)? as usize,
        recipient: row.get::<String>(3).map_err(storage_err)?,
        status: SendStatus::parse(&status)
            .ok_or_else(|| TradeScoutError::Storage(format!("unknown send status '{status}'")))?,
        rendered_body: row.get::<String>(5).map_err(storage_err)?,
        updated_at: parse_ts(&row.get::<String>(6).map_err(storage_err)?)?,
    })
}

fn row_to_campaign(row: &Row) -> Result<Campaign> {
    Ok(Campaign {
        id: row.get::<String>(0).map_err(storage_err)?,
        session_id: parse_session_id(&row.get::<String>(1).map_err(storage_err)?)?,
        name: row.get::<String>(2).map_err(storage_err)?,
        subject: row.get::<String>(3).map_err(storage_err)?,
        template: row.get::<String>(4).map_err(storage_err)?,
        email_column: row.get::<String>(5).map_err(storage_err)?,
        created_at: parse_ts(&row.get::<String>(6).map_err(storage_err)?)?,
        launched_at: match row.get::<String>(7).ok() {
            Some(s) => Some(parse_ts(&s)?),
            None => None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tradescout_shared::{Contact, ResearchStatus};
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ts_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn found_result(email: &str) -> ResearchResult {
        ResearchResult {
            status: ResearchStatus::Found,
            contacts: vec![Contact {
                email: Some(email.into()),
                phone: None,
                website: None,
            }],
            description: "Timber importer".into(),
            confidence_score: 0.8,
            search_results: 4,
            researched_at: Utc::now(),
        }
    }

    async fn new_session(storage: &Storage) -> SessionMeta {
        let meta = SessionMeta::new(SessionId::new());
        storage.insert_session(&meta).await.expect("insert session");
        meta
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.schema_version().await, 3);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ts_test_{}.db", Uuid::now_v7()));
        let first = Storage::open(&tmp).await.expect("first open");
        drop(first);
        let second = Storage::open(&tmp).await.expect("second open");
        assert_eq!(second.schema_version().await, 3);
    }

    #[tokio::test]
    async fn session_crud() {
        let storage = test_storage().await;
        let mut meta = new_session(&storage).await;

        let loaded = storage.get_session(&meta.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, meta.id);
        assert!(!loaded.data_loaded);

        meta.data_loaded = true;
        meta.uploaded_filename = Some("trade.csv".into());
        storage.update_session_meta(&meta).await.unwrap();
        let loaded = storage.get_session(&meta.id).await.unwrap().unwrap();
        assert_eq!(loaded.uploaded_filename.as_deref(), Some("trade.csv"));

        let touched = storage.touch_session(&meta.id).await.unwrap().unwrap();
        assert!(touched.last_accessed >= meta.last_accessed);

        assert_eq!(storage.list_sessions().await.unwrap().len(), 1);
        assert!(storage.delete_session(&meta.id).await.unwrap());
        assert!(!storage.delete_session(&meta.id).await.unwrap());
        assert!(storage.get_session(&meta.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_session_fails() {
        let storage = test_storage().await;
        let meta = SessionMeta::new(SessionId::new());
        assert!(storage.update_session_meta(&meta).await.is_err());
        assert!(storage.touch_session(&meta.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expiry_and_oldest() {
        let storage = test_storage().await;
        let mut old = SessionMeta::new(SessionId::new());
        old.last_accessed = Utc::now() - Duration::hours(5);
        storage.insert_session(&old).await.unwrap();
        let fresh = new_session(&storage).await;

        let expired = storage
            .expired_sessions(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(expired, vec![old.id.clone()]);
        assert_eq!(storage.oldest_session().await.unwrap(), Some(old.id));
        assert_ne!(storage.oldest_session().await.unwrap(), Some(fresh.id));
    }

    #[tokio::test]
    async fn app_state_kv() {
        let storage = test_storage().await;
        assert!(storage.get_state("active_session").await.unwrap().is_none());
        storage.set_state("active_session", "a").await.unwrap();
        storage.set_state("active_session", "b").await.unwrap();
        assert_eq!(
            storage.get_state("active_session").await.unwrap().as_deref(),
            Some("b")
        );
        storage.delete_state("active_session").await.unwrap();
        assert!(storage.get_state("active_session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dataset_upsert_and_list() {
        let storage = test_storage().await;
        let meta = new_session(&storage).await;

        storage
            .put_dataset(&meta.id, "main_data", "{\"v\":1}", 10, 2, 3)
            .await
            .unwrap();
        storage
            .put_dataset(&meta.id, "main_data", "{\"v\":2}", 20, 4, 3)
            .await
            .unwrap();

        let payload = storage.get_dataset(&meta.id, "main_data").await.unwrap();
        assert_eq!(payload.as_deref(), Some("{\"v\":2}"));

        let records = storage.list_datasets(&meta.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size_bytes, 20);
        assert_eq!(records[0].row_count, 4);

        assert!(storage.delete_dataset(&meta.id, "main_data").await.unwrap());
        assert!(storage.get_dataset(&meta.id, "main_data").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chat_transcript_order() {
        let storage = test_storage().await;
        let meta = new_session(&storage).await;
        storage
            .append_chat_message(&meta.id, &ChatMessage::new(ChatRole::User, "hello"))
            .await
            .unwrap();
        storage
            .append_chat_message(&meta.id, &ChatMessage::new(ChatRole::Assistant, "hi"))
            .await
            .unwrap();

        let messages = storage.list_chat_messages(&meta.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].content, "hi");
    }

    #[tokio::test]
    async fn research_results_keep_first_seen_order() {
        let storage = test_storage().await;
        let meta = new_session(&storage).await;

        storage
            .upsert_research_result(&meta.id, "Acme", &found_result("a@acme.in"))
            .await
            .unwrap();
        storage
            .upsert_research_result(&meta.id, "Beta", &found_result("b@beta.in"))
            .await
            .unwrap();
        storage
            .upsert_research_result(&meta.id, "Acme", &found_result("sales@acme.in"))
            .await
            .unwrap();

        let results = storage.list_research_results(&meta.id).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "Acme");
        assert_eq!(
            results[0].1.contacts[0].email.as_deref(),
            Some("sales@acme.in")
        );

        assert_eq!(storage.clear_research_results(&meta.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn research_cache_roundtrip() {
        let storage = test_storage().await;
        assert!(storage.get_research_cache("k1").await.unwrap().is_none());
        storage
            .set_research_cache("k1", "Acme", &found_result("a@acme.in"))
            .await
            .unwrap();
        let cached = storage.get_research_cache("k1").await.unwrap().unwrap();
        assert!(cached.is_found());
        assert_eq!(storage.clear_research_cache().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn launch_replaces_partial_sends() {
        let storage = test_storage().await;
        let meta = new_session(&storage).await;
        let campaign = Campaign {
            id: Uuid::now_v7().to_string(),
            session_id: meta.id.clone(),
            name: "Retry".into(),
            subject: "Hello".into(),
            template: "Hi".into(),
            email_column: "Email".into(),
            created_at: Utc::now(),
            launched_at: None,
        };
        storage.insert_campaign(&campaign).await.unwrap();
        let send = |row: usize, recipient: &str| CampaignSend {
            id: Uuid::now_v7().to_string(),
            campaign_id: campaign.id.clone(),
            row_index: row,
            recipient: recipient.into(),
            status: SendStatus::Queued,
            rendered_body: "Hi".into(),
            updated_at: Utc::now(),
        };

        // leftover from an interrupted attempt
        storage.insert_campaign_send(&send(0, "a@acme.in")).await.unwrap();

        let sends = vec![send(0, "a@acme.in"), send(1, "b@beta.in")];
        storage
            .record_campaign_launch(&campaign.id, Utc::now(), &sends)
            .await
            .unwrap();

        let stored = storage.list_campaign_sends(&campaign.id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].recipient, "b@beta.in");
        let loaded = storage.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert!(loaded.launched_at.is_some());
    }

    #[tokio::test]
    async fn campaign_lifecycle_and_cascade() {
        let storage = test_storage().await;
        let meta = new_session(&storage).await;

        let campaign = Campaign {
            id: Uuid::now_v7().to_string(),
            session_id: meta.id.clone(),
            name: "Q3 timber".into(),
            subject: "Hello".into(),
            template: "Dear [Company Name]".into(),
            email_column: "Email".into(),
            created_at: Utc::now(),
            launched_at: None,
        };
        storage.insert_campaign(&campaign).await.unwrap();

        let send = CampaignSend {
            id: Uuid::now_v7().to_string(),
            campaign_id: campaign.id.clone(),
            row_index: 0,
            recipient: "a@acme.in".into(),
            status: SendStatus::Queued,
            rendered_body: "Dear Acme".into(),
            updated_at: Utc::now(),
        };
        storage.insert_campaign_send(&send).await.unwrap();
        storage
            .mark_campaign_launched(&campaign.id, Utc::now())
            .await
            .unwrap();

        let loaded = storage.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert!(loaded.launched_at.is_some());
        assert_eq!(storage.list_campaigns(&meta.id).await.unwrap().len(), 1);

        assert!(
            storage
                .update_send_status(&send.id, SendStatus::Opened)
                .await
                .unwrap()
        );
        assert!(
            !storage
                .update_send_status("missing", SendStatus::Opened)
                .await
                .unwrap()
        );
        let sends = storage.list_campaign_sends(&campaign.id).await.unwrap();
        assert_eq!(sends[0].status, SendStatus::Opened);
        let one = storage.get_campaign_send(&send.id).await.unwrap().unwrap();
        assert_eq!(one.recipient, "a@acme.in");
        assert!(storage.get_campaign_send("missing").await.unwrap().is_none());

        storage.delete_session(&meta.id).await.unwrap();
        assert!(storage.get_campaign(&campaign.id).await.unwrap().is_none());
        assert!(
            storage
                .list_campaign_sends(&campaign.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn delete_all_sessions_counts() {
        let storage = test_storage().await;
        new_session(&storage).await;
        new_session(&storage).await;
        assert_eq!(storage.delete_all_sessions().await.unwrap(), 2);
        assert!(storage.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("ts_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        let meta = new_session(&rw).await;
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert!(ro.is_readonly());
        assert!(ro.get_session(&meta.id).await.unwrap().is_some());
        let result = ro.set_state("active_session", "x").await;
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("ts_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
