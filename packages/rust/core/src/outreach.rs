//! Email campaigns over the session's data.
//!
//! Nothing is delivered. Launching a campaign records one tracked send per
//! data row, and engagement events move sends along the funnel
//! (`queued` → `opened` → `clicked` → `responded`).

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use tradescout_dataset::{Dataset, Value};
use tradescout_shared::{
    Campaign, CampaignSend, Result, SendStatus, SessionId, Stage, TradeScoutError,
};

use crate::SessionManager;
use crate::research::COMPANY_COLUMN_CANDIDATES;

const EMAIL_COLUMN_KEYWORDS: &[&str] = &["email", "mail", "contact"];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex")
});

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid regex")
});

pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(address.trim())
}

/// Columns whose names mention email, mail, or contact.
pub fn email_columns(dataset: &Dataset) -> Vec<&str> {
    dataset
        .columns()
        .iter()
        .filter(|c| {
            let lower = c.to_lowercase();
            EMAIL_COLUMN_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(String::as_str)
        .collect()
}

/// Fill `[Company Name]`, `[Your Name]`, and `{{Column}}` placeholders from
/// one data row. Unknown `{{...}}` names are left as written.
pub fn render_template(template: &str, columns: &[String], row: &[Value], sender: &str) -> String {
    let cell = |name: &str| {
        columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| row.get(i))
    };

    let company = COMPANY_COLUMN_CANDIDATES
        .iter()
        .find_map(|c| cell(*c))
        .or_else(|| row.iter().find(|v| v.as_str().is_some()))
        .map(|v| v.to_string())
        .unwrap_or_default();

    let body = template
        .replace("[Company Name]", &company)
        .replace("[Your Name]", sender);

    PLACEHOLDER_RE
        .replace_all(&body, |caps: &regex::Captures| match cell(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Drafts and previews
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignDraft {
    pub name: String,
    pub subject: String,
    pub template: String,
    pub email_column: String,
}

impl CampaignDraft {
    pub fn validate(&self, dataset: &Dataset) -> Result<()> {
        for (field, value) in [
            ("Campaign name", &self.name),
            ("Email subject", &self.subject),
            ("Email template", &self.template),
        ] {
            if value.trim().is_empty() {
                return Err(TradeScoutError::validation(format!("{field} is required")));
            }
        }
        if dataset.column_index(&self.email_column).is_none() {
            return Err(TradeScoutError::validation(format!(
                "Email column '{}' not found in the data",
                self.email_column
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignPreview {
    pub total_rows: usize,
    /// Rows with a valid, not yet seen address.
    pub recipients: usize,
    pub first_message: Option<RenderedMessage>,
}

/// Per-row send plan: recipient, status, and row index.
fn plan_sends(dataset: &Dataset, column: usize) -> Vec<(usize, String, SendStatus)> {
    let mut seen = HashSet::new();
    dataset
        .column_values(column)
        .enumerate()
        .map(|(row, value)| {
            let address = value.to_string().trim().to_string();
            let status = if is_valid_email(&address) && seen.insert(address.to_lowercase()) {
                SendStatus::Queued
            } else {
                SendStatus::Skipped
            };
            (row, address, status)
        })
        .collect()
}

fn render_row(
    template: &str,
    subject: &str,
    dataset: &Dataset,
    row: usize,
    to: String,
    sender: &str,
) -> RenderedMessage {
    let cells = dataset.row(row).unwrap_or_default();
    RenderedMessage {
        to,
        subject: render_template(subject, dataset.columns(), cells, sender),
        body: render_template(template, dataset.columns(), cells, sender),
    }
}

pub fn preview(draft: &CampaignDraft, dataset: &Dataset, sender: &str) -> Result<CampaignPreview> {
    draft.validate(dataset)?;
    let column = dataset.require_column(&draft.email_column)?;
    let plan = plan_sends(dataset, column);
    let first_message = plan
        .iter()
        .find(|(_, _, status)| *status == SendStatus::Queued)
        .map(|(row, to, _)| {
            render_row(&draft.template, &draft.subject, dataset, *row, to.clone(), sender)
        });
    Ok(CampaignPreview {
        total_rows: dataset.row_count(),
        recipients: plan.iter().filter(|(_, _, s)| *s == SendStatus::Queued).count(),
        first_message,
    })
}

// ---------------------------------------------------------------------------
// Campaigns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchReport {
    pub queued: usize,
    pub skipped: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignAnalytics {
    pub total_rows: usize,
    pub sent: usize,
    pub skipped: usize,
    pub opened: usize,
    pub clicked: usize,
    pub responded: usize,
    pub open_rate: f64,
    pub click_rate: f64,
    pub response_rate: f64,
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub struct OutreachManager<'a> {
    sessions: &'a SessionManager,
    sender_name: String,
}

impl<'a> OutreachManager<'a> {
    pub fn new(sessions: &'a SessionManager, sender_name: impl Into<String>) -> Self {
        Self {
            sessions,
            sender_name: sender_name.into(),
        }
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    /// Preview against the session's working data.
    pub async fn preview(&self, session: &SessionId, draft: &CampaignDraft) -> Result<CampaignPreview> {
        let dataset = self.dataset(session).await?;
        preview(draft, &dataset, &self.sender_name)
    }

    /// Research-enhanced data when present, so `Research_Email` is usable.
    async fn dataset(&self, session: &SessionId) -> Result<Dataset> {
        self.sessions.require_data(session).await?;
        self.sessions
            .working_dataset(session)
            .await?
            .ok_or_else(|| TradeScoutError::validation("No data loaded"))
    }

    async fn campaign(&self, id: &str) -> Result<Campaign> {
        self.sessions
            .storage()
            .get_campaign(id)
            .await?
            .ok_or_else(|| TradeScoutError::validation(format!("campaign {id} not found")))
    }

    pub async fn list_campaigns(&self, session: &SessionId) -> Result<Vec<Campaign>> {
        self.sessions.storage().list_campaigns(session).await
    }

    #[instrument(skip(self, draft), fields(session = %session, name = %draft.name))]
    pub async fn create_campaign(&self, session: &SessionId, draft: &CampaignDraft) -> Result<Campaign> {
        let dataset = self.dataset(session).await?;
        draft.validate(&dataset)?;
        let campaign = Campaign {
            id: Uuid::now_v7().to_string(),
            session_id: session.clone(),
            name: draft.name.trim().to_string(),
            subject: draft.subject.clone(),
            template: draft.template.clone(),
            email_column: draft.email_column.clone(),
            created_at: Utc::now(),
            launched_at: None,
        };
        self.sessions.storage().insert_campaign(&campaign).await?;
        info!(campaign = %campaign.id, "created campaign");
        Ok(campaign)
    }

    /// Render the first row's message for `recipient` without recording it.
    pub async fn test_send(&self, campaign_id: &str, recipient: &str) -> Result<RenderedMessage> {
        if !is_valid_email(recipient) {
            return Err(TradeScoutError::validation(format!(
                "'{recipient}' is not a valid email address"
            )));
        }
        let campaign = self.campaign(campaign_id).await?;
        let dataset = self.dataset(&campaign.session_id).await?;
        if dataset.is_empty() {
            return Err(TradeScoutError::validation("No rows to render a test message from"));
        }
        Ok(render_row(
            &campaign.template,
            &campaign.subject,
            &dataset,
            0,
            recipient.trim().to_string(),
            &self.sender_name,
        ))
    }

    /// Record one send per data row. Invalid and repeated addresses are
    /// recorded as skipped.
    #[instrument(skip(self))]
    pub async fn launch(&self, campaign_id: &str) -> Result<LaunchReport> {
        let campaign = self.campaign(campaign_id).await?;
        if campaign.launched_at.is_some() {
            return Err(TradeScoutError::validation(format!(
                "campaign '{}' was already launched",
                campaign.name
            )));
        }
        let dataset = self.dataset(&campaign.session_id).await?;
        let column = dataset.require_column(&campaign.email_column)?;
        let storage = self.sessions.storage();

        let mut report = LaunchReport {
            queued: 0,
            skipped: 0,
            duplicates: 0,
        };
        let mut valid_seen = 0;
        let mut sends = Vec::new();
        for (row, recipient, status) in plan_sends(&dataset, column) {
            if is_valid_email(&recipient) {
                valid_seen += 1;
            }
            let message = render_row(
                &campaign.template,
                &campaign.subject,
                &dataset,
                row,
                recipient.clone(),
                &self.sender_name,
            );
            match status {
                SendStatus::Queued => report.queued += 1,
                _ => report.skipped += 1,
            }
            sends.push(CampaignSend {
                id: Uuid::now_v7().to_string(),
                campaign_id: campaign.id.clone(),
                row_index: row,
                recipient,
                status,
                rendered_body: message.body,
                updated_at: Utc::now(),
            });
        }
        report.duplicates = valid_seen - report.queued;

        storage
            .record_campaign_launch(&campaign.id, Utc::now(), &sends)
            .await?;
        self.sessions
            .mark_stage_complete(&campaign.session_id, Stage::Outreach)
            .await?;
        warn!("demo outreach: no emails were delivered");
        info!(queued = report.queued, skipped = report.skipped, "campaign launched");
        Ok(report)
    }

    /// Move a send along the funnel. Events never move a send backwards,
    /// and skipped sends cannot be engaged with.
    pub async fn record_event(&self, send_id: &str, status: SendStatus) -> Result<CampaignSend> {
        if matches!(status, SendStatus::Skipped | SendStatus::Queued) {
            return Err(TradeScoutError::validation(format!(
                "'{status}' is not an engagement event"
            )));
        }
        let storage = self.sessions.storage();
        let mut send = storage
            .get_campaign_send(send_id)
            .await?
            .ok_or_else(|| TradeScoutError::validation(format!("send {send_id} not found")))?;
        if send.status == SendStatus::Skipped {
            return Err(TradeScoutError::validation(format!(
                "send to '{}' was skipped",
                send.recipient
            )));
        }
        if status > send.status {
            storage.update_send_status(send_id, status).await?;
            send.status = status;
            send.updated_at = Utc::now();
        }
        Ok(send)
    }

    pub async fn sends(&self, campaign_id: &str) -> Result<Vec<CampaignSend>> {
        self.sessions.storage().list_campaign_sends(campaign_id).await
    }

    pub async fn analytics(&self, campaign_id: &str) -> Result<CampaignAnalytics> {
        self.campaign(campaign_id).await?;
        let sends = self.sends(campaign_id).await?;
        let at_least = |s: SendStatus| sends.iter().filter(|x| x.status >= s).count();

        let sent = at_least(SendStatus::Queued);
        let opened = at_least(SendStatus::Opened);
        let clicked = at_least(SendStatus::Clicked);
        let responded = at_least(SendStatus::Responded);
        Ok(CampaignAnalytics {
            total_rows: sends.len(),
            sent,
            skipped: sends.len() - sent,
            opened,
            clicked,
            responded,
            open_rate: rate(opened, sent),
            click_rate: rate(clicked, sent),
            response_rate: rate(responded, sent),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ENHANCED_DATA;
    use crate::session::tests::{local_policy, test_manager};

    fn contacts() -> Dataset {
        Dataset::from_columns(vec![
            (
                "Company",
                vec![
                    Value::text("Acme"),
                    Value::text("Beta"),
                    Value::text("Gamma"),
                    Value::text("Delta"),
                ],
            ),
            (
                "Contact Email",
                vec![
                    Value::text("info@acme.in"),
                    Value::text("not-an-email"),
                    Value::text("INFO@acme.in"),
                    Value::text("sales@delta.com"),
                ],
            ),
            (
                "City",
                vec![
                    Value::text("Mumbai"),
                    Value::Null,
                    Value::text("Pune"),
                    Value::text("Delhi"),
                ],
            ),
        ])
    }

    fn draft() -> CampaignDraft {
        CampaignDraft {
            name: "Spring".into(),
            subject: "Hello [Company Name]".into(),
            template: "Dear [Company Name] in {{City}},\n{{ Missing }}\n[Your Name]".into(),
            email_column: "Contact Email".into(),
        }
    }

    #[test]
    fn finds_email_like_columns() {
        let ds = contacts();
        assert_eq!(email_columns(&ds), vec!["Contact Email"]);
    }

    #[test]
    fn renders_placeholders() {
        let ds = contacts();
        let body = render_template(&draft().template, ds.columns(), ds.row(0).unwrap(), "Priya");
        assert_eq!(body, "Dear Acme in Mumbai,\n{{ Missing }}\nPriya");
        let body = render_template("{{City}}", ds.columns(), ds.row(1).unwrap(), "Priya");
        assert_eq!(body, "");
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email(" a@b.co "));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn draft_validation() {
        let ds = contacts();
        assert!(draft().validate(&ds).is_ok());
        let mut missing = draft();
        missing.subject = "  ".into();
        assert!(missing.validate(&ds).is_err());
        let mut column = draft();
        column.email_column = "Email".into();
        assert!(column.validate(&ds).is_err());
    }

    #[test]
    fn preview_counts_unique_valid_recipients() {
        let preview = preview(&draft(), &contacts(), "Priya").unwrap();
        assert_eq!(preview.total_rows, 4);
        assert_eq!(preview.recipients, 2);
        let first = preview.first_message.unwrap();
        assert_eq!(first.to, "info@acme.in");
        assert_eq!(first.subject, "Hello Acme");
    }

    #[tokio::test]
    async fn launch_track_and_analytics() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.upload(&session.id, "c.csv", &contacts().to_csv_bytes().unwrap())
            .await
            .unwrap();
        let outreach = OutreachManager::new(&mgr, "Priya");

        let campaign = outreach.create_campaign(&session.id, &draft()).await.unwrap();
        let empty = outreach.analytics(&campaign.id).await.unwrap();
        assert_eq!(empty.sent, 0);
        assert_eq!(empty.open_rate, 0.0);

        let test = outreach.test_send(&campaign.id, "me@test.com").await.unwrap();
        assert_eq!(test.to, "me@test.com");
        assert!(outreach.test_send(&campaign.id, "nope").await.is_err());
        assert!(outreach.sends(&campaign.id).await.unwrap().is_empty());

        let report = outreach.launch(&campaign.id).await.unwrap();
        assert_eq!(
            report,
            LaunchReport {
                queued: 2,
                skipped: 2,
                duplicates: 1
            }
        );
        assert!(outreach.launch(&campaign.id).await.is_err());
        assert!(mgr.is_stage_complete(&session.id, Stage::Outreach).await.unwrap());

        let sends = outreach.sends(&campaign.id).await.unwrap();
        assert_eq!(sends.len(), 4);
        assert!(sends[0].rendered_body.starts_with("Dear Acme"));
        assert_eq!(sends[1].status, SendStatus::Skipped);

        outreach.record_event(&sends[0].id, SendStatus::Clicked).await.unwrap();
        let same = outreach.record_event(&sends[0].id, SendStatus::Opened).await.unwrap();
        assert_eq!(same.status, SendStatus::Clicked);
        assert!(outreach.record_event(&sends[1].id, SendStatus::Opened).await.is_err());
        assert!(outreach.record_event(&sends[0].id, SendStatus::Queued).await.is_err());

        let stats = outreach.analytics(&campaign.id).await.unwrap();
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.open_rate, 50.0);
        assert_eq!(stats.click_rate, 50.0);
        assert_eq!(stats.response_rate, 0.0);
    }

    #[tokio::test]
    async fn relaunch_after_partial_write_does_not_duplicate() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.upload(&session.id, "c.csv", &contacts().to_csv_bytes().unwrap())
            .await
            .unwrap();
        let outreach = OutreachManager::new(&mgr, "Priya");
        let campaign = outreach.create_campaign(&session.id, &draft()).await.unwrap();

        // a send left behind by a launch that failed before completing
        mgr.storage()
            .insert_campaign_send(&CampaignSend {
                id: Uuid::now_v7().to_string(),
                campaign_id: campaign.id.clone(),
                row_index: 0,
                recipient: "info@acme.in".into(),
                status: SendStatus::Queued,
                rendered_body: "Dear Acme".into(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        outreach.launch(&campaign.id).await.unwrap();
        let sends = outreach.sends(&campaign.id).await.unwrap();
        assert_eq!(sends.len(), 4);
        assert_eq!(outreach.analytics(&campaign.id).await.unwrap().sent, 2);
    }

    #[tokio::test]
    async fn enhanced_data_exposes_research_email() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.load_sample(&session.id, crate::SampleKind::Timber).await.unwrap();
        let mut enhanced = mgr.main_dataset(&session.id).await.unwrap().unwrap();
        enhanced.add_column(crate::research::EMAIL_COLUMN, Value::text(""));
        mgr.store_dataset(&session.id, ENHANCED_DATA, &enhanced).await.unwrap();

        let data = mgr.working_dataset(&session.id).await.unwrap().unwrap();
        assert_eq!(email_columns(&data), vec!["Research_Email"]);
    }
}
