//! Question answering over the session's uploaded data.

use std::fmt::Write as _;

use tracing::{debug, info, instrument, warn};

use tradescout_dataset::{ColumnKind, Dataset, format_number};
use tradescout_research::{GroqClient, LlmMessage};
use tradescout_shared::{ChatMessage, ChatRole, Result, SessionId, TradeScoutError};

use crate::SessionManager;

/// Prior messages sent along with a new question.
const HISTORY_WINDOW: usize = 10;

/// Text columns summarised by value counts in the data context.
const CONTEXT_TEXT_COLUMNS: usize = 3;

/// Values listed per text column in the data context.
const CONTEXT_TOP_VALUES: usize = 5;

/// Rows included verbatim in the data context.
const CONTEXT_ROWS: usize = 5;

const CHAT_TEMPERATURE: f32 = 0.3;
const CHAT_MAX_TOKENS: u32 = 1024;

const SYSTEM_PROMPT: &str = "You are a business data analyst helping a trade team understand \
their dataset. Answer using only the data summary provided. Be concise, cite column names, \
and say so when the summary does not contain the answer.";

/// Plain-text summary of a dataset for the model's context window.
pub fn data_context(dataset: &Dataset, filename: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(name) = filename {
        let _ = writeln!(out, "File: {name}");
    }
    let _ = writeln!(
        out,
        "Shape: {} rows x {} columns",
        dataset.row_count(),
        dataset.column_count()
    );

    out.push_str("Columns:\n");
    for info in dataset.column_info() {
        let kind = match info.kind {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Text => "text",
        };
        let _ = writeln!(out, "- {} ({kind}, {} empty)", info.name, info.null_count);
    }

    let numeric = dataset.numeric_columns();
    if !numeric.is_empty() {
        out.push_str("Numeric summary:\n");
        for column in numeric {
            if let Ok(Some(stats)) = dataset.numeric_stats(column) {
                let _ = writeln!(
                    out,
                    "- {column}: min {}, max {}, mean {:.2}",
                    format_number(stats.min),
                    format_number(stats.max),
                    stats.mean
                );
            }
        }
    }

    let text = dataset.text_columns();
    if !text.is_empty() {
        out.push_str("Top values:\n");
        for column in text.into_iter().take(CONTEXT_TEXT_COLUMNS) {
            let Ok(counts) = dataset.value_counts(column, CONTEXT_TOP_VALUES) else {
                continue;
            };
            let listed = counts
                .iter()
                .map(|(value, n)| format!("{value} ({n})"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "- {column}: {listed}");
        }
    }

    if !dataset.is_empty() {
        let _ = writeln!(out, "First {} rows:", CONTEXT_ROWS.min(dataset.row_count()));
        let _ = writeln!(out, "{}", dataset.columns().join(" | "));
        for row in dataset.head(CONTEXT_ROWS).rows() {
            let cells = row.iter().map(|v| v.to_string()).collect::<Vec<_>>();
            let _ = writeln!(out, "{}", cells.join(" | "));
        }
    }

    out
}

/// Canned answer used when no LLM is configured.
pub fn offline_answer(dataset: &Dataset, question: &str) -> String {
    let mut lines = vec![
        format!("Thank you for your question: '{question}'"),
        format!(
            "Based on your data with {} rows and {} columns, here are some insights:",
            dataset.row_count(),
            dataset.column_count()
        ),
        format!(
            "• Your data contains the following columns: {}",
            dataset.columns().join(", ")
        ),
    ];
    if !dataset.is_empty() {
        lines.push(format!("• The data has {} records", dataset.row_count()));
        let numeric = dataset.numeric_columns();
        if !numeric.is_empty() {
            lines.push(format!(
                "• Numeric columns for analysis: {}",
                numeric.join(", ")
            ));
        }
    }
    lines.push(String::new());
    lines.push(
        "Note: This is a simplified response. The full AI integration provides detailed \
         analysis and insights."
            .into(),
    );
    lines.join("\n")
}

/// Chat over session data, with Groq when available.
pub struct ChatService<'a> {
    sessions: &'a SessionManager,
    groq: Option<GroqClient>,
}

impl<'a> ChatService<'a> {
    pub fn new(sessions: &'a SessionManager, groq: Option<GroqClient>) -> Self {
        Self { sessions, groq }
    }

    pub fn is_live(&self) -> bool {
        self.groq.is_some()
    }

    pub async fn history(&self, session: &SessionId) -> Result<Vec<ChatMessage>> {
        self.sessions.storage().list_chat_messages(session).await
    }

    /// Answer a question about the session's data and record the exchange.
    #[instrument(skip(self, question), fields(session = %session, live = self.is_live()))]
    pub async fn ask(&self, session: &SessionId, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(TradeScoutError::validation("Question cannot be empty"));
        }
        let dataset = self.sessions.require_data(session).await?;
        let meta = self.sessions.get(session).await?;

        let answer = match &self.groq {
            Some(groq) => {
                let history = self.history(session).await?;
                let context = data_context(&dataset, meta.uploaded_filename.as_deref());
                let messages = build_messages(&context, &history, question);
                debug!(messages = messages.len(), "sending chat completion");
                groq.chat(&messages, CHAT_TEMPERATURE, CHAT_MAX_TOKENS)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "chat completion failed");
                        e
                    })?
            }
            None => offline_answer(&dataset, question),
        };

        let storage = self.sessions.storage();
        storage
            .append_chat_message(session, &ChatMessage::new(ChatRole::User, question))
            .await?;
        storage
            .append_chat_message(session, &ChatMessage::new(ChatRole::Assistant, answer.clone()))
            .await?;
        info!(chars = answer.len(), "answered question");
        Ok(answer)
    }
}

/// System prompt with data context, the recent history, then the question.
fn build_messages(context: &str, history: &[ChatMessage], question: &str) -> Vec<LlmMessage> {
    let mut messages = vec![LlmMessage::system(format!(
        "{SYSTEM_PROMPT}\n\nData summary:\n{context}"
    ))];
    let skip = history.len().saturating_sub(HISTORY_WINDOW);
    messages.extend(
        history
            .iter()
            .skip(skip)
            .filter(|m| m.role != ChatRole::System)
            .map(|m| LlmMessage {
                role: m.role,
                content: m.content.clone(),
            }),
    );
    messages.push(LlmMessage::user(question));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SampleKind;
    use crate::session::tests::{local_policy, test_manager};
    use tradescout_dataset::sample;
    use tradescout_research::RetryPolicy;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn context_covers_shape_stats_and_rows() {
        let ctx = data_context(&sample::business_sample(), Some("biz.csv"));
        assert!(ctx.contains("File: biz.csv"));
        assert!(ctx.contains("Shape: 5 rows x"));
        assert!(ctx.contains("- Revenue (numeric"));
        assert!(ctx.contains("Technology (2)"));
        assert!(ctx.contains("First 5 rows:"));
    }

    #[test]
    fn offline_answer_lists_columns() {
        let answer = offline_answer(&sample::business_sample(), "What sells?");
        assert!(answer.starts_with("Thank you for your question: 'What sells?'"));
        assert!(answer.contains("5 rows"));
        assert!(answer.contains("Company, Industry, Revenue"));
        assert!(answer.contains("Numeric columns for analysis: Revenue"));
    }

    #[test]
    fn history_is_windowed() {
        let history: Vec<ChatMessage> = (0..15)
            .map(|i| ChatMessage::new(ChatRole::User, format!("q{i}")))
            .collect();
        let messages = build_messages("ctx", &history, "latest");
        assert_eq!(messages.len(), 1 + HISTORY_WINDOW + 1);
        assert_eq!(messages[1].content, "q5");
        assert_eq!(messages.last().unwrap().content, "latest");
        assert!(messages[0].content.contains("ctx"));
    }

    #[tokio::test]
    async fn ask_requires_data_and_question() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        let chat = ChatService::new(&mgr, None);
        assert!(chat.ask(&session.id, "hi").await.is_err());

        mgr.load_sample(&session.id, SampleKind::Business).await.unwrap();
        assert!(chat.ask(&session.id, "   ").await.is_err());
    }

    #[tokio::test]
    async fn offline_ask_persists_exchange() {
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.load_sample(&session.id, SampleKind::Business).await.unwrap();
        let chat = ChatService::new(&mgr, None);

        let answer = chat.ask(&session.id, "Which industry?").await.unwrap();
        assert!(answer.contains("Which industry?"));
        let history = chat.history(&session.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn live_ask_uses_groq() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "Technology leads revenue."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let groq = GroqClient::new(&server.uri(), "key", "test-model", RetryPolicy::none()).unwrap();
        let mgr = test_manager(local_policy()).await;
        let session = mgr.resolve(None).await.unwrap();
        mgr.load_sample(&session.id, SampleKind::Business).await.unwrap();
        let chat = ChatService::new(&mgr, Some(groq));

        let answer = chat.ask(&session.id, "Top industry?").await.unwrap();
        assert_eq!(answer, "Technology leads revenue.");
    }
}
