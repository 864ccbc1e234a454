//! "Upload & Data" screen: session summary, column profile, and a preview.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use super::{NO_DATA, Scroll};
use crate::snapshot::Snapshot;
use crate::widgets::{empty_state, string_table};

/// Rows drawn in the preview table.
const PREVIEW_ROWS: usize = 200;

#[derive(Default)]
pub(crate) struct UploadScreen {
    pub scroll: Scroll,
}

impl UploadScreen {
    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, snap: &Snapshot) {
        let (Some(session), Some(data)) = (&snap.session, &snap.main) else {
            f.render_widget(empty_state("Upload & Data", NO_DATA), area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([Constraint::Length(7), Constraint::Min(5)])
            .split(area);

        let progress = |done: bool| if done { "done" } else { "pending" };
        let info = data.info();
        let summary = vec![
            Line::from(format!(
                "Session {}  |  {}",
                session.id.short(),
                session.uploaded_filename.as_deref().unwrap_or("-")
            )),
            Line::from(format!(
                "{} rows x {} columns  |  {:.2} MB  |  {} duplicate rows",
                info.rows, info.columns, info.size_mb, info.duplicate_rows
            )),
            Line::from(format!(
                "Numeric: {}  |  Text: {}",
                data.numeric_columns().join(", "),
                data.text_columns().join(", ")
            )),
            Line::from(format!(
                "Progress: upload {}, research {}, outreach {}",
                progress(session.stage_progress.upload),
                progress(session.stage_progress.map),
                progress(session.stage_progress.analyze)
            )),
        ];
        let mut lines = summary;
        if let Some(stats) = &snap.stats {
            lines.push(Line::from(format!(
                "Sessions: {}/{}  |  {:.2} MB stored",
                stats.active_sessions, stats.max_sessions, stats.total_memory_mb
            )));
        }
        f.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Dataset ")),
            chunks[0],
        );

        let header: Vec<&str> = data.columns().iter().map(String::as_str).collect();
        let rows: Vec<Vec<String>> = data
            .head(PREVIEW_ROWS)
            .rows()
            .iter()
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .collect();
        let skip = self.scroll.offset.min(rows.len().saturating_sub(1));
        f.render_widget(
            string_table(format!(" Preview ({} rows) ", data.row_count()), &header, &rows, skip),
            chunks[1],
        );
    }
}
