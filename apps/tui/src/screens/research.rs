//! "Research" screen: progress overview and the formatted results table.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use tradescout_core::research::{format_results, research_overview, results_summary};

use super::{NO_DATA, Scroll};
use crate::snapshot::Snapshot;
use crate::widgets::{empty_state, string_table};

const HEADER: [&str; 6] = ["Company", "Status", "Email", "Phone", "Website", "Confidence"];

#[derive(Default)]
pub(crate) struct ResearchScreen {
    pub scroll: Scroll,
}

impl ResearchScreen {
    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, snap: &Snapshot) {
        let Some(data) = &snap.main else {
            f.render_widget(empty_state("Research", NO_DATA), area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([Constraint::Length(5), Constraint::Min(5)])
            .split(area);

        let ov = research_overview(data, &snap.research);
        let summary = results_summary(&snap.research);
        let lines = vec![
            Line::from(format!(
                "Company column: {}",
                ov.company_column.as_deref().unwrap_or("(none detected)")
            )),
            Line::from(format!(
                "{} records, {} unique companies, {} researched, {} pending",
                ov.total_records, ov.unique_companies, ov.researched, ov.pending
            )),
            Line::from(format!(
                "Found contacts for {} of {} ({:.1}%)",
                summary.successful, summary.total, summary.success_rate
            )),
        ];
        f.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Overview ")),
            chunks[0],
        );

        if snap.research.is_empty() {
            f.render_widget(
                empty_state("Results", "No research yet.\n\nRun `tradescout research run`."),
                chunks[1],
            );
            return;
        }

        let rows: Vec<Vec<String>> = format_results(&snap.research)
            .into_iter()
            .map(|r| vec![r.company, r.status, r.email, r.phone, r.website, r.confidence])
            .collect();
        let skip = self.scroll.offset.min(rows.len().saturating_sub(1));
        f.render_widget(
            string_table(format!(" Results ({}) ", rows.len()), &HEADER, &rows, skip),
            chunks[1],
        );
    }
}
