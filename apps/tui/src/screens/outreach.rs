//! "Outreach" screen: detected email columns, campaigns, and the selected
//! campaign's template and engagement.

use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use super::{NO_DATA, select};
use crate::snapshot::Snapshot;
use crate::widgets::{empty_state, string_table};

const HEADER: [&str; 6] = ["Campaign", "Status", "Sent", "Opened", "Clicked", "Responded"];

#[derive(Default)]
pub(crate) struct OutreachScreen {
    selected: usize,
}

impl OutreachScreen {
    pub(crate) fn handle_key(&mut self, code: KeyCode, snap: &Snapshot) {
        select(&mut self.selected, snap.campaigns.len(), code);
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, snap: &Snapshot) {
        if snap.working.is_none() {
            f.render_widget(empty_state("Outreach", NO_DATA), area);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Percentage(40),
                Constraint::Min(5),
            ])
            .split(area);

        let emails = snap.email_columns();
        let email_line = if emails.is_empty() {
            "No email column detected. Run research to fill Research_Email.".to_string()
        } else {
            format!("Email columns: {}", emails.join(", "))
        };
        f.render_widget(
            Paragraph::new(email_line).block(Block::default().borders(Borders::ALL).title(" Recipients ")),
            chunks[0],
        );

        if snap.campaigns.is_empty() {
            f.render_widget(
                empty_state(
                    "Campaigns",
                    "No campaigns yet.\n\nCreate one with `tradescout outreach create`.",
                ),
                chunks[1],
            );
            return;
        }

        let rows: Vec<Vec<String>> = snap
            .campaigns
            .iter()
            .enumerate()
            .map(|(i, (c, a))| {
                let marker = if i == self.selected { "> " } else { "  " };
                let status = match c.launched_at {
                    Some(at) => format!("launched {}", at.format("%Y-%m-%d")),
                    None => "draft".to_string(),
                };
                vec![
                    format!("{marker}{}", c.name),
                    status,
                    a.sent.to_string(),
                    format!("{} ({:.0}%)", a.opened, a.open_rate),
                    format!("{} ({:.0}%)", a.clicked, a.click_rate),
                    format!("{} ({:.0}%)", a.responded, a.response_rate),
                ]
            })
            .collect();
        f.render_widget(
            string_table(format!(" Campaigns ({}) ", rows.len()), &HEADER, &rows, 0),
            chunks[1],
        );

        let idx = self.selected.min(snap.campaigns.len() - 1);
        let (campaign, analytics) = &snap.campaigns[idx];
        let detail = vec![
            Line::from(format!("To: {{{}}}", campaign.email_column)),
            Line::from(format!("Subject: {}", campaign.subject)),
            Line::from(format!(
                "{} rows, {} sent, {} skipped",
                analytics.total_rows, analytics.sent, analytics.skipped
            )),
            Line::from(""),
        ]
        .into_iter()
        .chain(campaign.template.lines().map(|l| Line::from(l.to_string())))
        .collect::<Vec<_>>();
        f.render_widget(
            Paragraph::new(detail)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title(format!(" {} ", campaign.name))),
            chunks[2],
        );
    }
}
