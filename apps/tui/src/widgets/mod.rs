//! Reusable TUI widgets.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table};

/// Bottom status bar.
pub(crate) fn status_bar(msg: &str) -> Paragraph<'_> {
    Paragraph::new(format!(" {msg}")).style(Style::default().bg(Color::DarkGray).fg(Color::White))
}

/// Centered hint shown when a tab has nothing to display.
pub(crate) fn empty_state<'a>(title: &'a str, text: &'a str) -> Paragraph<'a> {
    Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(format!(" {title} ")))
}

/// Bordered table with a bold header and evenly split columns.
pub(crate) fn string_table<'a>(
    title: String,
    header: &[&'a str],
    rows: &[Vec<String>],
    skip: usize,
) -> Table<'a> {
    let widths = vec![Constraint::Ratio(1, header.len().max(1) as u32); header.len()];
    Table::new(
        rows.iter()
            .skip(skip)
            .map(|r| Row::new(r.iter().cloned().collect::<Vec<_>>())),
        widths,
    )
    .header(
        Row::new(header.to_vec()).style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title))
}
