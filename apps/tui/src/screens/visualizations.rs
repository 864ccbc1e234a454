//! "Visualizations" screen: text histogram of a numeric column and the top
//! values of a text column. Up/Down pick the column, Left/Right switch kind.

use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use tradescout_core::visualize::{self, DEFAULT_BINS, DEFAULT_TOP_VALUES};

use super::{NO_DATA, select};
use crate::snapshot::Snapshot;
use crate::widgets::empty_state;

#[derive(Default)]
pub(crate) struct VisualizationsScreen {
    selected: usize,
    text_mode: bool,
}

impl VisualizationsScreen {
    fn columns<'a>(&self, snap: &'a Snapshot) -> Vec<&'a str> {
        match &snap.working {
            Some(data) if self.text_mode => data.text_columns(),
            Some(data) => data.numeric_columns(),
            None => Vec::new(),
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, snap: &Snapshot) {
        match code {
            KeyCode::Left | KeyCode::Right | KeyCode::Char('h') | KeyCode::Char('l') => {
                self.text_mode = !self.text_mode;
                self.selected = 0;
            }
            _ => {
                let len = self.columns(snap).len();
                select(&mut self.selected, len, code);
            }
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, snap: &Snapshot) {
        let Some(data) = &snap.working else {
            f.render_widget(empty_state("Visualizations", NO_DATA), area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .margin(1)
            .constraints([Constraint::Length(28), Constraint::Min(30)])
            .split(area);

        let ov = visualize::overview(data);
        let columns = self.columns(snap);
        let mut lines = vec![
            Line::from(format!("{} rows x {} columns", ov.rows, ov.columns)),
            Line::from(format!("{} numeric, {} text", ov.numeric_columns, ov.text_columns)),
            Line::from(""),
        ];
        for (i, name) in columns.iter().enumerate() {
            let style = if i == self.selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::styled(format!(" {name}"), style));
        }
        let kind = if self.text_mode { "Text" } else { "Numeric" };
        f.render_widget(
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title(format!(" {kind} columns "))),
            chunks[0],
        );

        let Some(column) = columns.get(self.selected.min(columns.len().saturating_sub(1))) else {
            f.render_widget(empty_state("Chart", "No columns of this kind."), chunks[1]);
            return;
        };
        let chart = if self.text_mode {
            visualize::top_values(data, column, DEFAULT_TOP_VALUES)
        } else {
            visualize::histogram(data, column, DEFAULT_BINS)
        };
        let (title, body) = match chart {
            Ok(spec) => (spec.title().to_string(), spec.render_text()),
            Err(e) => ("Chart".to_string(), e.to_string()),
        };
        f.render_widget(
            Paragraph::new(body).block(Block::default().borders(Borders::ALL).title(format!(" {title} "))),
            chunks[1],
        );
    }
}
