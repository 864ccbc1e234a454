//! "AI Chat" screen: the session's conversation history.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use tradescout_shared::ChatRole;

use super::{NO_DATA, Scroll};
use crate::snapshot::Snapshot;
use crate::widgets::empty_state;

#[derive(Default)]
pub(crate) struct ChatScreen {
    pub scroll: Scroll,
}

impl ChatScreen {
    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, snap: &Snapshot) {
        if snap.main.is_none() {
            f.render_widget(empty_state("AI Chat", NO_DATA), area);
            return;
        }
        if snap.chat.is_empty() {
            f.render_widget(
                empty_state(
                    "AI Chat",
                    "No questions yet.\n\nAsk one with `tradescout chat ask \"...\"`.",
                ),
                area,
            );
            return;
        }

        let mut lines = Vec::new();
        for msg in &snap.chat {
            let (label, color) = match msg.role {
                ChatRole::User => ("You", Color::Cyan),
                ChatRole::Assistant => ("Assistant", Color::Green),
                ChatRole::System => ("System", Color::DarkGray),
            };
            lines.push(Line::from(Span::styled(
                format!("{label} · {}", msg.created_at.format("%H:%M")),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));
            lines.extend(msg.content.lines().map(|l| Line::from(l.to_string())));
            lines.push(Line::from(""));
        }

        let chat = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((self.scroll.offset.min(u16::MAX as usize) as u16, 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Conversation ({} messages) ", snap.chat.len())),
            );
        f.render_widget(chat, area);
    }
}
