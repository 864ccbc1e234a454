//! TUI screen definitions.
//!
//! Each screen corresponds to one workflow stage and renders the part of
//! the [`Snapshot`] that stage owns.

mod chat;
mod outreach;
mod research;
mod upload;
mod visualizations;

use std::fmt;

use crossterm::event::KeyCode;
use ratatui::prelude::*;

use tradescout_shared::Stage;

use crate::snapshot::Snapshot;

/// Screen identifiers, one per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScreenId(pub Stage);

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.title())
    }
}

/// Per-screen state and behaviour.
pub(crate) struct Screen {
    pub id: ScreenId,
    upload: upload::UploadScreen,
    chat: chat::ChatScreen,
    viz: visualizations::VisualizationsScreen,
    research: research::ResearchScreen,
    outreach: outreach::OutreachScreen,
}

impl Screen {
    pub(crate) fn new(id: ScreenId) -> Self {
        Self {
            id,
            upload: upload::UploadScreen::default(),
            chat: chat::ChatScreen::default(),
            viz: visualizations::VisualizationsScreen::default(),
            research: research::ResearchScreen::default(),
            outreach: outreach::OutreachScreen::default(),
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, snap: &Snapshot) {
        match self.id.0 {
            Stage::Upload => self.upload.draw(f, area, snap),
            Stage::AiChat => self.chat.draw(f, area, snap),
            Stage::Visualizations => self.viz.draw(f, area, snap),
            Stage::Research => self.research.draw(f, area, snap),
            Stage::Outreach => self.outreach.draw(f, area, snap),
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, snap: &Snapshot) {
        match self.id.0 {
            Stage::Upload => self.upload.scroll.handle_key(code),
            Stage::AiChat => self.chat.scroll.handle_key(code),
            Stage::Visualizations => self.viz.handle_key(code, snap),
            Stage::Research => self.research.scroll.handle_key(code),
            Stage::Outreach => self.outreach.handle_key(code, snap),
        }
    }
}

/// Vertical scroll offset driven by arrow and vim keys.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Scroll {
    pub offset: usize,
}

impl Scroll {
    pub(crate) fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up | KeyCode::Char('k') => self.offset = self.offset.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.offset += 1,
            KeyCode::PageUp => self.offset = self.offset.saturating_sub(10),
            KeyCode::PageDown => self.offset += 10,
            KeyCode::Home => self.offset = 0,
            _ => {}
        }
    }
}

/// Move a selection index within `len` items.
pub(crate) fn select(selected: &mut usize, len: usize, code: KeyCode) {
    match code {
        KeyCode::Up | KeyCode::Char('k') => *selected = selected.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') if *selected + 1 < len => *selected += 1,
        _ => {}
    }
}

/// Message shown when a tab needs data first.
pub(crate) const NO_DATA: &str =
    "No data loaded.\n\nRun `tradescout upload <file>` or `tradescout sample`, then press 'r'.";
