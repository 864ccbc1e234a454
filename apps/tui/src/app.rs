//! Core TUI application state and event loop.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use tokio::runtime::Runtime;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tradescout_shared::{Stage, config_dir};

use crate::screens::{Screen, ScreenId};
use crate::snapshot::Snapshot;
use crate::widgets::status_bar;

/// Log file inside the config directory. The terminal belongs to the UI.
const LOG_FILE: &str = "tui.log";

/// Application state.
pub(crate) struct App {
    /// Currently active screen tab.
    pub active_tab: usize,
    /// Available screens.
    pub screens: Vec<ScreenId>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    /// Whether help overlay is visible.
    pub show_help: bool,
    /// Per-screen state.
    pub screen_states: Vec<Screen>,
    /// Last loaded view of the active session.
    pub snapshot: Snapshot,
    runtime: Runtime,
}

impl App {
    pub(crate) fn new() -> Result<Self> {
        let screens: Vec<ScreenId> = Stage::ALL.into_iter().map(ScreenId).collect();
        let screen_states = screens.iter().map(|s| Screen::new(*s)).collect();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let mut app = Self {
            active_tab: 0,
            screens,
            should_quit: false,
            status: String::new(),
            show_help: false,
            screen_states,
            snapshot: Snapshot::default(),
            runtime,
        };
        app.reload();
        Ok(app)
    }

    /// Re-read the database. Failures leave the previous snapshot in place.
    fn reload(&mut self) {
        match self.runtime.block_on(Snapshot::load()) {
            Ok(snap) => {
                self.status = match &snap.session {
                    Some(s) => format!("Session {} loaded. Press ? for help", s.id.short()),
                    None => "No active session. Press ? for help".to_string(),
                };
                self.snapshot = snap;
            }
            Err(e) => {
                warn!(error = %e, "snapshot reload failed");
                self.status = format!("Reload failed: {e}");
            }
        }
    }

    fn current_screen(&self) -> &Screen {
        &self.screen_states[self.active_tab]
    }

    fn switch_to(&mut self, idx: usize) {
        self.active_tab = idx;
        self.status = format!("{}", self.screens[idx]);
    }
}

/// Send tracing output to `~/.tradescout/tui.log`. Logging is skipped if
/// the file cannot be opened.
pub(crate) fn init_file_logging() {
    let Ok(dir) = config_dir() else { return };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
    else {
        return;
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tradescout=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run() -> Result<()> {
    let mut app = App::new()?;

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        // Poll for events with 100ms timeout for responsive UI
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                handle_key(app, key.code, key.modifiers);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    // Global keybindings (always active)
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('?') => {
            app.show_help = !app.show_help;
            return;
        }
        KeyCode::Esc if app.show_help => {
            app.show_help = false;
            return;
        }
        KeyCode::Char('r') => {
            app.reload();
            return;
        }
        // Tab navigation with number keys
        KeyCode::Char(c @ '1'..='5') => {
            let idx = (c as usize) - ('1' as usize);
            if idx < app.screens.len() {
                app.switch_to(idx);
            }
            return;
        }
        KeyCode::Tab => {
            app.switch_to((app.active_tab + 1) % app.screens.len());
            return;
        }
        KeyCode::BackTab => {
            let idx = if app.active_tab == 0 {
                app.screens.len() - 1
            } else {
                app.active_tab - 1
            };
            app.switch_to(idx);
            return;
        }
        _ => {}
    }

    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return;
    }

    // Delegate to current screen
    let App {
        screen_states,
        snapshot,
        active_tab,
        ..
    } = app;
    screen_states[*active_tab].handle_key(code, snapshot);
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Tab bar
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    // Tab bar
    let tab_titles: Vec<Line> = app
        .screens
        .iter()
        .map(|s| Line::from(format!("{s}")))
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" TradeScout "),
        )
        .select(app.active_tab)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" │ ");

    f.render_widget(tabs, chunks[0]);

    // Content area, delegated to the screen
    app.current_screen().draw(f, chunks[1], &app.snapshot);

    // Status bar
    let bar = status_bar(&app.status);
    f.render_widget(bar, chunks[2]);

    // Help overlay
    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  1-5          Switch to screen"),
        Line::from("  Tab/S-Tab    Next/previous screen"),
        Line::from("  ?            Toggle this help"),
        Line::from("  r            Reload from the database"),
        Line::from("  q / Ctrl-C   Quit"),
        Line::from(""),
        Line::from("Screen-specific:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  ↑/↓ j/k      Scroll or pick a column/campaign"),
        Line::from("  PgUp/PgDn    Scroll faster"),
        Line::from("  ←/→          Visualizations: numeric or text columns"),
        Line::from(""),
        Line::from("Changes are made with the `tradescout` CLI."),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help: press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
