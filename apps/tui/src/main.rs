//! TradeScout TUI: a read-mostly dashboard over the active session.
//!
//! One tab per workflow stage, built with `ratatui` + `crossterm`. Data is
//! loaded from the same database the CLI writes to.

mod app;
mod screens;
mod snapshot;
mod widgets;

use color_eyre::eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    app::init_file_logging();
    app::run()
}
