//! TradeScout CLI: business data analysis and contact research.
//!
//! Upload trade data, ask questions about it, chart it, research the
//! companies it names, and plan outreach campaigns from the results.

mod commands;
mod progress;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
