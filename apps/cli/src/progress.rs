//! Terminal progress for batch research.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tradescout_research::BatchProgress;
use tradescout_shared::{ResearchResult, ResearchStatus};

/// Spinner that prints one line per finished company.
pub(crate) struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl BatchProgress for CliProgress {
    fn started(&self, company: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Researching [{current}/{total}] {company}"));
    }

    fn finished(&self, company: &str, result: &ResearchResult) {
        let line = match result.status {
            ResearchStatus::Found => {
                let email = result
                    .primary_contact()
                    .and_then(|c| c.email.as_deref())
                    .unwrap_or("No email");
                format!("  found    {company} | {email}")
            }
            ResearchStatus::Error => format!("  error    {company} | {}", result.description),
            _ => format!("  limited  {company}"),
        };
        self.spinner.println(line);
    }
}
