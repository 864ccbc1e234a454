//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing::info;

use tradescout_core::chat::ChatService;
use tradescout_core::outreach::{self, CampaignDraft, OutreachManager};
use tradescout_core::research::{
    self, ResearchOptions, ResearchWorkflow, enhanced_export_filename, format_results,
    results_export_filename, results_summary, results_table,
};
use tradescout_core::visualize::{self, ChartSpec, DEFAULT_BINS, DEFAULT_TOP_VALUES};
use tradescout_core::{ENHANCED_DATA, SampleKind, SessionManager};
use tradescout_dataset::Dataset;
use tradescout_research::ResearchClient;
use tradescout_shared::{
    AppConfig, DeploymentInfo, SendStatus, SessionId, SessionMeta, Stage, init_config,
    load_config,
};

use crate::progress::CliProgress;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// TradeScout: analyse trade data and research the businesses in it.
#[derive(Parser)]
#[command(
    name = "tradescout",
    version,
    about = "Analyse business data, research company contacts, and plan outreach.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Session to operate on (defaults to the active session).
    #[arg(long, global = true, env = "TRADESCOUT_SESSION")]
    pub session: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum SampleArg {
    Business,
    Timber,
}

impl From<SampleArg> for SampleKind {
    fn from(arg: SampleArg) -> Self {
        match arg {
            SampleArg::Business => SampleKind::Business,
            SampleArg::Timber => SampleKind::Timber,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum EventArg {
    Opened,
    Clicked,
    Responded,
}

impl From<EventArg> for SendStatus {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Opened => SendStatus::Opened,
            EventArg::Clicked => SendStatus::Clicked,
            EventArg::Responded => SendStatus::Responded,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage sessions.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Upload a CSV file as the session's data.
    Upload {
        /// Path to the file.
        file: PathBuf,
    },

    /// Load a built-in sample dataset.
    Sample {
        #[arg(value_enum, default_value = "business")]
        kind: SampleArg,
    },

    /// Inspect and export the session's data.
    Data {
        #[command(subcommand)]
        action: DataAction,
    },

    /// Ask questions about the data.
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },

    /// Quick charts.
    Viz {
        /// Print the chart as JSON instead of text.
        #[arg(long, global = true)]
        json: bool,

        #[command(subcommand)]
        action: VizAction,
    },

    /// Research company contacts.
    Research {
        #[command(subcommand)]
        action: ResearchAction,
    },

    /// Plan and track email campaigns.
    Outreach {
        #[command(subcommand)]
        action: OutreachAction,
    },

    /// Print deployment health as JSON.
    Health,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum SessionAction {
    /// Create a session and make it active.
    New,
    /// List stored sessions.
    List,
    /// Make a session active.
    Use { id: String },
    /// Show session statistics.
    Stats,
    /// Remove expired sessions.
    Cleanup,
    /// Remove every session and empty the research cache.
    Purge,
    /// Remove one session (defaults to the active one).
    Drop { id: Option<String> },
}

#[derive(Subcommand)]
pub(crate) enum DataAction {
    /// Shape, size, nulls, and validation issues.
    Info,
    /// First rows of the data.
    Preview {
        #[arg(short = 'n', long, default_value = "10")]
        rows: usize,
    },
    /// Column names, kinds, and sample values.
    Columns,
    /// Distinct values of a column.
    Unique {
        column: String,
        #[arg(long, default_value = "50")]
        max: usize,
    },
    /// Write the data to a CSV file.
    Export {
        out: PathBuf,
        /// Export the research-enhanced data.
        #[arg(long)]
        enhanced: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum ChatAction {
    /// Ask a question.
    Ask { question: Vec<String> },
    /// Show the conversation so far.
    History,
}

#[derive(Subcommand)]
pub(crate) enum VizAction {
    /// Row and column counts.
    Overview,
    /// Histogram of a numeric column.
    Hist {
        column: String,
        #[arg(long, default_value_t = DEFAULT_BINS)]
        bins: usize,
    },
    /// Scatter of two numeric columns.
    Scatter { x: String, y: String },
    /// Most frequent values of a column.
    Top {
        column: String,
        #[arg(long, default_value_t = DEFAULT_TOP_VALUES)]
        top: usize,
    },
}

#[derive(Subcommand)]
pub(crate) enum ResearchAction {
    /// Check the search API connection.
    Test,
    /// Companies researched and pending.
    Status,
    /// Research the next batch of pending companies.
    Run {
        /// Companies per batch (1-10).
        #[arg(long)]
        batch_size: Option<u32>,
        /// Ignore cached results.
        #[arg(long)]
        no_cache: bool,
    },
    /// Show research results.
    Results,
    /// Export results (and the enhanced data) as CSV.
    Export {
        /// Output directory.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Forget this session's results.
    Clear {
        /// Also empty the research cache shared by all sessions.
        #[arg(long)]
        cache: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum OutreachAction {
    /// Columns usable as email addresses.
    Columns,
    /// Render the first message of a draft.
    Preview(DraftArgs),
    /// Save a campaign.
    Create(DraftArgs),
    /// Render a campaign's first message for a test address.
    Test { campaign: String, to: String },
    /// Record sends for every row (no mail is delivered).
    Launch { campaign: String },
    /// Record an engagement event for one send.
    Track {
        send: String,
        #[arg(value_enum)]
        event: EventArg,
    },
    /// Campaign funnel statistics.
    Stats { campaign: String },
    /// Recorded sends of a campaign, with their ids.
    Sends { campaign: String },
    /// List campaigns in the session.
    List,
}

#[derive(clap::Args)]
pub(crate) struct DraftArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    subject: String,
    /// Template text; see --template-file.
    #[arg(long, conflicts_with = "template_file")]
    template: Option<String>,
    #[arg(long)]
    template_file: Option<PathBuf>,
    /// Column holding addresses (defaults to the first email-like column).
    #[arg(long)]
    email_column: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "tradescout=warn",
        1 => "tradescout=info",
        2 => "tradescout=debug",
        _ => "tradescout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Loaded config, session manager, and the session the command acts on.
struct Context {
    config: AppConfig,
    sessions: SessionManager,
    session: SessionMeta,
}

impl Context {
    async fn open(session: Option<&str>) -> Result<Self> {
        let config = load_config()?;
        let sessions = SessionManager::open(&config).await?;
        let explicit = session.map(parse_session_id).transpose()?;
        let session = sessions.resolve(explicit.as_ref()).await?;
        Ok(Self {
            config,
            sessions,
            session,
        })
    }

    fn id(&self) -> &SessionId {
        &self.session.id
    }

    async fn enter(&self, stage: Stage) -> Result<()> {
        self.sessions.go_to_stage(self.id(), stage).await?;
        Ok(())
    }

    async fn data(&self) -> Result<Dataset> {
        Ok(self.sessions.require_data(self.id()).await?)
    }
}

fn parse_session_id(raw: &str) -> Result<SessionId> {
    raw.parse()
        .map_err(|e| eyre!("invalid session id '{raw}': {e}"))
}

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let session = cli.session.as_deref();
    match cli.command {
        Command::Session { action } => cmd_session(action, session).await,
        Command::Upload { file } => cmd_upload(&file, session).await,
        Command::Sample { kind } => cmd_sample(kind.into(), session).await,
        Command::Data { action } => cmd_data(action, session).await,
        Command::Chat { action } => cmd_chat(action, session).await,
        Command::Viz { json, action } => cmd_viz(action, json, session).await,
        Command::Research { action } => cmd_research(action, session).await,
        Command::Outreach { action } => cmd_outreach(action, session).await,
        Command::Health => cmd_health(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_table(columns: &[String], rows: &[Vec<String>]) {
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|s| s.chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
                .min(40)
        })
        .collect();
    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| {
                let clipped: String = c.chars().take(*w).collect();
                format!("{clipped:<w$}")
            })
            .collect::<Vec<_>>()
            .join("  ")
    };
    println!("{}", line(columns.to_vec()));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    );
    for row in rows {
        println!("{}", line(row.clone()));
    }
}

fn print_dataset(dataset: &Dataset) {
    let rows: Vec<Vec<String>> = dataset
        .rows()
        .iter()
        .map(|r| r.iter().map(|v| v.to_string()).collect())
        .collect();
    print_table(dataset.columns(), &rows);
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).wrap_err_with(|| format!("failed to write {}", path.display()))
}

fn print_session(meta: &SessionMeta, active: bool) {
    println!(
        "{} {}  {:<16} {:>3} datasets  {:>8.2} MB  last used {}",
        if active { "*" } else { " " },
        meta.id,
        meta.current_stage.title(),
        meta.dataset_count,
        meta.total_size_bytes as f64 / (1024.0 * 1024.0),
        meta.last_accessed.format("%Y-%m-%d %H:%M"),
    );
}

// ---------------------------------------------------------------------------
// Sessions and upload
// ---------------------------------------------------------------------------

async fn cmd_session(action: SessionAction, session: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let sessions = SessionManager::open(&config).await?;

    match action {
        SessionAction::New => {
            let meta = sessions.create_session(None).await?;
            sessions.set_active(&meta.id).await?;
            println!("Created session {} (now active)", meta.id);
        }
        SessionAction::List => {
            let active = sessions.active_session().await?.map(|m| m.id);
            let all = sessions.list().await?;
            if all.is_empty() {
                println!("No sessions. Run `tradescout session new` or upload a file.");
            }
            for meta in &all {
                print_session(meta, active.as_ref() == Some(&meta.id));
            }
        }
        SessionAction::Use { id } => {
            let id = parse_session_id(&id)?;
            sessions.set_active(&id).await?;
            println!("Active session: {id}");
        }
        SessionAction::Stats => {
            let stats = sessions.stats().await?;
            println!("Active sessions: {}/{}", stats.active_sessions, stats.max_sessions);
            println!("Stored data:     {:.2} MB", stats.total_memory_mb);
            if let (Some(oldest), Some(newest)) = (stats.oldest_session, stats.newest_session) {
                println!("Oldest:          {}", oldest.format("%Y-%m-%d %H:%M:%S"));
                println!("Newest:          {}", newest.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        SessionAction::Cleanup => {
            let removed = sessions.cleanup_expired().await?;
            println!("Removed {} expired session(s)", removed.len());
        }
        SessionAction::Purge => {
            let removed = sessions.force_cleanup_all().await?;
            println!("Removed {removed} session(s)");
        }
        SessionAction::Drop { id } => {
            let target = match id.as_deref().or(session) {
                Some(raw) => parse_session_id(raw)?,
                None => sessions
                    .active_session()
                    .await?
                    .map(|m| m.id)
                    .ok_or_else(|| eyre!("no active session"))?,
            };
            if sessions.cleanup_session(&target).await? {
                println!("Removed session {target}");
            } else {
                println!("Session {target} not found");
            }
        }
    }
    Ok(())
}

async fn cmd_upload(file: &Path, session: Option<&str>) -> Result<()> {
    let ctx = Context::open(session).await?;
    let bytes = std::fs::read(file).wrap_err_with(|| format!("failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    info!(file = %file.display(), bytes = bytes.len(), "uploading");
    let summary = ctx.sessions.upload(ctx.id(), &filename, &bytes).await?;
    println!(
        "Data loaded: {} ({} rows x {} columns)",
        summary.filename, summary.rows, summary.columns
    );
    for issue in &summary.issues {
        println!("  warning: {issue}");
    }
    println!("Next: `tradescout chat ask <question>` or `tradescout viz overview`");
    Ok(())
}

async fn cmd_sample(kind: SampleKind, session: Option<&str>) -> Result<()> {
    let ctx = Context::open(session).await?;
    let summary = ctx.sessions.load_sample(ctx.id(), kind).await?;
    println!(
        "Sample data loaded: {} ({} rows x {} columns)",
        summary.filename, summary.rows, summary.columns
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

async fn cmd_data(action: DataAction, session: Option<&str>) -> Result<()> {
    let ctx = Context::open(session).await?;
    ctx.enter(Stage::Upload).await?;

    match action {
        DataAction::Info => {
            let data = ctx.data().await?;
            let info = data.info();
            println!(
                "File:       {}",
                ctx.session.uploaded_filename.as_deref().unwrap_or("-")
            );
            println!("Rows:       {}", info.rows);
            println!("Columns:    {}", info.columns);
            println!("Size:       {:.2} MB", info.size_mb);
            println!("Duplicates: {}", info.duplicate_rows);
            let nulls: Vec<String> = info
                .null_counts
                .iter()
                .filter(|(_, n)| *n > 0)
                .map(|(c, n)| format!("{c} ({n})"))
                .collect();
            if !nulls.is_empty() {
                println!("Missing:    {}", nulls.join(", "));
            }
            let report = data.validate();
            if report.is_valid() {
                println!("Validation: ok");
            }
            for issue in report.issues {
                println!("Validation: {issue}");
            }
        }
        DataAction::Preview { rows } => print_dataset(&ctx.data().await?.head(rows)),
        DataAction::Columns => {
            let data = ctx.data().await?;
            let rows: Vec<Vec<String>> = data
                .column_info()
                .into_iter()
                .map(|c| {
                    vec![
                        c.name,
                        c.kind.to_string(),
                        c.non_null.to_string(),
                        c.unique_count.to_string(),
                        c.samples.join(", "),
                    ]
                })
                .collect();
            let header = ["Column", "Kind", "Non-null", "Unique", "Samples"].map(String::from);
            print_table(&header, &rows);
        }
        DataAction::Unique { column, max } => {
            for value in ctx.data().await?.unique_values(&column, max)? {
                println!("{value}");
            }
        }
        DataAction::Export { out, enhanced } => {
            let data = if enhanced {
                ctx.sessions
                    .load_dataset(ctx.id(), ENHANCED_DATA)
                    .await?
                    .ok_or_else(|| eyre!("no enhanced data yet; run `tradescout research run`"))?
            } else {
                ctx.data().await?
            };
            let name = out.to_string_lossy();
            write_file(&out, &SessionManager::export(&data, &name)?)?;
            println!("Exported {} rows to {}", data.row_count(), out.display());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

async fn cmd_chat(action: ChatAction, session: Option<&str>) -> Result<()> {
    let ctx = Context::open(session).await?;
    ctx.enter(Stage::AiChat).await?;
    let client = ResearchClient::from_config(&ctx.config)?;
    let chat = ChatService::new(&ctx.sessions, client.groq().cloned());

    match action {
        ChatAction::Ask { question } => {
            let answer = chat.ask(ctx.id(), &question.join(" ")).await?;
            println!("{answer}");
        }
        ChatAction::History => {
            let history = chat.history(ctx.id()).await?;
            if history.is_empty() {
                println!("No messages yet.");
            }
            for msg in history {
                println!("[{}] {}:", msg.created_at.format("%H:%M"), msg.role.as_str());
                println!("{}\n", msg.content);
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Visualizations
// ---------------------------------------------------------------------------

async fn cmd_viz(action: VizAction, json: bool, session: Option<&str>) -> Result<()> {
    let ctx = Context::open(session).await?;
    ctx.enter(Stage::Visualizations).await?;
    let data = ctx.data().await?;

    let chart: ChartSpec = match action {
        VizAction::Overview => {
            let overview = visualize::overview(&data);
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                println!("Total rows:      {}", overview.rows);
                println!("Total columns:   {}", overview.columns);
                println!("Numeric columns: {}", overview.numeric_columns);
                println!("Text columns:    {}", overview.text_columns);
            }
            return Ok(());
        }
        VizAction::Hist { column, bins } => visualize::histogram(&data, &column, bins)?,
        VizAction::Scatter { x, y } => visualize::scatter(&data, &x, &y)?,
        VizAction::Top { column, top } => visualize::top_values(&data, &column, top)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&chart)?);
    } else {
        print!("{}", chart.render_text());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

async fn cmd_research(action: ResearchAction, session: Option<&str>) -> Result<()> {
    let ctx = Context::open(session).await?;
    ctx.enter(Stage::Research).await?;
    let client = ResearchClient::from_config(&ctx.config)?;
    let workflow = ResearchWorkflow::new(&ctx.sessions, &client);

    match action {
        ResearchAction::Test => {
            let (ok, message) = client.test_connection().await;
            ctx.sessions.set_api_tested(ctx.id(), ok).await?;
            println!("{} {message}", if ok { "ok:" } else { "failed:" });
            if !ok {
                println!("Research will run in {} mode.", client.mode());
            }
        }
        ResearchAction::Status => {
            let ov = workflow.overview(ctx.id()).await?;
            println!("Mode:             {}", client.mode());
            println!(
                "Company column:   {}",
                ov.company_column.as_deref().unwrap_or("(none found)")
            );
            println!("Total records:    {}", ov.total_records);
            println!("Unique companies: {}", ov.unique_companies);
            println!("Researched:       {}", ov.researched);
            println!("Pending:          {}", ov.pending);

            let data = ctx.data().await?;
            let done = workflow.results(ctx.id()).await?;
            let pending = research::pending_companies(&data, &done);
            for company in pending.iter().take(3) {
                println!("  - {company}");
            }
            if pending.len() > 3 {
                println!("  ... and {} more", pending.len() - 3);
            }
        }
        ResearchAction::Run {
            batch_size,
            no_cache,
        } => {
            let mut research_config = ctx.config.research.clone();
            if let Some(size) = batch_size {
                research_config.batch_size = size;
            }
            let mut options = ResearchOptions::from_config(&research_config);
            options.use_cache &= !no_cache;

            println!(
                "Researching up to {} companies ({} mode, {:.1}s delay)",
                options.batch_size,
                client.mode(),
                options.delay.as_secs_f64()
            );
            let progress = CliProgress::new();
            let run = workflow.run_research(ctx.id(), &options, &progress).await;
            progress.finish();
            let run = run?;

            if run.results.is_empty() {
                println!("All companies have been researched.");
            } else {
                println!(
                    "Research completed! {}/{} successful ({} from cache, {} pending)",
                    run.successful,
                    run.results.len(),
                    run.from_cache,
                    run.remaining
                );
            }
        }
        ResearchAction::Results => {
            let results = workflow.results(ctx.id()).await?;
            let summary = results_summary(&results);
            println!(
                "Total researched: {}  Successful: {}  Success rate: {:.1}%\n",
                summary.total, summary.successful, summary.success_rate
            );
            print_dataset(&results_table(&format_results(&results)));
        }
        ResearchAction::Export { dir } => {
            let results = workflow.results(ctx.id()).await?;
            if results.is_empty() {
                return Err(eyre!("no research results to export"));
            }
            let now = chrono::Local::now().naive_local();
            let table = results_table(&format_results(&results));
            let results_path = dir.join(results_export_filename(now));
            write_file(&results_path, &table.to_csv_bytes()?)?;
            println!("Wrote {}", results_path.display());

            if let Some(enhanced) = ctx.sessions.load_dataset(ctx.id(), ENHANCED_DATA).await? {
                let enhanced_path = dir.join(enhanced_export_filename(now));
                write_file(&enhanced_path, &enhanced.to_csv_bytes()?)?;
                println!("Wrote {}", enhanced_path.display());
            }
        }
        ResearchAction::Clear { cache } => {
            let removed = workflow.clear(ctx.id()).await?;
            println!("Cleared {removed} result(s)");
            if cache {
                let cached = workflow.clear_cache().await?;
                println!("Cleared {cached} cached lookup(s)");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Outreach
// ---------------------------------------------------------------------------

async fn draft_from_args(args: DraftArgs, data: &Dataset) -> Result<CampaignDraft> {
    let template = match (args.template, args.template_file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .wrap_err_with(|| format!("failed to read {}", path.display()))?,
        (None, None) => return Err(eyre!("provide --template or --template-file")),
    };
    let email_column = match args.email_column {
        Some(column) => column,
        None => outreach::email_columns(data)
            .first()
            .map(|c| c.to_string())
            .ok_or_else(|| {
                eyre!("No email columns found in the data. Please ensure your data includes email addresses.")
            })?,
    };
    Ok(CampaignDraft {
        name: args.name,
        subject: args.subject,
        template,
        email_column,
    })
}

async fn cmd_outreach(action: OutreachAction, session: Option<&str>) -> Result<()> {
    let ctx = Context::open(session).await?;
    ctx.enter(Stage::Outreach).await?;
    let manager = OutreachManager::new(&ctx.sessions, ctx.config.outreach.sender_name.clone());

    match action {
        OutreachAction::Columns => {
            ctx.data().await?;
            let data = ctx
                .sessions
                .working_dataset(ctx.id())
                .await?
                .unwrap_or_default();
            let columns = outreach::email_columns(&data);
            if columns.is_empty() {
                println!("No email columns found in the data.");
            }
            for column in columns {
                let idx = data.require_column(column)?;
                let count = data.column_values(idx).filter(|v| !v.is_null()).count();
                println!("{column}: {count} addresses");
            }
        }
        OutreachAction::Preview(args) => {
            let data = working(&ctx).await?;
            let draft = draft_from_args(args, &data).await?;
            let preview = manager.preview(ctx.id(), &draft).await?;
            println!(
                "Recipients: {} of {} rows",
                preview.recipients, preview.total_rows
            );
            match preview.first_message {
                Some(msg) => {
                    println!("To:      {}", msg.to);
                    println!("Subject: {}\n", msg.subject);
                    println!("{}", msg.body);
                }
                None => println!("No valid addresses in '{}'", draft.email_column),
            }
        }
        OutreachAction::Create(args) => {
            let data = working(&ctx).await?;
            let draft = draft_from_args(args, &data).await?;
            let campaign = manager.create_campaign(ctx.id(), &draft).await?;
            println!("Created campaign '{}' ({})", campaign.name, campaign.id);
        }
        OutreachAction::Test { campaign, to } => {
            let msg = manager.test_send(&campaign, &to).await?;
            println!("Test message (not sent)");
            println!("To:      {}", msg.to);
            println!("Subject: {}\n", msg.subject);
            println!("{}", msg.body);
        }
        OutreachAction::Launch { campaign } => {
            let report = manager.launch(&campaign).await?;
            println!(
                "Campaign launched: {} queued, {} skipped ({} duplicate addresses)",
                report.queued, report.skipped, report.duplicates
            );
            println!("Note: This is a demo version. No actual emails were sent.");
        }
        OutreachAction::Track { send, event } => {
            let updated = manager.record_event(&send, event.into()).await?;
            println!("{} is now {}", updated.recipient, updated.status);
        }
        OutreachAction::Stats { campaign } => {
            let stats = manager.analytics(&campaign).await?;
            println!("Emails sent:   {}", stats.sent);
            println!("Skipped:       {}", stats.skipped);
            println!("Open rate:     {:.1}%", stats.open_rate);
            println!("Click rate:    {:.1}%", stats.click_rate);
            println!("Response rate: {:.1}%", stats.response_rate);
        }
        OutreachAction::Sends { campaign } => {
            let rows: Vec<Vec<String>> = manager
                .sends(&campaign)
                .await?
                .into_iter()
                .map(|s| vec![s.id, s.row_index.to_string(), s.recipient, s.status.to_string()])
                .collect();
            let header = ["Send", "Row", "Recipient", "Status"].map(String::from);
            print_table(&header, &rows);
        }
        OutreachAction::List => {
            let campaigns = manager.list_campaigns(ctx.id()).await?;
            if campaigns.is_empty() {
                println!("No campaigns yet.");
            }
            for c in campaigns {
                let state = match c.launched_at {
                    Some(at) => format!("launched {}", at.format("%Y-%m-%d %H:%M")),
                    None => "draft".to_string(),
                };
                println!("{}  {:<24} {}", c.id, c.name, state);
            }
        }
    }
    Ok(())
}

async fn working(ctx: &Context) -> Result<Dataset> {
    ctx.data().await?;
    ctx.sessions
        .working_dataset(ctx.id())
        .await?
        .ok_or_else(|| eyre!("No data loaded"))
}

// ---------------------------------------------------------------------------
// Health and config
// ---------------------------------------------------------------------------

fn cmd_health() -> Result<()> {
    let config = load_config()?;
    let info = DeploymentInfo::collect(&config);
    let health = serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Local::now().to_rfc3339(),
        "deployment": info,
    });
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
