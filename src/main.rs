//! Defcon Tracker - OSINT escalation indicator tracker
//!
//! A CLI tool that keeps a fixed matrix of escalation indicators, scores
//! it, syncs it through a shared state document and can ask a hosted model
//! to refresh the matrix, write a SITREP or read it aloud.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, config, model failure on demand, etc.)
//!   2 - Threat level is Critical and --fail-on-critical was set

mod agent;
mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod scheduler;
mod sync;

use agent::{AnalysisOutcome, GeminiClient, GeminiConfig};
use analysis::IndicatorAggregator;
use anyhow::{bail, Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use models::{AnalysisLog, Category, ThreatLevel};
use scheduler::{format_countdown, ScanTimer};
use std::path::Path;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use sync::{FileStore, PullOutcome, SnapshotStore, SyncSession};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Defcon Tracker v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args.set);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .defcon.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to customize the model, weights, thresholds and scan interval.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so `--output -` keeps stdout clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }
}

/// Everything a run needs after configuration is resolved.
struct Runtime {
    args: Args,
    config: Config,
    session: SyncSession,
    client: Option<GeminiClient>,
    log: AnalysisLog,
    /// Status lines go to stdout unless the report does.
    announce: bool,
}

impl Runtime {
    fn say(&self, message: impl AsRef<str>) {
        if self.announce {
            println!("{}", message.as_ref());
        }
    }
}

/// Run the tracker. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;
    let model = config.scoring_model()?;

    let aggregator = IndicatorAggregator::new(model);
    let mut session = if args.no_sync {
        SyncSession::offline(aggregator)
    } else {
        let store = FileStore::new(&config.general.state_path);
        debug!("State document: {}", store.path().display());
        SyncSession::new(aggregator, Some(Box::new(store) as Box<dyn SnapshotStore>))
    };

    if !session.is_enabled() {
        info!("State sync disabled for this run");
    }
    match session.pull() {
        Ok(outcome) => debug!(
            "Initial sync: {:?} (last seen {:?})",
            outcome,
            session.last_seen()
        ),
        Err(e) => warn!("State sync unavailable, continuing from baseline: {:#}", e),
    }

    let client = if args.needs_model() {
        let api_key = args.api_key.clone().unwrap_or_default();
        let gemini = GeminiConfig::from_model_config(&config.model, api_key, !args.quiet);
        Some(GeminiClient::new(gemini)?)
    } else {
        None
    };

    let announce = !args.quiet && config.general.output != "-";
    let log = AnalysisLog::new(config.schedule.log_capacity);

    let mut rt = Runtime {
        args,
        config,
        session,
        client,
        log,
        announce,
    };

    apply_edits(&mut rt)?;

    let mut analysis_report = None;
    if rt.args.analyze {
        rt.say("🛰️  Running OSINT sweep...");
        analysis_report = run_analysis(&mut rt).await;
    }

    sync_push(&mut rt);

    if rt.args.watch {
        return run_watch(rt).await;
    }

    let sitrep = if rt.args.sitrep {
        Some(produce_sitrep(&rt).await?)
    } else {
        None
    };

    let mut dashboard =
        report::build_dashboard(rt.session.aggregator(), &rt.config.model.name, &rt.log);
    dashboard.sitrep = sitrep;
    dashboard.analysis_report = analysis_report;

    write_report(&rt, &dashboard)?;
    rt.say(format!("\n📊 {}", report::generate_console_summary(&dashboard)));

    Ok(critical_exit(&rt).unwrap_or(0))
}

/// Exit code 2 when --fail-on-critical is set and the level is Critical.
fn critical_exit(rt: &Runtime) -> Option<i32> {
    let level = rt.session.aggregator().threat_level();
    if rt.args.fail_on_critical && level == ThreatLevel::Critical {
        eprintln!("\n⛔ Threat level is Critical. Failing (exit code 2).");
        return Some(2);
    }
    None
}

/// Apply --reset, --import and --set in that order.
fn apply_edits(rt: &mut Runtime) -> Result<()> {
    if rt.args.reset {
        info!("Resetting all indicators to baseline");
        rt.session.aggregator_mut().reset_to_baseline();
    }

    if let Some(ref path) = rt.args.import {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read import file: {}", path.display()))?;
        let doc: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse import file: {}", path.display()))?;

        // Accept either a bare matrix or a full state document.
        let matrix = doc.get("indicators").unwrap_or(&doc);
        let applied = rt.session.aggregator_mut().replace_from_json(matrix);
        info!("Imported {} indicator values from {}", applied, path.display());
    }

    for edit in &rt.args.set {
        let aggregator = rt.session.aggregator_mut();
        match aggregator.set_value(&edit.category, &edit.key, edit.value) {
            Ok(()) => {
                let value = aggregator.get_value(&edit.category, &edit.key)?;
                info!("Set {}.{} = {}", edit.category, edit.key, value);
            }
            Err(e) if e.is_not_found() => {
                bail!(
                    "Invalid --set {}.{}: {} (known: {})",
                    edit.category,
                    edit.key,
                    e,
                    known_keys(&edit.category)
                );
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Invalid --set {}.{}", edit.category, edit.key));
            }
        }
    }

    Ok(())
}

/// Keys accepted for a category, or the category names if it is unknown.
fn known_keys(category: &str) -> String {
    match category.parse::<Category>() {
        Ok(category) => category
            .indicators()
            .iter()
            .map(|indicator| indicator.key())
            .collect::<Vec<_>>()
            .join(", "),
        Err(_) => Category::ALL
            .iter()
            .map(|category| category.key())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Run one sweep and merge its result. Returns free text the model sent
/// instead of a matrix. Failures are logged and leave the snapshot as is.
async fn run_analysis(rt: &mut Runtime) -> Option<String> {
    let client = rt.client.as_ref()?;

    match agent::run_sweep(client, rt.session.aggregator().snapshot()).await {
        Ok(AnalysisOutcome::Indicators(patch)) => {
            let applied = rt.session.aggregator_mut().replace_snapshot(&patch);
            info!("Merged {} indicators from sweep", applied);
            rt.log.record("OSINT Matrix Updated");
            None
        }
        Ok(AnalysisOutcome::Report(text)) => {
            rt.log.record("Analysis returned a text report");
            Some(text)
        }
        Err(e) => {
            warn!("Sweep failed: {:#}", e);
            rt.log.record(&format!("Analysis Error: {}", e));
            None
        }
    }
}

/// Generate the SITREP and, if requested, the voice briefing.
async fn produce_sitrep(rt: &Runtime) -> Result<String> {
    let Some(client) = rt.client.as_ref() else {
        bail!("SITREP requested without a model client");
    };

    rt.say("🧠 Generating strategic SITREP...");
    let aggregator = rt.session.aggregator();
    let sitrep = match agent::generate_sitrep(
        client,
        aggregator.snapshot(),
        aggregator.escalation_score(),
        &rt.config.model.sitrep_language,
    )
    .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!("SITREP failed: {:#}", e);
            if rt.args.voice.is_some() {
                warn!("Skipping voice briefing, no SITREP to read");
            }
            return Ok(agent::FAILED_SITREP.to_string());
        }
    };

    if let Some(ref path) = rt.args.voice {
        rt.say("🔊 Synthesizing voice briefing...");
        match write_briefing(client, &sitrep, path, rt.config.model.sample_rate).await {
            Ok(()) => rt.say(format!("   Voice briefing saved to: {}", path.display())),
            Err(e) => warn!("Voice briefing failed, keeping the text SITREP: {:#}", e),
        }
    }

    Ok(sitrep)
}

async fn write_briefing(
    client: &GeminiClient,
    sitrep: &str,
    path: &Path,
    sample_rate: u32,
) -> Result<()> {
    let wav = agent::synthesize_briefing(client, sitrep, sample_rate).await?;
    std::fs::write(path, &wav)
        .with_context(|| format!("Failed to write voice briefing to {}", path.display()))
}

/// What the watch loop shows next to the live matrix.
#[derive(Default)]
struct WatchView {
    sitrep: Option<String>,
    analysis_report: Option<String>,
}

enum WatchEvent {
    Scan,
    Sync,
    Stop,
}

/// Watch mode: sweep on a schedule and follow the state document until
/// Ctrl-C, or until the level turns Critical with --fail-on-critical.
async fn run_watch(mut rt: Runtime) -> Result<i32> {
    let period = Duration::from_secs(rt.config.schedule.scan_interval_seconds);
    let (mut timer, token) = ScanTimer::new(period);

    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let sync_period = Duration::from_secs(rt.config.schedule.sync_interval_seconds);
    let mut sync_tick = interval_at(Instant::now() + sync_period, sync_period);
    sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut changes = rt.session.aggregator().subscribe();
    let mut view = WatchView::default();
    if rt.args.sitrep {
        view.sitrep = Some(produce_sitrep(&rt).await?);
    }
    render_watch(&rt, &timer, &view)?;
    if let Some(code) = critical_exit(&rt) {
        return Ok(code);
    }

    rt.say(format!(
        "👁️  Watching every {}s. Next scan in {} (Ctrl-C to stop)",
        timer.period().as_secs(),
        format_countdown(timer.seconds_until_next())
    ));

    loop {
        let event = tokio::select! {
            due = timer.next_due() => match due {
                Some(()) => WatchEvent::Scan,
                None => WatchEvent::Stop,
            },
            _ = sync_tick.tick(), if rt.session.is_enabled() => WatchEvent::Sync,
        };

        match event {
            WatchEvent::Stop => break,
            WatchEvent::Sync => {
                if !poll_state(&mut rt) {
                    continue;
                }
            }
            WatchEvent::Scan => {
                scan(&mut rt, &mut view).await?;
                timer.reset();

                let aggregator = rt.session.aggregator();
                let score = aggregator.escalation_score();
                rt.say(format!(
                    "[{}] {}% {} | next scan in {}",
                    chrono::Local::now().format("%H:%M:%S"),
                    score,
                    aggregator.threshold_label(score),
                    format_countdown(timer.seconds_until_next())
                ));
            }
        }

        if changes.has_changed().unwrap_or(false) {
            let revision = *changes.borrow_and_update();
            debug!("Snapshot changed, revision {}", revision);
        }
        render_watch(&rt, &timer, &view)?;

        if let Some(code) = critical_exit(&rt) {
            return Ok(code);
        }
    }

    if token.is_cancelled() {
        info!("Watch cancelled by user");
    }
    info!("Watch stopped");
    rt.say("\n✅ Watch stopped.");
    Ok(0)
}

/// One scheduled scan: pull, sweep, push, then refresh the SITREP.
async fn scan(rt: &mut Runtime, view: &mut WatchView) -> Result<()> {
    if let Err(e) = rt.session.pull() {
        warn!("State sync failed: {:#}", e);
    }

    if let Some(text) = run_analysis(rt).await {
        view.analysis_report = Some(text);
    }
    sync_push(rt);

    if rt.args.sitrep {
        view.sitrep = Some(produce_sitrep(rt).await?);
    }
    Ok(())
}

/// Merge a newer state document written by another run. Returns whether
/// the snapshot changed.
fn poll_state(rt: &mut Runtime) -> bool {
    match rt.session.pull() {
        Ok(PullOutcome::Merged(applied)) => {
            info!("State document changed elsewhere, merged {} values", applied);
            true
        }
        Ok(outcome) => {
            debug!("State poll: {:?}", outcome);
            false
        }
        Err(e) => {
            warn!("State sync failed: {:#}", e);
            false
        }
    }
}

fn render_watch(rt: &Runtime, timer: &ScanTimer, view: &WatchView) -> Result<()> {
    let mut dashboard =
        report::build_dashboard(rt.session.aggregator(), &rt.config.model.name, &rt.log);
    dashboard.sitrep = view.sitrep.clone();
    dashboard.analysis_report = view.analysis_report.clone();
    dashboard.metadata.next_scan_in = Some(timer.seconds_until_next());
    write_report(rt, &dashboard)
}

/// Push the snapshot if it changed; failures are logged only.
fn sync_push(rt: &mut Runtime) {
    match rt.session.push_if_dirty() {
        Ok(true) => debug!("Snapshot synced"),
        Ok(false) => {}
        Err(e) => warn!("State sync failed, snapshot kept in memory: {:#}", e),
    }
}

/// Render the dashboard in the requested format and write it out.
fn write_report(rt: &Runtime, dashboard: &models::Dashboard) -> Result<()> {
    let output = match rt.args.format {
        OutputFormat::Json => report::generate_json_report(dashboard)?,
        OutputFormat::Markdown => report::generate_markdown_report(dashboard),
    };

    let target = &rt.config.general.output;
    if target == "-" {
        println!("{}", output);
        return Ok(());
    }

    std::fs::write(target, &output)
        .with_context(|| format!("Failed to write report to {}", target))?;
    debug!("Report written to {}", target);
    rt.say(format!("📝 Dashboard saved to: {}", target));
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
