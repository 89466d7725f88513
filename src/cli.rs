//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::PinerankError;

#[derive(Parser, Debug)]
#[command(name = "pinerank", about = "Community trading-script backtest pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process the backlog of scraped scripts
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        category: Option<String>,
        /// Max scripts to process (0 = all)
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Reprocess items even if their record is terminal
        #[arg(long)]
        force: bool,
    },
    /// Run the full pipeline for one script URL and print the result
    Submit {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        url: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Recompute indicator ranks and print the leaderboard
    Rankings {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Show ledger status counts
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Start the HTTP API server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Sweep {
            config,
            category,
            limit,
            force,
        } => run_sweep(&config, category.as_deref(), limit, force),
        Command::Submit {
            config,
            url,
            category,
        } => run_submit(&config, &url, category.as_deref()),
        Command::Rankings { config, top } => run_rankings(&config, top),
        Command::Status { config } => run_status(&config),
        Command::Serve { config } => run_serve(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PinerankError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Wire the pipeline from config around the given source adapter.
#[cfg(feature = "sqlite")]
fn build_orchestrator(
    config: &FileConfigAdapter,
    source: std::sync::Arc<dyn crate::ports::source_port::SourcePort>,
) -> Result<crate::domain::orchestrator::Orchestrator, PinerankError> {
    use std::sync::Arc;

    use crate::adapters::backtest_http_adapter::BacktestHttpAdapter;
    use crate::adapters::claude_transform_adapter::ClaudeTransformAdapter;
    use crate::adapters::csv_log_adapter::CsvLogAdapter;
    use crate::adapters::postgrest_sync_adapter::PostgrestSyncAdapter;
    use crate::adapters::sqlite_state_adapter::SqliteStateAdapter;
    use crate::adapters::telegram_adapter::TelegramAdapter;
    use crate::domain::instrument::{default_instruments, parse_instruments};
    use crate::domain::orchestrator::{DEFAULT_SHARPE_ALERT, DEFAULT_WORKERS, Orchestrator};
    use crate::ports::config_port::ConfigPort;
    use crate::ports::state_port::StatePort;

    let state = SqliteStateAdapter::from_config(config)?;
    state.initialize_schema()?;
    let state: Arc<dyn StatePort> = Arc::new(state);

    let transformer = Arc::new(ClaudeTransformAdapter::from_config(config)?);
    let evaluator = Arc::new(BacktestHttpAdapter::from_config(config)?);

    let instruments = match config.get_string("pipeline", "instruments") {
        Some(raw) => parse_instruments(&raw)?,
        None => default_instruments(),
    };
    let workers = config.get_int("pipeline", "workers", DEFAULT_WORKERS as i64) as usize;
    let sharpe_alert = config.get_double("telegram", "sharpe_alert", DEFAULT_SHARPE_ALERT);

    let mut orchestrator = Orchestrator::new(source, transformer, evaluator, state, instruments)
        .with_workers(workers)
        .with_sharpe_alert(sharpe_alert)
        .with_sink(Arc::new(CsvLogAdapter::from_config(config)));

    if config.get_string("supabase", "url").is_some() {
        orchestrator = orchestrator.with_sink(Arc::new(PostgrestSyncAdapter::from_config(config)?));
    }

    if config.get_string("telegram", "bot_token").is_some()
        || std::env::var("TELEGRAM_BOT_TOKEN").is_ok()
    {
        match TelegramAdapter::from_config(config) {
            Ok(telegram) => orchestrator = orchestrator.with_notifier(Arc::new(telegram)),
            Err(e) => eprintln!("warning: notifications disabled ({e})"),
        }
    }

    Ok(orchestrator)
}

fn run_sweep(
    config_path: &PathBuf,
    category: Option<&str>,
    limit: usize,
    force: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::script_dir_adapter::ScriptDirAdapter;
        use std::sync::Arc;
        use std::time::Instant;

        let source_adapter = match ScriptDirAdapter::from_config(&config) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let mut backlog = match source_adapter.discover(category) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        if limit > 0 {
            backlog.truncate(limit);
        }

        if backlog.is_empty() {
            eprintln!("Backlog is empty. Scrape some scripts first.");
            return ExitCode::SUCCESS;
        }
        eprintln!("Found {} scripts in backlog", backlog.len());

        let orchestrator = match build_orchestrator(&config, Arc::new(source_adapter)) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let start = Instant::now();
        let summary = match orchestrator.run_backlog(&backlog, force) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        let elapsed = start.elapsed().as_secs_f64();

        eprintln!("\n=== Sweep Summary ===");
        eprintln!("Evaluated:     {}", summary.processed);
        eprintln!("Failed:        {}", summary.failed);
        eprintln!("Duplicates:    {}", summary.skipped);
        eprintln!("Already done:  {}", summary.already_done);
        eprintln!("Elapsed:       {elapsed:.1}s");

        orchestrator.notify_sweep_summary(&summary, elapsed);
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, category, limit, force);
        eprintln!("error: sqlite feature is required for sweep");
        ExitCode::from(1)
    }
}

fn run_submit(config_path: &PathBuf, url: &str, category: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::scraper_http_adapter::ScraperHttpAdapter;
        use crate::domain::orchestrator::SubmitOutcome;
        use crate::domain::work_item::{SourceLocator, source_name_from_url};
        use std::sync::Arc;

        let scraper = match ScraperHttpAdapter::from_config(&config) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let orchestrator = match build_orchestrator(&config, Arc::new(scraper)) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let source = SourceLocator::new(
            url,
            source_name_from_url(url),
            category.unwrap_or("custom"),
        );

        eprintln!("Submitting {url}");
        match orchestrator.submit(&source) {
            Ok(SubmitOutcome::Completed(report)) => {
                eprintln!("\n=== Results: {} ===", report.item.item_id);
                for result in &report.results {
                    match &result.error {
                        Some(error) => eprintln!("  {}: ERROR - {}", result.symbol, error),
                        None => {
                            let metrics = result.metrics.clone().unwrap_or_default();
                            eprintln!(
                                "  {}: ROI {}  Sharpe {}  WinRate {}  Trades {}",
                                result.symbol,
                                format_pct(metrics.roi_pct),
                                format_num(metrics.sharpe_ratio),
                                format_pct(metrics.win_rate_pct),
                                metrics
                                    .num_trades
                                    .map(|n| n.to_string())
                                    .unwrap_or_else(|| "N/A".into()),
                            );
                        }
                    }
                }
                match &report.score {
                    Some(score) => eprintln!("\nComposite score: {:.4}", score.rounded()),
                    None => eprintln!("\nComposite score: undefined (all instruments failed)"),
                }
                ExitCode::SUCCESS
            }
            Ok(SubmitOutcome::Duplicate {
                item_id,
                duplicate_of,
            }) => {
                eprintln!("Skipped: {item_id} duplicates already-processed {duplicate_of}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, url, category);
        eprintln!("error: sqlite feature is required for submit");
        ExitCode::from(1)
    }
}

fn run_rankings(config_path: &PathBuf, top: usize) -> ExitCode {
    use crate::adapters::postgrest_sync_adapter::PostgrestSyncAdapter;

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let adapter = match PostgrestSyncAdapter::from_config(&config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let rows = match adapter.update_rankings() {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if rows.is_empty() {
        eprintln!("Nothing to rank.");
        return ExitCode::SUCCESS;
    }

    eprintln!("Updated {} indicator ranks.", rows.len());

    let shown = rows.len().min(top);
    println!("{}", "=".repeat(90));
    println!("  Indicator Rankings (Top {shown} of {})", rows.len());
    println!("{}", "=".repeat(90));
    println!(
        "  {:<6}{:<45}{:<16}{:>8}{:>8}{:>8}",
        "Rank", "Script", "Category", "Score", "Sharpe", "ROI%"
    );
    for row in rows.iter().take(top) {
        let name: String = row.script_name.chars().take(43).collect();
        println!(
            "  {:<6}{:<45}{:<16}{:>8}{:>8}{:>8}",
            row.rank.unwrap_or(0),
            name,
            row.category,
            row.composite_score
                .map(|s| format!("{s:.3}"))
                .unwrap_or_else(|| "N/A".into()),
            row.avg_sharpe
                .map(|s| format!("{s:.2}"))
                .unwrap_or_else(|| "N/A".into()),
            row.avg_roi
                .map(|r| format!("{r:.1}"))
                .unwrap_or_else(|| "N/A".into()),
        );
    }
    println!("{}", "=".repeat(90));

    ExitCode::SUCCESS
}

fn run_status(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_state_adapter::SqliteStateAdapter;
        use crate::domain::record::StageStatus;
        use crate::ports::state_port::StatePort;

        let state = match SqliteStateAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        if let Err(e) = state.initialize_schema() {
            eprintln!("error: {e}");
            return (&e).into();
        }

        let records = match state.load_records() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let statuses = [
            StageStatus::Pending,
            StageStatus::Fetched,
            StageStatus::Transformed,
            StageStatus::Evaluated,
            StageStatus::Skipped,
            StageStatus::Failed,
        ];

        println!("Pipeline ledger: {} items", records.len());
        for status in statuses {
            let count = records.values().filter(|r| r.status == status).count();
            println!("  {:<12} {}", status.as_str(), count);
        }

        if let Some(latest) = records.values().map(|r| r.updated_at).max() {
            println!("Last update: {}", latest.to_rfc3339());
        }

        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        eprintln!("error: sqlite feature is required for status");
        ExitCode::from(1)
    }
}

fn run_serve(config_path: &PathBuf) -> ExitCode {
    #[cfg(feature = "web")]
    {
        use crate::adapters::scraper_http_adapter::ScraperHttpAdapter;
        use crate::adapters::web::{AppState, build_router};
        use crate::domain::admission::{
            AdmissionController, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_PER_HOUR,
        };
        use crate::ports::config_port::ConfigPort;
        use std::net::SocketAddr;
        use std::sync::Arc;

        eprintln!("Loading config from {}", config_path.display());
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };

        let scraper = match ScraperHttpAdapter::from_config(&config) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let orchestrator = match build_orchestrator(&config, Arc::new(scraper)) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let admission = AdmissionController::new(
            config.get_int("web", "max_concurrent", DEFAULT_MAX_CONCURRENT as i64) as usize,
            config.get_int("web", "max_per_hour", DEFAULT_MAX_PER_HOUR as i64) as usize,
        );

        let addr: SocketAddr = config
            .get_string("web", "listen")
            .unwrap_or_else(|| "127.0.0.1:8100".to_string())
            .parse()
            .unwrap_or_else(|_| {
                "127.0.0.1:8100"
                    .parse()
                    .expect("default listen address is valid")
            });

        eprintln!("Starting API server on {addr}");

        let state = AppState {
            orchestrator: Arc::new(orchestrator),
            admission,
        };
        let router = build_router(state);

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                eprintln!("error: failed to start runtime: {e}");
                return ExitCode::from(1);
            }
        };

        let served: Result<(), std::io::Error> = runtime.block_on(async {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await
        });

        match served {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: server failed: {e}");
                ExitCode::from(1)
            }
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}

#[cfg(feature = "sqlite")]
fn format_pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}%"))
        .unwrap_or_else(|| "N/A".into())
}

#[cfg(feature = "sqlite")]
fn format_num(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "N/A".into())
}
