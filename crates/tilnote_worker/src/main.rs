//! Welcome-email queue consumer.
//!
//! # Responsibility
//! - Poll the shared SQLite job queue and deliver due welcome emails.
//! - Keep running through transient storage errors; the next poll retries.

use chrono::Utc;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tilnote_core::db::open_db;
use tilnote_core::notify::{LogEmailSender, RetryPolicy, WelcomeEmailWorker, WorkerReport};
use tilnote_core::{init_logging, AppConfig, JobQueue, SqliteJobQueue};

#[derive(Parser)]
#[command(name = "tilnote-worker")]
#[command(version, about = "Delivers queued tilnote welcome emails", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "TILNOTE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Process one batch of due jobs and exit
    #[arg(long)]
    once: bool,

    /// Print queue counters and exit
    #[arg(long, conflicts_with = "once")]
    stats: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("tilnote-worker: invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging(&config.logging, "worker") {
        eprintln!("tilnote-worker: failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let result = if cli.stats {
        print_stats(&config)
    } else if cli.once {
        poll_once(&config, &worker(&config)).map(|_| ())
    } else {
        run_forever(&config)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=worker_exit module=worker status=error error={}", err);
            ExitCode::FAILURE
        }
    }
}

fn worker(config: &AppConfig) -> WelcomeEmailWorker<LogEmailSender> {
    WelcomeEmailWorker::new(
        LogEmailSender,
        RetryPolicy::from_config(&config.worker),
        config.email.sender.clone(),
    )
}

fn poll_once(
    config: &AppConfig,
    worker: &WelcomeEmailWorker<LogEmailSender>,
) -> Result<WorkerReport, String> {
    let conn = open_db(&config.database.path)
        .map_err(|err| format!("failed to open database `{}`: {err}", config.database.path))?;
    let queue = SqliteJobQueue::new(&conn);
    let report = worker
        .run_once(&queue, Utc::now())
        .map_err(|err| format!("poll failed: {err}"))?;
    if report.claimed > 0 {
        info!(
            "event=worker_poll module=worker status=ok claimed={} sent={} retried={} dead={}",
            report.claimed, report.sent, report.retried, report.dead
        );
    }
    Ok(report)
}

fn run_forever(config: &AppConfig) -> Result<(), String> {
    let worker = worker(config);
    let interval = Duration::from_millis(config.worker.poll_interval_ms);
    info!(
        "event=worker_start module=worker status=ok poll_interval_ms={} batch_size={} max_attempts={}",
        config.worker.poll_interval_ms,
        worker.policy().batch_size,
        worker.policy().max_attempts
    );

    loop {
        match poll_once(config, &worker) {
            // A full batch means more work is likely waiting; poll again at once.
            Ok(report) if report.claimed >= worker.policy().batch_size as usize => continue,
            Ok(_) => {}
            Err(err) => error!("event=worker_poll module=worker status=error error={}", err),
        }
        std::thread::sleep(interval);
    }
}

fn print_stats(config: &AppConfig) -> Result<(), String> {
    let conn = open_db(&config.database.path)
        .map_err(|err| format!("failed to open database `{}`: {err}", config.database.path))?;
    let stats = SqliteJobQueue::new(&conn)
        .stats()
        .map_err(|err| format!("failed to read queue stats: {err}"))?;
    println!(
        "pending={} done={} dead={}",
        stats.pending, stats.done, stats.dead
    );
    Ok(())
}
