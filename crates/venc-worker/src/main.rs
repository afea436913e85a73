//! Video encoding worker binary.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use venc_models::VideoCode;
use venc_worker::app::{queue_client, Worker};
use venc_worker::cli::{Cli, Command};
use venc_worker::health::run_health_check;
use venc_worker::logging::{init_tracing, json_from_env};
use venc_worker::{metrics, WorkerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    // A missing env file is fine; everything can come from the environment.
    if let Err(e) = dotenvy::from_path(&cli.env_file) {
        if cli.env_file.exists() {
            eprintln!("Failed to load {}: {}", cli.env_file.display(), e);
        }
    }

    let level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("ENCODER_LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string())
        .to_ascii_lowercase();
    init_tracing(&level, cli.log_json || json_from_env());

    let mut config = match WorkerConfig::from_lookup(|key| cli.env_lookup(key)) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    cli.apply_overrides(&mut config);

    match dispatch(&cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: &Cli, config: WorkerConfig) -> anyhow::Result<ExitCode> {
    match cli.subcommand() {
        Command::Run => run(config).await,
        Command::HealthCheck => {
            let queue = queue_client(&config)?;
            let report = run_health_check(&config, &queue).await;
            print_json(&report)?;
            Ok(if report.is_healthy() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::ValidateConfig => {
            println!("Configuration is valid.");
            match &config.storage {
                Some(storage) => println!("Object storage: bucket {}", storage.bucket),
                None => println!("Object storage: not configured (uploads disabled)"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::ShowConfig => {
            print!("{}", config);
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats => {
            let stats = queue_client(&config)?
                .stats()
                .await
                .context("Failed to fetch queue stats")?;
            print_json(&serde_json::json!({
                "stats": stats,
                "assessment": stats.assess(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::JobStatus { code } => {
            let report = queue_client(&config)?
                .job_status(&VideoCode::from_string(code.as_str()))
                .await
                .with_context(|| format!("Failed to fetch status of {}", code))?;
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ResetStuck => {
            let response = queue_client(&config)?
                .reset_stuck()
                .await
                .context("Failed to reset stuck jobs")?;
            print_json(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Retry { code } => {
            queue_client(&config)?
                .retry_job(&VideoCode::from_string(code.as_str()))
                .await
                .with_context(|| format!("Failed to re-queue {}", code))?;
            println!("Job {} queued for retry.", code);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(config: WorkerConfig) -> anyhow::Result<ExitCode> {
    info!("Starting venc-worker");
    info!("Worker config: {:?}", config);

    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .with_context(|| format!("Cannot create temp dir {}", config.temp_dir.display()))?;

    if let Some(addr) = config.metrics_addr {
        metrics::install_exporter(addr)?;
        info!("Metrics exporter listening on {}", addr);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal; finishing current job");
        let _ = shutdown_tx.send(true);
    });

    Worker::build(&config, shutdown_rx).await?.run().await;

    info!("Worker shutdown complete");
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
