use std::process::ExitCode;

use anyhow::Context;
use axum::Router;
use clap::{Args, Parser, Subcommand};
use feedgen_api::{app_with, ServiceOptions};
use feedgen_client::{FeedbackService, HttpFeedbackService};
use feedgen_common::config::DriverConfig;
use feedgen_core::DriverParams;

#[derive(Parser, Debug)]
#[command(name = "feedgen", version, about = "Batch driver for the feedback generator service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate batches until the service holds the target count
    Run(RunArgs),
    /// Print the service's current progress
    Progress(ServiceArgs),
    /// Print the keys of stored feedback items
    List(ServiceArgs),
    /// Serve an in-memory stand-in for the generator service
    Serve(ServeArgs),
    Version,
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Overrides FEEDGEN_BASE_URL / the config file
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    service: ServiceArgs,
    #[arg(short, long)]
    target: Option<u64>,
    #[arg(short, long)]
    batch_size: Option<u64>,
    /// Pause between batches, in seconds
    #[arg(short, long)]
    delay_secs: Option<f64>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(short, long, default_value_t = 8787)]
    port: u16,
    /// Denominator of the reported progress percentage
    #[arg(long, default_value_t = 1000)]
    target: u64,
    /// Fail every generate call after this many
    #[arg(long)]
    fail_after: Option<u64>,
}

impl ServiceArgs {
    fn apply(&self, mut cfg: DriverConfig) -> DriverConfig {
        if let Some(url) = &self.base_url { cfg.base_url = url.clone(); }
        if let Some(t) = self.timeout_secs { cfg.timeout_secs = Some(t); }
        cfg
    }
}

impl RunArgs {
    fn apply(&self, cfg: DriverConfig) -> DriverConfig {
        let mut cfg = self.service.apply(cfg);
        if let Some(v) = self.target { cfg.target = v; }
        if let Some(v) = self.batch_size { cfg.batch_size = v; }
        if let Some(v) = self.delay_secs { cfg.delay_secs = v; }
        cfg
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    feedgen_obs::init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => run_driver(args).await,
        Commands::Progress(args) => show_progress(args).await,
        Commands::List(args) => list_feedbacks(args).await,
        Commands::Serve(args) => serve(args).await,
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn service_from(cfg: &DriverConfig) -> anyhow::Result<HttpFeedbackService> {
    Ok(HttpFeedbackService::new(&cfg.base_url, cfg.timeout())?)
}

async fn run_driver(args: RunArgs) -> anyhow::Result<ExitCode> {
    let cfg = args.apply(DriverConfig::load()?);
    cfg.validate()?;
    let service = service_from(&cfg)?;
    let params = DriverParams::from(&cfg);
    tracing::debug!(target: "cli", ?cfg, "resolved configuration");

    let mut out = std::io::stdout();
    let summary = feedgen_core::run(&service, &params, &mut out)
        .await
        .context("could not read initial progress")?;
    if summary.completed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

async fn show_progress(args: ServiceArgs) -> anyhow::Result<ExitCode> {
    let cfg = args.apply(DriverConfig::load()?);
    let report = service_from(&cfg)?.fetch_progress().await?;
    match report.progress.as_ref().and_then(|p| p.as_str()) {
        Some(pct) => println!("Current progress: {} ({})", report.count, pct),
        None => println!("Current progress: {}", report.count),
    }
    if let Some(updated) = report.last_updated {
        println!("Last updated: {}", updated);
    }
    if let Some(message) = report.message {
        println!("{}", message);
    }
    Ok(ExitCode::SUCCESS)
}

async fn list_feedbacks(args: ServiceArgs) -> anyhow::Result<ExitCode> {
    let cfg = args.apply(DriverConfig::load()?);
    let listing = service_from(&cfg)?.list_feedbacks().await?;
    println!("{} stored objects", listing.count);
    for file in listing.files {
        println!("- {}", file);
    }
    Ok(ExitCode::SUCCESS)
}

async fn serve(args: ServeArgs) -> anyhow::Result<ExitCode> {
    let app: Router = app_with(ServiceOptions { target: args.target, fail_after: args.fail_after });
    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("cannot bind {}:{}", args.host, args.port))?;
    tracing::info!("listening on http://{}:{}", args.host, args.port);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(ExitCode::SUCCESS)
}
