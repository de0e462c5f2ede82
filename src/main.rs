use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use statement_analyzer::api;
use statement_analyzer::storage::{InMemoryRepository, LocalBlobStore};
use statement_analyzer::{ServiceConfig, StatementService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "statement-analyzer",
    version,
    about = "Bank statement analysis and loan decisions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// TOML config file; environment variables override it
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Extract and aggregate a local statement PDF, printing the analysis as JSON
    Analyze {
        #[arg(long)]
        pdf: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => serve(config).await,
        Command::Analyze { pdf, config } => analyze(pdf, config).await,
    }
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let config = ServiceConfig::load(config_path.as_deref()).context("loading config")?;
    let service = config.build_service().context("building service")?;

    let app = api::router(service);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    log::info!("Listening on {}", config.server.bind_addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn analyze(pdf: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = ServiceConfig::load(config_path.as_deref()).context("loading config")?;

    let Some(file_name) = pdf.file_name().and_then(|n| n.to_str()) else {
        bail!("not a file path: {}", pdf.display());
    };
    let root = pdf
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let service = StatementService::new(
        Arc::new(LocalBlobStore::new(root)),
        Arc::new(InMemoryRepository::new()),
        config.extractor()?,
    );

    let data = service
        .process_statement_pdf(file_name)
        .await
        .with_context(|| format!("processing {}", pdf.display()))?;
    let analysis = service.analyze_statement(&data).await?;

    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
