use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use project_ledger::config::LedgerConfig;
use project_ledger::engine::ProjectService;
use project_ledger::store::{MemoryStore, ProjectStore};
use project_ledger::{api, db};

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Project record keeping with an audited update trail")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Keep projects in memory instead of SQLite
        #[arg(long)]
        memory: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "project_ledger=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_store(config: &LedgerConfig, memory: bool) -> anyhow::Result<Arc<dyn ProjectStore>> {
    if memory {
        tracing::info!("Using in-memory project store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = match &config.database_path {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(Arc::new(db))
}

async fn serve(port: u16, memory: bool) -> anyhow::Result<()> {
    let config = LedgerConfig::from_env();
    let store = open_store(&config, memory)?;
    let service = ProjectService::new(store, &config);
    let app = api::create_router(service);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Project ledger listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { port, memory }) => serve(port, memory).await,
        None => serve(3000, false).await,
    }
}
