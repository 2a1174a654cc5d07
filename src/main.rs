use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use caseforge_agent::{AgentDeps, CollectionStore, FsUploader};
use caseforge_core::config::AppConfig;
use caseforge_core::types::RunRequest;
use caseforge_gateway::GatewayServer;
use caseforge_tools::{data_search_registry, DataSourceClient};

#[derive(Parser)]
#[command(name = "caseforge", version, about = "API test-collection generation service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "caseforge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve,
    /// Execute one run from a request file and print the final state
    Run {
        /// Path to a JSON run request
        #[arg(short, long)]
        request: PathBuf,
    },
    /// Show current configuration
    Config,
}

fn build_deps(config: &AppConfig) -> anyhow::Result<Arc<AgentDeps>> {
    let model = Arc::from(caseforge_llm::create_client(&config.model));
    let data_source = Arc::new(DataSourceClient::new(&config.data_source)?);

    Ok(Arc::new(AgentDeps {
        model,
        model_config: config.model.clone(),
        tools: Arc::new(data_search_registry(data_source)),
        store: CollectionStore::new(&config.storage.artifacts_dir),
        uploader: Arc::new(FsUploader::new(&config.storage.uploads_dir)),
        workflow: config.workflow.clone(),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("caseforge=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Run { request } => {
            let deps = build_deps(&config)?;
            let text = std::fs::read_to_string(&request)?;
            let req: RunRequest = serde_json::from_str(&text)?;

            let done = caseforge_agent::run_request(deps, req).await;
            println!("{}", serde_json::to_string_pretty(&done)?);
        }
        Commands::Serve => {
            let deps = build_deps(&config)?;
            let server = GatewayServer::new(config.gateway.clone(), deps);

            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
    }

    Ok(())
}
