use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use contentmesh::agents::news_monitor::{NewsFeed, NewsItem, StaticNewsFeed};
use contentmesh::agents::{
    ContentGeneratorAgent, LearningAgent, NewsMonitorAgent, PublisherAgent, QualityControlAgent,
};
use contentmesh::bus::{InProcessBus, MessageBus};
use contentmesh::contracts::{
    ContentStore, InMemoryContentStore, InMemoryProfileStore, InMemoryPublishTarget, ProfileStore,
    PublishTarget,
};
use contentmesh::runtime::AgentRuntime;
use contentmesh::similarity::SimilarityEngine;
use contentmesh::surface::{http, AgentRegistry};
use contentmesh::{MeshConfig, Result};

#[derive(Parser)]
#[command(name = "contentmesh", about = "Multi-agent content orchestration core")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "contentmesh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the agent mesh and the health surface.
    Run,
    /// Validate the configuration file and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run => run(&cli.config).await,
        Command::CheckConfig => check_config(&cli.config).await,
    };
    if let Err(e) = result {
        error!(error = %e, "Fatal");
        std::process::exit(1);
    }
}

async fn check_config(path: &PathBuf) -> Result<()> {
    let config = MeshConfig::load(path).await?;
    info!(path = %path.display(), "Configuration is valid");
    info!(
        max_concurrent_tasks = config.runtime.max_concurrent_tasks,
        prefetch_count = config.bus.prefetch_count,
        similarity_threshold = config.similarity.threshold,
        "Effective settings"
    );
    Ok(())
}

async fn run(path: &PathBuf) -> Result<()> {
    let config = MeshConfig::load(path).await?;
    info!(path = %path.display(), "Configuration loaded");

    let bus: Arc<dyn MessageBus> = Arc::new(InProcessBus::new(config.bus.clone()));
    let profiles: Arc<dyn ProfileStore> = Arc::new(InMemoryProfileStore::new());
    let contents: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
    let publish_target: Arc<dyn PublishTarget> = Arc::new(InMemoryPublishTarget::new());
    let feed: Arc<dyn NewsFeed> = Arc::new(seed_feed());
    let engine = Arc::new(SimilarityEngine::new(config.similarity.clone()));

    let generator = AgentRuntime::new(
        "content-generator-1",
        ContentGeneratorAgent::new(Arc::clone(&profiles), Arc::clone(&contents)),
        Arc::clone(&bus),
        config.runtime.clone(),
        config.health.clone(),
    );
    let quality = AgentRuntime::new(
        "quality-control-1",
        QualityControlAgent::new(Arc::clone(&engine), Arc::clone(&contents)),
        Arc::clone(&bus),
        config.runtime.clone(),
        config.health.clone(),
    );
    let publisher = AgentRuntime::new(
        "publisher-1",
        PublisherAgent::new(Arc::clone(&contents), Arc::clone(&publish_target)),
        Arc::clone(&bus),
        config.runtime.clone(),
        config.health.clone(),
    );
    let monitor = AgentRuntime::new(
        "news-monitor-1",
        NewsMonitorAgent::new(Arc::clone(&feed), Arc::clone(&bus)),
        Arc::clone(&bus),
        config.runtime.clone(),
        config.health.clone(),
    );
    let learning = AgentRuntime::new(
        "learning-1",
        LearningAgent::new(),
        Arc::clone(&bus),
        config.runtime.clone(),
        config.health.clone(),
    );

    generator.start().await?;
    quality.start().await?;
    publisher.start().await?;
    monitor.start().await?;
    learning.start().await?;
    info!("All agents online");

    let registry = Arc::new(AgentRegistry::new());
    registry.register(generator.health_source());
    registry.register(quality.health_source());
    registry.register(publisher.health_source());
    registry.register(monitor.health_source());
    registry.register(learning.health_source());

    let surface_registry = Arc::clone(&registry);
    let bind_addr = config.http.bind_addr.clone();
    let surface = tokio::spawn(async move {
        if let Err(e) = http::serve(surface_registry, &bind_addr).await {
            error!(error = %e, "Health surface stopped");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining agents");

    learning.stop().await?;
    monitor.stop().await?;
    publisher.stop().await?;
    quality.stop().await?;
    generator.stop().await?;
    surface.abort();
    info!("Shutdown complete");
    Ok(())
}

fn seed_feed() -> StaticNewsFeed {
    let feed = StaticNewsFeed::new();
    feed.push(NewsItem {
        headline: "Async runtimes keep maturing".into(),
        url: "https://example.com/async".into(),
        summary: "Schedulers, io_uring backends, and structured concurrency.".into(),
    });
    feed
}
