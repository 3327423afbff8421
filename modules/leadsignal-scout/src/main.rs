use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use leadsignal_common::config::load_file_config;
use leadsignal_common::{Config, ProductCatalog, Source};
use leadsignal_scout::assembler::LeadAssembler;
use leadsignal_scout::fetcher::{validate_source, HttpContentFetcher, SourceFetcher};
use leadsignal_scout::inference::ProductInference;
use leadsignal_scout::orchestrator::CrawlOrchestrator;
use leadsignal_scout::resolver::EntityResolver;
use leadsignal_scout::scoring::rescore_all;
use leadsignal_scout::store::{MemoryStore, PgStore};
use leadsignal_scout::traits::LeadStore;

#[derive(Parser)]
#[command(name = "leadsignal", about = "Fuel-distribution lead discovery pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl every schedulable source.
    Run,
    /// Crawl one active source by name.
    RunOne { name: String },
    /// Recompute scores for every stored lead.
    Rescore,
    /// Load and validate configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leadsignal=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env();
    config.log_redacted();

    let file_config = load_file_config(&config.config_path)?;
    let sources: Vec<Source> = file_config
        .sources
        .iter()
        .cloned()
        .map(|s| s.into_source())
        .collect();
    for source in &sources {
        validate_source(source).with_context(|| format!("Invalid source {}", source.name))?;
    }
    info!(sources = sources.len(), "Configuration valid");

    if let Command::CheckConfig = cli.command {
        for source in &sources {
            println!("{} [{}] {}", source.name, source.source_type, source.url);
        }
        return Ok(());
    }

    let store: Arc<dyn LeadStore> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url).await?;
            pg.migrate().await?;
            pg.sync_sources(&sources).await?;
            Arc::new(pg)
        }
        None => {
            warn!("DATABASE_URL not set, results are kept in memory only");
            Arc::new(MemoryStore::with_sources(sources))
        }
    };

    if let Command::Rescore = cli.command {
        let summary = rescore_all(store.as_ref()).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let crawl = &file_config.crawl;
    let content = Arc::new(HttpContentFetcher::new(
        &crawl.user_agent,
        Duration::from_secs(crawl.request_timeout_secs),
    )?);
    let catalog = ProductCatalog::default().with_overrides(&file_config.products);
    let resolver =
        EntityResolver::new(store.clone()).with_candidate_limit(crawl.fuzzy_candidate_limit);
    let assembler = LeadAssembler::new(store.clone(), resolver, ProductInference::new(catalog));

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current item");
                cancelled.store(true, Ordering::Relaxed);
            }
        });
    }

    let orchestrator = CrawlOrchestrator::new(
        store,
        SourceFetcher::new(content),
        assembler,
        Duration::from_millis(crawl.inter_source_delay_ms),
        cancelled,
    );

    let reports = match cli.command {
        Command::RunOne { name } => vec![orchestrator.run_named(&name).await?],
        _ => orchestrator.run_all().await?,
    };
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
