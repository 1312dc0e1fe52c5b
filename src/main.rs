use memeseek::catalog::{CatalogStore, SqliteCatalog};
use memeseek::cli::{Cli, Commands, ConfigAction};
use memeseek::config::{Config, ConfigValidator};
use memeseek::delivery::ConsoleDelivery;
use memeseek::embedding::{
    backfill_embeddings, sync_indices, EmbeddingProvider, FastEmbedProvider, KeywordIndex,
    SyncReport, VectorIndex,
};
use memeseek::error::{MemeseekError, Result};
use memeseek::retrieval::{HybridRetriever, RetrievalSettings};
use memeseek::session::{Command, ConversationId, DialogSettings, Input, SessionEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Chat { conversation } => {
            cmd_chat(cli.config, ConversationId(conversation))?;
        }
        Commands::Search { query, limit, json } => {
            cmd_search(cli.config, &query, limit, json)?;
        }
        Commands::Embed { limit, batch_size } => {
            cmd_embed(cli.config, limit, batch_size)?;
        }
        Commands::Stats => {
            cmd_stats(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "memeseek=debug" } else { "memeseek=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| MemeseekError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn cmd_chat(config_path: Option<PathBuf>, conversation: ConversationId) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let config = load_config(config_path)?;
    let catalog = open_catalog(&config)?;
    let retriever = build_retriever(&config, &catalog)?;

    let engine = Arc::new(SessionEngine::new(
        Arc::new(retriever),
        Arc::new(catalog),
        Arc::new(ConsoleDelivery::new(true)),
        DialogSettings::from(&config),
    ));

    let rt = runtime()?;
    rt.block_on(async {
        let sweeper = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(SESSION_SWEEP_INTERVAL);
                loop {
                    tick.tick().await;
                    engine.evict_idle().await;
                }
            })
        };

        engine
            .handle(conversation, Input::Command(Command::Start))
            .await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.map_err(|e| MemeseekError::Io {
            source: e,
            context: "Failed to read from stdin".to_string(),
        })? {
            let phase = engine.handle(conversation, Input::decode(&line)).await;
            tracing::debug!("Conversation {} now {:?}", conversation, phase);
        }

        sweeper.abort();
        Ok(())
    })
}

fn cmd_search(config_path: Option<PathBuf>, query: &str, limit: usize, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let catalog = open_catalog(&config)?;
    let retriever = build_retriever(&config, &catalog)?;

    let rt = runtime()?;
    let (candidates, items) = rt.block_on(async {
        let candidates = retriever.retrieve(query, limit).await;
        let ids: Vec<i64> = candidates.iter().map(|c| c.id).collect();
        let items = catalog.fetch(&ids).await?;
        Ok::<_, MemeseekError>((candidates, items))
    })?;

    if json {
        let output = serde_json::to_string_pretty(&candidates).map_err(|e| MemeseekError::Json {
            source: e,
            context: "Failed to serialize search results".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    if candidates.is_empty() {
        println!("Nothing found for {:?}", query);
        return Ok(());
    }

    for (rank, candidate) in candidates.iter().enumerate() {
        let name = items
            .iter()
            .find(|item| item.id == candidate.id)
            .map(|item| item.name.as_str())
            .or(candidate.name.as_deref())
            .unwrap_or("<missing from catalog>");
        println!(
            "{:>3}. [#{}] {} ({:?}, {:.3})",
            rank + 1,
            candidate.id,
            name,
            candidate.source,
            candidate.score
        );
    }

    Ok(())
}

fn cmd_embed(config_path: Option<PathBuf>, limit: usize, batch_size: usize) -> Result<()> {
    let config = load_config(config_path)?;
    let catalog = open_catalog(&config)?;
    let provider = open_provider(&config)?;

    let stored = backfill_embeddings(&catalog, provider.as_ref(), limit, batch_size)?;
    let pending = catalog.pending_embeddings(usize::MAX)?.len();

    println!("✓ Stored {} embeddings ({} still pending)", stored, pending);
    Ok(())
}

fn cmd_stats(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let catalog = open_catalog(&config)?;
    let stats = catalog.stats()?;
    let (keyword_index, vector_index, report) = open_indices(&config, &catalog)?;

    println!("Catalog: {}", config.storage.catalog_path.display());
    println!("  Items:            {}", stats.item_count);
    println!("  With embeddings:  {}", stats.embedded_count);
    println!("Indices:");
    println!("  Keyword entries:  {}", keyword_index.len());
    println!(
        "  Vectors:          {} ({}D)",
        vector_index.len(),
        vector_index.dimension()
    );
    println!("  Skipped:          {}", report.skipped);

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| MemeseekError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        tracing::warn!(
            "Config file not found, using defaults. Run 'memeseek config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        config
    };

    config.storage.catalog_path = expand_path(&config.storage.catalog_path)?;
    Ok(config)
}

fn open_catalog(config: &Config) -> Result<SqliteCatalog> {
    tracing::info!("Opening catalog at {}", config.storage.catalog_path.display());
    SqliteCatalog::open(&config.storage.catalog_path)
}

fn open_provider(config: &Config) -> Result<Arc<FastEmbedProvider>> {
    let provider = FastEmbedProvider::new(&config.embedding.model)
        .map_err(|e| MemeseekError::Index(format!("Embedding model unavailable: {}", e)))?;

    if provider.dimension() != config.indexing.vector_dim {
        return Err(MemeseekError::Config(format!(
            "Model {} produces {}D vectors, index expects {}D",
            provider.model_name(),
            provider.dimension(),
            config.indexing.vector_dim
        )));
    }

    Ok(Arc::new(provider))
}

fn open_indices(
    config: &Config,
    catalog: &SqliteCatalog,
) -> Result<(KeywordIndex, VectorIndex, SyncReport)> {
    let mut keyword_index =
        KeywordIndex::in_memory().map_err(|e| MemeseekError::Index(e.to_string()))?;
    let vector_index = VectorIndex::new(
        config.indexing.vector_dim,
        config.indexing.hnsw_m,
        config.indexing.hnsw_ef_construction,
        config.indexing.max_elements,
    )
    .with_ef_search(config.indexing.hnsw_ef_search);

    let report = sync_indices(catalog, &mut keyword_index, &vector_index)?;
    Ok((keyword_index, vector_index, report))
}

fn build_retriever(config: &Config, catalog: &SqliteCatalog) -> Result<HybridRetriever> {
    let provider = open_provider(config)?;
    let (keyword_index, vector_index, _) = open_indices(config, catalog)?;

    Ok(HybridRetriever::from_indices(
        keyword_index,
        vector_index,
        provider,
        RetrievalSettings::from(&config.retrieval),
    ))
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| MemeseekError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| MemeseekError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
