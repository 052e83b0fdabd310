use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use papyrus_core::citation::CitationFields;
use papyrus_core::config::{Config, LogFormat, LoggingConfig, ProviderKind, StoreBackend};
use papyrus_core::{Assistant, PromptManager, SummaryFormat, SummaryOptions};
#[cfg(feature = "gateway")]
use papyrus_gateway::GatewayServer;
use papyrus_llm::any::AnyProvider;
use papyrus_llm::http::client_with_timeout;
use papyrus_llm::ollama::OllamaProvider;
use papyrus_llm::openai::OpenAiProvider;
use papyrus_memory::{
    DocumentStore, InMemoryVectorStore, QdrantOps, SqliteVectorStore, VectorStore,
};
use papyrus_papers::PaperLoader;
use papyrus_papers::arxiv::ArxivClient;
#[cfg(feature = "gateway")]
use tokio::sync::watch;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(name = "papyrus", version, about = "Research-paper assistant")]
struct Cli {
    /// TOML config file (falls back to `PAPYRUS_CONFIG`, then config/default.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    #[cfg(feature = "gateway")]
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Answer a question from the indexed papers.
    Ask {
        question: String,
        /// Print the answer as it is generated.
        #[arg(long)]
        stream: bool,
    },
    /// Search the paper repository.
    Search {
        query: String,
        #[arg(long, short = 'n')]
        max_results: Option<usize>,
    },
    /// Summarize a paper by id.
    Summarize {
        paper_id: String,
        /// full, short or bullets.
        #[arg(long, default_value = "full")]
        format: String,
        /// Word limit for the short format.
        #[arg(long)]
        max_length: Option<usize>,
        /// Bullet count for the bullets format.
        #[arg(long)]
        num_points: Option<usize>,
    },
    /// Cite a paper by id.
    Cite {
        paper_id: String,
        #[arg(long, default_value = "apa")]
        style: String,
        /// Print every supported style.
        #[arg(long)]
        all: bool,
    },
    /// Classify a free-text query and run the matching operation.
    Route { query: String },
    /// Load papers by id and add them to the document store.
    Index {
        #[arg(required = true)]
        paper_ids: Vec<String>,
    },
    /// Document store statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    init_subscriber(&config.logging);
    tracing::debug!("loaded config from {}", config_path.display());

    let provider = create_provider(&config)?;
    let store = create_store(&config, &provider).await?;
    let assistant = build_assistant(&config, provider, store)?;

    run(cli.command, assistant, &config).await
}

async fn run(
    command: Command,
    assistant: Assistant<AnyProvider>,
    #[cfg_attr(not(feature = "gateway"), allow(unused_variables))] config: &Config,
) -> anyhow::Result<()> {
    match command {
        #[cfg(feature = "gateway")]
        Command::Serve { bind, port } => serve(assistant, config, bind, port).await,
        Command::Ask { question, stream } => {
            if stream {
                ask_streaming(&assistant, &question).await
            } else {
                print_json(&assistant.rag().answer(&question).await?)
            }
        }
        Command::Search { query, max_results } => {
            print_json(&assistant.search(&query, max_results).await?)
        }
        Command::Summarize {
            paper_id,
            format,
            max_length,
            num_points,
        } => {
            let options = summary_options(&format, max_length, num_points)?;
            print_json(
                &assistant
                    .summarizer()
                    .summarize_paper(&paper_id, options)
                    .await?,
            )
        }
        Command::Cite {
            paper_id,
            style,
            all,
        } => {
            let paper = assistant.paper(&paper_id).await?;
            let fields = CitationFields::from_record(&paper);
            if all {
                print_json(&assistant.citations().format_all(&fields).await?)
            } else {
                print_json(&assistant.citations().format(&fields, &style).await?)
            }
        }
        Command::Route { query } => print_json(&assistant.route(&query).await?),
        Command::Index { paper_ids } => {
            let report = assistant.index_papers(&paper_ids).await?;
            for failure in &report.failed {
                tracing::warn!("could not index {}: {}", failure.id, failure.error);
            }
            print_json(&report)
        }
        Command::Stats => print_json(&assistant.stats().await?),
    }
}

#[cfg(feature = "gateway")]
async fn serve(
    assistant: Assistant<AnyProvider>,
    config: &Config,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    health_check(assistant.rag().provider()).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let bind = bind.unwrap_or_else(|| config.gateway.bind.clone());
    let port = port.unwrap_or(config.gateway.port);
    GatewayServer::new(&bind, port, Arc::new(assistant), shutdown_rx)
        .with_rate_limit(config.gateway.rate_limit)
        .with_max_body_size(config.gateway.max_body_size)
        .serve()
        .await
        .context("gateway failed")?;
    Ok(())
}

async fn ask_streaming(assistant: &Assistant<AnyProvider>, question: &str) -> anyhow::Result<()> {
    let mut answer = assistant.rag().stream(question).await?;
    let mut stdout = std::io::stdout().lock();
    while let Some(chunk) = answer.chunks.next().await {
        write!(stdout, "{}", chunk?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    if !answer.sources.is_empty() {
        writeln!(stdout, "\nSources:")?;
        for (i, source) in answer.sources.iter().enumerate() {
            writeln!(stdout, "  [{}] {} ({})", i + 1, source.title, source.id)?;
        }
    }
    Ok(())
}

#[cfg(feature = "gateway")]
async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn summary_options(
    format: &str,
    max_length: Option<usize>,
    num_points: Option<usize>,
) -> anyhow::Result<SummaryOptions> {
    let defaults = SummaryOptions::default();
    Ok(SummaryOptions {
        format: format.parse::<SummaryFormat>()?,
        max_length: max_length.unwrap_or(defaults.max_length),
        num_points: num_points.unwrap_or(defaults.num_points),
    })
}

fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("PAPYRUS_CONFIG")
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_subscriber(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let timeout = Duration::from_secs(config.timeouts.request_seconds);
    match config.llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(
            OllamaProvider::new(
                &config.llm.base_url,
                config.llm.model.clone(),
                config.llm.embedding_model.clone(),
            )
            .with_timeout(timeout),
        )),
        ProviderKind::OpenAi => {
            let Some(key) = config.secrets.openai_api_key.as_ref() else {
                bail!("PAPYRUS_OPENAI_API_KEY is required for the openai provider");
            };
            let openai = config.llm.openai.clone().unwrap_or_default();
            Ok(AnyProvider::OpenAi(
                OpenAiProvider::new(
                    key.expose().to_owned(),
                    openai.base_url,
                    openai.model,
                    config.llm.max_tokens,
                    Some(openai.embedding_model),
                )
                .with_temperature(config.llm.temperature)
                .with_client(client_with_timeout(timeout)),
            ))
        }
    }
}

async fn create_store(config: &Config, provider: &AnyProvider) -> anyhow::Result<DocumentStore> {
    let backend: Box<dyn VectorStore> = match config.store.backend {
        StoreBackend::Sqlite => {
            let path = &config.store.sqlite_path;
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            Box::new(
                SqliteVectorStore::new(path)
                    .await
                    .with_context(|| format!("failed to open sqlite store at {path}"))?,
            )
        }
        StoreBackend::Qdrant => {
            let url = &config.store.qdrant_url;
            Box::new(
                QdrantOps::new(url)
                    .map_err(|e| anyhow::anyhow!("failed to create Qdrant client for {url}: {e}"))?,
            )
        }
        StoreBackend::Memory => Box::new(InMemoryVectorStore::new()),
    };
    tracing::info!(
        "document store: {} backend, collection {}",
        config.store.backend.as_str(),
        config.store.collection
    );
    Ok(DocumentStore::new(backend, provider.embed_fn()).with_collection(&config.store.collection))
}

fn build_assistant(
    config: &Config,
    provider: AnyProvider,
    store: DocumentStore,
) -> anyhow::Result<Assistant<AnyProvider>> {
    let prompts = match config.prompts.dir.as_deref() {
        Some(dir) => PromptManager::from_dir(Path::new(dir))
            .with_context(|| format!("failed to load prompt templates from {dir}"))?,
        None => PromptManager::default(),
    };

    let timeout = Duration::from_secs(config.timeouts.request_seconds);
    let source = ArxivClient::new(&config.papers.base_url)
        .with_client(client_with_timeout(timeout))
        .with_full_text(config.papers.fetch_full_text);
    let loader = PaperLoader::new(Arc::new(source))
        .with_default_max_results(config.papers.default_max_results)
        .with_cache_ttl(Duration::from_secs(config.papers.cache_ttl_secs));

    tracing::info!("using {} provider", config.llm.provider);
    Ok(Assistant::from_config(
        provider,
        Arc::new(loader),
        Arc::new(store),
        Arc::new(prompts),
        config,
    ))
}
