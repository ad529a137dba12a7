//! CLI entry point: create the golf-ball index, ingest a catalog CSV and query it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dimple_core::app_data;
use dimple_core::config::{default_config_path, DEFAULT_ENVIRONMENT};
use dimple_core::query::{DEFAULT_K, DEFAULT_TOP};
use dimple_core::{
    build_index_schema, ingest_catalog, parse_dimensions, require, run_query, AzureOpenAiEmbedder,
    ConfigSources, GolfBall, IndexManager, IngestOptions, SearchClient, SearchQuery, Settings,
};

const SAMPLE_QUERIES: [&str; 3] = [
    "Find golf balls with similar markings to Titleist Pro V1",
    "Show me white golf balls with arrow markings",
    "Find golf balls with high spin characteristics",
];

#[derive(Parser)]
#[command(name = "dimple")]
#[command(about = "Dimple: vector search over a golf-ball catalog")]
struct Cli {
    /// Config file layered over the per-environment files.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Selects dimple.{environment}.toml.
    #[arg(long, global = true, env = "DIMPLE_ENVIRONMENT", default_value = DEFAULT_ENVIRONMENT)]
    environment: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create the index, ingest the catalog and run the sample queries.
    Run {
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },
    /// Create or update the search index.
    Setup,
    /// Embed every catalog row and upload it to the index.
    Ingest {
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },
    /// Run one vector query against the index.
    Search {
        query: String,
        /// Nearest neighbours to retrieve.
        #[arg(short, long, default_value_t = DEFAULT_K)]
        k: u32,
        /// Maximum rows returned.
        #[arg(long, default_value_t = DEFAULT_TOP)]
        top: u32,
        /// OData filter expression, passed through unchanged.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Inspect or create the user config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print where the user config file lives.
    Path,
    /// Print the merged settings with keys masked.
    Show,
    /// Write a starter config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dimple=info,dimple_core=info"));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let sources = ConfigSources::new(cli.environment.clone(), cli.config.clone());

    match cli.command.unwrap_or(Commands::Run { csv: None }) {
        Commands::Run { csv } => cmd_run(&load_settings(&sources)?, csv).await,
        Commands::Setup => cmd_setup(&load_settings(&sources)?).await,
        Commands::Ingest { csv } => cmd_ingest(&load_settings(&sources)?, csv).await.map(|_| ()),
        Commands::Search {
            query,
            k,
            top,
            filter,
        } => {
            let mut query = SearchQuery::new(query).with_k(k).with_top(top);
            if let Some(f) = filter {
                query = query.with_filter(f);
            }
            let results = cmd_search(&load_settings(&sources)?, &query).await?;
            if results.is_empty() {
                tracing::warn!("No results for: {}", query.text);
            }
            print_results(&results);
            Ok(())
        }
        Commands::Config { action } => cmd_config(action, &sources, cli.config),
    }
}

fn load_settings(sources: &ConfigSources) -> Result<Settings> {
    Settings::load(sources).context("Configuration validation failed")
}

async fn cmd_run(settings: &Settings, csv: Option<PathBuf>) -> Result<()> {
    let azure = &settings.azure;
    tracing::info!(
        "Search endpoint: {}",
        azure.search_service_endpoint.as_deref().unwrap_or("<unset>")
    );
    tracing::info!(
        "OpenAI endpoint: {}",
        azure.openai_endpoint.as_deref().unwrap_or("<unset>")
    );
    tracing::info!(
        "Embedding model: {}",
        azure.openai_embedding_model.as_deref().unwrap_or("<unset>")
    );
    tracing::info!("Index name: {}", azure.index_name.as_deref().unwrap_or("<unset>"));

    cmd_setup(settings).await?;
    cmd_ingest(settings, csv).await?;

    for text in SAMPLE_QUERIES {
        tracing::info!("Query: {}", text);
        let results = cmd_search(settings, &SearchQuery::new(text)).await?;
        if results.is_empty() {
            tracing::warn!("No results for: {}", text);
            continue;
        }
        print_results(&results);
    }
    Ok(())
}

async fn cmd_setup(settings: &Settings) -> Result<()> {
    let schema = build_index_schema(&settings.azure)?;
    let client = search_client(settings)?;
    tracing::info!(
        "Creating or updating index {} ({} fields) on {}",
        client.index_name(),
        schema.fields.len(),
        client.endpoint()
    );
    client
        .create_or_update_index(&schema)
        .await
        .with_context(|| format!("Failed to create index {}", schema.name))?;
    tracing::info!("Index {} is ready", schema.name);
    Ok(())
}

/// Returns the number of documents the service accepted.
async fn cmd_ingest(settings: &Settings, csv: Option<PathBuf>) -> Result<usize> {
    let path = match csv.or_else(|| settings.ingest.csv_path.clone()) {
        Some(p) => p,
        None => locate_catalog()?,
    };
    tracing::info!("Using catalog {}", path.display());

    let dimensions = dimensions(settings)?;
    let embedder = embedder(settings, dimensions)?;
    tracing::info!("Embedding deployment: {} ({} dimensions)", embedder.deployment(), dimensions);
    let client = search_client(settings)?;
    let options = IngestOptions::new(dimensions).with_embed_concurrency(settings.embed_concurrency());

    let report = ingest_catalog(&path, &embedder, &client, &options).await?;
    println!("Indexed {} golf balls.", report.accepted());
    if !report.is_complete() {
        tracing::warn!(
            "{} of {} documents were rejected",
            report.failures().len(),
            report.records
        );
    }
    Ok(report.accepted())
}

async fn cmd_search(settings: &Settings, query: &SearchQuery) -> Result<Vec<GolfBall>> {
    let client = search_client(settings)?;
    let results = run_query(&client, query)
        .await
        .with_context(|| format!("Search failed: {}", query.text))?;
    Ok(results)
}

fn cmd_config(action: ConfigAction, sources: &ConfigSources, explicit: Option<PathBuf>) -> Result<()> {
    match action {
        ConfigAction::Path => match default_config_path() {
            Some(p) => println!("{}", p.display()),
            None => bail!("Could not determine the config directory"),
        },
        ConfigAction::Show => {
            let settings = Settings::load(sources)?;
            print!("{}", settings.redacted().to_toml()?);
        }
        ConfigAction::Init { force } => {
            let path = match explicit {
                Some(p) => p,
                None => app_data::ensure_config_dir()
                    .map(|d| d.join(dimple_core::config::CONFIG_FILENAME))
                    .context("Could not create the config directory")?,
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            Settings::template().save(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn search_client(settings: &Settings) -> Result<SearchClient> {
    let azure = &settings.azure;
    let client = SearchClient::new(
        require(&azure.search_service_endpoint, "azure.search_service_endpoint")?,
        require(&azure.search_admin_key, "azure.search_admin_key")?,
        require(&azure.index_name, "azure.index_name")?,
        settings.timeout(),
    )?;
    Ok(client)
}

fn embedder(settings: &Settings, dimensions: usize) -> Result<AzureOpenAiEmbedder> {
    let azure = &settings.azure;
    let embedder = AzureOpenAiEmbedder::new(
        require(&azure.openai_endpoint, "azure.openai_endpoint")?,
        require(&azure.openai_api_key, "azure.openai_api_key")?,
        require(&azure.openai_embedding_deployment, "azure.openai_embedding_deployment")?,
        settings.timeout(),
    )?;
    Ok(embedder.with_dimensions(dimensions))
}

fn dimensions(settings: &Settings) -> Result<usize> {
    let raw = require(
        &settings.azure.openai_embedding_dimensions,
        "azure.openai_embedding_dimensions",
    )?;
    Ok(parse_dimensions(raw)?)
}

/// First existing catalog among the usual locations.
fn locate_catalog() -> Result<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    let candidates = catalog_candidates(exe_dir.as_deref());

    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }
    let listed: Vec<String> = candidates
        .iter()
        .map(|p| format!("  {}", p.display()))
        .collect();
    bail!(
        "No catalog CSV found; looked in:\n{}\nPass one with --csv",
        listed.join("\n")
    )
}

fn catalog_candidates(exe_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("data").join("sample-data-b1.csv")];
    if let Some(dir) = exe_dir {
        candidates.push(dir.join("data").join("sample-data.csv"));
    }
    candidates.push(PathBuf::from("sample-data.csv"));
    if let Some(dir) = exe_dir {
        candidates.push(dir.join("sample-data.csv"));
    }
    candidates
}

fn print_results(results: &[GolfBall]) {
    for ball in results {
        println!("{}", "-".repeat(40));
        println!("Manufacturer: {}", ball.manufacturer);
        println!("Pole Marking: {}", ball.pole_marking);
        println!("Color: {}", ball.colour);
        println!("Seam Marking: {}", ball.seam_marking);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_check_working_dir_before_exe_dir() {
        let exe = Path::new("/opt/dimple/bin");
        let c = catalog_candidates(Some(exe));
        assert_eq!(c[0], PathBuf::from("data/sample-data-b1.csv"));
        assert_eq!(c[1], exe.join("data/sample-data.csv"));
        assert_eq!(c[2], PathBuf::from("sample-data.csv"));
        assert_eq!(c[3], exe.join("sample-data.csv"));
    }

    #[test]
    fn candidates_without_exe_dir() {
        assert_eq!(catalog_candidates(None).len(), 2);
    }

    #[test]
    fn missing_dimensions_is_reported_by_key() {
        let err = dimensions(&Settings::default()).unwrap_err();
        assert!(err.to_string().contains("azure.openai_embedding_dimensions"));
    }

    #[test]
    fn cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["dimple"]).unwrap();
        assert!(cli.command.is_none());
        let cli = Cli::try_parse_from(["dimple", "search", "white balls", "-k", "5"]).unwrap();
        match cli.command {
            Some(Commands::Search { query, k, top, filter }) => {
                assert_eq!(query, "white balls");
                assert_eq!(k, 5);
                assert_eq!(top, DEFAULT_TOP);
                assert!(filter.is_none());
            }
            _ => panic!("expected search"),
        }
    }
}
