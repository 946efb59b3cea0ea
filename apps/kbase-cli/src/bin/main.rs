use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kbase_core::config::{Config, Settings};
use kbase_core::data_processor::DataProcessor;
use kbase_vector::{CorpusIndexer, KnowledgeBase, SnapshotStore};

#[derive(Debug, Parser)]
#[command(name = "kbase", about = "Build and query versioned document snapshots")]
struct Cli {
    /// Directory holding config.toml and config.<env>.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Configuration environment (dev, prod, test)
    #[arg(long, global = true, env = "RUST_ENV", default_value = "dev")]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fit a snapshot from a directory of .txt/.md files and save it
    Ingest(IngestArgs),
    /// Rank stored documents against a query
    Query(QueryArgs),
    /// List complete snapshot versions
    Versions,
}

#[derive(Debug, Args)]
struct IngestArgs {
    /// Corpus directory (defaults to data.raw_txt_dir)
    data_dir: Option<PathBuf>,

    /// Snapshot version to write (defaults to index.version)
    #[arg(long)]
    version: Option<String>,

    /// Embedding dimension (defaults to reducer.components)
    #[arg(long)]
    components: Option<usize>,

    /// Read at most this many files
    #[arg(long)]
    limit: Option<usize>,

    /// Replace an existing snapshot of the same version
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Args)]
struct QueryArgs {
    query: String,

    #[arg(long, short = 'k')]
    top_k: Option<usize>,

    /// Snapshot version to query (defaults to index.version)
    #[arg(long)]
    version: Option<String>,

    /// Min-max rescale scores into [0, 1]
    #[arg(long)]
    normalize: bool,

    /// Drop results scoring <= 0
    #[arg(long)]
    drop_non_positive: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load_for_env(&cli.config_dir, &cli.env)
        .with_context(|| format!("loading configuration from {}", cli.config_dir.display()))?;
    let settings = config.settings()?;

    match cli.command {
        Command::Ingest(args) => ingest(&config, &settings, args)?,
        Command::Query(args) => query(&config, args).await?,
        Command::Versions => versions(&config, &settings)?,
    }
    Ok(())
}

fn ingest(config: &Config, settings: &Settings, args: IngestArgs) -> Result<()> {
    let data_dir = args.data_dir.unwrap_or_else(|| config.resolve_path(&settings.data.raw_txt_dir));
    let version = args.version.unwrap_or_else(|| settings.index.version.clone());
    let store = SnapshotStore::new(config.resolve_path(&settings.index.snapshot_dir));
    if store.exists(&version) && !args.force {
        bail!("snapshot {version} already exists in {} (use --force to replace it)", store.base().display());
    }

    println!("📂 Reading corpus from {}", data_dir.display());
    let processor = DataProcessor::with_extensions(&settings.data.extensions);
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let limit = args.limit.or(settings.data.file_limit);
    let documents = processor.process_directory_with(&data_dir, limit, |i, total, path| {
        pb.set_length(total as u64);
        pb.set_position(i as u64 + 1);
        pb.set_message(path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
    })?;
    pb.finish_with_message("done");

    let mut indexer = CorpusIndexer::from_settings(settings);
    if let Some(k) = args.components {
        indexer = indexer.with_components(k);
    }
    let index = indexer.fit_raw(documents)?;
    store.save(&index, &version)?;
    info!(version = %version, "ingest complete");
    println!(
        "✅ Saved snapshot {version}: {} documents, {} terms, {} dimensions",
        index.len(),
        index.term_model().vocabulary_size(),
        index.reducer().components()
    );
    Ok(())
}

async fn query(config: &Config, args: QueryArgs) -> Result<()> {
    let mut kb = KnowledgeBase::from_config(config)?;
    if let Some(version) = args.version {
        kb = kb.with_version(version);
    }
    let mut options = *kb.options();
    options.normalize |= args.normalize;
    options.drop_non_positive |= args.drop_non_positive;
    let kb = kb.with_options(options);

    let hits = kb.retrieve(&args.query, args.top_k).await?;
    println!("🔍 {} results for \"{}\" (snapshot {})", hits.len(), args.query, kb.key().version);
    for (i, hit) in hits.iter().enumerate() {
        println!("  {}. score={:.4}  id={}", i + 1, hit.score, hit.document_id);
    }
    Ok(())
}

fn versions(config: &Config, settings: &Settings) -> Result<()> {
    let store = SnapshotStore::new(config.resolve_path(&settings.index.snapshot_dir));
    let versions = store.list_versions()?;
    if versions.is_empty() {
        println!("No snapshots in {}", store.base().display());
    }
    for version in versions {
        let marker = if version == settings.index.version { "*" } else { " " };
        println!("{marker} {version}");
    }
    Ok(())
}
