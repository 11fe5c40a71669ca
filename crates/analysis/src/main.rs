//! PaperLineage CLI
//!
//! Batch entry point for the analysis pipeline:
//! - `analyze`: graph, inheritance, comparison and evolution as one JSON report
//! - `embed`: fill in missing embeddings through the configured provider
//! - `reduce` / `cluster`: inspect the embedding space
//! - `db-init` / `db-import`: manage the PostgreSQL store

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use paperlineage_analysis::clustering::kmeans;
use paperlineage_analysis::reduction::{stress, trustworthiness};
use paperlineage_analysis::{Pipeline, Reducer};
use paperlineage_common::config::{AppConfig, BucketWidth, ObservabilityConfig, WeightingScheme};
use paperlineage_common::db::{DbPool, PgPaperStore};
use paperlineage_common::embeddings::{create_embedder, embed_missing};
use paperlineage_common::metrics::{self, EMBEDDING_BUCKETS, STAGE_BUCKETS};
use paperlineage_common::{AppError, PaperId, PaperStore, Snapshot, VERSION};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lineage", version, about = "Citation-aware inheritance analysis")]
struct Cli {
    /// Configuration file (defaults to config/default + APP__ overrides)
    #[arg(long, global = true, env = "LINEAGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full analysis and emit a JSON report
    Analyze(AnalyzeArgs),
    /// Generate embeddings for papers that lack one
    Embed(EmbedArgs),
    /// Project embeddings to a few dimensions
    Reduce(ReduceArgs),
    /// Cluster embeddings with k-means
    Cluster(ClusterArgs),
    /// Create the PostgreSQL schema
    DbInit,
    /// Load a snapshot file into PostgreSQL
    DbImport {
        #[arg(long)]
        snapshot: PathBuf,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Source {
    /// Snapshot JSON file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Read from the configured database instead
    #[arg(long)]
    database: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum WeightingArg {
    Uniform,
    Recency,
    OutDegree,
    InDegree,
    EdgeConfidence,
}

#[derive(Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    source: Source,

    /// Write the report here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Override the configured predecessor weighting
    #[arg(long, value_enum)]
    weighting: Option<WeightingArg>,

    /// Half-life for recency weighting
    #[arg(long, default_value_t = 365.0)]
    half_life_days: f64,

    /// Bucket width for the evolution table, in years
    #[arg(long)]
    bucket_years: Option<u32>,

    /// Score papers on one thread
    #[arg(long)]
    sequential: bool,
}

#[derive(Args)]
struct EmbedArgs {
    #[command(flatten)]
    source: Source,

    /// Output snapshot (required with --snapshot)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    Pca,
    Tsne,
    Umap,
}

#[derive(Args)]
struct ReduceArgs {
    #[arg(long)]
    snapshot: PathBuf,

    #[arg(long, value_enum, default_value = "pca")]
    method: Method,

    #[arg(long, default_value_t = 2)]
    components: usize,

    #[arg(long, default_value_t = 30.0)]
    perplexity: f64,

    #[arg(long, default_value_t = 1000)]
    iterations: usize,

    #[arg(long, default_value_t = 200.0)]
    learning_rate: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Size of the fuzzy neighbourhood graph for UMAP
    #[arg(long, default_value_t = 15)]
    umap_neighbors: usize,

    #[arg(long, default_value_t = 200)]
    epochs: usize,

    /// Neighbourhood size for the trustworthiness score
    #[arg(long, default_value_t = 5)]
    neighbors: usize,

    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct ClusterArgs {
    #[arg(long)]
    snapshot: PathBuf,

    #[arg(long)]
    k: usize,

    #[arg(long, default_value_t = 300)]
    max_iter: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(&path.to_string_lossy()),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config.observability);
    info!(service = %config.observability.service_name, "Starting PaperLineage v{}", VERSION);

    if config.observability.metrics_port != 0 {
        init_metrics(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    let span = info_span!("lineage", service = %config.observability.service_name);
    let result = run(cli.command, config).instrument(span).await;

    if let Err(err) = &result {
        match err.chain().find_map(|cause| cause.downcast_ref::<AppError>()) {
            Some(app) => error!(code = app.code().as_code(), kind = ?app.code(), error = %err, "Command failed"),
            None => error!(error = %err, "Command failed"),
        }
    }
    result
}

async fn run(command: Command, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Analyze(args) => analyze(config, args).await,
        Command::Embed(args) => embed(&config, args).await,
        Command::Reduce(args) => reduce(args).await,
        Command::Cluster(args) => cluster(args).await,
        Command::DbInit => {
            let pool = connect(&config).await?;
            pool.init_schema().await?;
            Ok(())
        }
        Command::DbImport { snapshot } => {
            let snapshot = Snapshot::load(&snapshot).await?;
            let store = PgPaperStore::new(connect(&config).await?);
            store.import_snapshot(&snapshot).await?;
            Ok(())
        }
    }
}

/// Open the pool and make sure the server answers
async fn connect(config: &AppConfig) -> anyhow::Result<DbPool> {
    let pool = DbPool::new(&config.database).await?;
    pool.ping().await?;
    Ok(pool)
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&observability.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so reports on stdout stay machine-readable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Suffix("stage_duration_seconds".to_string()), STAGE_BUCKETS)?
        .set_buckets_for_metric(Matcher::Suffix("embedding_duration_seconds".to_string()), EMBEDDING_BUCKETS)?
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

async fn load_source(config: &AppConfig, source: &Source) -> anyhow::Result<Snapshot> {
    match &source.snapshot {
        Some(path) => Ok(Snapshot::load(path).await?),
        None => {
            let store = PgPaperStore::new(connect(config).await?);
            Ok(store.load_snapshot().await?)
        }
    }
}

async fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Output written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn analyze(mut config: AppConfig, args: AnalyzeArgs) -> anyhow::Result<()> {
    if let Some(weighting) = args.weighting {
        config.analysis.inheritance.weighting = match weighting {
            WeightingArg::Uniform => WeightingScheme::Uniform,
            WeightingArg::Recency => WeightingScheme::Recency {
                half_life_days: args.half_life_days,
            },
            WeightingArg::OutDegree => WeightingScheme::OutDegree,
            WeightingArg::InDegree => WeightingScheme::InDegree,
            WeightingArg::EdgeConfidence => WeightingScheme::EdgeConfidence,
        };
    }
    if let Some(years) = args.bucket_years {
        config.analysis.evolution.bucket_width = BucketWidth::Years(years);
    }
    if args.sequential {
        config.analysis.inheritance.parallel = false;
    }

    let snapshot = load_source(&config, &args.source).await?;
    let pipeline = Pipeline::new(config.analysis.clone());

    // The pipeline is CPU bound
    let report = tokio::task::spawn_blocking(move || pipeline.run(&snapshot)).await??;

    if !report.graph.report.is_clean() {
        warn!(
            cycles = report.graph.report.cycles.len(),
            unknown = report.graph.report.unknown_edges.len(),
            "Input needed corrections; see graph.report"
        );
    }
    write_json(&report, args.out.as_deref()).await
}

async fn embed(config: &AppConfig, args: EmbedArgs) -> anyhow::Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    info!(
        model = %embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder initialized"
    );

    match &args.source.snapshot {
        Some(input) => {
            let Some(out) = args.out.as_deref() else {
                bail!("--out is required when embedding a snapshot file");
            };
            let mut snapshot = Snapshot::load(input).await?;
            let embedded = embed_missing(
                embedder.as_ref(),
                &mut snapshot.papers,
                config.embedding.batch_size,
                config.embedding.concurrency,
            )
            .await?;
            snapshot.save(out).await?;
            info!(embedded, path = %out.display(), "Snapshot written");
        }
        None => {
            let store = PgPaperStore::new(connect(config).await?);
            let mut snapshot = store.load_snapshot().await?;
            let missing: HashSet<PaperId> = snapshot
                .papers
                .iter()
                .filter(|p| !p.is_embedded())
                .map(|p| p.id.clone())
                .collect();

            embed_missing(
                embedder.as_ref(),
                &mut snapshot.papers,
                config.embedding.batch_size,
                config.embedding.concurrency,
            )
            .await?;

            let fresh: Vec<(PaperId, Vec<f32>)> = snapshot
                .papers
                .into_iter()
                .filter(|p| missing.contains(&p.id))
                .filter_map(|p| p.embedding.map(|e| (p.id, e)))
                .collect();
            let updated = store.store_embeddings(&fresh).await?;
            info!(updated, "Embeddings stored");
        }
    }
    Ok(())
}

/// Embedded papers as parallel id and vector lists
fn embedded(snapshot: &Snapshot) -> (Vec<PaperId>, Vec<Vec<f32>>) {
    snapshot
        .papers
        .iter()
        .filter_map(|p| p.embedding.clone().map(|e| (p.id.clone(), e)))
        .unzip()
}

#[derive(Serialize)]
struct Point {
    id: PaperId,
    coordinates: Vec<f32>,
}

#[derive(Serialize)]
struct ReductionOutput {
    reducer: Reducer,
    stress: f64,
    trustworthiness: Option<f64>,
    points: Vec<Point>,
}

async fn reduce(args: ReduceArgs) -> anyhow::Result<()> {
    let snapshot = Snapshot::load(&args.snapshot).await?;
    let (ids, vectors) = embedded(&snapshot);
    if vectors.is_empty() {
        bail!("snapshot has no embedded papers");
    }

    let reducer = match args.method {
        Method::Pca => Reducer::pca(args.components),
        Method::Tsne => Reducer::Tsne {
            components: args.components,
            perplexity: args.perplexity,
            iterations: args.iterations,
            learning_rate: args.learning_rate,
            seed: args.seed,
        },
        Method::Umap => Reducer::Umap {
            components: args.components,
            neighbors: args.umap_neighbors,
            epochs: args.epochs,
            seed: args.seed,
        },
    };

    let neighbors = args.neighbors;
    let output = tokio::task::spawn_blocking(move || -> anyhow::Result<ReductionOutput> {
        let reduced = reducer.reduce(&vectors)?;
        let trust = trustworthiness(&vectors, &reduced, neighbors).ok();
        Ok(ReductionOutput {
            reducer,
            stress: stress(&vectors, &reduced)?,
            trustworthiness: trust,
            points: ids
                .into_iter()
                .zip(reduced)
                .map(|(id, coordinates)| Point { id, coordinates })
                .collect(),
        })
    })
    .await??;

    info!(stress = output.stress, trustworthiness = ?output.trustworthiness, "Reduction finished");
    write_json(&output, args.out.as_deref()).await
}

#[derive(Serialize)]
struct Assignment {
    id: PaperId,
    cluster: usize,
    category: Option<String>,
}

#[derive(Serialize)]
struct ClusterOutput {
    k: usize,
    inertia: f64,
    iterations: usize,
    sizes: Vec<usize>,
    assignments: Vec<Assignment>,
}

async fn cluster(args: ClusterArgs) -> anyhow::Result<()> {
    let snapshot = Snapshot::load(&args.snapshot).await?;
    let (ids, vectors) = embedded(&snapshot);

    let result = kmeans(&vectors, args.k, args.max_iter, args.seed)?;
    let categories: HashMap<&PaperId, Option<String>> =
        snapshot.papers.iter().map(|p| (&p.id, p.category.clone())).collect();

    let output = ClusterOutput {
        k: args.k,
        inertia: result.inertia,
        iterations: result.iterations,
        sizes: result.cluster_sizes(),
        assignments: ids
            .iter()
            .zip(&result.labels)
            .map(|(id, &cluster)| Assignment {
                id: id.clone(),
                cluster,
                category: categories.get(id).cloned().flatten(),
            })
            .collect(),
    };

    info!(k = args.k, inertia = output.inertia, "Clustering finished");
    write_json(&output, args.out.as_deref()).await
}
