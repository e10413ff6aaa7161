//! kiln CLI - Command line interface for kiln_cache
//!
//! Computes checksum trees for a target graph, explains differences between
//! two trees, and moves build products in and out of the configured cache.
//! Results go to stdout as JSON; logs go to stderr.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kiln_cache::{
    build_parameters_checksum, render_diff, BuildProductCacheKey, BuildProductCacheStorage,
    CacheConfig, Checksum, FsChecksumProducer, ProjectChecksumCalculator, ProjectGraph,
    RootChecksumHolder, TargetInfo, TargetInfoFilter, TargetInfoProvider, TreeNodeConvertible,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "A content-addressed cache for build products")]
#[command(version)]
struct Cli {
    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Cache configuration file (JSON); KILN_* environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log more (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

/// Build configuration the cache keys are computed for
#[derive(Args)]
struct BuildParams {
    /// JSON object of build settings, e.g. {"CONFIGURATION": "Debug"}
    #[arg(long, conflicts_with = "params_checksum")]
    params: Option<PathBuf>,

    /// Precomputed build-parameters checksum (hex)
    #[arg(long)]
    params_checksum: Option<String>,
}

impl BuildParams {
    fn checksum(&self) -> anyhow::Result<Checksum> {
        if let Some(hex) = &self.params_checksum {
            return Ok(Checksum::from_hex(hex)?);
        }
        let parameters: BTreeMap<String, String> = match &self.params {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading build parameters {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("parsing build parameters {}", path.display()))?
            }
            None => BTreeMap::new(),
        };
        Ok(build_parameters_checksum(&parameters)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the checksum tree of a target graph
    Checksum {
        /// Graph manifest (JSON)
        #[arg(short, long)]
        graph: PathBuf,
        /// Where to write the checksum tree
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Explain what changed between two checksum trees
    Diff {
        /// The older checksum tree
        #[arg(long)]
        first: PathBuf,
        /// The newer checksum tree
        #[arg(long)]
        second: PathBuf,
    },

    /// List the dependency closure of a target with its cache keys
    Targets {
        /// Root target name
        target: String,
        /// Checksum tree to read
        #[arg(long)]
        checksums: PathBuf,
        #[command(flatten)]
        params: BuildParams,
    },

    /// Look a product up in the cache
    Lookup {
        /// Product name, e.g. Kit.framework
        product: String,
        #[arg(long)]
        checksums: PathBuf,
        #[command(flatten)]
        params: BuildParams,
    },

    /// Put a built product into the cache
    Store {
        /// Product name, e.g. Kit.framework
        product: String,
        /// Path of the built product
        #[arg(long)]
        artifact: PathBuf,
        #[arg(long)]
        checksums: PathBuf,
        #[command(flatten)]
        params: BuildParams,
    },

    /// Checksum the graph, then report which frameworks a target needs are cached
    Prepare {
        /// Root target name
        target: String,
        #[arg(short, long)]
        graph: PathBuf,
        /// Where to write the checksum tree
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        params: BuildParams,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Checksum { graph, output: out } => {
            let tree = calculate(graph)?;
            tree.save(out)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "checksum": tree.checksum.to_hex(),
                    "projects": tree.projects.len(),
                    "targets": tree.targets().count(),
                    "output": out.display().to_string()
                }),
            )?;
        }

        Commands::Diff { first, second } => {
            let old = RootChecksumHolder::load(first)?.node();
            let new = RootChecksumHolder::load(second)?.node();
            let rendered = render_diff(&old, &new);
            match cli.format {
                OutputFormat::Text => print!("{}", rendered),
                OutputFormat::Json => output(
                    &cli.format,
                    &serde_json::json!({
                        "status": "ok",
                        "changed": old.value != new.value,
                        "diff": rendered
                    }),
                )?,
            }
        }

        Commands::Targets {
            target,
            checksums,
            params,
        } => {
            let provider = TargetInfoProvider::load(checksums)?;
            let infos = provider.dependencies(target, &params.checksum()?)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "target": target,
                    "count": infos.len(),
                    "targets": infos
                }),
            )?;
        }

        Commands::Lookup {
            product,
            checksums,
            params,
        } => {
            let info = TargetInfoProvider::load(checksums)?.target_info(product, &params.checksum()?)?;
            let key = cache_key(&info);
            let storage = load_config(cli.config.as_deref())?.storage()?;
            let hit = storage.lookup(&key)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key.to_string(),
                    "hit": hit.is_some(),
                    "path": hit.map(|v| v.path.display().to_string())
                }),
            )?;
        }

        Commands::Store {
            product,
            artifact,
            checksums,
            params,
        } => {
            let info = TargetInfoProvider::load(checksums)?.target_info(product, &params.checksum()?)?;
            let key = cache_key(&info);
            let storage = load_config(cli.config.as_deref())?.storage()?;
            storage
                .store(&key, artifact)
                .with_context(|| format!("storing {}", key))?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key.to_string()
                }),
            )?;
        }

        Commands::Prepare {
            target,
            graph,
            output: out,
            params,
        } => {
            let build_parameters = params.checksum()?;
            let tree = calculate(graph)?;
            let provider = TargetInfoProvider::new(tree);
            provider.save_checksum(out)?;

            let filter = TargetInfoFilter::new(&provider);
            let required = filter.obtain_required_targets(target, &build_parameters)?;
            let frameworks = filter.framework_target_infos(&required);

            let storage = load_config(cli.config.as_deref())?.storage()?;
            let mut hits = Vec::new();
            let mut misses = Vec::new();
            for info in &frameworks {
                let key = cache_key(info);
                match storage.lookup(&key) {
                    Ok(Some(value)) => hits.push(serde_json::json!({
                        "target": info.target_name,
                        "product": info.product_name,
                        "path": value.path.display().to_string()
                    })),
                    Ok(None) => misses.push(serde_json::json!({
                        "target": info.target_name,
                        "product": info.product_name,
                        "key": key.to_string()
                    })),
                    // One unreadable entry must not hide the rest of the report
                    Err(e) => {
                        warn!(key = %key, error = %e, "cache lookup failed, counting as miss");
                        misses.push(serde_json::json!({
                            "target": info.target_name,
                            "product": info.product_name,
                            "key": key.to_string(),
                            "error": e.to_string()
                        }));
                    }
                }
            }

            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "checksum": provider.checksum_holder().checksum.to_hex(),
                    "required": required.len(),
                    "hits": hits,
                    "misses": misses
                }),
            )?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn calculate(graph: &Path) -> anyhow::Result<RootChecksumHolder> {
    let graph = ProjectGraph::load(graph)
        .with_context(|| format!("loading graph {}", graph.display()))?;
    Ok(ProjectChecksumCalculator::new(FsChecksumProducer::new()).calculate(&graph)?)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CacheConfig> {
    CacheConfig::load(path).context("loading cache configuration")
}

fn cache_key(info: &TargetInfo) -> BuildProductCacheKey {
    BuildProductCacheKey::new(info.product_name.clone(), info.product_type, info.checksum)
}

fn output(format: &OutputFormat, value: &serde_json::Value) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(value)?);
        }
        OutputFormat::Text => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}
