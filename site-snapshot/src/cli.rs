//! CLI interface for site-snapshot: argument parsing, config assembly and
//! human-readable progress output.
//!
//! All snapshot, mirror and rewrite logic lives in `site-snapshot-core`. This
//! module only wires configuration into it and maps outcomes to output and
//! exit codes (see [`exit_code`]).
//!
//! For programmatic or integration use, call [`run`] with a constructed [`Cli`].
use crate::load_config::{load_config, validate_url, ElasticsearchSection};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use site_snapshot_core::elasticsearch::ElasticsearchAdmin;
use site_snapshot_core::error::SnapshotError;
use site_snapshot_core::identifier::resolve_snapshot_id;
use site_snapshot_core::index::{
    AdminEndpoint, SnapshotRequest, DEFAULT_INDEX_PREFIX, DEFAULT_SOURCE_INDEX,
};
use site_snapshot_core::pipeline::{create_site_snapshot, PipelineError, SearchSnapshot};
use site_snapshot_core::snapshot::{SnapshotOptions, Snapshotter};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// CLI for site-snapshot: static Drupal exports backed by a frozen search index.
#[derive(Parser)]
#[clap(
    name = "site-snapshot",
    version,
    about = "Create static snapshots of a Drupal site and clone its Elasticsearch index"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Freeze, clone and unfreeze an Elasticsearch index
    EsSnapshot(EsSnapshotArgs),
    /// Mirror the site, patch it for static hosting and snapshot its search index
    SnapshotCreate {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Snapshot identifier; defaults to the current Unix timestamp
        #[clap(long, env = "SNAPSHOT_ID")]
        id: Option<String>,
        /// Skip the index snapshot even if the config has an elasticsearch section
        #[clap(long)]
        skip_search: bool,
    },
}

#[derive(Args)]
pub struct EsSnapshotArgs {
    /// Elasticsearch base URL, e.g. https://drupal.ddev.site:9201
    #[clap(long, env = "ELASTICSEARCH_URL")]
    pub url: String,
    #[clap(long, env = "ELASTICSEARCH_USERNAME", default_value = "")]
    pub username: String,
    #[clap(long, env = "ELASTICSEARCH_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    /// Source index name without the prefix
    #[clap(long, env = "ELASTICSEARCH_INDEX", default_value = DEFAULT_SOURCE_INDEX)]
    pub index: String,
    #[clap(long, env = "ELASTICSEARCH_INDEX_PREFIX", default_value = DEFAULT_INDEX_PREFIX)]
    pub prefix: String,
    /// Snapshot identifier; defaults to the current Unix timestamp
    #[clap(long, env = "SNAPSHOT_ID")]
    pub id: Option<String>,
    /// Per-request timeout in seconds
    #[clap(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,
    /// Wait for the clone to reach yellow health before reporting success
    #[clap(long)]
    pub wait_for_clone: bool,
}

/// Exit code for a failed run: step-specific for snapshot failures, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<SnapshotError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<PipelineError>() {
        return e.exit_code();
    }
    1
}

/// Drive `fut` to completion even if Ctrl-C arrives: once the source index is
/// frozen the unfreeze has to be attempted.
async fn run_to_completion<F: Future>(fut: F) -> F::Output {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => return out,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupt received; finishing the current step sequence so the source index is not left read-only");
                eprintln!("Interrupt received, finishing current sequence...");
            }
        }
    }
}

fn build_snapshotter(
    endpoint: AdminEndpoint,
    timeout: Duration,
    wait_for_clone: bool,
) -> Result<Snapshotter<ElasticsearchAdmin>> {
    let admin = ElasticsearchAdmin::new(endpoint, timeout)
        .context("Failed to build Elasticsearch client")?;
    Ok(Snapshotter::new(admin).with_options(SnapshotOptions {
        wait_for_clone: wait_for_clone.then_some(timeout),
    }))
}

async fn es_snapshot(args: EsSnapshotArgs) -> Result<()> {
    validate_url("--url", &args.url)?;
    let snapshot_id = resolve_snapshot_id(args.id.as_deref());
    let request = SnapshotRequest::new(&args.prefix, &args.index, &snapshot_id)?;
    let endpoint = AdminEndpoint::new(&args.url)
        .with_credentials(Some(args.username), Some(args.password));
    let timeout = Duration::from_secs(args.timeout_secs);
    let snapshotter = build_snapshotter(endpoint, timeout, args.wait_for_clone)?;

    println!(
        "Snapshot starting: {} -> {}",
        request.source, request.snapshot
    );
    match run_to_completion(snapshotter.snapshot(&request)).await {
        Ok(report) => {
            tracing::info!(command = "es-snapshot", ?report, "Index snapshot complete");
            println!("Snapshot complete: {}", report.snapshot);
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "es-snapshot", error = %e, "Index snapshot failed");
            Err(e.into())
        }
    }
}

async fn snapshot_create(config: PathBuf, id: Option<String>, skip_search: bool) -> Result<()> {
    let config = load_config(config)?;
    let pipeline_config = config.site.to_pipeline_config();

    let search_parts = match (&config.elasticsearch, skip_search) {
        (Some(es), false) => Some(search_setup(es, id.as_deref())?),
        _ => None,
    };
    let search = search_parts
        .as_ref()
        .map(|(snapshotter, request)| SearchSnapshot {
            snapshotter,
            request: request.clone(),
        });

    println!("Snapshot starting: {}", config.site.url);
    let report = match run_to_completion(create_site_snapshot(&pipeline_config, search)).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(command = "snapshot-create", error = %e, "Static snapshot failed");
            return Err(e.into());
        }
    };

    tracing::info!(command = "snapshot-create", ?report, "Static snapshot complete");
    println!("Snapshot created in {}", report.site_dir.display());
    println!(
        "  static rewrites: {} of {} files changed",
        report.static_rewrites.files_changed, report.static_rewrites.files_scanned
    );
    if let (Some(snapshot), Some(rewrites)) = (&report.index_snapshot, &report.index_rewrites) {
        println!(
            "  search index: {} ({} files retargeted)",
            snapshot.snapshot, rewrites.files_changed
        );
    }
    println!(
        "View it locally with: npx http-server {}/",
        report.site_dir.display()
    );
    Ok(())
}

fn search_setup(
    es: &ElasticsearchSection,
    id: Option<&str>,
) -> Result<(Snapshotter<ElasticsearchAdmin>, SnapshotRequest)> {
    let snapshot_id = resolve_snapshot_id(id);
    let request = SnapshotRequest::new(&es.index_prefix, &es.source_index, &snapshot_id)?;
    let snapshotter = build_snapshotter(es.endpoint(), es.timeout(), es.wait_for_clone)?;
    Ok((snapshotter, request))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    let command = match &cli.command {
        Commands::EsSnapshot(_) => "es-snapshot",
        Commands::SnapshotCreate { .. } => "snapshot-create",
    };
    tracing::info!(command, "command_started");

    match cli.command {
        Commands::EsSnapshot(args) => es_snapshot(args).await,
        Commands::SnapshotCreate {
            config,
            id,
            skip_search,
        } => snapshot_create(config, id, skip_search).await,
    }
}
