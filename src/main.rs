use std::env;
use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};

use kubernetriks_cache::config::{CacheConfig, PluginConfig};
use kubernetriks_cache::core::cache::cache::Cache;
use kubernetriks_cache::core::cache::handler::CacheHandler;
use kubernetriks_cache::core::cache::snapshot::{new_empty_snapshot, NodeInfoLister};
use kubernetriks_cache::core::events::ClusterEvents;
use kubernetriks_cache::core::pod::Pod;
use kubernetriks_cache::core::scheduler::load_aware::LOAD_AWARE_NAME;
use kubernetriks_cache::core::scheduler::score_profile::ScoreProfile;
use kubernetriks_cache::printer::{print_node_scores, OutputConfig, OutputFormat};

/// Replays cluster events into a scheduler cache, takes a snapshot of it and scores a pod on
/// every node of the snapshot.
#[derive(Parser)]
struct Args {
    #[clap(short, long)]
    config_file: PathBuf,
    #[clap(long)]
    cluster_events_file: PathBuf,
    #[clap(short, long)]
    pod_file: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    // log level INFO by default
    let mut env_logger_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        env_logger_builder.filter_level(log::LevelFilter::Info);
    }
    env_logger_builder.init();

    let args = Args::parse();

    info!("Path to config file: {:?}", args.config_file);
    info!("Path to cluster events file: {:?}", args.cluster_events_file);
    info!("Path to pod file: {:?}", args.pod_file);

    let config = CacheConfig::from_file(&args.config_file)?;
    let cluster_events =
        ClusterEvents::from_yaml(&std::fs::read_to_string(&args.cluster_events_file)?)?;
    let pod: Pod = serde_yaml::from_str(&std::fs::read_to_string(&args.pod_file)?)?;

    let handler = CacheHandler::from_config(&config);
    let mut cache = Cache::new(handler.clone());
    let total_events = cluster_events.events.len();
    let mut failed_events = 0;
    for event in cluster_events.events.into_iter() {
        let kind = event.kind();
        if let Err(err) = cache.handle(event) {
            warn!("Failed to handle {} event: {}", kind, err);
            failed_events += 1;
        }
    }
    info!(
        "Replayed {} events ({} failed), cache holds {} nodes and {} pods",
        total_events,
        failed_events,
        cache.node_count(),
        cache.pod_count()
    );

    let mut snapshot = new_empty_snapshot(handler);
    cache.update_snapshot(&mut snapshot)?;
    info!(
        "Snapshot at generation {} lists {} nodes, {} in partition of scheduler {:?}",
        snapshot.generation(),
        snapshot.num_nodes(),
        snapshot.in_partition_list().len(),
        snapshot.handler().scheduler_name()
    );

    let plugins = if config.plugins.is_empty() {
        vec![PluginConfig {
            name: LOAD_AWARE_NAME.to_string(),
            weight: 1,
            args: None,
        }]
    } else {
        config.plugins.clone()
    };
    let profile = ScoreProfile::from_config(&plugins)?;
    info!("Scoring pod {} with plugins {:?}", pod.key(), profile.plugin_names());

    let node_scores = profile.score_nodes(&snapshot, &pod)?;
    let output = config.output.clone().unwrap_or(OutputConfig {
        format: OutputFormat::PrettyTable,
        output_file: None,
    });
    print_node_scores(&pod.key(), &node_scores, &output)?;
    Ok(())
}
