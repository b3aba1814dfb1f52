//! ChainPipe CLI — follow a Cardano node and stream filtered chain events.
//!
//! # Usage
//! ```text
//! chainpipe --input-chainsync-network preview --input-chainsync-bulk-mode
//! chainpipe --filter chainsync --filter-chainsync-policy <hex> --output webhook \
//!           --output-webhook-url http://localhost:3000/events
//! chainpipe --list-plugins
//! ```

use anyhow::{Context, Result};
use clap::Parser;

use chainpipe_core::{Pipeline, StageKind, StageRegistry};
use chainpipe_output::EVENT_TARGET;

mod logging;
mod options;
mod plugins;

use logging::{init_tracing, LogConfig};
use options::Options;

#[derive(Parser, Debug)]
#[command(
    name = "chainpipe",
    about = "Cardano chain-sync pipeline — ChainPipe CLI",
    long_about = "
ChainPipe CLI: sync blocks and transactions from a Cardano node, filter them,
and deliver one JSON event per block, transaction and rollback.

ENVIRONMENT VARIABLES:
  RUST_LOG    Log filter directives, overriding --log-level
",
    version
)]
struct Cli {
    /// Input plugin
    #[arg(long, default_value = "chainsync")]
    input: String,

    /// Filter plugin (repeatable, applied in order)
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Output plugin
    #[arg(long, default_value = "log")]
    output: String,

    #[command(flatten)]
    options: Options,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// List available plugins and exit
    #[arg(long)]
    list_plugins: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let registry = plugins::registry();

    if cli.list_plugins {
        print_plugins(&registry);
        return Ok(());
    }

    // the log output writes events at info; keep them visible at any level
    init_tracing(&LogConfig::new(&cli.log_level, cli.log_json).component(EVENT_TARGET, "info"));

    let mut pipeline = build_pipeline(&cli, &registry)?;
    pipeline.start().await.context("failed to start pipeline")?;
    tracing::info!(input = %cli.input, filters = ?cli.filters, output = %cli.output, "Pipeline started");

    pipeline
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("pipeline failed")?;

    tracing::info!("Pipeline stopped");
    Ok(())
}

fn build_pipeline(cli: &Cli, registry: &StageRegistry<Options>) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new();
    pipeline.set_input(
        registry
            .build(StageKind::Input, &cli.input, &cli.options)
            .with_context(|| format!("cannot create input '{}'", cli.input))?,
    );
    for name in &cli.filters {
        pipeline.add_filter(
            registry
                .build(StageKind::Filter, name, &cli.options)
                .with_context(|| format!("cannot create filter '{name}'"))?,
        );
    }
    pipeline.set_output(
        registry
            .build(StageKind::Output, &cli.output, &cli.options)
            .with_context(|| format!("cannot create output '{}'", cli.output))?,
    );
    Ok(pipeline)
}

fn print_plugins(registry: &StageRegistry<Options>) {
    for kind in [StageKind::Input, StageKind::Filter, StageKind::Output] {
        println!("{kind}s:");
        for entry in registry.entries(kind) {
            println!("  {:<12} {}", entry.name, entry.description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["chainpipe"]).unwrap();
        assert_eq!(cli.input, "chainsync");
        assert_eq!(cli.output, "log");
        assert!(cli.filters.is_empty());
        assert_eq!(cli.options.webhook_url, chainpipe_output::DEFAULT_URL);
    }

    #[test]
    fn chainsync_flags_map_to_sync_config() {
        let cli = Cli::try_parse_from([
            "chainpipe",
            "--input-chainsync-network",
            "preprod",
            "--input-chainsync-network-magic",
            "42",
            "--input-chainsync-bulk-mode",
            "--input-chainsync-include-cbor",
            "--input-chainsync-intersect-point",
            "100.aabb",
            "--input-chainsync-intersect-point",
            "200.ccdd",
        ])
        .unwrap();
        let config = cli.options.sync_config();
        assert_eq!(config.network.as_deref(), Some("preprod"));
        assert!(config.bulk_mode && config.include_cbor && !config.intersect_tip);
        assert_eq!(config.intersect_points.len(), 2);
        assert_eq!(config.intersect_points[1].slot, 200);
        assert_eq!(config.dial_target().unwrap().network_magic, 42);
    }

    #[test]
    fn malformed_intersect_point_is_a_usage_error() {
        let res = Cli::try_parse_from(["chainpipe", "--input-chainsync-intersect-point", "abc"]);
        assert!(res.is_err());
    }

    #[test]
    fn filter_values_accept_commas_and_repeats() {
        let cli = Cli::try_parse_from([
            "chainpipe",
            "--filter",
            "chainsync",
            "--filter-chainsync-policy",
            "aa,bb",
            "--filter-chainsync-policy",
            "cc",
            "--filter-chainsync-asset",
            "asset1rjklcrnsdzqp65wjgrg55sy9723kw09mlgvlc3",
        ])
        .unwrap();
        assert_eq!(cli.filters, vec!["chainsync"]);
        let criteria = cli.options.filter_criteria();
        assert_eq!(criteria.policy_ids.len(), 3);
        assert_eq!(criteria.asset_fingerprints.len(), 1);
        assert!(criteria.addresses.is_empty());
    }

    #[test]
    fn unknown_filter_fails_pipeline_build() {
        let cli = Cli::try_parse_from([
            "chainpipe",
            "--filter",
            "regex",
            "--input-chainsync-network",
            "preview",
            "--input-chainsync-replay",
            concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../crates/chainpipe-sync/tests/fixtures/preview-session.jsonl"
            ),
        ])
        .unwrap();
        let err = build_pipeline(&cli, &plugins::registry()).err().unwrap();
        assert!(format!("{err:#}").contains("Unknown filter plugin: regex"));
    }
}
