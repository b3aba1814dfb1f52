//! Per-plugin command-line options.
//!
//! Flags are namespaced `--<kind>-<plugin>-<option>` so that every registered
//! stage can read its own settings from the same [`Options`] value.

use std::path::PathBuf;

use clap::Args;

use chainpipe_core::Point;
use chainpipe_filter::{split_list, FilterCriteria};
use chainpipe_output::{WebhookConfig, DEFAULT_URL};
use chainpipe_sync::SyncConfig;

#[derive(Debug, Clone, Default, Args)]
pub struct Options {
    // ─── input: chainsync ─────────────────────────────────────────────────────
    /// Well-known network name (mainnet, preprod, preview, sanchonet)
    #[arg(long = "input-chainsync-network", value_name = "NAME")]
    pub chainsync_network: Option<String>,

    /// Node address as host:port
    #[arg(long = "input-chainsync-address", value_name = "HOST:PORT")]
    pub chainsync_address: Option<String>,

    /// Path to the node's UNIX socket
    #[arg(long = "input-chainsync-socket-path", value_name = "PATH")]
    pub chainsync_socket_path: Option<PathBuf>,

    /// Use node-to-client over TCP instead of node-to-node
    #[arg(long = "input-chainsync-ntc-tcp")]
    pub chainsync_ntc_tcp: bool,

    /// Network magic, overriding the named network's
    #[arg(long = "input-chainsync-network-magic", value_name = "MAGIC")]
    pub chainsync_network_magic: Option<u32>,

    /// Fetch history with block-fetch before following the chain
    #[arg(long = "input-chainsync-bulk-mode")]
    pub chainsync_bulk_mode: bool,

    /// Start from the current chain tip
    #[arg(long = "input-chainsync-intersect-tip")]
    pub chainsync_intersect_tip: bool,

    /// Start from a point given as <slot>.<hash> (repeatable)
    #[arg(long = "input-chainsync-intersect-point", value_name = "SLOT.HASH")]
    pub chainsync_intersect_points: Vec<Point>,

    /// Include raw block and transaction CBOR in events
    #[arg(long = "input-chainsync-include-cbor")]
    pub chainsync_include_cbor: bool,

    /// Serve a recorded session (JSON lines) instead of dialing a node
    #[arg(long = "input-chainsync-replay", value_name = "PATH")]
    pub chainsync_replay: Option<PathBuf>,

    // ─── filter: chainsync ────────────────────────────────────────────────────
    /// Payment or stake address to match (comma-separated or repeated)
    #[arg(long = "filter-chainsync-address", value_name = "ADDR")]
    pub filter_addresses: Vec<String>,

    /// Policy id to match (comma-separated or repeated)
    #[arg(long = "filter-chainsync-policy", value_name = "HEX")]
    pub filter_policies: Vec<String>,

    /// CIP-14 asset fingerprint to match (comma-separated or repeated)
    #[arg(long = "filter-chainsync-asset", value_name = "ASSET")]
    pub filter_assets: Vec<String>,

    // ─── output: webhook ──────────────────────────────────────────────────────
    /// Endpoint receiving one POST per event
    #[arg(long = "output-webhook-url", value_name = "URL", default_value = DEFAULT_URL)]
    pub webhook_url: String,
}

impl Options {
    pub fn sync_config(&self) -> SyncConfig {
        let mut builder = SyncConfig::builder()
            .ntc_tcp(self.chainsync_ntc_tcp)
            .bulk_mode(self.chainsync_bulk_mode)
            .intersect_tip(self.chainsync_intersect_tip)
            .intersect_points(self.chainsync_intersect_points.iter().cloned())
            .include_cbor(self.chainsync_include_cbor);
        if let Some(network) = &self.chainsync_network {
            builder = builder.network(network.clone());
        }
        if let Some(address) = &self.chainsync_address {
            builder = builder.address(address.clone());
        }
        if let Some(path) = &self.chainsync_socket_path {
            builder = builder.socket_path(path.clone());
        }
        if let Some(magic) = self.chainsync_network_magic {
            builder = builder.network_magic(magic);
        }
        builder.build()
    }

    pub fn filter_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            addresses: split_list(&self.filter_addresses).into_iter().collect(),
            policy_ids: split_list(&self.filter_policies).into_iter().collect(),
            asset_fingerprints: split_list(&self.filter_assets).into_iter().collect(),
        }
    }

    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig::url(self.webhook_url.clone())
    }
}
