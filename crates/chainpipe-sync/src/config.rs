//! Sync engine configuration and its fluent builder.
//!
//! # Example
//!
//! ```rust
//! use chainpipe_sync::SyncConfig;
//!
//! let config = SyncConfig::builder()
//!     .network("preview")
//!     .bulk_mode(true)
//!     .include_cbor(true)
//!     .build();
//! let target = config.dial_target().unwrap();
//! assert!(target.node_to_node);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use chainpipe_core::Point;

use crate::error::SyncError;
use crate::network::Network;
use crate::protocol::{DialFamily, DialTarget};

/// Configuration for a [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Well-known network name (`mainnet`, `preprod`, `preview`, …).
    pub network: Option<String>,
    /// Explicit handshake magic; takes precedence over the network's.
    pub network_magic: Option<u32>,
    /// `host:port` to dial over TCP.
    pub address: Option<String>,
    /// Local node socket to dial.
    pub socket_path: Option<PathBuf>,
    /// Speak node-to-client over the TCP `address`.
    pub ntc_tcp: bool,
    /// Fetch history through block-fetch before following the chain.
    pub bulk_mode: bool,
    /// Start from the node's current tip.
    pub intersect_tip: bool,
    /// Points to intersect with; empty means origin.
    pub intersect_points: Vec<Point>,
    /// Attach raw block and transaction CBOR to events.
    pub include_cbor: bool,
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Resolve the connection target.
    ///
    /// A network supplies its magic and public relay. An explicit address
    /// replaces the relay; otherwise a socket path does.
    pub fn dial_target(&self) -> Result<DialTarget, SyncError> {
        let mut magic = 0;
        let mut target = None;

        if let Some(name) = non_empty(self.network.as_deref()) {
            let network = Network::by_name(name)
                .ok_or_else(|| SyncError::Configuration(format!("unknown network: {name}")))?;
            magic = network.magic;
            if let Some(root) = network.public_root_address() {
                target = Some((DialFamily::Tcp, root, true));
            }
        }

        if let Some(address) = non_empty(self.address.as_deref()) {
            target = Some((DialFamily::Tcp, address.to_string(), !self.ntc_tcp));
        } else if let Some(path) = self.socket_path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            target = Some((DialFamily::Unix, path.display().to_string(), false));
        }

        let (family, address, node_to_node) = target.ok_or_else(|| {
            SyncError::Configuration(
                "you must specify a host/port, UNIX socket path, or well-known network name".into(),
            )
        })?;

        Ok(DialTarget {
            family,
            address,
            node_to_node,
            network_magic: self.network_magic.unwrap_or(magic),
        })
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Fluent builder for [`SyncConfig`].
#[derive(Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn network(mut self, name: impl Into<String>) -> Self {
        self.config.network = Some(name.into());
        self
    }

    pub fn network_magic(mut self, magic: u32) -> Self {
        self.config.network_magic = Some(magic);
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = Some(address.into());
        self
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = Some(path.into());
        self
    }

    pub fn ntc_tcp(mut self, enabled: bool) -> Self {
        self.config.ntc_tcp = enabled;
        self
    }

    pub fn bulk_mode(mut self, enabled: bool) -> Self {
        self.config.bulk_mode = enabled;
        self
    }

    pub fn intersect_tip(mut self, enabled: bool) -> Self {
        self.config.intersect_tip = enabled;
        self
    }

    /// Add an intersection point. May be called repeatedly.
    pub fn intersect_point(mut self, point: Point) -> Self {
        self.config.intersect_points.push(point);
        self
    }

    pub fn intersect_points(mut self, points: impl IntoIterator<Item = Point>) -> Self {
        self.config.intersect_points.extend(points);
        self
    }

    pub fn include_cbor(mut self, enabled: bool) -> Self {
        self.config.include_cbor = enabled;
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}
