//! Well-known Cardano networks.

/// A named network with its handshake magic and, optionally, a public relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    pub name: &'static str,
    pub magic: u32,
    pub public_root: Option<(&'static str, u16)>,
}

pub const MAINNET: Network = Network {
    name: "mainnet",
    magic: 764_824_073,
    public_root: Some(("backbone.cardano.iog.io", 3001)),
};

pub const PREPROD: Network = Network {
    name: "preprod",
    magic: 1,
    public_root: Some(("preprod-node.play.dev.cardano.org", 3001)),
};

pub const PREVIEW: Network = Network {
    name: "preview",
    magic: 2,
    public_root: Some(("preview-node.play.dev.cardano.org", 3001)),
};

pub const SANCHONET: Network = Network {
    name: "sanchonet",
    magic: 4,
    public_root: Some(("sanchonet-node.play.dev.cardano.org", 3001)),
};

/// Legacy testnet; no public relay is operated any more.
pub const TESTNET: Network = Network {
    name: "testnet",
    magic: 1_097_911_063,
    public_root: None,
};

pub const NETWORKS: &[Network] = &[MAINNET, PREPROD, PREVIEW, SANCHONET, TESTNET];

impl Network {
    /// Look up a network by its lowercase name.
    pub fn by_name(name: &str) -> Option<Network> {
        NETWORKS.iter().copied().find(|n| n.name == name)
    }

    /// `host:port` of the public relay, if the network has one.
    pub fn public_root_address(&self) -> Option<String> {
        self.public_root
            .filter(|(host, port)| !host.is_empty() && *port > 0)
            .map(|(host, port)| format!("{host}:{port}"))
    }
}
