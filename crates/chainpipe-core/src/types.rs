//! Chain position types shared by every stage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// ─── Point ────────────────────────────────────────────────────────────────────

/// A position on the chain: a slot plus the hash of the block in that slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub slot: u64,
    #[serde(with = "crate::serde_hex")]
    pub hash: Vec<u8>,
}

impl Point {
    pub fn new(slot: u64, hash: impl Into<Vec<u8>>) -> Self {
        Self {
            slot,
            hash: hash.into(),
        }
    }

    /// Block hash as lowercase hex.
    pub fn hash_hex(&self) -> String {
        hex::encode(&self.hash)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.slot, self.hash_hex())
    }
}

/// Parses the `<slot>.<hash>` form used on the command line.
impl FromStr for Point {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (slot, hash) = s
            .split_once('.')
            .ok_or_else(|| ParseError::InvalidPoint(s.to_string()))?;
        let slot = slot
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidPoint(s.to_string()))?;
        let hash = hex::decode(hash.trim())?;
        Ok(Self { slot, hash })
    }
}

// ─── Tip ──────────────────────────────────────────────────────────────────────

/// The chain head as advertised by the node. Only a hint: the real tip may
/// move while we are syncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tip {
    pub point: Point,
    pub block_number: u64,
}

impl Tip {
    pub fn new(point: Point, block_number: u64) -> Self {
        Self {
            point,
            block_number,
        }
    }
}
