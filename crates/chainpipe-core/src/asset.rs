//! Native asset bundles and CIP-14 asset fingerprints.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::U20;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::encode_bech32;
use crate::error::ParseError;

const POLICY_ID_LEN: usize = 28;
const FINGERPRINT_HRP: &str = "asset";

type Blake2b160 = Blake2b<U20>;

// ─── PolicyId ─────────────────────────────────────────────────────────────────

/// Hash of the minting policy script (28 bytes).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyId([u8; POLICY_ID_LEN]);

impl PolicyId {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let arr: [u8; POLICY_ID_LEN] =
            bytes.try_into().map_err(|_| ParseError::InvalidLength {
                what: "policy id",
                expected: POLICY_ID_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PolicyId({self})")
    }
}

impl FromStr for PolicyId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(&hex::decode(s)?)
    }
}

impl Serialize for PolicyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PolicyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─── AssetName ────────────────────────────────────────────────────────────────

/// Arbitrary asset name bytes (0–32 bytes on chain).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetName(#[serde(with = "crate::serde_hex")] Vec<u8>);

impl AssetName {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// ─── MultiAsset ───────────────────────────────────────────────────────────────

/// Policy → asset name → quantity, kept in canonical (sorted) order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiAsset(BTreeMap<PolicyId, BTreeMap<AssetName, u64>>);

impl MultiAsset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` of `(policy, name)`, accumulating with any existing amount.
    pub fn insert(&mut self, policy: PolicyId, name: AssetName, quantity: u64) {
        let entry = self.0.entry(policy).or_default().entry(name).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    pub fn policies(&self) -> impl Iterator<Item = &PolicyId> {
        self.0.keys()
    }

    /// Asset names and quantities minted under `policy`.
    pub fn assets(&self, policy: &PolicyId) -> impl Iterator<Item = (&AssetName, u64)> {
        self.0
            .get(policy)
            .into_iter()
            .flat_map(|names| names.iter().map(|(name, qty)| (name, *qty)))
    }

    /// Every `(policy, name, quantity)` triple.
    pub fn iter(&self) -> impl Iterator<Item = (&PolicyId, &AssetName, u64)> {
        self.0
            .iter()
            .flat_map(|(policy, names)| names.iter().map(move |(name, qty)| (policy, name, *qty)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ─── AssetFingerprint ─────────────────────────────────────────────────────────

/// CIP-14 fingerprint: bech32(`asset`, blake2b-160(policy_id ‖ asset_name)).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetFingerprint(String);

impl AssetFingerprint {
    pub fn new(policy: &PolicyId, name: &AssetName) -> Self {
        let digest = Blake2b160::new()
            .chain_update(policy.as_bytes())
            .chain_update(name.as_bytes())
            .finalize();
        Self(encode_bech32(FINGERPRINT_HRP, &digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(hex_str: &str) -> PolicyId {
        hex_str.parse().unwrap()
    }

    #[test]
    fn cip14_fingerprint_empty_name() {
        let fp = AssetFingerprint::new(
            &policy("7eae28af2208be856f7a119668ae52a49b73725e326dc16579dcc373"),
            &AssetName::new(vec![]),
        );
        assert_eq!(fp.as_str(), "asset1rjklcrnsdzqp65wjgrg55sy9723kw09mlgvlc3");
    }

    #[test]
    fn cip14_fingerprint_named_asset() {
        let fp = AssetFingerprint::new(
            &policy("7eae28af2208be856f7a119668ae52a49b73725e326dc16579dcc373"),
            &AssetName::new(hex::decode("504154415445").unwrap()),
        );
        assert_eq!(fp.as_str(), "asset13n25uv0yaf5kus35fm2k86cqy60z58d9xmde92");
    }

    #[test]
    fn policy_id_length_checked() {
        assert!(matches!(
            "abcd".parse::<PolicyId>(),
            Err(ParseError::InvalidLength { expected: 28, actual: 2, .. })
        ));
    }

    #[test]
    fn multi_asset_accumulates_and_serializes_as_hex_map() {
        let p = policy("1e349c9bdea19fd6c147626a5260bc44b71635f398b67c59881df209");
        let mut assets = MultiAsset::new();
        assets.insert(p, AssetName::new(b"PATATE".to_vec()), 5);
        assets.insert(p, AssetName::new(b"PATATE".to_vec()), 2);
        assert_eq!(assets.assets(&p).map(|(_, q)| q).collect::<Vec<_>>(), vec![7]);

        let json = serde_json::to_value(&assets).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "1e349c9bdea19fd6c147626a5260bc44b71635f398b67c59881df209": { "504154415445": 7 }
            })
        );
        let back: MultiAsset = serde_json::from_value(json).unwrap();
        assert_eq!(back, assets);
    }
}
