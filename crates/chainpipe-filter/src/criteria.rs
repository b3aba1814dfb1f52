//! Filter criteria and the per-event match predicate.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use chainpipe_core::{AssetFingerprint, Event, EventPayload, TransactionEvent};

/// What a transaction must touch to pass the filter.
///
/// Categories are ANDed; values within a category are ORed. An empty category
/// places no constraint. Block and rollback events always pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// Bech32 payment addresses, or `stake…` reward addresses matching any
    /// output that delegates to them.
    pub addresses: BTreeSet<String>,
    /// Hex policy ids.
    pub policy_ids: BTreeSet<String>,
    /// CIP-14 `asset1…` fingerprints.
    pub asset_fingerprints: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.addresses.insert(address.into());
        self
    }

    pub fn policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_ids.insert(policy_id.into());
        self
    }

    pub fn asset_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.asset_fingerprints.insert(fingerprint.into());
        self
    }

    /// Returns `true` if no category is constrained.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.policy_ids.is_empty() && self.asset_fingerprints.is_empty()
    }

    /// Returns `true` if `event` should be forwarded.
    pub fn matches(&self, event: &Event) -> bool {
        match &event.payload {
            EventPayload::Transaction(tx) => self.matches_transaction(tx),
            EventPayload::Block(_) | EventPayload::Rollback(_) => true,
        }
    }

    pub fn matches_transaction(&self, tx: &TransactionEvent) -> bool {
        self.matches_address(tx) && self.matches_policy(tx) && self.matches_fingerprint(tx)
    }

    fn matches_address(&self, tx: &TransactionEvent) -> bool {
        if self.addresses.is_empty() {
            return true;
        }
        tx.outputs.iter().any(|out| {
            if self.addresses.contains(&out.address.to_string()) {
                return true;
            }
            // derived reward addresses always render with a `stake` prefix
            out.address
                .stake_address()
                .is_some_and(|stake| self.addresses.contains(&stake.to_string()))
        })
    }

    fn matches_policy(&self, tx: &TransactionEvent) -> bool {
        if self.policy_ids.is_empty() {
            return true;
        }
        tx.outputs
            .iter()
            .filter_map(|out| out.assets.as_ref())
            .flat_map(|assets| assets.policies())
            .any(|policy| self.policy_ids.contains(&policy.to_string()))
    }

    fn matches_fingerprint(&self, tx: &TransactionEvent) -> bool {
        if self.asset_fingerprints.is_empty() {
            return true;
        }
        tx.outputs
            .iter()
            .filter_map(|out| out.assets.as_ref())
            .flat_map(|assets| assets.iter())
            .any(|(policy, name, _)| {
                self.asset_fingerprints
                    .contains(AssetFingerprint::new(policy, name).as_str())
            })
    }
}

/// Normalise comma-separated and/or repeated option values into one list,
/// trimming whitespace and dropping empty entries.
pub fn split_list<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .flat_map(|v| {
            v.as_ref()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect()
}
