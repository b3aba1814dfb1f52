//! chainpipe-filter — transaction filtering for the chain-sync pipeline.
//!
//! A transaction passes when every configured category is satisfied by at
//! least one of its outputs:
//!
//! | category           | output matches when                                   |
//! |--------------------|-------------------------------------------------------|
//! | address            | its bech32 address, or its derived `stake…` address, is listed |
//! | policy id          | it carries an asset minted under a listed policy      |
//! | asset fingerprint  | one of its assets has a listed CIP-14 fingerprint     |
//!
//! Block and rollback events are never filtered.

pub mod criteria;
pub mod stage;

pub use criteria::{split_list, FilterCriteria};
pub use stage::{filter_stage, ChainSyncFilter, FilterStage, STAGE_NAME};
