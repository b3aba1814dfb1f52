//! The filter stage: a [`ProcessorStage`] driving [`FilterCriteria`].

use async_trait::async_trait;

use chainpipe_core::{Event, PipelineError, Processor, ProcessorStage};

use crate::criteria::FilterCriteria;

/// Name under which the filter is registered and logged.
pub const STAGE_NAME: &str = "chainsync";

/// Drops transaction events that do not satisfy the criteria.
#[derive(Debug, Clone)]
pub struct ChainSyncFilter {
    criteria: FilterCriteria,
}

impl ChainSyncFilter {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }
}

#[async_trait]
impl Processor for ChainSyncFilter {
    async fn process(&self, event: Event) -> Result<Option<Event>, PipelineError> {
        if self.criteria.matches(&event) {
            return Ok(Some(event));
        }
        if let Some(tx) = event.as_transaction() {
            tracing::trace!(tx = %tx.transaction_hash, slot = tx.slot_number, "Transaction filtered out");
        }
        Ok(None)
    }
}

pub type FilterStage = ProcessorStage<ChainSyncFilter>;

/// Build a filter stage for `criteria`.
pub fn filter_stage(criteria: FilterCriteria) -> FilterStage {
    if criteria.is_empty() {
        tracing::debug!("Filter has no criteria, every event passes");
    }
    ProcessorStage::new(STAGE_NAME, ChainSyncFilter::new(criteria))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainpipe_core::{Address, BlockEvent, EventKind, Stage, TransactionEvent, TransactionOutput};

    fn enterprise(payment: u8) -> Address {
        let mut bytes = vec![0x61];
        bytes.extend_from_slice(&[payment; 28]);
        Address::from_bytes(bytes).unwrap()
    }

    fn block(slot: u64) -> Event {
        Event::new(
            BlockEvent {
                block_number: slot,
                block_hash: String::new(),
                slot_number: slot,
                block_cbor: None,
            }
            .into(),
        )
    }

    fn paying(slot: u64, to: &Address) -> Event {
        Event::new(
            TransactionEvent {
                block_number: slot,
                block_hash: String::new(),
                slot_number: slot,
                transaction_hash: format!("{slot:064x}"),
                transaction_cbor: None,
                inputs: vec![],
                outputs: vec![TransactionOutput {
                    address: to.clone(),
                    amount: 1_000_000,
                    assets: None,
                }],
                metadata: None,
            }
            .into(),
        )
    }

    #[tokio::test]
    async fn stage_forwards_matching_events_in_order() {
        let watched = enterprise(1);
        let mut stage = filter_stage(FilterCriteria::new().address(watched.to_string()));
        let tx = stage.take_inbound().unwrap();
        let mut rx = stage.take_outbound().unwrap();
        stage.start().await.unwrap();

        let other = enterprise(2);
        let input = vec![
            block(1),
            paying(1, &other),
            paying(1, &watched),
            block(2),
            paying(2, &watched),
            paying(2, &other),
        ];
        for evt in input {
            tx.send(evt).await.unwrap();
        }
        drop(tx);

        let mut out = vec![];
        while let Some(evt) = rx.recv().await {
            out.push((evt.kind(), evt.as_transaction().map(|t| t.slot_number)));
        }
        assert_eq!(
            out,
            vec![
                (EventKind::Block, None),
                (EventKind::Transaction, Some(1)),
                (EventKind::Block, None),
                (EventKind::Transaction, Some(2)),
            ]
        );
    }

    #[tokio::test]
    async fn processor_never_errors_on_garbage_criteria() {
        let filter = ChainSyncFilter::new(FilterCriteria::new().policy_id("zz").asset_fingerprint("x"));
        let out = filter.process(paying(5, &enterprise(3))).await.unwrap();
        assert!(out.is_none());
        assert!(filter.process(block(5)).await.unwrap().is_some());
    }
}
