//! Conversion from decoded ledger types to pipeline event payloads.

use chainpipe_core::{BlockEvent, TransactionEvent};

use crate::protocol::{Block, Transaction};

fn raw(cbor: &[u8], include: bool) -> Option<Vec<u8>> {
    (include && !cbor.is_empty()).then(|| cbor.to_vec())
}

pub fn block_event(block: &Block, include_cbor: bool) -> BlockEvent {
    BlockEvent {
        block_number: block.number,
        block_hash: block.hash_hex(),
        slot_number: block.slot,
        block_cbor: raw(&block.cbor, include_cbor),
    }
}

pub fn transaction_event(block: &Block, tx: &Transaction, include_cbor: bool) -> TransactionEvent {
    TransactionEvent {
        block_number: block.number,
        block_hash: block.hash_hex(),
        slot_number: block.slot,
        transaction_hash: hex::encode(&tx.hash),
        transaction_cbor: raw(&tx.cbor, include_cbor),
        inputs: tx.inputs.clone(),
        outputs: tx.outputs.clone(),
        metadata: tx.metadata.clone(),
    }
}
