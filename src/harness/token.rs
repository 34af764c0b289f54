//! Tokens passed from producers to the consumer.

use tokio::sync::mpsc;

use crate::ledger::types::OperationId;

/// One queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingToken {
    /// An accepted operation whose receipt still has to be resolved.
    Operation {
        id: OperationId,
        seq: u64,
        producer: usize,
    },
    /// Last token of a producer; nothing from that producer follows it.
    EndOfStream { producer: usize, submitted: u64 },
}

pub type TokenSender = mpsc::UnboundedSender<PendingToken>;
pub type TokenReceiver = mpsc::UnboundedReceiver<PendingToken>;

/// The unbounded FIFO shared by all producers and the consumer.
pub fn token_queue() -> (TokenSender, TokenReceiver) {
    mpsc::unbounded_channel()
}
