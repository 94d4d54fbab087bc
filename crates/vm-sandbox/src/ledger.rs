use crate::{
    block::SealedBlock,
    inspectors::TraceReport,
    logs::{
        LogFilter,
        LogIndex,
        StoredLog,
    },
    primitives::{
        B256,
        ExecutionResult,
        TxEnv,
    },
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// How an appended block was produced. Determines whether the log-matching
/// pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Synthesized at bootstrap; exempt from log processing.
    Genesis,
    /// Produced by committed transaction execution; feeds the log index.
    Mined,
    /// Produced to preview a call without committing state; exempt from log
    /// processing.
    CallOnly,
}

/// Execution outcome of a tracked transaction together with the opcode trace
/// captured while it ran. Attached once, never mutated.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub result: ExecutionResult,
    pub trace: TraceReport,
}

impl ExecutionRecord {
    pub fn new(result: ExecutionResult, trace: TraceReport) -> Self {
        Self { result, trace }
    }

    pub fn gas_used(&self) -> u64 {
        self.result.gas_used()
    }
}

/// Authoritative record of all blocks and transactions seen by one context.
///
/// Constructed fresh per session and owned by the context facade; nothing
/// here is process-wide. Maps are unbounded and never evicted; a new context
/// reclaims the memory.
#[derive(Debug, Default)]
pub struct ChainLedger {
    blocks_by_hash: DashMap<B256, Arc<SealedBlock>>,
    blocks_by_number: DashMap<u64, Arc<SealedBlock>>,
    latest_block_number: RwLock<Option<u64>>,
    block_by_tx: DashMap<B256, Arc<SealedBlock>>,
    tx_by_hash: DashMap<B256, TxEnv>,
    results: DashMap<B256, ExecutionRecord>,
    log_index: LogIndex,
}

impl ChainLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes the block by hash and by number and moves the latest pointer
    /// unconditionally. Appends may arrive out of numeric order (a call-only
    /// preview block, for instance); indexing is last-write-wins, no
    /// monotonicity is enforced.
    ///
    /// Mined blocks run the log-matching pass over their transactions'
    /// recorded results, so results should be tracked before the block that
    /// contains them is appended.
    pub fn append_block(&self, block: Arc<SealedBlock>, kind: BlockKind) {
        let number = block.number();
        self.blocks_by_hash.insert(block.hash(), Arc::clone(&block));
        self.blocks_by_number.insert(number, Arc::clone(&block));
        *self.latest_block_number.write() = Some(number);
        debug!(
            target: "sandbox::ledger",
            number,
            hash = %block.hash(),
            ?kind,
            "Appended block"
        );

        if kind == BlockKind::Mined {
            for transaction_hash in block.transactions() {
                if let Some(record) = self.results.get(transaction_hash) {
                    self.log_index
                        .absorb(&block, *transaction_hash, record.result.logs());
                }
            }
        }
    }

    /// Records the transaction and its containing block. Overwrites any prior
    /// record for the same hash.
    pub fn track_transaction(&self, hash: B256, block: Arc<SealedBlock>, tx: TxEnv) {
        self.block_by_tx.insert(hash, block);
        self.tx_by_hash.insert(hash, tx);
    }

    /// Attaches an execution record to a transaction hash. May be called
    /// before or after `track_transaction`; no ordering is enforced.
    pub fn track_result(&self, hash: B256, record: ExecutionRecord) {
        self.results.insert(hash, record);
    }

    pub fn block_by_hash(&self, hash: B256) -> Option<Arc<SealedBlock>> {
        self.blocks_by_hash.get(&hash).map(|b| Arc::clone(&b))
    }

    pub fn block_by_number(&self, number: u64) -> Option<Arc<SealedBlock>> {
        self.blocks_by_number.get(&number).map(|b| Arc::clone(&b))
    }

    /// Number of the most recently appended block, regardless of numeric
    /// ordering. `None` until the first append.
    pub fn latest_block_number(&self) -> Option<u64> {
        *self.latest_block_number.read()
    }

    pub fn block_for_transaction(&self, hash: B256) -> Option<Arc<SealedBlock>> {
        self.block_by_tx.get(&hash).map(|b| Arc::clone(&b))
    }

    pub fn transaction_by_hash(&self, hash: B256) -> Option<TxEnv> {
        self.tx_by_hash.get(&hash).map(|tx| tx.clone())
    }

    pub fn result_for_transaction(&self, hash: B256) -> Option<ExecutionRecord> {
        self.results.get(&hash).map(|record| record.clone())
    }

    pub fn logs_matching(&self, filter: &LogFilter) -> Vec<StoredLog> {
        self.log_index.logs_matching(filter)
    }

    #[cfg(test)]
    fn indexed_log_count(&self) -> usize {
        self.log_index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{
        Address,
        Bytes,
        Log,
        address,
    };
    use alloy_consensus::Header;
    use revm::context::result::{
        Output,
        SuccessReason,
    };

    fn sealed(number: u64, transactions: Vec<B256>) -> Arc<SealedBlock> {
        Arc::new(SealedBlock::seal(
            Header {
                number,
                timestamp: 1_700_000_000 + number,
                ..Default::default()
            },
            transactions,
        ))
    }

    fn tx_hash(byte: u8) -> B256 {
        B256::from([byte; 32])
    }

    fn success_with_logs(logs: Vec<Log>) -> ExecutionRecord {
        ExecutionRecord::new(
            ExecutionResult::Success {
                reason: SuccessReason::Stop,
                gas_used: 21_000,
                gas_refunded: 0,
                logs,
                output: Output::Call(Bytes::default()),
            },
            TraceReport::default(),
        )
    }

    fn emitter() -> Address {
        address!("1000000000000000000000000000000000000000")
    }

    #[test]
    fn append_indexes_by_hash_and_number() {
        let ledger = ChainLedger::new();
        let block = sealed(0, vec![]);
        ledger.append_block(Arc::clone(&block), BlockKind::Genesis);

        assert_eq!(
            ledger.block_by_hash(block.hash()).unwrap().hash(),
            block.hash()
        );
        assert_eq!(ledger.block_by_number(0).unwrap().hash(), block.hash());
        assert_eq!(ledger.latest_block_number(), Some(0));
    }

    #[test]
    fn latest_pointer_follows_append_order_not_numeric_order() {
        let ledger = ChainLedger::new();
        ledger.append_block(sealed(5, vec![]), BlockKind::Mined);
        ledger.append_block(sealed(2, vec![]), BlockKind::CallOnly);
        assert_eq!(ledger.latest_block_number(), Some(2));
    }

    #[test]
    fn indexing_is_last_write_wins() {
        let ledger = ChainLedger::new();
        let first = sealed(1, vec![tx_hash(1)]);
        let second = sealed(1, vec![tx_hash(2)]);
        ledger.append_block(Arc::clone(&first), BlockKind::Mined);
        ledger.append_block(Arc::clone(&second), BlockKind::Mined);

        assert_eq!(
            ledger.block_by_number(1).unwrap().transactions(),
            second.transactions()
        );
        // The first block stays reachable by hash.
        assert_eq!(
            ledger.block_by_hash(first.hash()).unwrap().transactions(),
            first.transactions()
        );
    }

    #[test]
    fn tracked_transactions_resolve_to_block_and_result() {
        let ledger = ChainLedger::new();
        let hash = tx_hash(7);
        let block = sealed(1, vec![hash]);

        ledger.track_transaction(hash, Arc::clone(&block), TxEnv::default());
        ledger.track_result(hash, success_with_logs(vec![]));

        assert_eq!(
            ledger.block_for_transaction(hash).unwrap().hash(),
            block.hash()
        );
        assert!(ledger.transaction_by_hash(hash).is_some());
        assert_eq!(
            ledger.result_for_transaction(hash).unwrap().gas_used(),
            21_000
        );
    }

    #[test]
    fn unknown_hash_is_an_explicit_not_found() {
        let ledger = ChainLedger::new();
        assert!(ledger.result_for_transaction(tx_hash(9)).is_none());
        assert!(ledger.transaction_by_hash(tx_hash(9)).is_none());
        assert!(ledger.block_for_transaction(tx_hash(9)).is_none());
        assert!(ledger.block_by_number(42).is_none());
        assert_eq!(ledger.latest_block_number(), None);
    }

    #[test]
    fn result_before_transaction_is_accepted() {
        let ledger = ChainLedger::new();
        let hash = tx_hash(3);
        ledger.track_result(hash, success_with_logs(vec![]));
        ledger.track_transaction(hash, sealed(1, vec![hash]), TxEnv::default());
        assert!(ledger.result_for_transaction(hash).is_some());
    }

    #[test]
    fn only_mined_blocks_feed_the_log_index() {
        let ledger = ChainLedger::new();
        let log = Log::new_unchecked(emitter(), vec![B256::from([1u8; 32])], Bytes::new());

        let genesis_tx = tx_hash(1);
        ledger.track_result(genesis_tx, success_with_logs(vec![log.clone()]));
        ledger.append_block(sealed(0, vec![genesis_tx]), BlockKind::Genesis);
        assert_eq!(ledger.indexed_log_count(), 0);

        let preview_tx = tx_hash(2);
        ledger.track_result(preview_tx, success_with_logs(vec![log.clone()]));
        ledger.append_block(sealed(1, vec![preview_tx]), BlockKind::CallOnly);
        assert_eq!(ledger.indexed_log_count(), 0);

        let mined_tx = tx_hash(3);
        ledger.track_result(mined_tx, success_with_logs(vec![log.clone()]));
        ledger.append_block(sealed(2, vec![mined_tx]), BlockKind::Mined);
        assert_eq!(ledger.indexed_log_count(), 1);

        let matched = ledger.logs_matching(&LogFilter {
            addresses: vec![emitter()],
            ..Default::default()
        });
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].transaction_hash, mined_tx);
        assert_eq!(matched[0].block_number, 2);
    }
}
