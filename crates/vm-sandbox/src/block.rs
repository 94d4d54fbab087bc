use alloy_consensus::Header;
use alloy_primitives::{
    Address,
    B256,
    U256,
};

/// A block header sealed with its hash, plus the hashes of the transactions
/// included in it. Immutable once appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlock {
    header: Header,
    hash: B256,
    transactions: Vec<B256>,
}

impl SealedBlock {
    /// Seals the header by computing its hash once. The hash computation is
    /// delegated to the consensus library, never reimplemented here.
    pub fn seal(header: Header, transactions: Vec<B256>) -> Self {
        let hash = header.hash_slow();
        Self {
            header,
            hash,
            transactions,
        }
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn beneficiary(&self) -> Address {
        self.header.beneficiary
    }

    pub fn difficulty(&self) -> U256 {
        self.header.difficulty
    }

    pub fn gas_limit(&self) -> u64 {
        self.header.gas_limit
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Hashes of the transactions included in this block, in execution order.
    pub fn transactions(&self) -> &[B256] {
        &self.transactions
    }
}
