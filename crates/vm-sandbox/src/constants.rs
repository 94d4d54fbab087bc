use crate::primitives::{
    Address,
    address,
};

/// Beneficiary address stamped into every synthesized block header.
pub const COINBASE: Address = address!("0e9281e9c6a0808672eaba6bd1220e144c9bb07a");

/// Gas limit of the synthesized genesis block.
pub const GENESIS_GAS_LIMIT: u64 = 8_000_000;

/// Gas limit applied to blocks synthesized after genesis.
/// Distinct from the genesis block's own limit.
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 4_300_000;

/// Difficulty of every block under proof-of-work consensus.
pub const POW_DIFFICULTY: u64 = 69_762_765_929_000;

/// Chain id the sandbox reports to executed contracts.
pub const CHAIN_ID: u64 = 1;
