//! State stores the sandbox can execute against.
//!
//! A context owns exactly one store for its lifetime, selected at creation:
//! a local in-memory store that tracks storage-key preimages, or a remote
//! provider-backed store that lazily fetches the state of a pinned historical
//! block. Both are served to the execution engine through the revm database
//! traits.

pub mod remote;
pub mod tracked;

pub use remote::{
    BlockRef,
    RemoteDb,
    RemoteDbError,
};
pub use tracked::{
    DumpEntry,
    DumpError,
    StorageDump,
    TrackedDb,
};

use crate::primitives::{
    AccountInfo,
    Address,
    B256,
    Bytecode,
    EvmState,
    StorageKey,
    StorageValue,
};
pub use revm::{
    Database,
    DatabaseCommit,
    DatabaseRef,
};
use revm::database::DBErrorMarker;
use tracing::debug;

/// Errors a sandbox state store surfaces through the EVM's database traits.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("remote state error: {0}")]
    Remote(#[from] RemoteDbError),
    #[error("malformed stored value: {0}")]
    Decode(#[from] alloy_rlp::Error),
}

impl DBErrorMarker for StateError {}

/// The single active state store of a context.
///
/// Selected once at context creation; switching stores requires constructing
/// a new context.
#[derive(Debug)]
pub enum StateDb {
    Local(TrackedDb),
    Remote(RemoteDb),
}

impl StateDb {
    /// Selects and constructs the store. Without an endpoint the local store
    /// is available immediately; with one, the provider is connected and a
    /// `Latest` block reference is resolved exactly once. Any failure is a
    /// creation-time error; no degraded store is returned.
    pub async fn select(
        node_url: Option<&str>,
        block_ref: BlockRef,
    ) -> Result<Self, RemoteDbError> {
        match node_url {
            Some(url) => {
                let remote = RemoteDb::connect(url, block_ref).await?;
                debug!(
                    target: "sandbox::state",
                    url,
                    block_number = remote.block_number(),
                    "Selected remote state store"
                );
                Ok(StateDb::Remote(remote))
            }
            None => {
                debug!(target: "sandbox::state", "Selected local state store");
                Ok(StateDb::Local(TrackedDb::new()))
            }
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, StateDb::Local(_))
    }

    /// The local tracked store, if this context runs on one.
    pub fn as_local(&self) -> Option<&TrackedDb> {
        match self {
            StateDb::Local(db) => Some(db),
            StateDb::Remote(_) => None,
        }
    }

    pub fn insert_account_info(&mut self, address: Address, info: AccountInfo) {
        match self {
            StateDb::Local(db) => db.insert_account_info(address, info),
            StateDb::Remote(db) => db.insert_account_info(address, info),
        }
    }

    /// Registers a block hash for BLOCKHASH opcode lookups.
    pub fn store_block_hash(&mut self, number: u64, hash: B256) {
        match self {
            StateDb::Local(db) => db.store_block_hash(number, hash),
            StateDb::Remote(db) => db.store_block_hash(number, hash),
        }
    }
}

impl DatabaseRef for StateDb {
    type Error = StateError;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        match self {
            StateDb::Local(db) => db.basic_ref(address),
            StateDb::Remote(db) => Ok(db.basic_ref(address)?),
        }
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        match self {
            StateDb::Local(db) => db.code_by_hash_ref(code_hash),
            StateDb::Remote(db) => Ok(db.code_by_hash_ref(code_hash)?),
        }
    }

    fn storage_ref(&self, address: Address, index: StorageKey) -> Result<StorageValue, Self::Error> {
        match self {
            StateDb::Local(db) => db.storage_ref(address, index),
            StateDb::Remote(db) => Ok(db.storage_ref(address, index)?),
        }
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        match self {
            StateDb::Local(db) => db.block_hash_ref(number),
            StateDb::Remote(db) => Ok(db.block_hash_ref(number)?),
        }
    }
}

impl Database for StateDb {
    type Error = StateError;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        self.basic_ref(address)
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.code_by_hash_ref(code_hash)
    }

    fn storage(&mut self, address: Address, index: StorageKey) -> Result<StorageValue, Self::Error> {
        self.storage_ref(address, index)
    }

    fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error> {
        self.block_hash_ref(number)
    }
}

impl DatabaseCommit for StateDb {
    fn commit(&mut self, changes: EvmState) {
        match self {
            StateDb::Local(db) => db.commit(changes),
            StateDb::Remote(db) => db.commit(changes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_endpoint_selects_the_local_store() {
        let db = StateDb::select(None, BlockRef::Latest).await.unwrap();
        assert!(db.is_local());
        assert!(db.as_local().is_some());
    }

    #[tokio::test]
    async fn endpoint_failure_yields_no_store() {
        let err = StateDb::select(Some("http://127.0.0.1:1/"), BlockRef::Latest).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn pinned_block_skips_latest_resolution() {
        // With a concrete block number no resolution query is issued, so
        // binding succeeds even against an endpoint that answers nothing.
        let db = StateDb::select(Some("http://127.0.0.1:1/"), BlockRef::Number(1234))
            .await
            .unwrap();
        match db {
            StateDb::Remote(remote) => assert_eq!(remote.block_number(), 1234),
            StateDb::Local(_) => unreachable!("remote endpoint must select the remote store"),
        }
    }
}
