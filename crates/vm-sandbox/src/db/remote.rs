use crate::primitives::{
    AccountInfo,
    Address,
    B256,
    Bytecode,
    EvmState,
    StorageKey,
    StorageValue,
    keccak256,
};
use alloy_provider::{
    Provider,
    ProviderBuilder,
    RootProvider,
};
use alloy_transport::{
    RpcError,
    TransportErrorKind,
};
use dashmap::DashMap;
use revm::{
    Database,
    DatabaseCommit,
    DatabaseRef,
    database::DBErrorMarker,
};
use std::{
    collections::HashMap,
    sync::Arc,
};
use tracing::{
    debug,
    trace,
};

/// Which historical block a remote context is bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockRef {
    /// Resolved to a concrete number exactly once, at context creation.
    #[default]
    Latest,
    Number(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteDbError {
    #[error("invalid node url")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build the RPC provider")]
    BuildProvider(#[source] RpcError<TransportErrorKind>),
    #[error("failed to resolve the latest block number")]
    ResolveLatest(#[source] RpcError<TransportErrorKind>),
    #[error("provider error during RPC call")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("block not found")]
    BlockNotFound,
    #[error("code by hash not found")]
    CodeByHashNotFound,
    #[error("runtime error")]
    Runtime,
}

impl DBErrorMarker for RemoteDbError {}

/// Provider-backed state store pinned to one historical block.
///
/// Reads that miss the local overlay fetch from the network, one entry at a
/// time, always against the pinned block. Committed writes land in the
/// overlay, which is consulted first, so executed transactions layer on top
/// of the remote state without touching it.
#[derive(Debug)]
pub struct RemoteDb {
    provider: Arc<RootProvider>,
    block_number: u64,
    basic: HashMap<Address, AccountInfo>,
    storage: HashMap<Address, HashMap<StorageKey, StorageValue>>,
    code_by_hash: HashMap<B256, Bytecode>,
    /// Bytecode seen while fetching accounts. `code_by_hash` cannot be served
    /// by standard JSON-RPC, so this cache is the only source for it.
    code_cache: Arc<DashMap<B256, Bytecode>>,
    block_hashes: HashMap<u64, B256>,
}

impl RemoteDb {
    /// Connects to the endpoint and binds the store to a block. A `Latest`
    /// reference is resolved to a concrete number by a single network query;
    /// the resolved number is fixed for the lifetime of the store, even if
    /// the remote chain advances.
    pub async fn connect(node_url: &str, block_ref: BlockRef) -> Result<Self, RemoteDbError> {
        url::Url::parse(node_url)?;
        let provider = ProviderBuilder::new()
            .connect(node_url)
            .await
            .map_err(RemoteDbError::BuildProvider)?;
        let provider = Arc::new(provider.root().clone());

        let block_number = match block_ref {
            BlockRef::Number(number) => number,
            BlockRef::Latest => {
                provider
                    .get_block_number()
                    .await
                    .map_err(RemoteDbError::ResolveLatest)?
            }
        };
        debug!(target: "sandbox::remote_db", block_number, "Bound remote state store");

        Ok(Self {
            provider,
            block_number,
            basic: HashMap::new(),
            storage: HashMap::new(),
            code_by_hash: HashMap::new(),
            code_cache: Arc::new(DashMap::default()),
            block_hashes: HashMap::new(),
        })
    }

    /// The concrete block number this store reads remote state at.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Inserts an account info into the overlay, overwriting any existing
    /// entry.
    pub fn insert_account_info(&mut self, address: Address, info: AccountInfo) {
        self.basic.insert(address, info);
    }

    /// Registers a block hash for BLOCKHASH opcode lookups on locally
    /// synthesized blocks.
    pub fn store_block_hash(&mut self, number: u64, hash: B256) {
        self.block_hashes.insert(number, hash);
    }

    fn fetch_basic(&self, address: Address) -> Result<Option<AccountInfo>, RemoteDbError> {
        let provider = self.provider.clone();
        let block_number = self.block_number;
        let future = async move {
            let balance = provider
                .get_balance(address)
                .block_id(block_number.into())
                .await
                .map_err(|e| RemoteDbError::Provider(Box::new(e)))?;
            let nonce = provider
                .get_transaction_count(address)
                .block_id(block_number.into())
                .await
                .map_err(|e| RemoteDbError::Provider(Box::new(e)))?;
            let code = provider
                .get_code_at(address)
                .block_id(block_number.into())
                .await
                .map_err(|e| RemoteDbError::Provider(Box::new(e)))?;

            let code_hash = if code.is_empty() {
                revm::primitives::KECCAK_EMPTY
            } else {
                keccak256(&code)
            };

            Ok(Some(AccountInfo {
                balance,
                nonce,
                code_hash,
                code: if code.is_empty() {
                    None
                } else {
                    let bytecode = Bytecode::new_raw(code);
                    self.code_cache.insert(code_hash, bytecode.clone());
                    Some(bytecode)
                },
            }))
        };
        let handle = tokio::runtime::Handle::current();
        std::thread::scope(|s| {
            s.spawn(|| handle.block_on(future))
                .join()
                .map_err(|_| RemoteDbError::Runtime)?
        })
    }

    fn fetch_storage(
        &self,
        address: Address,
        index: StorageKey,
    ) -> Result<StorageValue, RemoteDbError> {
        let provider = self.provider.clone();
        let block_number = self.block_number;
        let future = async move {
            provider
                .get_storage_at(address, index)
                .block_id(block_number.into())
                .await
                .map_err(|e| RemoteDbError::Provider(Box::new(e)))
        };
        let handle = tokio::runtime::Handle::current();
        std::thread::scope(|s| {
            s.spawn(|| handle.block_on(future))
                .join()
                .map_err(|_| RemoteDbError::Runtime)?
        })
    }

    fn fetch_block_hash(&self, number: u64) -> Result<B256, RemoteDbError> {
        let provider = self.provider.clone();
        let future = async move {
            let block = provider
                .get_block_by_number(number.into())
                .await
                .map_err(|e| RemoteDbError::Provider(Box::new(e)))?
                .ok_or(RemoteDbError::BlockNotFound)?;

            Ok(block.header.hash)
        };
        let handle = tokio::runtime::Handle::current();
        std::thread::scope(|s| {
            s.spawn(|| handle.block_on(future))
                .join()
                .map_err(|_| RemoteDbError::Runtime)?
        })
    }
}

impl DatabaseRef for RemoteDb {
    type Error = RemoteDbError;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        if let Some(info) = self.basic.get(&address) {
            return Ok(Some(info.clone()));
        }
        trace!(target: "sandbox::remote_db", %address, "Fetching account from provider");
        self.fetch_basic(address)
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        if code_hash == revm::primitives::KECCAK_EMPTY {
            return Ok(Bytecode::default());
        }
        if let Some(code) = self.code_by_hash.get(&code_hash) {
            return Ok(code.clone());
        }
        if let Some(code) = self.code_cache.get(&code_hash) {
            return Ok(code.clone());
        }
        // Standard JSON-RPC cannot serve code by hash; the account fetch that
        // preceded this lookup is expected to have populated the cache.
        Err(RemoteDbError::CodeByHashNotFound)
    }

    fn storage_ref(&self, address: Address, index: StorageKey) -> Result<StorageValue, Self::Error> {
        if let Some(value) = self.storage.get(&address).and_then(|s| s.get(&index)) {
            return Ok(*value);
        }
        trace!(target: "sandbox::remote_db", %address, %index, "Fetching storage from provider");
        self.fetch_storage(address, index)
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        if let Some(hash) = self.block_hashes.get(&number) {
            return Ok(*hash);
        }
        self.fetch_block_hash(number)
    }
}

impl Database for RemoteDb {
    type Error = RemoteDbError;

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

impl DatabaseCommit for RemoteDb {
    fn commit(&mut self, changes: EvmState) {
        for (address, account) in changes {
            if !account.is_touched() {
                continue;
            }
            if let Some(code) = account.info.code.clone() {
                self.code_by_hash.insert(account.info.code_hash, code);
            }
            self.basic.insert(address, account.info.clone());
            let slots = self.storage.entry(address).or_default();
            for (slot, value) in account.storage {
                slots.insert(slot, value.present_value());
            }
        }
    }
}
