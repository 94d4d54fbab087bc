use crate::{
    db::StateError,
    primitives::{
        AccountInfo,
        Address,
        B256,
        Bytecode,
        Bytes,
        EvmState,
        KECCAK_EMPTY,
        StorageKey,
        StorageValue,
        U256,
        keccak256,
    },
};
use alloy_rlp::Decodable;
use dashmap::DashMap;
use revm::{
    Database,
    DatabaseCommit,
    DatabaseRef,
};
use serde::Serialize;
use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    sync::Arc,
};
use tracing::trace;

/// One entry of a storage dump: the slot's recovered pre-hash key and its
/// decoded value. The key is absent if the slot was written by a path that
/// bypassed tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpEntry {
    pub key: Option<U256>,
    pub value: U256,
}

/// Storage dump keyed by the hashed slot, ordered for stable display.
pub type StorageDump = BTreeMap<B256, DumpEntry>;

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    /// A stored value failed to decode. The whole dump fails; no partial
    /// result is returned.
    #[error("malformed storage value for slot {slot}")]
    Decode {
        slot: B256,
        #[source]
        source: alloy_rlp::Error,
    },
}

/// Per-account storage, keyed by the keccak digest of the slot and holding
/// the RLP-encoded value. This mirrors the content-addressed layout of the
/// backing store, which is why the original key is unrecoverable without the
/// preimage table.
#[derive(Debug, Clone, Default)]
struct HashedStorage {
    slots: HashMap<B256, Bytes>,
}

/// In-memory state store that records the pre-hash key of every written
/// storage slot, so dumps can show original keys next to the hashed slots the
/// store actually indexes by.
///
/// Composes its maps rather than extending a state manager. Snapshots copy
/// the state maps but share the preimage table: preimages describe keys that
/// were already hashed and are independent of which store generation is being
/// read.
#[derive(Debug, Default)]
pub struct TrackedDb {
    accounts: HashMap<Address, AccountInfo>,
    contracts: HashMap<B256, Bytecode>,
    storage: HashMap<Address, HashedStorage>,
    block_hashes: HashMap<u64, B256>,
    preimages: Arc<DashMap<B256, U256>>,
}

fn hash_slot(slot: U256) -> B256 {
    keccak256(B256::from(slot))
}

impl TrackedDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `keccak(slot) -> slot` in the preimage table, then writes the
    /// encoded value. Last writer wins on both. Every write path, including
    /// EVM commits, funnels through here.
    pub fn write_storage(&mut self, address: Address, slot: U256, value: U256) {
        let hashed = hash_slot(slot);
        self.preimages.insert(hashed, slot);
        self.storage
            .entry(address)
            .or_default()
            .slots
            .insert(hashed, alloy_rlp::encode(value).into());
        trace!(target: "sandbox::tracked_db", %address, %slot, "Tracked storage write");
    }

    /// Inserts an account info, overwriting any existing entry.
    pub fn insert_account_info(&mut self, address: Address, info: AccountInfo) {
        self.accounts.insert(address, info);
    }

    /// Registers a block hash for BLOCKHASH opcode lookups.
    pub fn store_block_hash(&mut self, number: u64, hash: B256) {
        self.block_hashes.insert(number, hash);
    }

    /// Copy-on-write snapshot: fresh copies of the state maps, the same
    /// preimage table reference. Writes to either side after the snapshot are
    /// invisible to the other.
    pub fn snapshot(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            contracts: self.contracts.clone(),
            storage: self.storage.clone(),
            block_hashes: self.block_hashes.clone(),
            preimages: Arc::clone(&self.preimages),
        }
    }

    /// Dumps an account's storage: every stored slot keyed by its hash, with
    /// the recovered original key and the decoded value. A single slot that
    /// fails to decode fails the whole dump.
    pub fn dump_storage(&self, address: Address) -> Result<StorageDump, DumpError> {
        let mut dump = StorageDump::new();
        let Some(storage) = self.storage.get(&address) else {
            return Ok(dump);
        };
        for (hashed, raw) in &storage.slots {
            let value = U256::decode(&mut raw.as_ref()).map_err(|source| {
                DumpError::Decode {
                    slot: *hashed,
                    source,
                }
            })?;
            let key = self.preimages.get(hashed).map(|entry| *entry.value());
            dump.insert(*hashed, DumpEntry { key, value });
        }
        Ok(dump)
    }
}

impl DatabaseRef for TrackedDb {
    type Error = StateError;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        Ok(self.accounts.get(&address).cloned())
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        if code_hash == KECCAK_EMPTY {
            return Ok(Bytecode::new());
        }
        Ok(self.contracts.get(&code_hash).cloned().unwrap_or_default())
    }

    fn storage_ref(&self, address: Address, index: StorageKey) -> Result<StorageValue, Self::Error> {
        let hashed = hash_slot(index);
        match self.storage.get(&address).and_then(|s| s.slots.get(&hashed)) {
            Some(raw) => Ok(U256::decode(&mut raw.as_ref())?),
            None => Ok(U256::ZERO),
        }
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        match self.block_hashes.get(&number) {
            Some(hash) => Ok(*hash),
            None => Ok(keccak256(number.to_string().as_bytes())),
        }
    }
}

impl Database for TrackedDb {
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

impl DatabaseCommit for TrackedDb {
    fn commit(&mut self, changes: EvmState) {
        for (address, account) in changes {
            if !account.is_touched() {
                continue;
            }
            if account.is_selfdestructed() {
                self.accounts.insert(address, account.info.clone());
                self.storage.entry(address).or_default().slots.clear();
                continue;
            }

            if let Some(code) = account.info.code.clone() {
                self.contracts.insert(account.info.code_hash, code);
            }
            self.accounts.insert(address, account.info.clone());

            for (slot, value) in account.storage {
                self.write_storage(address, slot, value.present_value());
            }
        }
    }
}
