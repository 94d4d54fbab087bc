use crate::{
    block::SealedBlock,
    constants::{
        CHAIN_ID,
        COINBASE,
        DEFAULT_BLOCK_GAS_LIMIT,
        GENESIS_GAS_LIMIT,
    },
    db::{
        DatabaseCommit,
        StateDb,
    },
    error::SandboxError,
    evm::{
        build_eth_evm,
        evm_env,
    },
    fork::ForkSpec,
    inspectors::Tracer,
    ledger::{
        BlockKind,
        ChainLedger,
    },
    primitives::{
        AccountInfo,
        Address,
        B256,
        BlobExcessGasAndPrice,
        BlockEnv,
        ResultAndState,
        TxEnv,
        U256,
    },
};
use alloy_consensus::Header;
use revm::InspectEvm;
use std::{
    sync::Arc,
    time::{
        SystemTime,
        UNIX_EPOCH,
    },
};
use tracing::{
    debug,
    instrument,
};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// The assembled execution environment of one context: fork rules, the
/// selected state store, the trace recorder, and the ledger genesis was
/// appended to. This is the handle callers run transactions through.
#[derive(Debug)]
pub struct SandboxVm {
    fork: ForkSpec,
    state: StateDb,
    tracer: Tracer,
    ledger: Arc<ChainLedger>,
    block_gas_limit: u64,
}

impl SandboxVm {
    /// Wires consensus parameters, genesis, state store, and tracer into one
    /// handle: derives the fork's difficulty, pre-funds the configured
    /// accounts, seals the genesis block, and appends it to the ledger marked
    /// genesis so log processing skips it.
    #[instrument(level = "debug", skip(state, ledger, genesis_accounts), target = "sandbox::vm")]
    pub(crate) fn bootstrap(
        fork: ForkSpec,
        mut state: StateDb,
        ledger: Arc<ChainLedger>,
        genesis_accounts: &[(Address, U256)],
    ) -> Self {
        for (address, balance) in genesis_accounts {
            state.insert_account_info(
                *address,
                AccountInfo {
                    balance: *balance,
                    ..Default::default()
                },
            );
        }

        let genesis = Arc::new(SealedBlock::seal(
            Header {
                number: 0,
                timestamp: unix_now(),
                beneficiary: COINBASE,
                difficulty: fork.difficulty(),
                gas_limit: GENESIS_GAS_LIMIT,
                ..Default::default()
            },
            Vec::new(),
        ));
        state.store_block_hash(0, genesis.hash());
        ledger.append_block(Arc::clone(&genesis), BlockKind::Genesis);
        debug!(
            target: "sandbox::vm",
            %fork,
            difficulty = %fork.difficulty(),
            hash = %genesis.hash(),
            "Sealed genesis block"
        );

        Self {
            fork,
            state,
            tracer: Tracer::default(),
            ledger,
            block_gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
        }
    }

    pub fn fork(&self) -> ForkSpec {
        self.fork
    }

    /// Shared handle to the trace recorder observing this vm's executions.
    pub fn tracer(&self) -> Tracer {
        self.tracer.clone()
    }

    pub fn state(&self) -> &StateDb {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateDb {
        &mut self.state
    }

    /// Gas limit applied to blocks synthesized after genesis.
    pub fn block_gas_limit(&self) -> u64 {
        self.block_gas_limit
    }

    /// Block environment for the next synthesized block: one past the latest
    /// appended block, the default per-block gas limit, and the fork's
    /// difficulty rules.
    pub fn next_block_env(&self) -> BlockEnv {
        let mut block_env = BlockEnv::default();
        block_env.number = self
            .ledger
            .latest_block_number()
            .map_or(0, |latest| latest + 1);
        block_env.beneficiary = COINBASE;
        block_env.timestamp = unix_now();
        block_env.gas_limit = self.block_gas_limit;
        block_env.basefee = 0;
        block_env.difficulty = self.fork.difficulty();
        block_env.prevrandao = Some(B256::ZERO);
        block_env.blob_excess_gas_and_price = Some(BlobExcessGasAndPrice {
            excess_blob_gas: 0,
            blob_gasprice: 1,
        });
        block_env
    }

    /// Runs a transaction through the execution engine with the trace
    /// recorder attached. State changes are returned, not committed.
    #[instrument(level = "trace", skip_all, target = "sandbox::vm")]
    pub fn transact(&mut self, tx_env: TxEnv) -> Result<ResultAndState, SandboxError> {
        let env = evm_env(CHAIN_ID, self.fork.spec_id(), self.next_block_env());
        let tracer = self.tracer.clone();
        let mut recorder = tracer.begin();
        let mut evm = build_eth_evm(&mut self.state, &env, &mut *recorder);
        let result_and_state = evm.inspect_with_tx(tx_env).map_err(|e| {
            debug!(target: "sandbox::vm", error = %e, "Evm error executing transaction");
            e
        })?;
        Ok(result_and_state)
    }

    /// Runs a transaction and commits its state delta to the store. This is
    /// the mined-block pipeline; previews that must not touch state use
    /// [`Self::transact`].
    pub fn transact_commit(&mut self, tx_env: TxEnv) -> Result<ResultAndState, SandboxError> {
        let result_and_state = self.transact(tx_env)?;
        self.state.commit(result_and_state.state.clone());
        Ok(result_and_state)
    }

    /// Seals the next block over the given transaction hashes and registers
    /// its hash for BLOCKHASH lookups. The caller decides how to append it
    /// (mined or call-only).
    pub fn seal_block(&mut self, transactions: Vec<B256>) -> Arc<SealedBlock> {
        let env = self.next_block_env();
        let block = Arc::new(SealedBlock::seal(
            Header {
                number: env.number,
                timestamp: env.timestamp,
                beneficiary: env.beneficiary,
                difficulty: env.difficulty,
                gas_limit: env.gas_limit,
                ..Default::default()
            },
            transactions,
        ));
        self.state.store_block_hash(block.number(), block.hash());
        block
    }
}
