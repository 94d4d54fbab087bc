use crate::{
    block::SealedBlock,
    db::{
        BlockRef,
        StateDb,
        StorageDump,
    },
    error::SandboxError,
    fork::ForkSpec,
    inspectors::Tracer,
    ledger::{
        BlockKind,
        ChainLedger,
        ExecutionRecord,
    },
    logs::{
        LogFilter,
        StoredLog,
    },
    primitives::{
        Address,
        B256,
        TxEnv,
        U256,
    },
    vm::SandboxVm,
};
use std::{
    fmt,
    sync::Arc,
};
use tracing::{
    debug,
    warn,
};

/// Configuration captured at construction. All I/O is deferred to `init`.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfig {
    pub fork: ForkSpec,
    /// Remote endpoint to pull historical state from. Absent means a purely
    /// local context.
    pub node_url: Option<String>,
    /// Block the remote store is bound to. Ignored without `node_url`.
    pub block_ref: BlockRef,
    /// Accounts funded in the state store before genesis is appended.
    pub genesis_accounts: Vec<(Address, U256)>,
}

impl SandboxConfig {
    pub fn new(fork: ForkSpec) -> Self {
        Self {
            fork,
            ..Default::default()
        }
    }

    /// Parses the fork identifier; unknown identifiers are a configuration
    /// error surfaced before any context exists.
    pub fn for_fork(fork: &str) -> Result<Self, SandboxError> {
        Ok(Self::new(fork.parse()?))
    }

    /// Pull state from a remote endpoint instead of starting empty.
    pub fn with_node_url(mut self, node_url: impl Into<String>) -> Self {
        self.node_url = Some(node_url.into());
        self
    }

    /// Bind the remote store to a specific historical block.
    pub fn with_block_ref(mut self, block_ref: BlockRef) -> Self {
        self.block_ref = block_ref;
        self
    }

    /// Fund an account before genesis is appended.
    pub fn with_genesis_account(mut self, address: Address, balance: U256) -> Self {
        self.genesis_accounts.push((address, balance));
        self
    }
}

/// Externally visible lifecycle phase of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Unconfigured,
    Initializing,
    Ready,
    Failed,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            LifecyclePhase::Unconfigured => "unconfigured",
            LifecyclePhase::Initializing => "initializing",
            LifecyclePhase::Ready => "ready",
            LifecyclePhase::Failed => "failed",
        };
        f.write_str(phase)
    }
}

#[derive(Debug)]
enum Lifecycle {
    Unconfigured,
    Initializing,
    Ready(SandboxVm),
    /// Bootstrap failed; the message is kept so later calls can report what
    /// happened instead of a bare misuse error.
    Failed(String),
}

impl Lifecycle {
    fn phase(&self) -> LifecyclePhase {
        match self {
            Lifecycle::Unconfigured => LifecyclePhase::Unconfigured,
            Lifecycle::Initializing => LifecyclePhase::Initializing,
            Lifecycle::Ready(_) => LifecyclePhase::Ready,
            Lifecycle::Failed(_) => LifecyclePhase::Failed,
        }
    }
}

/// The simulated execution context callers hold.
///
/// Construction captures configuration only; `init` performs all I/O and must
/// complete before any other operation is valid. The lifecycle is an explicit
/// state machine (unconfigured, initializing, ready, failed) and every
/// tracked operation is gated on the ready state, so misuse yields a
/// deterministic error rather than undefined behavior on a half-built
/// context.
#[derive(Debug)]
pub struct SandboxContext {
    config: SandboxConfig,
    ledger: Arc<ChainLedger>,
    lifecycle: Lifecycle,
}

impl SandboxContext {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            ledger: Arc::new(ChainLedger::new()),
            lifecycle: Lifecycle::Unconfigured,
        }
    }

    /// Performs all bootstrap I/O: state store selection (including the
    /// one-time resolution of a `Latest` block reference), genesis
    /// construction, and the genesis append. On failure the context lands in
    /// the failed state and the error is returned; no partially initialized
    /// context is exposed.
    pub async fn init(&mut self) -> Result<(), SandboxError> {
        if let Lifecycle::Ready(_) = self.lifecycle {
            return Err(SandboxError::AlreadyInitialized);
        }
        self.lifecycle = Lifecycle::Initializing;

        match self.bootstrap().await {
            Ok(vm) => {
                debug!(target: "sandbox::context", fork = %self.config.fork, "Context initialized");
                self.lifecycle = Lifecycle::Ready(vm);
                Ok(())
            }
            Err(err) => {
                warn!(target: "sandbox::context", error = %err, "Context initialization failed");
                self.lifecycle = Lifecycle::Failed(err.to_string());
                Err(err)
            }
        }
    }

    async fn bootstrap(&self) -> Result<SandboxVm, SandboxError> {
        let state = StateDb::select(self.config.node_url.as_deref(), self.config.block_ref).await?;
        Ok(SandboxVm::bootstrap(
            self.config.fork,
            state,
            Arc::clone(&self.ledger),
            &self.config.genesis_accounts,
        ))
    }

    /// The active fork. Part of captured configuration, readable before
    /// `init`.
    pub fn fork(&self) -> ForkSpec {
        self.config.fork
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.lifecycle.phase()
    }

    /// Why initialization failed, if it did.
    pub fn failure(&self) -> Option<&str> {
        match &self.lifecycle {
            Lifecycle::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// The execution engine handle. Gated on the ready state.
    pub fn vm(&self) -> Result<&SandboxVm, SandboxError> {
        match &self.lifecycle {
            Lifecycle::Ready(vm) => Ok(vm),
            other => {
                Err(SandboxError::NotReady {
                    phase: other.phase(),
                })
            }
        }
    }

    /// Mutable access to the execution engine handle, for running
    /// transactions.
    pub fn vm_mut(&mut self) -> Result<&mut SandboxVm, SandboxError> {
        match &mut self.lifecycle {
            Lifecycle::Ready(vm) => Ok(vm),
            other => {
                Err(SandboxError::NotReady {
                    phase: other.phase(),
                })
            }
        }
    }

    /// The tracing handle observing opcode-level events of this context's
    /// executions.
    pub fn tracer(&self) -> Result<Tracer, SandboxError> {
        Ok(self.vm()?.tracer())
    }

    pub fn append_block(&self, block: Arc<SealedBlock>, kind: BlockKind) -> Result<(), SandboxError> {
        self.vm()?;
        self.ledger.append_block(block, kind);
        Ok(())
    }

    pub fn track_transaction(
        &self,
        hash: B256,
        block: Arc<SealedBlock>,
        tx: TxEnv,
    ) -> Result<(), SandboxError> {
        self.vm()?;
        self.ledger.track_transaction(hash, block, tx);
        Ok(())
    }

    pub fn track_result(&self, hash: B256, record: ExecutionRecord) -> Result<(), SandboxError> {
        self.vm()?;
        self.ledger.track_result(hash, record);
        Ok(())
    }

    pub fn block_by_hash(&self, hash: B256) -> Result<Option<Arc<SealedBlock>>, SandboxError> {
        self.vm()?;
        Ok(self.ledger.block_by_hash(hash))
    }

    pub fn block_by_number(&self, number: u64) -> Result<Option<Arc<SealedBlock>>, SandboxError> {
        self.vm()?;
        Ok(self.ledger.block_by_number(number))
    }

    pub fn latest_block_number(&self) -> Result<Option<u64>, SandboxError> {
        self.vm()?;
        Ok(self.ledger.latest_block_number())
    }

    pub fn block_for_transaction(
        &self,
        hash: B256,
    ) -> Result<Option<Arc<SealedBlock>>, SandboxError> {
        self.vm()?;
        Ok(self.ledger.block_for_transaction(hash))
    }

    pub fn transaction_by_hash(&self, hash: B256) -> Result<Option<TxEnv>, SandboxError> {
        self.vm()?;
        Ok(self.ledger.transaction_by_hash(hash))
    }

    /// Execution record for a transaction hash. `Ok(None)` is an explicit
    /// not-found, distinguishable from any real result.
    pub fn result_for_transaction(
        &self,
        hash: B256,
    ) -> Result<Option<ExecutionRecord>, SandboxError> {
        self.vm()?;
        Ok(self.ledger.result_for_transaction(hash))
    }

    pub fn logs_matching(&self, filter: &LogFilter) -> Result<Vec<StoredLog>, SandboxError> {
        self.vm()?;
        Ok(self.ledger.logs_matching(filter))
    }

    /// Storage dump of an account, with recovered pre-hash keys. Only the
    /// local store tracks preimages; a remote context reports an error rather
    /// than a lossy dump.
    pub fn dump_storage(&self, address: Address) -> Result<StorageDump, SandboxError> {
        match self.vm()?.state() {
            StateDb::Local(db) => Ok(db.dump_storage(address)?),
            StateDb::Remote(_) => Err(SandboxError::RemoteDump),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::uint;

    fn local_config() -> SandboxConfig {
        SandboxConfig::new(ForkSpec::Merge)
    }

    #[tokio::test]
    async fn init_transitions_to_ready() {
        let mut context = SandboxContext::new(local_config());
        assert_eq!(context.phase(), LifecyclePhase::Unconfigured);

        context.init().await.unwrap();
        assert_eq!(context.phase(), LifecyclePhase::Ready);
        assert_eq!(context.fork(), ForkSpec::Merge);
    }

    #[tokio::test]
    async fn merge_genesis_matches_the_consensus_profile() {
        let mut context = SandboxContext::new(SandboxConfig::for_fork("merge").unwrap());
        context.init().await.unwrap();

        let genesis = context.block_by_number(0).unwrap().unwrap();
        assert_eq!(genesis.difficulty(), U256::ZERO);
        assert_eq!(genesis.number(), 0);
        assert_eq!(context.latest_block_number().unwrap(), Some(0));
    }

    #[test]
    fn operations_before_init_are_misuse_errors() {
        let context = SandboxContext::new(local_config());

        let err = context.latest_block_number().unwrap_err();
        assert!(matches!(
            err,
            SandboxError::NotReady {
                phase: LifecyclePhase::Unconfigured
            }
        ));
        assert!(context.vm().is_err());
        assert!(context.tracer().is_err());
        assert!(context.dump_storage(Address::ZERO).is_err());
        assert!(context.result_for_transaction(B256::ZERO).is_err());
    }

    #[tokio::test]
    async fn double_init_is_rejected() {
        let mut context = SandboxContext::new(local_config());
        context.init().await.unwrap();
        let err = context.init().await.unwrap_err();
        assert!(matches!(err, SandboxError::AlreadyInitialized));
    }

    #[tokio::test]
    async fn failed_init_leaves_a_failed_context() {
        let mut context = SandboxContext::new(
            local_config().with_node_url("http://127.0.0.1:1/"),
        );
        assert!(context.init().await.is_err());
        assert_eq!(context.phase(), LifecyclePhase::Failed);
        assert!(context.failure().is_some());

        let err = context.latest_block_number().unwrap_err();
        assert!(matches!(
            err,
            SandboxError::NotReady {
                phase: LifecyclePhase::Failed
            }
        ));
    }

    #[test]
    fn unknown_fork_fails_before_construction() {
        assert!(matches!(
            SandboxConfig::for_fork("byzantium"),
            Err(SandboxError::UnknownFork(_))
        ));
    }

    #[tokio::test]
    async fn genesis_accounts_are_funded() {
        let rich = Address::with_last_byte(0x11);
        let mut context = SandboxContext::new(
            local_config().with_genesis_account(rich, uint!(42_U256)),
        );
        context.init().await.unwrap();

        use crate::db::DatabaseRef;
        let balance = context
            .vm()
            .unwrap()
            .state()
            .basic_ref(rich)
            .unwrap()
            .unwrap()
            .balance;
        assert_eq!(balance, uint!(42_U256));
    }
}
