use crate::{
    context::LifecyclePhase,
    db::{
        DumpError,
        RemoteDbError,
        StateError,
    },
    fork::UnknownFork,
    primitives::EVMError,
};
use thiserror::Error;

/// Error taxonomy of the sandbox: configuration, network, decode, execution,
/// and misuse classes. Nothing here is retried automatically; retry policy
/// belongs to the caller or the layers below.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Configuration: the fork identifier is not in the fork table.
    #[error(transparent)]
    UnknownFork(#[from] UnknownFork),
    /// Misuse: an operation was invoked before `init` completed.
    #[error("context is not ready: {phase}")]
    NotReady { phase: LifecyclePhase },
    /// Misuse: `init` was invoked on an already initialized context.
    #[error("context is already initialized")]
    AlreadyInitialized,
    /// Network: provider connection, resolution, or state fetch failed.
    #[error("remote provider error: {0}")]
    Provider(#[from] RemoteDbError),
    /// Decode: a stored value failed to decode during a storage dump.
    #[error("storage dump failed: {0}")]
    Dump(#[from] DumpError),
    /// Storage dumps read the preimage table, which only the local store has.
    #[error("storage dumps require a local state store")]
    RemoteDump,
    /// The execution engine rejected or failed the transaction.
    #[error("transaction execution failed: {0}")]
    Execution(#[from] EVMError<StateError>),
}
