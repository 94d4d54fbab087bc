//! Simulated execution context for smart-contract development.
//!
//! Stands in for a live node: synthesizes and retains a chain of blocks,
//! routes every transaction through a pluggable state store (purely local or
//! lazily fetched from a remote endpoint at a pinned historical block), and
//! records transaction results, opcode traces, and storage-key preimages for
//! later inspection. One context per session; a fresh context reclaims
//! everything.

mod error;
pub use error::SandboxError;

pub mod block;

pub mod constants;

pub mod context;
pub use context::{
    LifecyclePhase,
    SandboxConfig,
    SandboxContext,
};

pub mod db;
pub use db::{
    BlockRef,
    StateDb,
};

pub mod evm;

pub mod fork;
pub use fork::{
    ConsensusType,
    ForkSpec,
};

pub mod inspectors;

pub mod ledger;
pub use ledger::{
    BlockKind,
    ChainLedger,
    ExecutionRecord,
};

pub mod logs;

pub mod primitives;

pub mod vm;
pub use vm::SandboxVm;
