//! Execution observers. The trace recorder is the sandbox's window into the
//! execution engine: it listens on opcode-level events while a transaction
//! runs, so callers can reconstruct a trace afterwards.

pub mod tracer;

pub use tracer::{
    CallTrace,
    StepTrace,
    TraceRecorder,
    TraceReport,
    Tracer,
};
