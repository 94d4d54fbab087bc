use crate::{
    evm::EthCtx,
    primitives::{
        Address,
        Bytes,
    },
};
use parking_lot::{
    RwLock,
    RwLockWriteGuard,
};
use revm::{
    Database,
    Inspector,
    interpreter::{
        CallInputs,
        CallOutcome,
        CreateInputs,
        CreateOutcome,
        Interpreter,
        interpreter_types::Jumps,
    },
};
use std::sync::Arc;

/// One opcode-level event observed during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTrace {
    pub pc: usize,
    pub opcode: u8,
    pub gas_remaining: u64,
    /// Call nesting depth at the time of the step (0 = top-level frame).
    pub depth: u32,
}

/// One call frame observed during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTrace {
    pub caller: Address,
    /// Callee, or the created contract's deployer context for creation
    /// frames.
    pub target: Address,
    pub input: Bytes,
    pub gas_limit: u64,
    pub depth: u32,
    /// `None` until the frame ends.
    pub reverted: Option<bool>,
    pub output: Option<Bytes>,
}

/// Finished trace of a single transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceReport {
    pub steps: Vec<StepTrace>,
    pub calls: Vec<CallTrace>,
}

impl TraceReport {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.calls.is_empty()
    }
}

/// Records opcode steps and the call tree of one transaction. Cleared at the
/// start of each traced transaction; frames follow strict stack discipline,
/// so depth is tracked with a plain stack of open frame indices.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    steps: Vec<StepTrace>,
    calls: Vec<CallTrace>,
    open_frames: Vec<usize>,
}

impl TraceRecorder {
    /// Drops everything recorded for the previous transaction.
    pub fn clear(&mut self) {
        self.steps.clear();
        self.calls.clear();
        self.open_frames.clear();
    }

    /// Snapshot of everything recorded so far.
    pub fn report(&self) -> TraceReport {
        TraceReport {
            steps: self.steps.clone(),
            calls: self.calls.clone(),
        }
    }

    fn record_frame_start(&mut self, caller: Address, target: Address, input: Bytes, gas_limit: u64) {
        let depth = self.open_frames.len() as u32;
        self.open_frames.push(self.calls.len());
        self.calls.push(CallTrace {
            caller,
            target,
            input,
            gas_limit,
            depth,
            reverted: None,
            output: None,
        });
    }

    fn record_frame_end(&mut self, reverted: bool, output: Bytes) {
        if let Some(index) = self.open_frames.pop()
            && let Some(frame) = self.calls.get_mut(index)
        {
            frame.reverted = Some(reverted);
            frame.output = Some(output);
        }
    }
}

impl<DB: Database> Inspector<EthCtx<'_, DB>> for TraceRecorder {
    fn step(&mut self, interp: &mut Interpreter, _context: &mut EthCtx<'_, DB>) {
        self.steps.push(StepTrace {
            pc: interp.bytecode.pc(),
            opcode: interp.bytecode.opcode(),
            gas_remaining: interp.gas.remaining(),
            depth: self.open_frames.len().saturating_sub(1) as u32,
        });
    }

    fn call(&mut self, context: &mut EthCtx<'_, DB>, inputs: &mut CallInputs) -> Option<CallOutcome> {
        let input_bytes = inputs.input.bytes(context);
        self.record_frame_start(
            inputs.caller,
            inputs.target_address,
            input_bytes,
            inputs.gas_limit,
        );
        None
    }

    fn call_end(
        &mut self,
        _context: &mut EthCtx<'_, DB>,
        _inputs: &CallInputs,
        outcome: &mut CallOutcome,
    ) {
        self.record_frame_end(
            !outcome.result.result.is_ok(),
            outcome.result.output.clone(),
        );
    }

    fn create(
        &mut self,
        _context: &mut EthCtx<'_, DB>,
        inputs: &mut CreateInputs,
    ) -> Option<CreateOutcome> {
        self.record_frame_start(
            inputs.caller,
            inputs.caller,
            inputs.init_code.clone(),
            inputs.gas_limit,
        );
        None
    }

    fn create_end(
        &mut self,
        _context: &mut EthCtx<'_, DB>,
        _inputs: &CreateInputs,
        outcome: &mut CreateOutcome,
    ) {
        self.record_frame_end(
            !outcome.result.result.is_ok(),
            outcome.result.output.clone(),
        );
    }
}

/// Cloneable handle to the recorder the execution handle drives. Callers read
/// the last trace through this; the vm takes the write side for the duration
/// of a transaction.
#[derive(Debug, Clone, Default)]
pub struct Tracer {
    inner: Arc<RwLock<TraceRecorder>>,
}

impl Tracer {
    /// Clears the recorder and returns the guard the EVM writes through.
    pub(crate) fn begin(&self) -> RwLockWriteGuard<'_, TraceRecorder> {
        let mut guard = self.inner.write();
        guard.clear();
        guard
    }

    /// Trace of the most recently executed transaction.
    pub fn last_trace(&self) -> TraceReport {
        self.inner.read().report()
    }
}
