//! The profile context: pools, running set, switches and accumulators.
//!
//! One context exists per host state. It owns every call stack and record;
//! the host only ever holds identity tokens.

use crate::config::Config;
use crate::error::ProfileError;
use crate::host::{HookMode, Host};
use crate::ident::{ContextId, FunctionId, IdentityMap};
use crate::records::{FunctionRecord, RecordPool};
use crate::stack::CallStackPool;

/// Profiling state of one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Events are being handled with the hook installed by the latest `begin`.
    Profiling(HookMode),
}

/// Process-wide accumulators, in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Totals {
    /// Time spent inside the handler.
    pub(crate) lost_ns: u64,
    pub(crate) self_ns: u64,
    pub(crate) yield_ns: u64,
    /// Frames thrown away while resynchronizing on a mismatched return.
    pub(crate) desync_frames: u64,
}

/// Point-in-time view of pool sizes and accumulators.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Info {
    pub stack_pool_used: usize,
    pub stack_pool_free: usize,
    pub stack_pool_peak_used: usize,
    pub record_pool_capacity: usize,
    pub record_pool_len: usize,
    pub lost_ns: u64,
    pub self_ns: u64,
    pub yield_ns: u64,
    pub desync_frames: u64,
    pub enabled: bool,
    pub yield_marker: Option<FunctionId>,
    pub trace_tailcall: bool,
}

#[derive(Debug)]
pub struct ProfileContext {
    pub(crate) running: IdentityMap<ContextId, HookMode>,
    pub(crate) stacks: CallStackPool,
    pub(crate) records: RecordPool,
    pub(crate) totals: Totals,
    pub(crate) enabled: bool,
    pub(crate) yield_marker: Option<FunctionId>,
    pub(crate) trace_tailcall: bool,
}

impl ProfileContext {
    pub fn new(config: &Config) -> Result<Self, ProfileError> {
        let ctx = Self {
            running: IdentityMap::new(),
            stacks: CallStackPool::new(config.initial_stacks, config.stack_capacity)?,
            records: RecordPool::with_capacity(config.record_capacity)?,
            totals: Totals::default(),
            enabled: config.enabled,
            yield_marker: None,
            trace_tailcall: config.trace_tailcall,
        };
        log::trace!(
            "profile context created: {} stacks, {} record slots",
            ctx.stacks.free(),
            ctx.records.capacity()
        );
        Ok(ctx)
    }

    /// Start a session on the host's current context.
    ///
    /// Nested sessions share the context's stack; every `begin` discards
    /// whatever frames a previous session left on it.
    pub fn begin<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<(), ProfileError> {
        let context = host.current_context();
        let mode = HookMode::for_tailcall_tracing(self.trace_tailcall);
        self.running.set(context, mode);
        host.install_hook(mode);
        self.stacks.acquire(context)?.reset();
        log::debug!("profiling session started on {context} ({mode:?})");
        Ok(())
    }

    /// End a session on the host's current context. Unknown contexts are a no-op.
    pub fn end<H: Host + ?Sized>(&mut self, host: &mut H) {
        let context = host.current_context();
        self.running.remove(context);
        host.uninstall_hook();
        self.stacks.release(context);
        log::debug!("profiling session ended on {context}");
    }

    /// Forget all records and accumulators. In-flight stacks are untouched.
    pub fn clear(&mut self) {
        self.records.clear();
        self.totals = Totals::default();
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Function whose self time counts as suspension rather than work.
    pub fn set_yield_marker(&mut self, marker: Option<FunctionId>) {
        self.yield_marker = marker;
    }

    pub fn yield_marker(&self) -> Option<FunctionId> {
        self.yield_marker
    }

    /// Takes effect for hooks installed by later `begin` calls.
    pub fn set_trace_tailcall(&mut self, on: bool) {
        self.trace_tailcall = on;
    }

    pub fn trace_tailcall(&self) -> bool {
        self.trace_tailcall
    }

    pub fn state(&self, context: ContextId) -> SessionState {
        match self.running.get(context) {
            Some(&mode) => SessionState::Profiling(mode),
            None => SessionState::Idle,
        }
    }

    pub fn stacks(&self) -> &CallStackPool {
        &self.stacks
    }

    pub fn dump(&self) -> Vec<FunctionRecord> {
        self.records.snapshot()
    }

    pub fn info(&self) -> Info {
        Info {
            stack_pool_used: self.stacks.used(),
            stack_pool_free: self.stacks.free(),
            stack_pool_peak_used: self.stacks.peak_used(),
            record_pool_capacity: self.records.capacity(),
            record_pool_len: self.records.len(),
            lost_ns: self.totals.lost_ns,
            self_ns: self.totals.self_ns,
            yield_ns: self.totals.yield_ns,
            desync_frames: self.totals.desync_frames,
            enabled: self.enabled,
            yield_marker: self.yield_marker,
            trace_tailcall: self.trace_tailcall,
        }
    }
}

impl Drop for ProfileContext {
    fn drop(&mut self) {
        log::trace!(
            "profile context destroyed: {} active stacks, {} records",
            self.stacks.used(),
            self.records.len()
        );
    }
}
