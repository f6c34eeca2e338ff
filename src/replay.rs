//! Drive the profiling engine from a recorded trace.
//!
//! `ReplayHost` plays the part of the host runtime. Introspection answers come
//! from the trace line being replayed, and events only reach the profiler for
//! contexts that have a hook installed.

use std::collections::HashMap;

use callprof_runtime::{
    CallInfo, Config, ContextId, FunctionId, FunctionRecord, HookEvent, HookMode, Host, Info,
    ManualClock, Profiler,
};

use crate::error::Error;
use crate::trace::{Op, TraceLine};

/// Settings applied before the first trace line.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub config: Config,
    pub yield_marker: Option<FunctionId>,
}

/// Final state of the engine after a replay.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub functions: Vec<FunctionRecord>,
    pub info: Info,
    /// Event lines for contexts that had no hook installed.
    pub skipped_events: usize,
}

struct ReplayHost<'t> {
    context: ContextId,
    current: Option<&'t TraceLine>,
    hooks: HashMap<ContextId, HookMode>,
}

impl<'t> ReplayHost<'t> {
    fn new() -> Self {
        Self {
            context: ContextId(0),
            current: None,
            hooks: HashMap::new(),
        }
    }

    fn hooked(&self) -> bool {
        self.hooks.contains_key(&self.context)
    }
}

impl Host for ReplayHost<'_> {
    fn current_context(&self) -> ContextId {
        self.context
    }

    fn call_info(&self) -> Option<CallInfo<'_>> {
        let line = self.current?;
        Some(CallInfo {
            function: FunctionId(line.function?),
            source: line.source.as_deref(),
            name: line.name.as_deref(),
            namewhat: line.namewhat.as_deref(),
            what: line.what.as_deref(),
            line: line.line.unwrap_or(-1),
        })
    }

    fn install_hook(&mut self, mode: HookMode) {
        self.hooks.insert(self.context, mode);
    }

    fn uninstall_hook(&mut self) {
        self.hooks.remove(&self.context);
    }
}

/// Replay `lines` through a fresh profiler and return its final dump.
pub fn replay(lines: &[TraceLine], options: &ReplayOptions) -> Result<ReplayOutcome, Error> {
    let clock = ManualClock::new();
    let mut profiler = Profiler::with_clock(options.config.clone(), clock.clone());
    let mut host = ReplayHost::new();
    let mut skipped_events = 0;

    if options.yield_marker.is_some() {
        profiler.set_yield_marker(options.yield_marker)?;
    }

    for (idx, line) in lines.iter().enumerate() {
        if let Some(t) = line.t {
            clock.set(t);
        }
        host.context = ContextId(line.ctx);
        host.current = Some(line);

        if line.is_event() && !host.hooked() {
            skipped_events += 1;
            log::warn!(
                "trace entry {}: {:?} on {} which has no hook installed",
                idx + 1,
                line.op,
                host.context
            );
            continue;
        }

        match line.op {
            Op::Begin => profiler.begin(&mut host)?,
            Op::End => profiler.end(&mut host)?,
            Op::Clear => profiler.clear()?,
            Op::Enable => profiler.enable()?,
            Op::Disable => profiler.disable()?,
            Op::Reset => profiler.reset(),
            Op::YieldMarker => profiler.set_yield_marker(line.function.map(FunctionId))?,
            Op::TraceTailcall => profiler.set_trace_tailcall(line.on.unwrap_or(false))?,
            Op::Call => profiler.on_event(&host, HookEvent::Call)?,
            Op::Tailcall => profiler.on_event(&host, HookEvent::TailCall)?,
            Op::Return => profiler.on_event(&host, HookEvent::Return)?,
        }
    }

    Ok(ReplayOutcome {
        functions: profiler.dump()?,
        info: profiler.info()?,
        skipped_events,
    })
}
