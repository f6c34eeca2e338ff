//! Timing accounting across whole sessions, driven through the public API
//! with a deterministic clock.

use std::collections::HashMap;

use callprof_runtime::{
    CallInfo, Config, ContextId, FunctionId, FunctionRecord, HookEvent, HookMode, Host,
    ManualClock, Profiler, SessionState,
};

/// Host with a switchable current context and a settable current function.
#[derive(Default)]
struct FakeVm {
    context: u64,
    function: u64,
    hooks: HashMap<u64, HookMode>,
}

impl Host for FakeVm {
    fn current_context(&self) -> ContextId {
        ContextId(self.context)
    }

    fn call_info(&self) -> Option<CallInfo<'_>> {
        Some(CallInfo {
            function: FunctionId(self.function),
            source: Some("@fake.lua"),
            name: None,
            namewhat: None,
            what: Some("Lua"),
            line: 1,
        })
    }

    fn install_hook(&mut self, mode: HookMode) {
        self.hooks.insert(self.context, mode);
    }

    fn uninstall_hook(&mut self) {
        self.hooks.remove(&self.context);
    }
}

struct Session {
    profiler: Profiler<ManualClock>,
    vm: FakeVm,
}

impl Session {
    fn new(step: u64) -> Self {
        let config = Config {
            initial_stacks: 2,
            stack_capacity: 4,
            record_capacity: 4,
            ..Config::default()
        };
        Self {
            profiler: Profiler::with_clock(config, ManualClock::with_step(step)),
            vm: FakeVm::default(),
        }
    }

    fn switch_to(&mut self, context: u64) {
        self.vm.context = context;
    }

    fn begin(&mut self) {
        self.profiler.begin(&mut self.vm).unwrap();
    }

    fn end(&mut self) {
        self.profiler.end(&mut self.vm).unwrap();
    }

    fn work(&self, ns: u64) {
        self.profiler.clock().advance(ns);
    }

    fn event(&mut self, event: HookEvent, function: u64) {
        self.vm.function = function;
        self.profiler.on_event(&self.vm, event).unwrap();
    }

    fn call(&mut self, function: u64) {
        self.event(HookEvent::Call, function);
    }

    fn tail(&mut self, function: u64) {
        self.event(HookEvent::TailCall, function);
    }

    fn ret(&mut self, function: u64) {
        self.event(HookEvent::Return, function);
    }

    fn record(&mut self, function: u64) -> FunctionRecord {
        self.profiler
            .dump()
            .unwrap()
            .into_iter()
            .find(|r| r.proto == FunctionId(function))
            .unwrap_or_else(|| panic!("no record for function {function}"))
    }

    /// Emit a call tree: `fanout` children per level down to `depth`.
    fn tree(&mut self, function: u64, depth: u32, fanout: u64) {
        self.call(function);
        self.work(7);
        if depth > 0 {
            for child in 0..fanout {
                self.tree(function * 10 + child + 1, depth - 1, fanout);
                self.work(3);
            }
        }
        self.ret(function);
    }
}

#[test]
fn self_times_sum_to_wall_time_minus_overhead() {
    let step = 5;
    let mut s = Session::new(step);
    s.begin();
    s.work(1_000);
    let start = s.profiler.clock().peek();
    s.tree(1, 3, 3);
    // The last clock read happened one step before the current time.
    let finish = s.profiler.clock().peek() - step;

    let info = s.profiler.info().unwrap();
    let self_sum: u64 = s.profiler.dump().unwrap().iter().map(|r| r.self_ns).sum();
    assert_eq!(self_sum, info.self_ns);
    assert!(info.lost_ns > 0);
    assert_eq!(self_sum, (finish - start) - info.lost_ns);
}

#[test]
fn overhead_never_reaches_function_records() {
    let mut s = Session::new(50);
    s.begin();
    s.call(1);
    s.ret(1);
    // No work happened inside the callee; only the handler's own reads.
    let rec = s.record(1);
    assert_eq!(rec.calls, 1);
    assert!(
        rec.total_ns <= 50,
        "callee charged {}ns of handler time",
        rec.total_ns
    );
    assert_eq!(s.profiler.info().unwrap().lost_ns, 100);
}

#[test]
fn repeated_calls_collapse_into_one_record() {
    let mut s = Session::new(0);
    s.begin();
    for _ in 0..25 {
        s.call(3);
        s.work(4);
        s.ret(3);
    }
    let dump = s.profiler.dump().unwrap();
    assert_eq!(dump.len(), 1);
    assert_eq!(dump[0].calls, 25);
    assert_eq!(dump[0].total_ns, 100);
    assert_eq!(dump[0].what, "Lua");
}

#[test]
fn nested_begin_end_shares_stack() {
    let mut s = Session::new(0);
    s.begin();
    s.call(1);
    s.begin(); // restarts the shared stack
    let shared = s
        .profiler
        .context()
        .and_then(|c| c.stacks().get(ContextId(0)))
        .map(|st| (st.len(), st.refs()));
    assert_eq!(shared, Some((0, 2)));

    s.end();
    let info = s.profiler.info().unwrap();
    assert_eq!(info.stack_pool_used, 1);
    assert_eq!(s.profiler.state(ContextId(0)), SessionState::Idle);

    s.end();
    let info = s.profiler.info().unwrap();
    assert_eq!(info.stack_pool_used, 0);
    assert_eq!(info.stack_pool_free, 2);
    assert_eq!(info.stack_pool_peak_used, 1);
}

#[test]
fn coroutines_keep_independent_stacks() {
    let mut s = Session::new(0);
    s.switch_to(1);
    s.begin();
    s.switch_to(2);
    s.begin();

    s.switch_to(1);
    s.call(10);
    s.work(5);
    s.switch_to(2);
    s.call(20);
    s.work(8);
    s.ret(20);
    s.switch_to(1);
    s.work(5);
    s.ret(10);

    let a = s.record(10);
    let b = s.record(20);
    // Context 1 was parked while context 2 ran; its frame saw wall time.
    assert_eq!(a.total_ns, 18);
    assert_eq!(b.total_ns, 8);

    let info = s.profiler.info().unwrap();
    assert_eq!(info.stack_pool_used, 2);
    assert_eq!(info.stack_pool_peak_used, 2);
}

#[test]
fn yield_marker_separates_suspension_from_work() {
    let yield_fn = 99;
    let mut s = Session::new(0);
    s.profiler.set_yield_marker(Some(FunctionId(yield_fn))).unwrap();
    s.switch_to(1);
    s.begin();

    s.call(1);
    s.work(10);
    s.call(2);
    s.work(10);
    s.call(yield_fn);
    // Suspended: another coroutine runs unprofiled for a long time.
    s.work(1_000);
    s.ret(yield_fn);
    s.work(10);
    s.ret(2);
    s.work(10);
    s.ret(1);

    let info = s.profiler.info().unwrap();
    assert_eq!(info.yield_ns, 1_000);

    let marker = s.record(yield_fn);
    assert_eq!(marker.self_ns, 1_000);
    assert_eq!(marker.coroutine_ns, 0);

    let inner = s.record(2);
    assert_eq!(inner.total_ns, 1_020);
    assert_eq!(inner.coroutine_ns, 20);

    let outer = s.record(1);
    assert_eq!(outer.total_ns, 1_040);
    assert_eq!(outer.coroutine_ns, 40);
}

#[test]
fn yield_through_tail_call_counts_whole_chain_as_suspension() {
    let yield_fn = 99;
    let mut s = Session::new(0);
    s.profiler.set_trace_tailcall(true).unwrap();
    s.profiler.set_yield_marker(Some(FunctionId(yield_fn))).unwrap();
    s.begin();

    s.call(1);
    s.call(2);
    s.work(10);
    s.tail(yield_fn);
    s.work(500);
    s.ret(yield_fn);
    s.work(5);
    s.ret(1);

    let info = s.profiler.info().unwrap();
    assert_eq!(info.yield_ns, 510);
    assert_eq!(s.record(yield_fn).coroutine_ns, 0);
    assert_eq!(s.record(2).coroutine_ns, 0);

    let outer = s.record(1);
    assert_eq!(outer.total_ns, 515);
    assert_eq!(outer.coroutine_ns, 5);
}

#[test]
fn tail_call_chain_yields_one_record_per_link() {
    let mut s = Session::new(0);
    s.profiler.set_trace_tailcall(true).unwrap();
    s.begin();
    assert_eq!(s.vm.hooks.get(&0), Some(&HookMode::Materialize));

    s.call(1);
    s.work(1);
    s.tail(2);
    s.work(2);
    s.tail(3);
    s.work(3);
    s.ret(3);

    let (a, b, c) = (s.record(1), s.record(2), s.record(3));
    assert_eq!((a.calls, b.calls, c.calls), (1, 1, 1));
    assert!(!a.tailcall && b.tailcall && c.tailcall);
    assert_eq!((a.self_ns, b.self_ns, c.self_ns), (1, 2, 3));
}

#[test]
fn tailcall_mode_change_applies_to_next_begin_only() {
    let mut s = Session::new(0);
    s.begin();
    s.profiler.set_trace_tailcall(true).unwrap();

    s.call(1);
    s.tail(2);
    s.ret(2);
    // Still overwriting: only the tail callee is recorded.
    let dump = s.profiler.dump().unwrap();
    assert_eq!(dump.len(), 1);
    assert_eq!(dump[0].proto, FunctionId(2));

    s.end();
    s.begin();
    assert_eq!(
        s.profiler.state(ContextId(0)),
        SessionState::Profiling(HookMode::Materialize)
    );
}

#[test]
fn desync_recovery_keeps_later_calls_accurate() {
    let mut s = Session::new(0);
    s.begin();
    s.call(1);
    s.call(2);
    s.call(3);
    s.ret(42); // nothing matches; stack is abandoned

    s.call(5);
    s.work(10);
    s.call(6);
    s.work(20);
    s.ret(6);
    s.work(10);
    s.ret(5);

    let outer = s.record(5);
    assert_eq!((outer.total_ns, outer.self_ns), (40, 20));
    assert_eq!(s.profiler.info().unwrap().desync_frames, 3);
}

#[test]
fn events_outside_a_session_are_ignored() {
    let mut s = Session::new(0);
    s.begin();
    s.end();
    s.call(1);
    s.ret(1);
    assert!(s.profiler.dump().unwrap().is_empty());
}
