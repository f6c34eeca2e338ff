//! Per-context call stacks and the pool that recycles them.
//!
//! Each profiled execution context owns one `CallStack` while at least one
//! profiling session is attached to it. Stacks live in an index-addressed
//! arena; unowned stacks are threaded onto an intrusive free list through
//! `next_free`, so acquire and release never search.

use crate::bounded::SourceInfo;
use crate::error::ProfileError;
use crate::host::CallInfo;
use crate::ident::{ContextId, FunctionId, IdentityMap};

/// One in-flight invocation.
///
/// All times are nanoseconds from the profiler clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    pub function: FunctionId,
    pub info: SourceInfo,
    pub tailcall: bool,
    /// When the call event reached the handler.
    pub call_event_ns: u64,
    /// When the handler finished its bookkeeping and let the callee run.
    pub call_real_ns: u64,
    pub return_ns: u64,
    pub total_ns: u64,
    pub self_ns: u64,
    /// Wall time spent in descendant calls, handler time included.
    pub subtree_ns: u64,
    /// Suspension time observed while this frame was active.
    pub yield_ns: u64,
}

impl CallFrame {
    pub(crate) fn enter(info: &CallInfo<'_>, tailcall: bool, event_ns: u64) -> Self {
        Self {
            function: info.function,
            info: SourceInfo::from_call(info),
            tailcall,
            call_event_ns: event_ns,
            call_real_ns: event_ns,
            return_ns: 0,
            total_ns: 0,
            self_ns: 0,
            subtree_ns: 0,
            yield_ns: 0,
        }
    }

    /// Replace identity and source in place for an overwriting tail call.
    /// Timing state is kept: the tail callee inherits the caller's slot.
    pub(crate) fn retarget(&mut self, info: &CallInfo<'_>) {
        self.function = info.function;
        self.info = SourceInfo::from_call(info);
        self.tailcall = true;
    }
}

/// Stack of in-flight frames for one execution context.
#[derive(Debug)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    capacity: usize,
    refs: u32,
    generation: u32,
    next_free: Option<u32>,
}

impl CallStack {
    fn with_capacity(capacity: usize) -> Result<Self, ProfileError> {
        let capacity = capacity.max(1);
        let mut frames = Vec::new();
        frames
            .try_reserve_exact(capacity)
            .map_err(|source| ProfileError::StackGrowth { capacity, source })?;
        Ok(Self {
            frames,
            capacity,
            refs: 0,
            generation: 0,
            next_free: None,
        })
    }

    /// Push a frame, doubling the backing storage when full.
    pub fn push(&mut self, frame: CallFrame) -> Result<&mut CallFrame, ProfileError> {
        if self.frames.len() >= self.capacity {
            let capacity = self.capacity * 2;
            self.frames
                .try_reserve_exact(capacity - self.frames.len())
                .map_err(|source| ProfileError::StackGrowth { capacity, source })?;
            log::trace!("call stack grew to {capacity} frames");
            self.capacity = capacity;
        }
        self.frames.push(frame);
        let top = self.frames.len() - 1;
        Ok(&mut self.frames[top])
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut CallFrame> {
        self.frames.last_mut()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of profiling sessions attached to this stack.
    pub fn refs(&self) -> u32 {
        self.refs
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Drop all frames, keeping the storage.
    pub fn reset(&mut self) {
        self.frames.clear();
    }
}

/// Arena slot plus the generation it was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StackHandle {
    index: u32,
    generation: u32,
}

/// Recycles call stacks between execution contexts.
///
/// A stack is either on the free list or indexed under exactly one context.
#[derive(Debug)]
pub struct CallStackPool {
    slots: Vec<CallStack>,
    active: IdentityMap<ContextId, StackHandle>,
    free_head: Option<u32>,
    free: usize,
    peak_used: usize,
    stack_capacity: usize,
}

impl CallStackPool {
    pub fn new(initial_stacks: usize, stack_capacity: usize) -> Result<Self, ProfileError> {
        let mut pool = Self {
            slots: Vec::new(),
            active: IdentityMap::new(),
            free_head: None,
            free: 0,
            peak_used: 0,
            stack_capacity,
        };
        for _ in 0..initial_stacks {
            pool.grow_free_list()?;
        }
        Ok(pool)
    }

    /// Create one stack and put it on the free list. Returns its slot.
    fn grow_free_list(&mut self) -> Result<u32, ProfileError> {
        let capacity = self.slots.len() + 1;
        self.slots
            .try_reserve(1)
            .map_err(|source| ProfileError::PoolGrowth { capacity, source })?;
        let mut stack = CallStack::with_capacity(self.stack_capacity)?;
        let index = self.slots.len() as u32;
        stack.next_free = self.free_head;
        self.free_head = Some(index);
        self.slots.push(stack);
        self.free += 1;
        log::trace!("call stack pool: {} stacks, {} free", self.slots.len(), self.free);
        Ok(index)
    }

    /// Attach a session for `context`.
    ///
    /// An already-active context shares its stack and gains a reference;
    /// otherwise a stack comes off the free list with no frames and one
    /// reference.
    pub fn acquire(&mut self, context: ContextId) -> Result<&mut CallStack, ProfileError> {
        if let Some(&handle) = self.active.get(context) {
            let stack = &mut self.slots[handle.index as usize];
            stack.refs += 1;
            return Ok(stack);
        }

        let index = match self.free_head {
            Some(index) => index,
            None => self.grow_free_list()?,
        };
        let stack = &mut self.slots[index as usize];
        self.free_head = stack.next_free.take();
        self.free -= 1;
        stack.reset();
        stack.refs = 1;

        let handle = StackHandle {
            index,
            generation: stack.generation,
        };
        self.active.set(context, handle);
        self.peak_used = self.peak_used.max(self.active.len());
        log::trace!("call stack {index} acquired by {context}");
        Ok(&mut self.slots[index as usize])
    }

    /// Stack for `context` if it is under active profiling.
    pub fn get(&self, context: ContextId) -> Option<&CallStack> {
        let handle = *self.active.get(context)?;
        let stack = &self.slots[handle.index as usize];
        debug_assert_eq!(stack.generation, handle.generation);
        Some(stack)
    }

    pub fn get_mut(&mut self, context: ContextId) -> Option<&mut CallStack> {
        let handle = *self.active.get(context)?;
        let stack = &mut self.slots[handle.index as usize];
        debug_assert_eq!(stack.generation, handle.generation);
        Some(stack)
    }

    /// Detach one session. The stack returns to the free list when the last
    /// session detaches. Unknown contexts are ignored.
    pub fn release(&mut self, context: ContextId) {
        let handle = match self.active.get(context) {
            Some(&handle) => handle,
            None => return,
        };
        let stack = &mut self.slots[handle.index as usize];
        stack.refs = stack.refs.saturating_sub(1);
        if stack.refs > 0 {
            return;
        }

        self.active.remove(context);
        stack.generation = stack.generation.wrapping_add(1);
        stack.next_free = self.free_head;
        self.free_head = Some(handle.index);
        self.free += 1;
        log::trace!("call stack {} released by {context}", handle.index);
    }

    /// Stacks currently owned by a context.
    pub fn used(&self) -> usize {
        self.active.len()
    }

    pub fn free(&self) -> usize {
        self.free
    }

    /// Highest number of simultaneously used stacks.
    pub fn peak_used(&self) -> usize {
        self.peak_used
    }
}
