//! Call/return event handling.
//!
//! Every event is timestamped on arrival (`event_ns`). Time between arrival
//! and the moment control goes back to the host is handler overhead and is
//! charged to `Totals::lost_ns`, never to a function record.
//!
//! On return the matching frame is folded:
//!
//! ```text
//! total = return - call_real
//! self  = total - subtree
//! ```
//!
//! and the parent's subtree grows by the child's wall time measured from the
//! child's call *event*, so the handler time spent on the child's call and
//! return is excluded from the parent's self time as well.

use crate::clock::Clock;
use crate::context::{ProfileContext, Totals};
use crate::error::ProfileError;
use crate::host::{HookEvent, HookMode, Host};
use crate::ident::FunctionId;
use crate::records::RecordPool;
use crate::stack::{CallFrame, CallStack};

impl ProfileContext {
    /// Handle one event delivered by the host at `event_ns`.
    ///
    /// Events are dropped when profiling is disabled, when the current
    /// context has no stack or no running session, or when the host cannot
    /// introspect the call.
    pub fn handle_event<H, C>(
        &mut self,
        host: &H,
        clock: &C,
        event: HookEvent,
        event_ns: u64,
    ) -> Result<(), ProfileError>
    where
        H: Host + ?Sized,
        C: Clock + ?Sized,
    {
        if !self.enabled {
            return Ok(());
        }
        let context = host.current_context();
        let stack = match self.stacks.get_mut(context) {
            Some(stack) => stack,
            None => return Ok(()),
        };
        let mode = match self.running.get(context) {
            Some(&mode) => mode,
            None => return Ok(()),
        };
        let info = match host.call_info() {
            Some(info) => info,
            None => return Ok(()),
        };

        match (event, mode) {
            (HookEvent::Call, _) | (HookEvent::TailCall, HookMode::Materialize) => {
                let tailcall = event == HookEvent::TailCall;
                let frame = stack.push(CallFrame::enter(&info, tailcall, event_ns))?;
                let now = clock.now_ns();
                frame.call_real_ns = now;
                let spent = now.saturating_sub(event_ns);
                self.totals.lost_ns = self.totals.lost_ns.saturating_add(spent);
            }
            (HookEvent::TailCall, HookMode::Overwrite) => {
                if let Some(frame) = stack.top_mut() {
                    frame.retarget(&info);
                }
                let spent = clock.now_ns().saturating_sub(event_ns);
                self.totals.lost_ns = self.totals.lost_ns.saturating_add(spent);
            }
            (HookEvent::Return, _) => {
                let mut frame = match unwind_to(stack, info.function, &mut self.totals) {
                    Some(frame) => frame,
                    None => {
                        log::debug!("return from {} with no matching frame", info.function);
                        return Ok(());
                    }
                };
                let mut fold = Fold {
                    stack,
                    records: &mut self.records,
                    totals: &mut self.totals,
                    yield_marker: self.yield_marker,
                    returning: info.function,
                    event_ns,
                };
                match mode {
                    HookMode::Overwrite => {
                        let now = fold.complete(&mut frame, clock)?;
                        fold.charge_loss(now);
                    }
                    HookMode::Materialize => {
                        // One physical return retires the whole tail-call chain.
                        loop {
                            fold.complete(&mut frame, clock)?;
                            if !frame.tailcall {
                                break;
                            }
                            frame = match fold.stack.pop() {
                                Some(next) => next,
                                None => break,
                            };
                        }
                        fold.charge_loss(clock.now_ns());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Pop until the frame for `function` surfaces. Frames above it belong to
/// calls whose return was never seen; they are discarded unrecorded.
fn unwind_to(
    stack: &mut CallStack,
    function: FunctionId,
    totals: &mut Totals,
) -> Option<CallFrame> {
    while let Some(frame) = stack.pop() {
        if frame.function == function {
            return Some(frame);
        }
        totals.desync_frames = totals.desync_frames.saturating_add(1);
        log::debug!(
            "return from {function} discarded unmatched frame {} ({})",
            frame.function,
            frame.info.name
        );
    }
    None
}

/// Borrowed state needed to retire frames during one return event.
struct Fold<'a> {
    stack: &'a mut CallStack,
    records: &'a mut RecordPool,
    totals: &'a mut Totals,
    yield_marker: Option<FunctionId>,
    /// Identity carried by the return event. Every frame drained by it is
    /// treated as that function for the yield check.
    returning: FunctionId,
    event_ns: u64,
}

impl Fold<'_> {
    /// Finish `frame`, record it and charge it to its parent.
    /// Returns the clock reading taken after recording.
    fn complete<C: Clock + ?Sized>(
        &mut self,
        frame: &mut CallFrame,
        clock: &C,
    ) -> Result<u64, ProfileError> {
        frame.return_ns = self.event_ns;
        frame.total_ns = self.event_ns.saturating_sub(frame.call_real_ns);
        frame.self_ns = frame.total_ns.saturating_sub(frame.subtree_ns);

        if self.yield_marker == Some(self.returning) {
            frame.yield_ns = frame.yield_ns.saturating_add(frame.self_ns);
            self.totals.yield_ns = self.totals.yield_ns.saturating_add(frame.self_ns);
        }

        self.records.record(frame)?;

        let now = clock.now_ns();
        if let Some(parent) = self.stack.top_mut() {
            let wall = now.saturating_sub(frame.call_event_ns);
            parent.subtree_ns = parent.subtree_ns.saturating_add(wall);
            parent.yield_ns = parent.yield_ns.saturating_add(frame.yield_ns);
        }
        self.totals.self_ns = self.totals.self_ns.saturating_add(frame.self_ns);
        Ok(now)
    }

    fn charge_loss(&mut self, now: u64) {
        let spent = now.saturating_sub(self.event_ns);
        self.totals.lost_ns = self.totals.lost_ns.saturating_add(spent);
    }
}
