//! Command surface over a lazily created profile context.
//!
//! A `Profiler` belongs to one host state. The context is created on the
//! first command that needs it and dropped by `reset()`; the next command
//! builds a fresh one from the same `Config`. Events arriving while no
//! context exists are ignored.

use crate::clock::{Clock, TscClock};
use crate::config::Config;
use crate::context::{Info, ProfileContext, SessionState};
use crate::error::ProfileError;
use crate::host::{HookEvent, Host};
use crate::ident::{ContextId, FunctionId};
use crate::records::FunctionRecord;

pub struct Profiler<C: Clock = TscClock> {
    config: Config,
    clock: C,
    context: Option<ProfileContext>,
}

impl Profiler<TscClock> {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, TscClock::new())
    }
}

impl Default for Profiler<TscClock> {
    fn default() -> Self {
        Self::new(Config::from_env())
    }
}

impl<C: Clock> Profiler<C> {
    pub fn with_clock(config: Config, clock: C) -> Self {
        Self {
            config,
            clock,
            context: None,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The live context, if one has been created.
    pub fn context(&self) -> Option<&ProfileContext> {
        self.context.as_ref()
    }

    fn context_mut(&mut self) -> Result<&mut ProfileContext, ProfileError> {
        let ctx = match self.context.take() {
            Some(ctx) => ctx,
            None => ProfileContext::new(&self.config)?,
        };
        Ok(self.context.insert(ctx))
    }

    /// Hook entry point: the host calls this for every delivered event.
    pub fn on_event<H: Host + ?Sized>(
        &mut self,
        host: &H,
        event: HookEvent,
    ) -> Result<(), ProfileError> {
        let event_ns = self.clock.now_ns();
        match self.context.as_mut() {
            Some(ctx) => ctx.handle_event(host, &self.clock, event, event_ns),
            None => Ok(()),
        }
    }

    pub fn begin<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<(), ProfileError> {
        self.context_mut()?.begin(host)
    }

    pub fn end<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<(), ProfileError> {
        self.context_mut()?.end(host);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), ProfileError> {
        self.context_mut()?.clear();
        Ok(())
    }

    pub fn dump(&mut self) -> Result<Vec<FunctionRecord>, ProfileError> {
        Ok(self.context_mut()?.dump())
    }

    /// Discard the context entirely. Installed hooks stay installed but see
    /// no context until the next command recreates one.
    pub fn reset(&mut self) {
        self.context = None;
    }

    pub fn info(&mut self) -> Result<Info, ProfileError> {
        Ok(self.context_mut()?.info())
    }

    pub fn enable(&mut self) -> Result<(), ProfileError> {
        self.context_mut()?.enable();
        Ok(())
    }

    pub fn disable(&mut self) -> Result<(), ProfileError> {
        self.context_mut()?.disable();
        Ok(())
    }

    pub fn set_yield_marker(&mut self, marker: Option<FunctionId>) -> Result<(), ProfileError> {
        self.context_mut()?.set_yield_marker(marker);
        Ok(())
    }

    pub fn yield_marker(&mut self) -> Result<Option<FunctionId>, ProfileError> {
        Ok(self.context_mut()?.yield_marker())
    }

    pub fn set_trace_tailcall(&mut self, on: bool) -> Result<(), ProfileError> {
        self.context_mut()?.set_trace_tailcall(on);
        Ok(())
    }

    /// Session state of `context`; `Idle` when no profile context exists.
    pub fn state(&self, context: ContextId) -> SessionState {
        self.context
            .as_ref()
            .map_or(SessionState::Idle, |ctx| ctx.state(context))
    }
}
