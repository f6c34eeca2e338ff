//! Interface to the host runtime that delivers call/return events.

use crate::ident::{ContextId, FunctionId};

/// Kind of trace event the host delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Call,
    /// A call in tail position that replaced the caller's frame.
    TailCall,
    Return,
}

/// How tail calls are represented on the profiler's call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum HookMode {
    /// A tail call overwrites the current top frame in place.
    Overwrite,
    /// Every tail call gets its own frame; one return drains the chain.
    Materialize,
}

impl HookMode {
    pub fn for_tailcall_tracing(trace_tailcall: bool) -> Self {
        if trace_tailcall {
            Self::Materialize
        } else {
            Self::Overwrite
        }
    }
}

/// Introspection for the currently executing call.
///
/// Any descriptive field may be unavailable; the identity is always present
/// when the host could introspect at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallInfo<'a> {
    pub function: FunctionId,
    pub source: Option<&'a str>,
    pub name: Option<&'a str>,
    /// How the name was resolved: `global`, `local`, `method`, `field`...
    pub namewhat: Option<&'a str>,
    /// Kind of function: `Lua`, `C`, `main`.
    pub what: Option<&'a str>,
    pub line: i32,
}

impl<'a> CallInfo<'a> {
    /// Info carrying only an identity.
    pub fn anonymous(function: FunctionId) -> Self {
        Self {
            function,
            source: None,
            name: None,
            namewhat: None,
            what: None,
            line: -1,
        }
    }
}

/// The host runtime as seen from the profiler.
///
/// The hook-installation methods act on the context that is current when the
/// profiler calls them, the same way the host scopes its own debug hooks.
pub trait Host {
    /// Identity of the execution context that is running right now.
    fn current_context(&self) -> ContextId;

    /// Introspect the call at the top of the current context's stack.
    /// `None` when the host cannot supply call-site data.
    fn call_info(&self) -> Option<CallInfo<'_>>;

    /// Start delivering call/tail-call/return events for the current context.
    fn install_hook(&mut self, mode: HookMode);

    /// Stop delivering events for the current context.
    fn uninstall_hook(&mut self);
}
