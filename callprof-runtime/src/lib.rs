#![allow(unsafe_code)]

mod bounded;
mod clock;
mod config;
mod context;
mod error;
mod handler;
mod host;
mod ident;
mod profiler;
mod records;
mod stack;
mod tsc;

#[cfg(test)]
mod test_host;

pub use bounded::{BoundedStr, KindBuf, NameBuf, SourceBuf, SourceInfo};
pub use clock::{Clock, ManualClock, TscClock};
pub use config::Config;
pub use context::{Info, ProfileContext, SessionState};
pub use error::ProfileError;
pub use host::{CallInfo, HookEvent, HookMode, Host};
pub use ident::{ContextId, FunctionId, IdentityMap};
pub use profiler::Profiler;
pub use records::{FunctionRecord, RecordPool};
pub use stack::{CallFrame, CallStack, CallStackPool};
