//! Scripted host for unit tests.

use std::collections::HashMap;

use crate::host::{CallInfo, HookMode, Host};
use crate::ident::{ContextId, FunctionId};

#[derive(Default)]
pub(crate) struct ScriptHost {
    pub(crate) context: u64,
    pub(crate) function: Option<u64>,
    pub(crate) hooks: HashMap<u64, HookMode>,
}

impl ScriptHost {
    pub(crate) fn on(context: u64) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    pub(crate) fn at(&mut self, function: u64) -> &mut Self {
        self.function = Some(function);
        self
    }
}

impl Host for ScriptHost {
    fn current_context(&self) -> ContextId {
        ContextId(self.context)
    }

    fn call_info(&self) -> Option<CallInfo<'_>> {
        let function = self.function?;
        Some(CallInfo {
            function: FunctionId(function),
            source: Some("@test.lua"),
            name: Some("f"),
            namewhat: Some("global"),
            what: Some("Lua"),
            line: function as i32,
        })
    }

    fn install_hook(&mut self, mode: HookMode) {
        self.hooks.insert(self.context, mode);
    }

    fn uninstall_hook(&mut self) {
        self.hooks.remove(&self.context);
    }
}
