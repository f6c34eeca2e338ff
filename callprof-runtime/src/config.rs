//! Pool sizing and initial switches for a profile context.

use std::str::FromStr;

/// Settings applied when a profile context is (re)created.
///
/// Capacities are starting points; every pool doubles on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Call stacks pre-created on the free list.
    pub initial_stacks: usize,
    /// Frame capacity of each freshly created call stack.
    pub stack_capacity: usize,
    /// Initial capacity of the record pool.
    pub record_capacity: usize,
    pub enabled: bool,
    pub trace_tailcall: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_stacks: 100,
            stack_capacity: 100,
            record_capacity: 100,
            enabled: true,
            trace_tailcall: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with `CALLPROF_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(n) = parse_var::<usize>(&lookup, "CALLPROF_INITIAL_STACKS") {
            config.initial_stacks = n;
        }
        if let Some(n) = parse_var::<usize>(&lookup, "CALLPROF_STACK_CAPACITY") {
            config.stack_capacity = n.max(1);
        }
        if let Some(n) = parse_var::<usize>(&lookup, "CALLPROF_RECORD_CAPACITY") {
            config.record_capacity = n.max(1);
        }
        if let Some(raw) = lookup("CALLPROF_TRACE_TAILCALL") {
            match parse_flag(&raw) {
                Some(on) => config.trace_tailcall = on,
                None => log::warn!("ignoring CALLPROF_TRACE_TAILCALL={raw:?}: expected a boolean"),
            }
        }
        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
