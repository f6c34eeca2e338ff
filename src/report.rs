use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use callprof_runtime::{FunctionRecord, Info};

use crate::error::Error;

/// A profiling dump as written to disk.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Dump {
    pub timestamp_ms: u128,
    pub info: Info,
    pub functions: Vec<FunctionRecord>,
}

impl Dump {
    pub fn new(info: Info, functions: Vec<FunctionRecord>) -> Self {
        Self {
            timestamp_ms: timestamp_ms(),
            info,
            functions,
        }
    }
}

/// Milliseconds since the Unix epoch; 0 if the system clock is before it.
pub fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Write a dump as pretty-printed JSON.
pub fn write_dump(dump: &Dump, path: &Path) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(dump)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a dump from a JSON file on disk.
pub fn load_dump(path: &Path) -> Result<Dump, Error> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::DumpReadError {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|e| Error::InvalidDump {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}

/// Display label: function name (or `?`) followed by its definition site.
pub fn label(record: &FunctionRecord) -> String {
    let name = if record.name.is_empty() {
        "?"
    } else {
        record.name.as_str()
    };
    format!("{name} {}:{}", record.source, record.line)
}

/// Format records as a text table sorted by self time descending.
pub fn format_table(functions: &[FunctionRecord]) -> String {
    let mut entries: Vec<&FunctionRecord> = functions.iter().collect();
    entries.sort_by(|a, b| b.self_ns.cmp(&a.self_ns));

    let mut out = String::new();
    out.push_str(&format!(
        "{:<40} {:>8} {:>10} {:>10} {:>10}\n",
        "Function", "Calls", "Total", "Self", "Coroutine"
    ));
    out.push_str(&format!("{}\n", "-".repeat(83)));

    for entry in entries {
        let mut name = label(entry);
        if entry.tailcall {
            name.push_str(" (tail)");
        }
        out.push_str(&format!(
            "{:<40} {:>8} {:>8.3}ms {:>8.3}ms {:>8.3}ms\n",
            name,
            entry.calls,
            ms(entry.total_ns),
            ms(entry.self_ns),
            ms(entry.coroutine_ns)
        ));
    }
    out
}

/// Summarize pool usage and accumulators.
pub fn format_info(info: &Info) -> String {
    let marker = info
        .yield_marker
        .map_or_else(|| "none".to_string(), |id| id.to_string());
    let mut out = String::new();
    out.push_str(&format!(
        "stacks: {} used, {} free, {} peak\n",
        info.stack_pool_used, info.stack_pool_free, info.stack_pool_peak_used
    ));
    out.push_str(&format!(
        "records: {} of {} slots\n",
        info.record_pool_len, info.record_pool_capacity
    ));
    out.push_str(&format!(
        "self: {:.3}ms  lost: {:.3}ms  yield: {:.3}ms\n",
        ms(info.self_ns),
        ms(info.lost_ns),
        ms(info.yield_ns)
    ));
    if info.desync_frames > 0 {
        out.push_str(&format!("desync: {} frames discarded\n", info.desync_frames));
    }
    out.push_str(&format!(
        "enabled: {}  tailcall tracing: {}  yield marker: {marker}\n",
        info.enabled, info.trace_tailcall
    ));
    out
}

/// Show the self-time delta between two dumps, matching functions by label.
///
/// Function identities are only stable within one process, so the
/// definition site stands in for them across dumps.
pub fn diff_dumps(a: &Dump, b: &Dump) -> String {
    let a_map: HashMap<String, &FunctionRecord> =
        a.functions.iter().map(|f| (label(f), f)).collect();
    let b_map: HashMap<String, &FunctionRecord> =
        b.functions.iter().map(|f| (label(f), f)).collect();

    let mut names: Vec<&String> = a_map.keys().chain(b_map.keys()).collect();
    names.sort_unstable();
    names.dedup();

    let mut out = String::new();
    out.push_str(&format!(
        "{:<40} {:>10} {:>10} {:>10}\n",
        "Function", "Before", "After", "Delta"
    ));
    out.push_str(&format!("{}\n", "-".repeat(74)));

    for name in names {
        let before = a_map.get(name).map_or(0.0, |e| ms(e.self_ns));
        let after = b_map.get(name).map_or(0.0, |e| ms(e.self_ns));
        let delta = after - before;
        out.push_str(&format!(
            "{:<40} {:>8.3}ms {:>8.3}ms {:>+8.3}ms\n",
            name, before, after, delta
        ));
    }
    out
}
