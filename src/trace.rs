//! Recorded call/return traces.
//!
//! A trace is JSON Lines: one object per line, each naming an operation in
//! `op`. Event lines (`call`, `tailcall`, `return`) carry what the host's
//! introspection would have returned; control lines (`begin`, `end`,
//! `clear`, ...) mirror the profiler's command surface. `t` is the event
//! time in nanoseconds and `ctx` the execution context (0 when omitted).
//! Blank lines and lines starting with `#` are ignored.

use std::path::Path;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Begin,
    End,
    Call,
    Tailcall,
    Return,
    Clear,
    Enable,
    Disable,
    Reset,
    YieldMarker,
    TraceTailcall,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TraceLine {
    pub op: Op,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<u64>,
    #[serde(default)]
    pub ctx: u64,
    /// Function identity. `null` on an event line means introspection failed.
    #[serde(default, rename = "fn", skip_serializing_if = "Option::is_none")]
    pub function: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namewhat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<i32>,
    /// Argument of `trace_tailcall`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
}

impl TraceLine {
    pub fn is_event(&self) -> bool {
        matches!(self.op, Op::Call | Op::Tailcall | Op::Return)
    }
}

/// Parse trace text. `path` is only used in error messages.
pub fn parse_trace(text: &str, path: &Path) -> Result<Vec<TraceLine>, Error> {
    let mut lines = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }
        let line = serde_json::from_str(raw).map_err(|e| Error::InvalidTrace {
            path: path.to_path_buf(),
            line: idx + 1,
            reason: e.to_string(),
        })?;
        lines.push(line);
    }
    Ok(lines)
}

/// Read and parse a trace file.
pub fn load_trace(path: &Path) -> Result<Vec<TraceLine>, Error> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::TraceReadError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_trace(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn parses_events_and_control_lines() {
        let text = r#"
# warmup is not traced
{"op":"begin","ctx":1,"t":0}
{"op":"call","ctx":1,"t":5,"fn":42,"name":"update","source":"@game.lua","line":10}
{"op":"return","ctx":1,"t":9,"fn":42}
{"op":"trace_tailcall","on":true}
{"op":"end","ctx":1}
"#;
        let lines = parse_trace(text, Path::new("mem")).unwrap();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].op, Op::Begin);
        assert!(lines[1].is_event());
        assert_eq!(lines[1].function, Some(42));
        assert_eq!(lines[1].name.as_deref(), Some("update"));
        assert_eq!(lines[1].line, Some(10));
        assert_eq!(lines[2].t, Some(9));
        assert_eq!(lines[3].on, Some(true));
        assert_eq!(lines[4].t, None);
    }

    #[test]
    fn context_defaults_to_zero() {
        let lines = parse_trace(r#"{"op":"clear"}"#, Path::new("mem")).unwrap();
        assert_eq!(lines[0].ctx, 0);
        assert!(!lines[0].is_event());
    }

    #[test]
    fn reports_line_number_of_bad_json() {
        let text = "{\"op\":\"begin\"}\n\n{\"op\":\"jump\"}\n";
        let err = parse_trace(text, Path::new("bad.jsonl")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 3"), "unexpected error: {msg}");
        assert!(msg.contains("bad.jsonl"), "unexpected error: {msg}");
    }

    #[test]
    fn load_trace_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        fs::write(&path, "{\"op\":\"enable\"}\n{\"op\":\"disable\"}\n").unwrap();
        let lines = load_trace(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].op, Op::Disable);
    }

    #[test]
    fn load_trace_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let err = load_trace(&dir.path().join("absent.jsonl")).unwrap_err();
        assert!(err.to_string().contains("failed to read trace file"));
    }
}
