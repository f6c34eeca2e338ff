use std::path::PathBuf;

use callprof_runtime::ProfileError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read trace file {}: {source}", path.display())]
    TraceReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid trace line {line} in {}: {reason}", path.display())]
    InvalidTrace {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("failed to read dump file {}: {source}", path.display())]
    DumpReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid dump data in {}: {reason}", path.display())]
    InvalidDump { path: PathBuf, reason: String },

    #[error("failed to encode dump: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("profiler failure: {0}")]
    Profile(#[from] ProfileError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
