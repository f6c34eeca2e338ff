use std::collections::TryReserveError;

/// Allocation failure while growing one of the profiler's pools.
///
/// Nothing else the event handler encounters is an error: stray events,
/// desynchronized returns and missing introspection are all absorbed.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to grow call stack to {capacity} frames: {source}")]
    StackGrowth {
        capacity: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("failed to grow record pool to {capacity} records: {source}")]
    RecordGrowth {
        capacity: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("failed to grow call stack pool to {capacity} stacks: {source}")]
    PoolGrowth {
        capacity: usize,
        #[source]
        source: TryReserveError,
    },
}
