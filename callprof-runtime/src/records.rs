//! Per-function aggregates folded from completed frames.

use crate::bounded::SourceInfo;
use crate::error::ProfileError;
use crate::ident::{FunctionId, IdentityMap};
use crate::stack::CallFrame;

/// Running totals for one function identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProtoRecord {
    function: FunctionId,
    info: SourceInfo,
    tailcall: bool,
    calls: u64,
    total_ns: u64,
    self_ns: u64,
    coroutine_ns: u64,
}

impl ProtoRecord {
    fn new(frame: &CallFrame) -> Self {
        Self {
            function: frame.function,
            info: frame.info,
            tailcall: false,
            calls: 0,
            total_ns: 0,
            self_ns: 0,
            coroutine_ns: 0,
        }
    }
}

/// Aggregated timing for one function, as handed out by `dump()`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionRecord {
    pub proto: FunctionId,
    pub source: String,
    pub name: String,
    pub namewhat: String,
    pub what: String,
    pub line: i32,
    pub calls: u64,
    pub total_ns: u64,
    pub self_ns: u64,
    /// Total time minus time spent suspended.
    pub coroutine_ns: u64,
    /// Set once any call was observed through a tail call.
    pub tailcall: bool,
}

impl From<&ProtoRecord> for FunctionRecord {
    fn from(rec: &ProtoRecord) -> Self {
        Self {
            proto: rec.function,
            source: rec.info.source.as_str().to_owned(),
            name: rec.info.name.as_str().to_owned(),
            namewhat: rec.info.namewhat.as_str().to_owned(),
            what: rec.info.what.as_str().to_owned(),
            line: rec.info.line,
            calls: rec.calls,
            total_ns: rec.total_ns,
            self_ns: rec.self_ns,
            coroutine_ns: rec.coroutine_ns,
            tailcall: rec.tailcall,
        }
    }
}

/// Deduplicating store of `ProtoRecord`s keyed by function identity.
///
/// The index maps an identity to a slot in `records`. Slots are append-only
/// until `clear()`, so an issued slot stays valid across growth.
#[derive(Debug)]
pub struct RecordPool {
    index: IdentityMap<FunctionId, usize>,
    records: Vec<ProtoRecord>,
    capacity: usize,
}

impl RecordPool {
    pub fn with_capacity(capacity: usize) -> Result<Self, ProfileError> {
        let capacity = capacity.max(1);
        let mut records = Vec::new();
        records
            .try_reserve_exact(capacity)
            .map_err(|source| ProfileError::RecordGrowth { capacity, source })?;
        Ok(Self {
            index: IdentityMap::new(),
            records,
            capacity,
        })
    }

    /// Fold a completed frame into its function's record, creating the
    /// record on first sight.
    pub fn record(&mut self, frame: &CallFrame) -> Result<(), ProfileError> {
        let slot = match self.index.get(frame.function) {
            Some(&slot) => slot,
            None => self.insert(frame)?,
        };
        let rec = &mut self.records[slot];
        rec.calls = rec.calls.saturating_add(1);
        rec.total_ns = rec.total_ns.saturating_add(frame.total_ns);
        rec.self_ns = rec.self_ns.saturating_add(frame.self_ns);
        rec.tailcall |= frame.tailcall;
        let active = frame.total_ns.saturating_sub(frame.yield_ns);
        rec.coroutine_ns = rec.coroutine_ns.saturating_add(active);
        Ok(())
    }

    fn insert(&mut self, frame: &CallFrame) -> Result<usize, ProfileError> {
        if self.records.len() >= self.capacity {
            let capacity = self.capacity * 2;
            self.records
                .try_reserve_exact(capacity - self.records.len())
                .map_err(|source| ProfileError::RecordGrowth { capacity, source })?;
            log::trace!("record pool grew to {capacity} records");
            self.capacity = capacity;
        }
        let slot = self.records.len();
        self.records.push(ProtoRecord::new(frame));
        self.index.set(frame.function, slot);
        Ok(slot)
    }

    /// Forget every record. Capacity is kept for reuse.
    pub fn clear(&mut self) {
        self.index.clear();
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, function: FunctionId) -> Option<FunctionRecord> {
        let slot = *self.index.get(function)?;
        Some(FunctionRecord::from(&self.records[slot]))
    }

    /// Materialize every record in index order.
    pub fn snapshot(&self) -> Vec<FunctionRecord> {
        let mut out = Vec::with_capacity(self.records.len());
        self.index
            .for_each(|_, &slot| out.push(FunctionRecord::from(&self.records[slot])));
        out
    }
}
