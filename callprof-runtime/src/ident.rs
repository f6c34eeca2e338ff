//! Opaque identity tokens and the map keyed by them.
//!
//! The host hands out a stable token for every function prototype and every
//! execution context it asks us to track. Tokens are only ever compared and
//! ordered; nothing here interprets them as addresses.

use std::collections::BTreeMap;
use std::fmt;

/// Identity of a function prototype in the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct FunctionId(pub u64);

/// Identity of an execution context (coroutine, fiber, main thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ContextId(pub u64);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{:x}", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{:x}", self.0)
    }
}

/// Ordered map from an identity token to a value.
///
/// Traversal order is ascending by key, which keeps `dump()` output stable
/// between runs that see the same identities.
#[derive(Debug, Clone)]
pub struct IdentityMap<K, V> {
    map: BTreeMap<K, V>,
}

impl<K: Ord + Copy, V> IdentityMap<K, V> {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Insert or overwrite. Returns the previous value, if any.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        self.map.insert(key, value)
    }

    pub fn get(&self, key: K) -> Option<&V> {
        self.map.get(&key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.map.contains_key(&key)
    }

    pub fn remove(&mut self, key: K) -> Option<V> {
        self.map.remove(&key)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Visit every entry in ascending key order.
    pub fn for_each(&self, mut visit: impl FnMut(K, &V)) {
        for (key, value) in &self.map {
            visit(*key, value);
        }
    }
}

impl<K: Ord + Copy, V> Default for IdentityMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_and_returns_previous() {
        let mut map = IdentityMap::new();
        assert_eq!(map.set(FunctionId(7), "a"), None);
        assert_eq!(map.set(FunctionId(7), "b"), Some("a"));
        assert_eq!(map.get(FunctionId(7)), Some(&"b"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_unknown_key_is_noop() {
        let mut map: IdentityMap<ContextId, u32> = IdentityMap::new();
        assert_eq!(map.remove(ContextId(1)), None);
        assert!(map.is_empty());
    }

    #[test]
    fn for_each_visits_in_key_order() {
        let mut map = IdentityMap::new();
        for key in [30u64, 10, 20] {
            map.set(FunctionId(key), key * 2);
        }
        let mut seen = Vec::new();
        map.for_each(|k, v| seen.push((k.0, *v)));
        assert_eq!(seen, vec![(10, 20), (20, 40), (30, 60)]);
    }

    #[test]
    fn clear_drops_everything() {
        let mut map = IdentityMap::new();
        map.set(ContextId(1), ());
        map.set(ContextId(2), ());
        map.clear();
        assert!(map.is_empty());
        assert!(!map.contains(ContextId(1)));
    }
}
