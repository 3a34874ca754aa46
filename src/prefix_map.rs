//! Prefix-keyed map with longest-prefix resolution

use std::collections::BTreeMap;

/// Map from ledger prefix to value.
///
/// Prefixes are opaque strings; the longest-prefix relation is plain string
/// prefix, not label-wise. The empty prefix acts as a catch-all. Iteration
/// is in prefix-sorted order.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixMap<T> {
    map: BTreeMap<String, T>,
}

impl<T> PrefixMap<T> {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Store a value under `prefix`, returning the previous value if any.
    pub fn insert(&mut self, prefix: impl Into<String>, value: T) -> Option<T> {
        self.map.insert(prefix.into(), value)
    }

    /// Exact-prefix lookup.
    pub fn get(&self, prefix: &str) -> Option<&T> {
        self.map.get(prefix)
    }

    pub fn get_mut(&mut self, prefix: &str) -> Option<&mut T> {
        self.map.get_mut(prefix)
    }

    pub fn remove(&mut self, prefix: &str) -> Option<T> {
        self.map.remove(prefix)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.map.iter().map(|(prefix, value)| (prefix.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.map
            .iter_mut()
            .map(|(prefix, value)| (prefix.as_str(), value))
    }

    /// Longest-prefix match: the value stored under the longest prefix of
    /// `key`, if any.
    pub fn resolve(&self, key: &str) -> Option<&T> {
        self.resolve_entry(key).map(|(_, value)| value)
    }

    /// Longest-prefix match, returning the matching prefix as well.
    pub fn resolve_entry(&self, key: &str) -> Option<(&str, &T)> {
        let mut end = key.len();
        loop {
            if key.is_char_boundary(end) {
                if let Some((prefix, value)) = self.map.get_key_value(&key[..end]) {
                    return Some((prefix.as_str(), value));
                }
            }
            if end == 0 {
                return None;
            }
            end -= 1;
        }
    }

    /// Shortest prefix of `target` that extends `stored_prefix` far enough
    /// to not shadow any other stored prefix, growing one `.`-separated
    /// segment of `target` at a time. When no boundary is left to grow to,
    /// the full `target` is returned. `target` must start with
    /// `stored_prefix`.
    pub fn shortest_unambiguous_prefix(&self, stored_prefix: &str, target: &str) -> String {
        debug_assert!(target.starts_with(stored_prefix));
        let mut prefix = stored_prefix.to_string();
        for second in self.map.keys() {
            let second = second.as_str();
            while second != prefix && second.starts_with(&prefix) {
                match target.get(prefix.len() + 1..).and_then(|rest| rest.find('.')) {
                    Some(dot) => {
                        let end = prefix.len() + 1 + dot + 1;
                        prefix = target[..end].to_string();
                    }
                    None => return target.to_string(),
                }
            }
        }
        prefix
    }
}

impl<T> Default for PrefixMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
