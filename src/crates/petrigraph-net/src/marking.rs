//! Token assignments over places.
//!
//! A marking is a total function from place ids to token counts, stored
//! sparsely: places with zero tokens are never kept in the map, so two
//! markings compare equal iff they agree on every place with nonzero
//! tokens, and hashing is order-independent over place ids (the backing
//! `BTreeMap` iterates in key order).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The dynamic state of a net. A value object: firing produces a new
/// marking rather than mutating the old one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marking(BTreeMap<String, u64>);

impl Marking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens at a place, zero if unlisted.
    pub fn get(&self, place_id: &str) -> u64 {
        self.0.get(place_id).copied().unwrap_or(0)
    }

    /// Set the token count at a place. Zero entries are removed so the
    /// sparse representation stays canonical.
    pub fn set(&mut self, place_id: impl Into<String>, tokens: u64) {
        let place_id = place_id.into();
        if tokens == 0 {
            self.0.remove(&place_id);
        } else {
            self.0.insert(place_id, tokens);
        }
    }

    /// Places with nonzero tokens, in id order.
    pub fn nonzero(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(id, &tokens)| (id.as_str(), tokens))
    }

    /// Sum of all tokens.
    pub fn total_tokens(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `other` has at least as many tokens on every place this
    /// marking has tokens on. Used to detect growth along a path.
    pub fn covered_by(&self, other: &Marking) -> bool {
        self.0.iter().all(|(id, &tokens)| other.get(id) >= tokens)
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for Marking {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut marking = Marking::new();
        for (id, tokens) in iter {
            marking.set(id, tokens);
        }
        marking
    }
}

impl fmt::Display for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (id, tokens)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", id, tokens)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(marking: &Marking) -> u64 {
        let mut hasher = DefaultHasher::new();
        marking.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn zero_entries_do_not_affect_equality_or_hash() {
        let a: Marking = [("p1", 1u64), ("p2", 0)].into_iter().collect();
        let b: Marking = [("p1", 1u64)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn insertion_order_does_not_affect_hash() {
        let a: Marking = [("p1", 1u64), ("p2", 3)].into_iter().collect();
        let b: Marking = [("p2", 3u64), ("p1", 1)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn setting_zero_removes_the_entry() {
        let mut marking: Marking = [("p1", 2u64)].into_iter().collect();
        marking.set("p1", 0);
        assert!(marking.is_empty());
        assert_eq!(marking.get("p1"), 0);
    }

    #[test]
    fn covered_by_detects_growth() {
        let small: Marking = [("p1", 1u64)].into_iter().collect();
        let large: Marking = [("p1", 2u64), ("p2", 1)].into_iter().collect();
        assert!(small.covered_by(&large));
        assert!(!large.covered_by(&small));
    }

    #[test]
    fn serializes_as_plain_map() {
        let marking: Marking = [("p2", 1u64), ("p1", 2)].into_iter().collect();
        let json = serde_json::to_string(&marking).unwrap();
        assert_eq!(json, r#"{"p1":2,"p2":1}"#);
    }
}
