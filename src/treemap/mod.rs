//! TreeMap - An ordered map backed by a binary search tree
//!
//! This is the storage behind each [Table](crate::table::Table). Keys are
//! kept in their `Ord` order (for `String` that is byte-wise lexicographic),
//! every key is unique, and inserting an existing key overwrites its value in
//! place. There is no delete - tables are append/overwrite only.
//!
//! The tree is deliberately *not* balanced. Inserting keys in sorted order
//! produces a chain, and lookups degrade to O(n). Because of this every walk
//! of the tree (search, insert, iteration, drop) is a loop over an explicit
//! stack so that depth is never bounded by the thread's stack size.
//!
//! Subtrees are linked with `Arc`, and a node is only copied when it is
//! mutated while shared with another clone of the map. Cloning a `TreeMap`
//! is therefore O(1), and a clone followed by an insert copies one path of
//! the tree. This is what allows the [CowCell](crate::cowcell::CowCell) that
//! wraps a table to hand out stable snapshots cheaply.
//!
//! The map does not lock. Callers that share a map between threads must
//! provide single-writer / multi-reader access themselves.

mod iter;
mod node;

pub use self::iter::{Iter, Keys, Range, Values};

use std::borrow::Borrow;
use std::fmt;
use std::ops::RangeBounds;

#[cfg(feature = "serde")]
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, SerializeMap, Serializer},
};

#[cfg(feature = "serde")]
use crate::utils::MapCollector;

use self::node::Link;

/// An ordered map based on an unbalanced binary search tree.
///
/// # Examples
/// ```
/// use treecache::treemap::TreeMap;
///
/// let mut map: TreeMap<String, String> = TreeMap::new();
/// map.insert("apple".to_string(), "red".to_string());
/// map.insert("banana".to_string(), "yellow".to_string());
///
/// assert_eq!(map.get("banana").map(String::as_str), Some("yellow"));
/// assert_eq!(map.get("date"), None);
///
/// // Overwrites in place.
/// map.insert("banana".to_string(), "green".to_string());
/// assert_eq!(map.len(), 2);
/// ```
pub struct TreeMap<K, V> {
    root: Link<K, V>,
    length: usize,
}

impl<K, V> TreeMap<K, V> {
    /// Construct a new, empty map.
    pub const fn new() -> Self {
        TreeMap {
            root: None,
            length: 0,
        }
    }

    /// Returns the number of keys in the map.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map has no keys.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Iterate over all key-value pairs in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.root, self.length)
    }

    /// Iterate over the keys in ascending order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { iter: self.iter() }
    }

    /// Iterate over the values, ordered by their keys.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { iter: self.iter() }
    }

    /// The height of the tree. An empty map has a depth of zero, and a map
    /// built from sorted keys has a depth equal to its length.
    pub fn depth(&self) -> usize {
        node::depth(&self.root)
    }
}

impl<K: Ord, V> TreeMap<K, V> {
    /// Retrieve a value from the map. `None` means the key was never
    /// inserted, which is distinct from `Some` of an empty value.
    pub fn get<Q>(&self, k: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        node::search(&self.root, k).map(|n| &n.value)
    }

    /// Retrieve the stored key and its value.
    pub fn get_key_value<Q>(&self, k: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        node::search(&self.root, k).map(|n| (&n.key, &n.value))
    }

    /// Assert if a key exists in the map.
    pub fn contains_key<Q>(&self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        node::search(&self.root, k).is_some()
    }

    /// Iterate over the key-value pairs whose keys fall within `range`.
    /// An inverted range yields nothing.
    pub fn range<R, Q>(&self, range: R) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        Range::new(&self.root, range)
    }

    /// Check the BST invariant: an in-order walk yields strictly increasing
    /// keys, and it visits exactly `len()` nodes.
    pub fn verify(&self) -> bool {
        let mut count = 0;
        let mut prev: Option<&K> = None;
        for (k, _) in self.iter() {
            if prev.is_some_and(|p| p >= k) {
                return false;
            }
            prev = Some(k);
            count += 1;
        }
        count == self.length
    }
}

impl<K: Clone + Ord, V: Clone> TreeMap<K, V> {
    /// Insert or update a value by key. If the key was already present its
    /// value is overwritten in place and the previous value returned; the
    /// shape of the tree does not change. Otherwise a new leaf is linked
    /// and `None` is returned.
    pub fn insert(&mut self, k: K, v: V) -> Option<V> {
        let prev = node::insert(&mut self.root, k, v);
        if prev.is_none() {
            self.length += 1;
        }
        prev
    }
}

impl<K, V> Drop for TreeMap<K, V> {
    fn drop(&mut self) {
        node::release(&mut self.root);
    }
}

impl<K, V> Clone for TreeMap<K, V> {
    fn clone(&self) -> Self {
        TreeMap {
            root: self.root.clone(),
            length: self.length,
        }
    }
}

impl<K, V> Default for TreeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TreeMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// Equality is over the mapping, not the shape of the tree.
impl<K: PartialEq, V: PartialEq> PartialEq for TreeMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq> Eq for TreeMap<K, V> {}

impl<K: Clone + Ord, V: Clone> FromIterator<(K, V)> for TreeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = TreeMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Clone + Ord, V: Clone> Extend<(K, V)> for TreeMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        iter.into_iter().for_each(|(k, v)| {
            self.insert(k, v);
        });
    }
}

impl<'a, K, V> IntoIterator for &'a TreeMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(feature = "serde")]
impl<K, V> Serialize for TreeMap<K, V>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_map(Some(self.len()))?;

        for (key, val) in self.iter() {
            state.serialize_entry(key, val)?;
        }

        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> Deserialize<'de> for TreeMap<K, V>
where
    K: Deserialize<'de> + Clone + Ord,
    V: Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MapCollector::new())
    }
}
