//! Table - A named, concurrently readable string map
//!
//! A `Table` owns exactly one [TreeMap] and is the only thing that touches
//! it. The map has no locking of its own, so the table holds it in a
//! [CowCell]: writers are serialised, and readers work from a snapshot that
//! no writer can change underneath them.
//!
//! For one-off operations use [Table::get] and [Table::set]. To batch several
//! writes into a single generation, or to read several keys from one
//! consistent view, open a transaction with [Table::write] or [Table::read].

use std::borrow::Borrow;
use std::ops::{Bound, RangeBounds};

use tracing::trace;

use crate::cowcell::{CowCell, CowCellReadTxn, CowCellWriteTxn};
use crate::treemap::{Iter, Range, TreeMap};

/// The map type stored by every table.
pub type TableMap = TreeMap<String, String>;

/// A named, ordered, string to string map with single-writer / multi-reader
/// transactions.
///
/// # Examples
/// ```
/// use treecache::table::Table;
///
/// let table = Table::new("fruit");
/// table.set("apple", "red");
/// table.set("banana", "yellow");
///
/// assert_eq!(table.get("banana").as_deref(), Some("yellow"));
/// assert_eq!(table.get("date"), None);
/// ```
#[derive(Debug)]
pub struct Table {
    name: String,
    inner: CowCell<TableMap>,
}

/// A consistent, read only view of a [Table] at the time it was opened.
/// Commits made after this point are not visible through it.
#[derive(Debug, Clone)]
pub struct TableReadTxn {
    inner: CowCellReadTxn<TableMap>,
}

/// The exclusive write transaction of a [Table]. Changes are only visible
/// through this handle until `commit()` is called. Dropping it without a
/// commit discards them.
pub struct TableWriteTxn<'a> {
    name: &'a str,
    inner: CowCellWriteTxn<'a, TableMap>,
    staged: usize,
}

impl Table {
    /// Create a new empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            inner: CowCell::new(TreeMap::new()),
        }
    }

    /// The name this table was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initiate a read transaction, concurrent to any other readers or
    /// writers.
    pub fn read(&self) -> TableReadTxn {
        TableReadTxn {
            inner: self.inner.read(),
        }
    }

    /// Initiate a write transaction, exclusive to this writer, and
    /// concurrent to all existing reads.
    pub fn write(&self) -> TableWriteTxn<'_> {
        TableWriteTxn {
            name: &self.name,
            inner: self.inner.write(),
            staged: 0,
        }
    }

    /// Attempt to create a new write, returns None if another writer
    /// already exists.
    pub fn try_write(&self) -> Option<TableWriteTxn<'_>> {
        self.inner.try_write().map(|inner| TableWriteTxn {
            name: &self.name,
            inner,
            staged: 0,
        })
    }

    /// Retrieve the current value of `key`. `None` means the key was never
    /// set, which callers must keep distinct from an empty value.
    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).map(str::to_string)
    }

    /// Set `key` to `value` and commit immediately. This always succeeds.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut wr = self.write();
        wr.set(key, value);
        wr.commit();
    }

    /// The number of keys in the table.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Collect the pairs with keys between `start` and `end` inclusive, in
    /// key order, stopping after `limit` pairs if one is given.
    pub fn scan(&self, start: &str, end: &str, limit: Option<usize>) -> Vec<(String, String)> {
        self.read().scan(start, end, limit)
    }
}

impl TableReadTxn {
    /// Retrieve the value of `key` as of this snapshot.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    /// Assert if `key` exists in this snapshot.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// The number of keys in this snapshot.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the snapshot has no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over the snapshot in key order.
    pub fn iter(&self) -> Iter<'_, String, String> {
        self.inner.iter()
    }

    /// Iterate over the pairs whose keys fall within `range`. Borrowed
    /// bounds are given as a `Bound` pair, owned ones with range syntax.
    ///
    /// # Examples
    /// ```
    /// use std::ops::Bound::{Included, Unbounded};
    /// use treecache::table::Table;
    ///
    /// let table = Table::new("t");
    /// for k in ["a", "b", "c"] {
    ///     table.set(k, k);
    /// }
    /// let ro = table.read();
    /// assert_eq!(ro.range::<_, str>((Included("b"), Unbounded)).count(), 2);
    /// assert_eq!(ro.range::<_, String>("a".to_string().."c".to_string()).count(), 2);
    /// ```
    pub fn range<R, Q>(&self, range: R) -> Range<'_, String, String>
    where
        String: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        self.inner.range::<R, Q>(range)
    }

    /// See [Table::scan].
    pub fn scan(&self, start: &str, end: &str, limit: Option<usize>) -> Vec<(String, String)> {
        scan(&self.inner, start, end, limit)
    }

    /// Borrow the underlying map of this snapshot.
    pub fn as_map(&self) -> &TableMap {
        &self.inner
    }
}

impl TableWriteTxn<'_> {
    /// Set `key` to `value` in this transaction, returning the value it
    /// replaced if the key was already present.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        trace!(table = %self.name, key = %key, "set");
        self.staged += 1;
        self.inner.insert(key, value.into())
    }

    /// Retrieve the value of `key`, including uncommitted changes made
    /// through this transaction.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    /// The number of keys, including uncommitted changes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no keys, including uncommitted changes.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Commit the changes from this write transaction. Readers after this point
    /// will be able to perceive these changes.
    ///
    /// To abort (unstage changes), just do not call this function.
    pub fn commit(self) {
        trace!(table = %self.name, staged = self.staged, len = self.inner.len(), "commit");
        self.inner.commit();
    }
}

fn scan(map: &TableMap, start: &str, end: &str, limit: Option<usize>) -> Vec<(String, String)> {
    if end < start {
        return Vec::new();
    }
    map.range::<_, str>((Bound::Included(start), Bound::Included(end)))
        .take(limit.unwrap_or(usize::MAX))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::Table;
    use std::ops::Bound;
    use std::thread::scope;

    #[test]
    fn test_table_get_set() {
        let _ = tracing_subscriber::fmt::try_init();
        let table = Table::new("fruit");
        assert_eq!(table.name(), "fruit");

        table.set("apple", "red");
        table.set("banana", "yellow");
        table.set("cherry", "red");
        assert_eq!(table.get("banana").as_deref(), Some("yellow"));

        table.set("banana", "green");
        assert_eq!(table.get("banana").as_deref(), Some("green"));
        assert_eq!(table.get("apple").as_deref(), Some("red"));
        assert_eq!(table.get("date"), None);
        assert_eq!(table.count(), 3);
    }

    #[test]
    fn test_table_empty_value_is_not_absent() {
        let table = Table::new("t");
        table.set("k", "");
        assert_eq!(table.get("k").as_deref(), Some(""));
        assert_eq!(table.get("j"), None);
    }

    #[test]
    fn test_table_read_txn_is_stable() {
        let table = Table::new("t");
        table.set("a", "1");
        let ro = table.read();

        table.set("a", "2");
        table.set("b", "2");

        assert_eq!(ro.get("a"), Some("1"));
        assert!(!ro.contains_key("b"));
        assert_eq!(ro.len(), 1);
        assert_eq!(table.read().get("a"), Some("2"));
    }

    #[test]
    fn test_table_write_txn_rollback() {
        let table = Table::new("t");
        table.set("a", "1");
        {
            let mut wr = table.write();
            assert_eq!(wr.set("a", "100"), Some("1".to_string()));
            assert_eq!(wr.set("b", "2"), None);
            assert_eq!(wr.get("a"), Some("100"));
            assert_eq!(wr.len(), 2);
            // The committed view is untouched while we write.
            assert_eq!(table.get("a").as_deref(), Some("1"));
        }
        assert_eq!(table.get("a").as_deref(), Some("1"));
        assert_eq!(table.get("b"), None);
    }

    #[test]
    fn test_table_try_write() {
        let table = Table::new("t");
        let wr = table.write();
        assert!(table.try_write().is_none());
        wr.commit();
        assert!(table.try_write().is_some());
    }

    #[test]
    fn test_table_scan() {
        let table = Table::new("t");
        {
            let mut wr = table.write();
            for c in 'a'..='k' {
                wr.set(c.to_string(), format!("v{}", c));
            }
            wr.commit();
        }

        let keys = |v: Vec<(String, String)>| v.into_iter().map(|(k, _)| k).collect::<Vec<_>>();

        assert_eq!(keys(table.scan("c", "f", None)), vec!["c", "d", "e", "f"]);
        assert_eq!(keys(table.scan("c", "f", Some(2))), vec!["c", "d"]);
        assert_eq!(keys(table.scan("c", "f", Some(0))), Vec::<String>::new());
        assert_eq!(keys(table.scan("j", "zz", None)), vec!["j", "k"]);
        assert!(table.scan("f", "c", None).is_empty());
        assert_eq!(
            table.scan("e", "e", None),
            vec![("e".to_string(), "ve".to_string())]
        );

        let ro = table.read();
        let got: Vec<&str> = ro
            .range::<_, str>((Bound::Included("i"), Bound::Unbounded))
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(got, vec!["i", "j", "k"]);
        let got: Vec<&str> = ro
            .range::<_, String>("b".to_string()..="d".to_string())
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(got, vec!["b", "c", "d"]);
        assert_eq!(ro.range::<_, str>(..).count(), 11);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_table_concurrent_readers() {
        const WRITES: usize = 500;
        let table = Table::new("t");

        scope(|scope| {
            let t = &table;
            let writer = scope.spawn(move || {
                for i in 0..WRITES {
                    t.set(format!("{:05}", i), i.to_string());
                }
            });

            let readers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(move || {
                        let mut seen = 0;
                        while seen < WRITES {
                            let ro = t.read();
                            // A snapshot is always a prefix of the writes.
                            assert_eq!(ro.iter().count(), ro.len());
                            if let Some((k, _)) = ro.iter().last() {
                                assert_eq!(k, &format!("{:05}", ro.len() - 1));
                            }
                            assert!(ro.as_map().verify());
                            seen = ro.len();
                        }
                    })
                })
                .collect();

            writer.join().unwrap();
            for h in readers.into_iter() {
                h.join().unwrap();
            }
        });

        assert_eq!(table.count(), WRITES);
    }
}
