//! Cache - A registry of named tables
//!
//! The cache maps table names to independent [Table]s and routes `get` and
//! `set` calls to them. Tables are created explicitly with
//! [Cache::create_table], or on the first `set` that names them when
//! auto-create is enabled (the default). Dropping a table removes it from
//! the registry; readers that still hold the `Arc<Table>` or one of its
//! snapshots keep working until they let go.
//!
//! The registry itself is a [CowCell], so resolving a table name never blocks
//! behind a table being created or dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::cowcell::CowCell;
use crate::error::{CacheError, Result};
use crate::table::Table;

/// A configurable builder to create a new [Cache].
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    auto_create: bool,
    max_tables: Option<usize>,
}

impl Default for CacheBuilder {
    fn default() -> Self {
        CacheBuilder {
            auto_create: true,
            max_tables: None,
        }
    }
}

impl CacheBuilder {
    /// Create a new Cache builder that you can configure before creation.
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, a `set` naming a table that does not exist creates it.
    /// When disabled, such calls fail with [CacheError::TableNotFound].
    #[must_use]
    pub fn set_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    /// Limit the number of tables the cache will hold at once.
    #[must_use]
    pub fn set_max_tables(mut self, max_tables: usize) -> Self {
        self.max_tables = Some(max_tables);
        self
    }

    /// Consume this builder, returning a cache.
    pub fn build(self) -> Cache {
        Cache {
            tables: CowCell::new(BTreeMap::new()),
            auto_create: self.auto_create,
            max_tables: self.max_tables,
        }
    }
}

/// A set of named tables, each an independent ordered string map.
///
/// # Examples
/// ```
/// use treecache::cache::Cache;
///
/// let cache = Cache::new();
/// cache.set("fruit", "apple", "red").unwrap();
///
/// assert_eq!(cache.get("fruit", "apple").unwrap().as_deref(), Some("red"));
/// assert_eq!(cache.get("fruit", "date").unwrap(), None);
/// ```
#[derive(Debug)]
pub struct Cache {
    tables: CowCell<BTreeMap<String, Arc<Table>>>,
    auto_create: bool,
    max_tables: Option<usize>,
}

impl Default for Cache {
    fn default() -> Self {
        CacheBuilder::default().build()
    }
}

impl Cache {
    /// Create a cache with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, empty table.
    pub fn create_table(&self, name: &str) -> Result<Arc<Table>> {
        check_name(name)?;
        let mut wr = self.tables.write();
        if wr.contains_key(name) {
            return Err(CacheError::TableExists(name.to_string()));
        }
        let table = self.insert_table(&mut wr, name)?;
        wr.commit();
        Ok(table)
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(name).cloned()
    }

    /// Remove a table from the cache. Returns `false` if it did not exist.
    pub fn drop_table(&self, name: &str) -> bool {
        let mut wr = self.tables.write();
        if !wr.contains_key(name) {
            return false;
        }
        wr.remove(name);
        wr.commit();
        trace!(table = %name, "drop_table");
        true
    }

    /// The names of all tables, in order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Retrieve `key` from `table`. A missing key is `Ok(None)`. A missing
    /// table is `Ok(None)` under auto-create, since a set would create it,
    /// and [CacheError::TableNotFound] otherwise. Reads never create tables.
    pub fn get(&self, table: &str, key: &str) -> Result<Option<String>> {
        Ok(self.lookup(table)?.and_then(|t| t.get(key)))
    }

    /// Set `key` to `value` in `table`.
    pub fn set(&self, table: &str, key: &str, value: &str) -> Result<()> {
        self.resolve(table)?.set(key, value);
        Ok(())
    }

    /// Apply many pairs to `table` in a single write transaction, so readers
    /// see all of them or none. Pairs with an empty key are skipped. Returns
    /// the number of pairs applied.
    pub fn batch_set<I, K, V>(&self, table: &str, pairs: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let t = self.resolve(table)?;
        let mut wr = t.write();
        let mut applied = 0;
        for (k, v) in pairs {
            let k = k.into();
            if k.is_empty() {
                continue;
            }
            wr.set(k, v);
            applied += 1;
        }
        wr.commit();
        trace!(table = %table, applied, "batch_set");
        Ok(applied)
    }

    /// The number of keys in `table`.
    pub fn count(&self, table: &str) -> Result<usize> {
        Ok(self.lookup(table)?.map(|t| t.count()).unwrap_or(0))
    }

    /// See [Table::scan].
    pub fn scan(
        &self,
        table: &str,
        start: &str,
        end: &str,
        limit: Option<usize>,
    ) -> Result<Vec<(String, String)>> {
        Ok(self
            .lookup(table)?
            .map(|t| t.scan(start, end, limit))
            .unwrap_or_default())
    }

    // Find a table for reading.
    fn lookup(&self, name: &str) -> Result<Option<Arc<Table>>> {
        check_name(name)?;
        match self.table(name) {
            Some(t) => Ok(Some(t)),
            None if self.auto_create => Ok(None),
            None => Err(CacheError::TableNotFound(name.to_string())),
        }
    }

    // Find a table for writing, creating it if allowed.
    fn resolve(&self, name: &str) -> Result<Arc<Table>> {
        check_name(name)?;
        if let Some(t) = self.table(name) {
            return Ok(t);
        }
        if !self.auto_create {
            return Err(CacheError::TableNotFound(name.to_string()));
        }
        let mut wr = self.tables.write();
        // Someone may have created it while we waited for the lock.
        if let Some(t) = wr.get(name) {
            return Ok(t.clone());
        }
        let table = self.insert_table(&mut wr, name)?;
        wr.commit();
        Ok(table)
    }

    fn insert_table(
        &self,
        tables: &mut BTreeMap<String, Arc<Table>>,
        name: &str,
    ) -> Result<Arc<Table>> {
        if let Some(max) = self.max_tables {
            if tables.len() >= max {
                return Err(CacheError::TableLimit(max));
            }
        }
        let table = Arc::new(Table::new(name));
        tables.insert(name.to_string(), table.clone());
        trace!(table = %name, tables = tables.len(), "create_table");
        Ok(table)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        Err(CacheError::InvalidTableName)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cache, CacheBuilder};
    use crate::error::CacheError;
    use std::sync::Arc;
    use std::thread::scope;

    #[test]
    fn test_cache_auto_create_on_set() {
        let _ = tracing_subscriber::fmt::try_init();
        let cache = Cache::new();
        assert_eq!(cache.get("fruit", "apple"), Ok(None));
        // Reads don't create.
        assert!(cache.table("fruit").is_none());

        cache.set("fruit", "apple", "red").unwrap();
        cache.set("fruit", "banana", "yellow").unwrap();
        cache.set("veg", "carrot", "orange").unwrap();

        assert_eq!(cache.get("fruit", "apple").unwrap().as_deref(), Some("red"));
        // Tables are independent.
        assert_eq!(cache.get("veg", "apple"), Ok(None));
        assert_eq!(cache.table_names(), vec!["fruit", "veg"]);
        assert_eq!(cache.count("fruit"), Ok(2));
        assert_eq!(cache.count("missing"), Ok(0));
    }

    #[test]
    fn test_cache_no_auto_create() {
        let cache = CacheBuilder::new().set_auto_create(false).build();
        assert_eq!(
            cache.set("t", "k", "v"),
            Err(CacheError::TableNotFound("t".to_string()))
        );
        assert_eq!(
            cache.get("t", "k"),
            Err(CacheError::TableNotFound("t".to_string()))
        );

        cache.create_table("t").unwrap();
        cache.set("t", "k", "v").unwrap();
        assert_eq!(cache.get("t", "k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_cache_create_table_twice() {
        let cache = Cache::new();
        let t = cache.create_table("t").unwrap();
        assert_eq!(t.name(), "t");
        assert_eq!(
            cache.create_table("t").unwrap_err(),
            CacheError::TableExists("t".to_string())
        );
        assert!(Arc::ptr_eq(&t, &cache.table("t").unwrap()));
    }

    #[test]
    fn test_cache_invalid_name() {
        let cache = Cache::new();
        assert_eq!(cache.set("", "k", "v"), Err(CacheError::InvalidTableName));
        assert_eq!(cache.get("", "k"), Err(CacheError::InvalidTableName));
        assert_eq!(
            cache.create_table("").unwrap_err(),
            CacheError::InvalidTableName
        );
    }

    #[test]
    fn test_cache_table_limit() {
        let cache = CacheBuilder::new().set_max_tables(2).build();
        cache.set("a", "k", "v").unwrap();
        cache.create_table("b").unwrap();
        assert_eq!(cache.set("c", "k", "v"), Err(CacheError::TableLimit(2)));
        // Existing tables still accept writes.
        cache.set("a", "k2", "v").unwrap();

        assert!(cache.drop_table("b"));
        cache.set("c", "k", "v").unwrap();
        assert_eq!(cache.table_names(), vec!["a", "c"]);
    }

    #[test]
    fn test_cache_drop_table() {
        let cache = Cache::new();
        cache.set("t", "k", "v").unwrap();
        let held = cache.table("t").unwrap();
        let snap = held.read();

        assert!(cache.drop_table("t"));
        assert!(!cache.drop_table("t"));
        assert!(cache.table("t").is_none());
        assert_eq!(cache.get("t", "k"), Ok(None));

        // Holders outlive the registry entry.
        assert_eq!(snap.get("k"), Some("v"));
        assert_eq!(held.get("k").as_deref(), Some("v"));

        // Recreating starts empty.
        cache.set("t", "other", "v").unwrap();
        assert_eq!(cache.get("t", "k"), Ok(None));
    }

    #[test]
    fn test_cache_batch_set() {
        let cache = Cache::new();
        let applied = cache
            .batch_set("t", vec![("a", "1"), ("", "skipped"), ("b", "2"), ("a", "3")])
            .unwrap();
        assert_eq!(applied, 3);
        assert_eq!(cache.count("t"), Ok(2));
        assert_eq!(cache.get("t", "a").unwrap().as_deref(), Some("3"));
        assert_eq!(cache.get("t", ""), Ok(None));
    }

    #[test]
    fn test_cache_scan() {
        let cache = Cache::new();
        cache
            .batch_set("t", (0..20).map(|i| (format!("key{:02}", i), i.to_string())))
            .unwrap();

        let got = cache.scan("t", "key05", "key09", Some(3)).unwrap();
        assert_eq!(
            got,
            vec![
                ("key05".to_string(), "5".to_string()),
                ("key06".to_string(), "6".to_string()),
                ("key07".to_string(), "7".to_string()),
            ]
        );
        assert_eq!(cache.scan("t", "key09", "key05", None), Ok(vec![]));
        assert_eq!(cache.scan("nope", "a", "z", None), Ok(vec![]));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_cache_concurrent_auto_create() {
        let cache = Cache::new();
        scope(|scope| {
            let c = &cache;
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    scope.spawn(move || {
                        for j in 0..50 {
                            c.set("shared", &format!("{}-{}", i, j), "v").unwrap();
                        }
                    })
                })
                .collect();
            for h in handles.into_iter() {
                h.join().unwrap();
            }
        });
        // Racing creators must all land in one table.
        assert_eq!(cache.table_names(), vec!["shared"]);
        assert_eq!(cache.count("shared"), Ok(400));
    }
}
