//! CowCell - A concurrently readable cell with Arc
//!
//! A CowCell can be used in place of a `RwLock`. Readers are guaranteed that
//! the data will not change during the lifetime of the read. Readers do
//! not block writers, and writers do not block readers. Writers are serialised
//! same as the write in a RwLock.
//!
//! Each [Table](crate::table::Table) keeps its [TreeMap](crate::treemap::TreeMap)
//! in one of these. Since cloning a `TreeMap` only bumps the root's reference
//! count, the clone-on-write taken by a writer is cheap, and only the paths
//! the writer touches are copied.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, MutexGuard};

/// A concurrently readable cell.
///
/// This structure behaves in a similar manner to a `RwLock<T>`. However unlike
/// a `RwLock`, writes and parallel reads can be performed at the same time. This
/// means readers and writers do no block either other. Writers are serialised.
///
/// As a write transaction first mutates, we clone the existing data to a new
/// location that is capable of being mutated. Readers are guaranteed that the
/// content of the `CowCell` will live as long as the read transaction is open,
/// and will be consistent for the duration of the transaction.
///
/// # Examples
/// ```
/// use treecache::cowcell::CowCell;
/// use treecache::treemap::TreeMap;
///
/// let cell = CowCell::new(TreeMap::new());
///
/// // Begin a read transaction
/// let read_txn = cell.read();
/// {
///     let mut write_txn = cell.write();
///     write_txn.insert("k".to_string(), "v".to_string());
///     write_txn.commit();
/// }
/// // The earlier generation is unchanged.
/// assert!(read_txn.is_empty());
/// assert_eq!(cell.read().get("k").map(String::as_str), Some("v"));
/// ```
#[derive(Debug, Default)]
pub struct CowCell<T> {
    write: Mutex<()>,
    active: ArcSwap<T>,
}

/// A `CowCell` Write Transaction handle.
///
/// Changes are only stored in this structure until you call commit. To abort/
/// rollback a change, don't call commit and allow the write transaction to
/// be dropped. This causes the `CowCell` to unlock allowing the next writer
/// to proceed.
pub struct CowCellWriteTxn<'a, T> {
    // None until the first mutation.
    work: Option<T>,
    read: Arc<T>,
    caller: &'a CowCell<T>,
    _guard: MutexGuard<'a, ()>,
}

/// A `CowCell` Read Transaction handle.
///
/// This allows safe reading of the value within the `CowCell`, that allows
/// no mutation of the value, and without blocking writers.
#[derive(Debug)]
pub struct CowCellReadTxn<T>(Arc<T>);

impl<T> Clone for CowCellReadTxn<T> {
    fn clone(&self) -> Self {
        CowCellReadTxn(self.0.clone())
    }
}

impl<T> CowCell<T>
where
    T: Clone,
{
    /// Create a new `CowCell` for storing type `T`. `T` must implement `Clone`
    /// to enable clone-on-write.
    pub fn new(data: T) -> Self {
        CowCell {
            write: Mutex::new(()),
            active: ArcSwap::from_pointee(data),
        }
    }

    /// Begin a read transaction, returning a read guard. The content of
    /// the read guard is guaranteed to be consistent for the life time of the
    /// read - even if writers commit during.
    pub fn read(&self) -> CowCellReadTxn<T> {
        CowCellReadTxn(self.active.load_full())
    }

    /// Begin a write transaction, returning a write guard. The content of the
    /// write is only visible to this thread, and is not visible to any reader
    /// until `commit()` is called.
    pub fn write(&self) -> CowCellWriteTxn<'_, T> {
        let mguard = self.write.lock();
        self.begin(mguard)
    }

    /// Attempt to create a write transaction. Returns `None` if another
    /// writer is active. See also `write(&self)`
    pub fn try_write(&self) -> Option<CowCellWriteTxn<'_, T>> {
        self.write.try_lock().map(|mguard| self.begin(mguard))
    }

    fn begin<'a>(&'a self, mguard: MutexGuard<'a, ()>) -> CowCellWriteTxn<'a, T> {
        // We delay copying until the first get_mut.
        let read = self.active.load_full();
        CowCellWriteTxn {
            work: None,
            read,
            caller: self,
            _guard: mguard,
        }
    }

    fn commit(&self, newdata: Option<T>) {
        if let Some(new_data) = newdata {
            self.active.store(Arc::new(new_data));
        }
        // If not some, nothing was changed.
    }
}

impl<T> Deref for CowCellReadTxn<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> CowCellWriteTxn<'_, T>
where
    T: Clone,
{
    /// Access a mutable pointer of the data in the `CowCell`. This data is only
    /// visible to the write transaction object in this thread, until you call
    /// `commit()`.
    pub fn get_mut(&mut self) -> &mut T {
        let read = &self.read;
        self.work.get_or_insert_with(|| (**read).clone())
    }

    /// Update the inner value with a new one, skipping the clone.
    pub fn replace(&mut self, value: T) {
        self.work = Some(value);
    }

    /// Returns `true` if this transaction has staged any change.
    pub fn is_dirty(&self) -> bool {
        self.work.is_some()
    }

    /// Commit the changes made in this write transactions to the `CowCell`.
    /// This will consume the transaction so no further changes can be made
    /// after this is called. Not calling this in a block, is equivalent to
    /// an abort/rollback of the transaction.
    pub fn commit(self) {
        self.caller.commit(self.work);
    }
}

impl<T> Deref for CowCellWriteTxn<'_, T>
where
    T: Clone,
{
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        match &self.work {
            Some(v) => v,
            None => &self.read,
        }
    }
}

impl<T> DerefMut for CowCellWriteTxn<'_, T>
where
    T: Clone,
{
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut()
    }
}
