//! Iterators over the [TreeMap](super::TreeMap). All of them walk the tree
//! in order with an explicit stack rather than by recursion.

use std::borrow::Borrow;
use std::iter::FusedIterator;
use std::ops::{Bound, RangeBounds};
use std::ptr;

use smallvec::SmallVec;

use super::node::{Link, Node};

// Enough for a well shaped tree of any practical size before we spill.
const STACK_INLINE: usize = 32;

type Stack<'a, K, V> = SmallVec<[&'a Node<K, V>; STACK_INLINE]>;

fn push_left<'a, K, V>(stack: &mut Stack<'a, K, V>, mut next: Option<&'a Node<K, V>>) {
    while let Some(node) = next {
        stack.push(node);
        next = node.left.as_deref();
    }
}

/// Iterator over all key-value pairs in ascending key order.
pub struct Iter<'a, K, V> {
    stack: Stack<'a, K, V>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(root: &'a Link<K, V>, length: usize) -> Self {
        let mut stack = SmallVec::new();
        push_left(&mut stack, root.as_deref());
        Iter {
            stack,
            remaining: length,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        push_left(&mut self.stack, node.right.as_deref());
        self.remaining = self.remaining.saturating_sub(1);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over the keys in ascending order.
pub struct Keys<'a, K, V> {
    pub(crate) iter: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// Iterator over the values, ordered by their keys.
pub struct Values<'a, K, V> {
    pub(crate) iter: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// Iterator over the key-value pairs that fall inside a key range.
///
/// Both ends are resolved when the iterator is built: the stack is seeded
/// with the path to the first key at or past the start bound, and `last`
/// points at the greatest key inside the end bound.
pub struct Range<'a, K, V> {
    stack: Stack<'a, K, V>,
    last: Option<&'a Node<K, V>>,
}

impl<'a, K, V> Range<'a, K, V>
where
    K: Ord,
{
    pub(crate) fn new<Q, R>(root: &'a Link<K, V>, range: R) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        let mut stack: Stack<'a, K, V> = SmallVec::new();
        let mut next = root.as_deref();
        while let Some(node) = next {
            let k: &Q = node.key.borrow();
            let after_start = match range.start_bound() {
                Bound::Included(s) => k >= s,
                Bound::Excluded(s) => k > s,
                Bound::Unbounded => true,
            };
            if after_start {
                stack.push(node);
                next = node.left.as_deref();
            } else {
                next = node.right.as_deref();
            }
        }

        let mut last = None;
        let mut next = root.as_deref();
        while let Some(node) = next {
            let k: &Q = node.key.borrow();
            let before_end = match range.end_bound() {
                Bound::Included(e) => k <= e,
                Bound::Excluded(e) => k < e,
                Bound::Unbounded => true,
            };
            if before_end {
                last = Some(node);
                next = node.right.as_deref();
            } else {
                next = node.left.as_deref();
            }
        }

        let nonempty = matches!(
            (stack.last(), last),
            (Some(first), Some(l)) if first.key <= l.key
        );
        if !nonempty {
            // Inverted or empty range.
            stack.clear();
            last = None;
        }

        Range { stack, last }
    }
}

impl<'a, K, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if self.last.is_some_and(|l| ptr::eq(l, node)) {
            self.stack.clear();
            self.last = None;
        } else {
            push_left(&mut self.stack, node.right.as_deref());
        }
        Some((&node.key, &node.value))
    }
}

impl<K, V> FusedIterator for Range<'_, K, V> {}
