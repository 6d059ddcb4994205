use std::borrow::Borrow;
use std::cmp::Ordering;
use std::mem;
use std::sync::Arc;

/// An owned edge to a subtree. `None` is an empty subtree.
pub(crate) type Link<K, V> = Option<Arc<Node<K, V>>>;

#[derive(Clone)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) left: Link<K, V>,
    pub(crate) right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new_leaf(key: K, value: V) -> Arc<Self> {
        Arc::new(Node {
            key,
            value,
            left: None,
            right: None,
        })
    }
}

/// Walk from `start` toward `k`. Less goes left, greater goes right.
pub(crate) fn search<'a, K, V, Q>(start: &'a Link<K, V>, k: &Q) -> Option<&'a Node<K, V>>
where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
{
    let mut next = start.as_deref();
    while let Some(node) = next {
        next = match k.cmp(node.key.borrow()) {
            Ordering::Less => node.left.as_deref(),
            Ordering::Greater => node.right.as_deref(),
            Ordering::Equal => return Some(node),
        };
    }
    None
}

/// Place `k` below `start`, or overwrite the value if `k` is present.
///
/// Every node on the path is made unique before it is touched, so any other
/// owner of a shared subtree keeps seeing the old contents. The new leaf is
/// created and linked in one assignment to the empty slot.
pub(crate) fn insert<K, V>(start: &mut Link<K, V>, k: K, v: V) -> Option<V>
where
    K: Clone + Ord,
    V: Clone,
{
    let mut slot = start;
    while let Some(node) = slot {
        let node = Arc::make_mut(node);
        match k.cmp(&node.key) {
            Ordering::Less => slot = &mut node.left,
            Ordering::Greater => slot = &mut node.right,
            Ordering::Equal => return Some(mem::replace(&mut node.value, v)),
        }
    }
    *slot = Some(Node::new_leaf(k, v));
    None
}

/// Release a subtree without recursing, so a degenerate chain can't blow the
/// stack. Subtrees still referenced by a snapshot are left to that owner.
///
/// Two generations sharing a tail may be released on different threads at
/// once. `Arc::into_inner` hands each node to exactly one of them.
pub(crate) fn release<K, V>(start: &mut Link<K, V>) {
    let mut stack: Vec<Arc<Node<K, V>>> = start.take().into_iter().collect();
    while let Some(node) = stack.pop() {
        if let Some(mut node) = Arc::into_inner(node) {
            stack.extend(node.left.take());
            stack.extend(node.right.take());
        }
    }
}

/// Height of the subtree, zero when empty.
pub(crate) fn depth<K, V>(start: &Link<K, V>) -> usize {
    let mut max = 0;
    let mut stack: Vec<(&Node<K, V>, usize)> =
        start.as_deref().map(|n| (n, 1)).into_iter().collect();
    while let Some((node, d)) = stack.pop() {
        max = max.max(d);
        if let Some(l) = node.left.as_deref() {
            stack.push((l, d + 1));
        }
        if let Some(r) = node.right.as_deref() {
            stack.push((r, d + 1));
        }
    }
    max
}
