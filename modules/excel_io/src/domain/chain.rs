use std::sync::Arc;

use arc_swap::ArcSwap;

/// A strategy that takes part in a priority chain.
pub trait Ranked: Send + Sync {
    fn id(&self) -> &str;

    /// Lower values are consulted first.
    fn priority(&self) -> i32;
}

/// Read-mostly chain of strategies kept sorted by priority.
///
/// Readers get an immutable snapshot; registration builds a new sorted vector
/// and swaps it in, so a reader never sees a half-sorted chain. The sort is
/// stable: equal priorities keep registration order.
pub struct PriorityChain<T: ?Sized + Ranked> {
    snapshot: ArcSwap<Vec<Arc<T>>>,
}

impl<T: ?Sized + Ranked> PriorityChain<T> {
    pub fn new(items: Vec<Arc<T>>) -> Self {
        let mut items = items;
        items.sort_by_key(|i| i.priority());
        Self {
            snapshot: ArcSwap::from_pointee(items),
        }
    }

    pub fn register(&self, item: Arc<T>) {
        tracing::debug!(id = item.id(), priority = item.priority(), "Chain member registered");
        self.snapshot.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(item.clone());
            next.sort_by_key(|i| i.priority());
            next
        });
    }

    /// Current members in consultation order.
    pub fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.load_full()
    }

    pub fn by_id(&self, id: &str) -> Option<Arc<T>> {
        self.snapshot.load().iter().find(|i| i.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
