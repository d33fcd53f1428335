//! An ordered list that reports every edit to its observers.
//!
//! [`ObservableList`] is what callers edit to change a mixer's effect chain.
//! Each successful mutation produces exactly one [`ListChange`], delivered to
//! all observers while the list lock is still held, so observers see changes
//! in the same order they were applied.
//!
//! Observers must not edit the list they observe; the lock is not reentrant.

use std::sync::Arc;

use parking_lot::Mutex;

/// One observed edit to an [`ObservableList`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange<T> {
    /// `items` were inserted starting at `index`.
    ///
    /// `index` is `None` for the replay of pre-existing content delivered when
    /// an observer subscribes; consumers treat it as index 0.
    Insert {
        /// Insertion point, or `None` for the initial replay.
        index: Option<usize>,
        /// The inserted items, in order.
        items: Vec<T>,
    },
    /// The item at `from` was removed and re-inserted at `to`.
    Move {
        /// Index before the move.
        from: usize,
        /// Index after the move.
        to: usize,
    },
    /// `count` items starting at `index` were removed.
    Remove {
        /// First removed index.
        index: usize,
        /// Number of removed items.
        count: usize,
    },
    /// The item at `index` was replaced by `item`.
    Replace {
        /// Replaced index.
        index: usize,
        /// The new item.
        item: T,
    },
    /// Every item was removed.
    Reset,
}

/// Identifies a registered observer for [`ObservableList::unobserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer<T> = Box<dyn Fn(ListChange<T>) + Send + Sync>;

struct ListInner<T> {
    items: Vec<T>,
    observers: Vec<(ObserverId, Observer<T>)>,
    next_observer: u64,
}

impl<T: Clone> ListInner<T> {
    fn emit(&self, change: ListChange<T>) {
        let Some(((_, last), rest)) = self.observers.split_last() else {
            return;
        };
        for (_, observer) in rest {
            observer(change.clone());
        }
        last(change);
    }
}

/// A cloneable, thread-safe list whose edits are observable.
///
/// Clones share the same underlying list.
pub struct ObservableList<T> {
    inner: Arc<Mutex<ListInner<T>>>,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ObservableList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Creates a list holding `items`. No change is emitted.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListInner {
                items,
                observers: Vec::new(),
                next_observer: 0,
            })),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.lock().items.get(index).cloned()
    }

    /// Clone of every item.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.lock().items.clone()
    }

    /// Appends `item`.
    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock();
        let index = inner.items.len();
        inner.items.push(item.clone());
        inner.emit(ListChange::Insert {
            index: Some(index),
            items: vec![item],
        });
    }

    /// Inserts `item` at `index`. Returns `false` if `index > len`.
    pub fn insert(&self, index: usize, item: T) -> bool {
        self.insert_range(index, [item])
    }

    /// Inserts `items` starting at `index`.
    ///
    /// Returns `false` if `index > len`. Inserting nothing succeeds without
    /// emitting a change.
    pub fn insert_range(&self, index: usize, items: impl IntoIterator<Item = T>) -> bool {
        let mut inner = self.inner.lock();
        if index > inner.items.len() {
            return false;
        }
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return true;
        }
        inner.items.splice(index..index, items.iter().cloned());
        inner.emit(ListChange::Insert {
            index: Some(index),
            items,
        });
        true
    }

    /// Removes and returns the item at `index`.
    pub fn remove(&self, index: usize) -> Option<T> {
        let mut inner = self.inner.lock();
        if index >= inner.items.len() {
            return None;
        }
        let item = inner.items.remove(index);
        inner.emit(ListChange::Remove { index, count: 1 });
        Some(item)
    }

    /// Removes `count` items starting at `index`.
    ///
    /// Returns `false` if the range extends past the end. Removing nothing
    /// succeeds without emitting a change.
    pub fn remove_range(&self, index: usize, count: usize) -> bool {
        let mut inner = self.inner.lock();
        let Some(end) = index.checked_add(count) else {
            return false;
        };
        if end > inner.items.len() {
            return false;
        }
        if count == 0 {
            return true;
        }
        inner.items.drain(index..end);
        inner.emit(ListChange::Remove { index, count });
        true
    }

    /// Moves the item at `from` so it ends up at `to`.
    ///
    /// `to` is an index into the list after the move. Returns `false` if
    /// either index is out of range. Moving an item onto itself succeeds
    /// without emitting a change.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        let mut inner = self.inner.lock();
        let len = inner.items.len();
        if from >= len || to >= len {
            return false;
        }
        if from == to {
            return true;
        }
        let item = inner.items.remove(from);
        inner.items.insert(to, item);
        inner.emit(ListChange::Move { from, to });
        true
    }

    /// Replaces the item at `index`, returning the old one.
    pub fn replace(&self, index: usize, item: T) -> Option<T> {
        let mut inner = self.inner.lock();
        let slot = inner.items.get_mut(index)?;
        let old = std::mem::replace(slot, item.clone());
        inner.emit(ListChange::Replace { index, item });
        Some(old)
    }

    /// Removes every item.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.items.clear();
        inner.emit(ListChange::Reset);
    }

    /// Registers an observer.
    ///
    /// If the list already holds items, the observer immediately receives a
    /// [`ListChange::Insert`] with `index: None` describing them.
    pub fn observe(&self, observer: impl Fn(ListChange<T>) + Send + Sync + 'static) -> ObserverId {
        let mut inner = self.inner.lock();
        if !inner.items.is_empty() {
            observer(ListChange::Insert {
                index: None,
                items: inner.items.clone(),
            });
        }
        let id = ObserverId(inner.next_observer);
        inner.next_observer += 1;
        inner.observers.push((id, Box::new(observer)));
        id
    }

    /// Unregisters an observer. Returns `false` if it was not registered.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.observers.len();
        inner.observers.retain(|(oid, _)| *oid != id);
        inner.observers.len() != before
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}
