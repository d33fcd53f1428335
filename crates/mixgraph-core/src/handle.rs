//! Opaque native handles and the arena that backs them.
//!
//! Every resource owned by the native backend (mixer streams, decoding
//! channels, effect instances) is referred to by a [`Handle`]. A handle is a
//! plain integer tagged with a zero-sized kind marker so a stream handle can
//! never be passed where an effect handle is expected. The value `0` is
//! reserved: it means "not yet allocated" or "already released".
//!
//! [`HandleArena`] is the storage side: handle `n` addresses slot `n - 1`, and
//! slots are never reused, so a released handle can't alias a newer resource.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// Kind marker for mixer stream handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamTag {}

/// Kind marker for decoding channel handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelTag {}

/// Kind marker for effect instance handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectTag {}

/// Handle to a native mixer stream.
pub type StreamHandle = Handle<StreamTag>;
/// Handle to a native decoding channel.
pub type ChannelHandle = Handle<ChannelTag>;
/// Handle to a native effect instance.
pub type EffectHandle = Handle<EffectTag>;

/// Opaque identifier for a native resource of kind `K`.
///
/// `Handle::NULL` (raw value 0) is the unallocated state. Handles are `Copy`;
/// ownership of the underlying resource is a convention tracked by whichever
/// component allocated it, and [`take`](Handle::take) is the way to give it up
/// exactly once.
pub struct Handle<K> {
    id: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    /// The unallocated handle.
    pub const NULL: Self = Self {
        id: 0,
        _kind: PhantomData,
    };

    /// Wraps a raw native identifier.
    #[inline]
    pub const fn from_raw(id: u32) -> Self {
        Self {
            id,
            _kind: PhantomData,
        }
    }

    /// Returns the raw native identifier.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.id
    }

    /// Whether this handle is the unallocated sentinel.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.id == 0
    }

    /// Whether this handle refers to an allocated resource.
    #[inline]
    pub const fn is_allocated(self) -> bool {
        self.id != 0
    }

    /// `Some(self)` if allocated, `None` for the null handle.
    #[inline]
    pub const fn allocated(self) -> Option<Self> {
        if self.id == 0 { None } else { Some(self) }
    }

    /// Moves the handle out, leaving [`Handle::NULL`] behind.
    ///
    /// Returns `None` if the handle was already null, so callers can write
    /// `if let Some(h) = slot.handle.take() { backend.free(h) }` and never
    /// release twice.
    #[inline]
    pub fn take(&mut self) -> Option<Self> {
        let taken = core::mem::replace(self, Self::NULL);
        taken.is_allocated().then_some(taken)
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<K> PartialOrd for Handle<K> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Handle<K> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<K> Default for Handle<K> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.id)
    }
}

impl<K> fmt::Display for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

/// Integer-keyed slot storage where the key is a [`Handle`].
///
/// Handle `n` lives in slot `n - 1`. Released slots stay empty forever, which
/// keeps handle values unique for the lifetime of the arena.
pub struct HandleArena<K, T> {
    slots: Vec<Option<T>>,
    live: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<K, T> HandleArena<K, T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            _kind: PhantomData,
        }
    }

    /// Stores `value` and returns its freshly allocated handle.
    pub fn insert(&mut self, value: T) -> Handle<K> {
        self.slots.push(Some(value));
        self.live += 1;
        Handle::from_raw(self.slots.len() as u32)
    }

    fn slot_index(handle: Handle<K>) -> Option<usize> {
        handle.raw().checked_sub(1).map(|i| i as usize)
    }

    /// Returns the value behind `handle`, or `None` if it was never allocated
    /// or has been released.
    pub fn get(&self, handle: Handle<K>) -> Option<&T> {
        Self::slot_index(handle)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }

    /// Mutable access to the value behind `handle`.
    pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut T> {
        Self::slot_index(handle)
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::as_mut)
    }

    /// Whether `handle` currently refers to a live slot.
    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.get(handle).is_some()
    }

    /// Releases `handle`, returning its value. Releasing a null or already
    /// released handle returns `None` and changes nothing.
    pub fn remove(&mut self, handle: Handle<K>) -> Option<T> {
        let value = Self::slot_index(handle)
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::take);
        if value.is_some() {
            self.live -= 1;
        }
        value
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no slot is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates live slots in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (Handle::from_raw(i as u32 + 1), v)))
    }

    /// Iterates live slots mutably in allocation order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<K>, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (Handle::from_raw(i as u32 + 1), v)))
    }

    /// Releases every slot for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(Handle<K>, &mut T) -> bool) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot
                && !keep(Handle::from_raw(i as u32 + 1), value)
            {
                *slot = None;
                self.live -= 1;
            }
        }
    }
}

impl<K, T> Default for HandleArena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T: fmt::Debug> fmt::Debug for HandleArena<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_zero() {
        let h = StreamHandle::NULL;
        assert!(h.is_null());
        assert!(!h.is_allocated());
        assert_eq!(h.raw(), 0);
        assert_eq!(StreamHandle::default(), h);
    }

    #[test]
    fn take_releases_exactly_once() {
        let mut h = EffectHandle::from_raw(7);
        assert_eq!(h.take(), Some(EffectHandle::from_raw(7)));
        assert!(h.is_null());
        assert_eq!(h.take(), None);
    }

    #[test]
    fn arena_handles_start_at_one() {
        let mut arena: HandleArena<ChannelTag, &str> = HandleArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn arena_never_reuses_released_slots() {
        let mut arena: HandleArena<ChannelTag, u8> = HandleArena::new();
        let a = arena.insert(1);
        assert_eq!(arena.remove(a), Some(1));
        let b = arena.insert(2);
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
    }

    #[test]
    fn double_release_is_noop() {
        let mut arena: HandleArena<EffectTag, u8> = HandleArena::new();
        let a = arena.insert(1);
        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());
        assert!(arena.remove(EffectHandle::NULL).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn retain_drops_rejected_slots() {
        let mut arena: HandleArena<StreamTag, u8> = HandleArena::new();
        arena.insert(1);
        let keep = arena.insert(2);
        arena.insert(3);
        arena.retain(|h, _| h == keep);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.iter().map(|(h, _)| h).collect::<Vec<_>>(), vec![keep]);
    }
}
