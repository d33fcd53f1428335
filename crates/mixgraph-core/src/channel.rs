//! Channels and the generation-checked slots that track them.
//!
//! A [`Channel`] is one playable source. The application owns it; mixers only
//! remember its [`ChannelKey`]. Dropping the `Channel` frees its slot and bumps
//! the slot's generation, so any key a mixer still holds stops resolving. This
//! gives mixers weak membership without keeping the channel alive.
//!
//! Per-channel state that must outlive a trip through the native mixer lives in
//! the slot: the native handle, the logical mixer pause flag, the synthesized
//! stopped flag, and which mixer the channel currently belongs to.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::handle::ChannelHandle;
use crate::mixer::MixerNode;
use crate::queue::CommandQueue;

/// Generation-checked index of a channel slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
    index: u32,
    generation: u32,
}

impl ChannelKey {
    /// Slot index.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at allocation time.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// State kept per live channel.
#[derive(Debug, Default)]
pub(crate) struct ChannelState {
    pub handle: ChannelHandle,
    pub mixer_paused: bool,
    pub stopped: bool,
    pub mixer: Option<Weak<MixerNode>>,
}

struct SlotEntry {
    generation: u32,
    state: Option<ChannelState>,
}

#[derive(Default)]
struct Slab {
    entries: Vec<SlotEntry>,
    free: Vec<u32>,
    live: usize,
}

impl Slab {
    fn state_mut(&mut self, key: ChannelKey) -> Option<&mut ChannelState> {
        self.entries
            .get_mut(key.index as usize)
            .filter(|e| e.generation == key.generation)
            .and_then(|e| e.state.as_mut())
    }
}

/// Graph-wide storage for channel state.
///
/// Cheap to clone; clones share storage. The lock is held only for short
/// field reads and writes and never across a backend call.
#[derive(Clone, Default)]
pub struct ChannelSlots {
    inner: Arc<Mutex<Slab>>,
}

impl ChannelSlots {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate(&self) -> ChannelKey {
        let mut slab = self.inner.lock();
        slab.live += 1;
        if let Some(index) = slab.free.pop() {
            let entry = &mut slab.entries[index as usize];
            entry.state = Some(ChannelState::default());
            return ChannelKey {
                index,
                generation: entry.generation,
            };
        }
        let index = slab.entries.len() as u32;
        slab.entries.push(SlotEntry {
            generation: 0,
            state: Some(ChannelState::default()),
        });
        ChannelKey {
            index,
            generation: 0,
        }
    }

    pub(crate) fn release(&self, key: ChannelKey) -> Option<ChannelState> {
        let mut slab = self.inner.lock();
        let entry = slab
            .entries
            .get_mut(key.index as usize)
            .filter(|e| e.generation == key.generation)?;
        let state = entry.state.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        slab.free.push(key.index);
        slab.live -= 1;
        Some(state)
    }

    /// Whether `key` still refers to a live channel.
    pub fn is_live(&self, key: ChannelKey) -> bool {
        self.inner.lock().state_mut(key).is_some()
    }

    /// Number of live channels.
    pub fn live_count(&self) -> usize {
        self.inner.lock().live
    }

    /// Runs `f` on the state behind `key`, if it is still live.
    pub(crate) fn with<R>(&self, key: ChannelKey, f: impl FnOnce(&mut ChannelState) -> R) -> Option<R> {
        self.inner.lock().state_mut(key).map(f)
    }

    pub(crate) fn handle(&self, key: ChannelKey) -> Option<ChannelHandle> {
        self.with(key, |s| s.handle)
    }

    pub(crate) fn mixer(&self, key: ChannelKey) -> Option<Arc<MixerNode>> {
        self.with(key, |s| s.mixer.as_ref().and_then(Weak::upgrade))
            .flatten()
    }
}

impl fmt::Debug for ChannelSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSlots")
            .field("live", &self.live_count())
            .finish()
    }
}

/// An application-owned playable source.
///
/// Created by [`MixerGraph::create_channel`](crate::MixerGraph::create_channel)
/// without a native handle; call [`set_handle`](Channel::set_handle) once the
/// decoder has produced one. Dropping the channel removes it from its mixer.
pub struct Channel {
    key: ChannelKey,
    slots: ChannelSlots,
    queue: CommandQueue,
}

impl Channel {
    pub(crate) fn new(slots: ChannelSlots, queue: CommandQueue) -> Self {
        let key = slots.allocate();
        Self { key, slots, queue }
    }

    /// Slot key of this channel.
    pub fn key(&self) -> ChannelKey {
        self.key
    }

    /// Native playback handle, or [`ChannelHandle::NULL`] if not realized.
    pub fn handle(&self) -> ChannelHandle {
        self.slots.handle(self.key).unwrap_or_default()
    }

    /// Whether the channel is held paused at the mixer level.
    ///
    /// Reflects the last applied play/pause/stop, or the native flag captured
    /// when the channel last left a mixer.
    pub fn is_mixer_paused(&self) -> bool {
        self.slots.with(self.key, |s| s.mixer_paused).unwrap_or(false)
    }

    /// The mixer this channel currently belongs to.
    pub fn mixer(&self) -> Option<Arc<MixerNode>> {
        self.slots.mixer(self.key)
    }

    /// Records the channel's native handle.
    ///
    /// Queued like any mutation. If the channel already belongs to a mixer
    /// whose stream exists, it is attached once the handle is recorded; a
    /// previously attached handle is detached first.
    pub fn set_handle(&self, handle: ChannelHandle) {
        let key = self.key;
        let slots = self.slots.clone();
        self.queue.schedule(move || {
            let Some(previous) = slots.with(key, |s| std::mem::replace(&mut s.handle, handle))
            else {
                return Ok(());
            };
            if let Some(mixer) = slots.mixer(key) {
                mixer.refresh_member(key, previous);
            }
            Ok(())
        });
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        let mixer = self.slots.mixer(self.key);
        self.slots.release(self.key);
        if let Some(mixer) = mixer {
            let weak = Arc::downgrade(&mixer);
            drop(mixer);
            self.queue.schedule(move || {
                if let Some(mixer) = weak.upgrade() {
                    mixer.prune_dead_members();
                }
                Ok(())
            });
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("key", &self.key)
            .field("handle", &self.handle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_keys_go_stale() {
        let slots = ChannelSlots::new();
        let key = slots.allocate();
        assert!(slots.is_live(key));
        assert!(slots.release(key).is_some());
        assert!(!slots.is_live(key));
        assert!(slots.release(key).is_none());
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let slots = ChannelSlots::new();
        let a = slots.allocate();
        slots.release(a);
        let b = slots.allocate();
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(!slots.is_live(a));
        assert!(slots.is_live(b));
        assert!(slots.with(a, |_| ()).is_none());
    }

    #[test]
    fn live_count_tracks_allocations() {
        let slots = ChannelSlots::new();
        let keys: Vec<_> = (0..3).map(|_| slots.allocate()).collect();
        assert_eq!(slots.live_count(), 3);
        slots.release(keys[1]);
        assert_eq!(slots.live_count(), 2);
    }

    #[test]
    fn dropping_channel_frees_slot() {
        let slots = ChannelSlots::new();
        let queue = CommandQueue::new();
        let channel = Channel::new(slots.clone(), queue);
        let key = channel.key();
        assert!(channel.handle().is_null());
        drop(channel);
        assert!(!slots.is_live(key));
    }

    #[test]
    fn set_handle_is_queued() {
        let slots = ChannelSlots::new();
        let queue = CommandQueue::new();
        let channel = Channel::new(slots, queue.clone());
        channel.set_handle(ChannelHandle::from_raw(9));
        assert!(channel.handle().is_null());
        queue.bind_current_thread();
        queue.tick();
        assert_eq!(channel.handle(), ChannelHandle::from_raw(9));
    }
}
