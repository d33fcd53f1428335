//! Mixer graph nodes.
//!
//! A [`MixerNode`] owns one native mixer stream, the weak membership of the
//! channels routed into it, and an effect chain that follows its observable
//! effect list. Every mutation funnels through the graph's
//! [`CommandQueue`]; the `*_now` methods in this module are the bodies of
//! those queued actions and assume they run on the audio thread.
//!
//! Transport calls (`play`, `pause`, `stop`, positions, levels) are direct
//! native calls and report failure as `bool`/`Option`.
//!
//! # Locking
//!
//! Each node guards its mutable state with one mutex. Node locks are never
//! nested: moving a channel between nodes releases one before taking the
//! other. Channel slot locks may be taken briefly while a node lock is held,
//! never the other way around.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::{Backend, BackendError, ChannelStatus, MixerFlags, PositionMode, StreamFlags};
use crate::chain::{ChainTarget, EffectChain};
use crate::channel::{Channel, ChannelKey, ChannelSlots};
use crate::effect::{EffectKind, EffectParameters};
use crate::error::MixerError;
use crate::handle::{ChannelHandle, EffectHandle, StreamHandle};
use crate::observable::{ListChange, ObservableList, ObserverId};
use crate::queue::CommandQueue;
use crate::registry::{Member, MemberRegistry};

/// Identifies a mixer within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MixerId(pub(crate) u64);

impl MixerId {
    /// Raw numeric id. The default mixer is always 0.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MixerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mixer#{}", self.0)
    }
}

/// Output format for mixer streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Sample rate in Hz.
    pub frequency: u32,
    /// Output channel count.
    pub channels: u32,
    /// Creation flags.
    pub flags: StreamFlags,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            frequency: 44_100,
            channels: 2,
            flags: StreamFlags::NONSTOP,
        }
    }
}

/// Audible playback state of a channel within its mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Not producing audio: never started, stopped, or out of data.
    Stopped,
    /// Audibly playing.
    Playing,
    /// Held at the mixer or channel level.
    Paused,
    /// Wants to play but is starved.
    Stalled,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stalled => "stalled",
        })
    }
}

/// One effect chain entry as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectInfo {
    /// Effect type.
    pub kind: EffectKind,
    /// Native handle, null while unallocated.
    pub handle: EffectHandle,
    /// Chain position.
    pub priority: u32,
}

/// Graph-wide collaborators every node shares.
#[derive(Clone)]
pub(crate) struct NodeContext {
    pub backend: Arc<dyn Backend>,
    pub queue: CommandQueue,
    pub slots: ChannelSlots,
    pub format: StreamFormat,
}

#[derive(Default)]
struct NodeState {
    stream: StreamHandle,
    members: MemberRegistry,
    chain: EffectChain,
    observer: Option<ObserverId>,
}

/// A mixer stream with its channels and effect chain.
///
/// Created by [`MixerGraph::create_mixer`](crate::MixerGraph::create_mixer).
/// The node starts without a native stream; it gets one from
/// [`ensure_stream`](MixerNode::ensure_stream) or
/// [`on_device_changed`](MixerNode::on_device_changed) once the device is up.
pub struct MixerNode {
    id: MixerId,
    name: String,
    ctx: NodeContext,
    fallback: Option<Arc<MixerNode>>,
    effects: ObservableList<Arc<EffectParameters>>,
    this: Weak<MixerNode>,
    state: Mutex<NodeState>,
    disposed: AtomicBool,
    // Published after every mutation for lock-free readers.
    published_stream: AtomicU32,
    published_members: AtomicUsize,
    published_effects: AtomicUsize,
}

impl MixerNode {
    pub(crate) fn new(
        id: MixerId,
        name: String,
        ctx: NodeContext,
        fallback: Option<Arc<MixerNode>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<MixerNode>| {
            let effects = ObservableList::new();
            let weak = this.clone();
            let queue = ctx.queue.clone();
            let observer = effects.observe(move |change| {
                let weak = weak.clone();
                queue.schedule(move || {
                    if let Some(node) = weak.upgrade() {
                        node.apply_effect_change(change);
                    }
                    Ok(())
                });
            });
            Self {
                id,
                name,
                ctx,
                fallback,
                effects,
                this: this.clone(),
                state: Mutex::new(NodeState {
                    observer: Some(observer),
                    ..NodeState::default()
                }),
                disposed: AtomicBool::new(false),
                published_stream: AtomicU32::new(0),
                published_members: AtomicUsize::new(0),
                published_effects: AtomicUsize::new(0),
            }
        })
    }

    // ── Identity ────────────────────────────────────────────────────────────

    /// Mixer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mixer id.
    pub fn id(&self) -> MixerId {
        self.id
    }

    /// The node that receives this node's channels on disposal.
    pub fn fallback(&self) -> Option<&Arc<MixerNode>> {
        self.fallback.as_ref()
    }

    /// Whether [`dispose`](Self::dispose) has taken effect.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    // ── Membership ──────────────────────────────────────────────────────────

    /// Routes `channel` into this mixer.
    ///
    /// A channel belonging to another mixer is moved. Adding a channel that is
    /// already a member does nothing. The channel is plugged into the native
    /// stream as soon as both the stream and the channel's handle exist.
    pub fn add(&self, channel: &Channel) {
        let key = channel.key();
        let node = self.this.clone();
        self.ctx.queue.schedule(move || match node.upgrade() {
            Some(node) => node.add_now(key),
            None => Ok(()),
        });
    }

    /// Takes `channel` out of this mixer. Does nothing if it is not a member.
    ///
    /// The channel's native pause flag is captured first so it carries over
    /// to the next mixer it joins.
    pub fn remove(&self, channel: &Channel) {
        let key = channel.key();
        let node = self.this.clone();
        self.ctx.queue.schedule(move || {
            if let Some(node) = node.upgrade() {
                node.remove_now(key);
            }
            Ok(())
        });
    }

    /// Whether `channel` is a member.
    pub fn contains(&self, channel: &Channel) -> bool {
        self.state.lock().members.contains(channel.key())
    }

    /// Number of live members.
    pub fn count(&self) -> usize {
        self.state.lock().members.live_count(&self.ctx.slots)
    }

    // ── Effects ─────────────────────────────────────────────────────────────

    /// The effect list. Edits are reconciled into native effects on the
    /// audio thread.
    pub fn effects(&self) -> &ObservableList<Arc<EffectParameters>> {
        &self.effects
    }

    /// The reconciled chain as it currently stands natively.
    pub fn effect_snapshot(&self) -> Vec<EffectInfo> {
        self.state
            .lock()
            .chain
            .slots()
            .iter()
            .map(|slot| EffectInfo {
                kind: slot.parameters.kind(),
                handle: slot.handle,
                priority: slot.priority,
            })
            .collect()
    }

    // ── Transport ───────────────────────────────────────────────────────────

    /// Clears the mixer-level pause flag.
    pub fn play(&self, channel: &Channel) -> bool {
        let Some(handle) = self.attached_handle(channel) else {
            return false;
        };
        match self.ctx.backend.channel_remove_flag(handle, MixerFlags::PAUSE) {
            Ok(()) => {
                self.ctx.slots.with(channel.key(), |s| {
                    s.mixer_paused = false;
                    s.stopped = false;
                });
                true
            }
            Err(err) => {
                tracing::warn!(mixer = %self.name, channel = %handle, error = %err, "play failed");
                false
            }
        }
    }

    /// Sets the mixer-level pause flag.
    pub fn pause(&self, channel: &Channel) -> bool {
        let Some(handle) = self.attached_handle(channel) else {
            return false;
        };
        match self.ctx.backend.channel_add_flag(handle, MixerFlags::PAUSE) {
            Ok(()) => {
                self.ctx.slots.with(channel.key(), |s| s.mixer_paused = true);
                true
            }
            Err(err) => {
                tracing::warn!(mixer = %self.name, channel = %handle, error = %err, "pause failed");
                false
            }
        }
    }

    /// Pauses `channel` and rewinds it to the start, discarding buffered
    /// audio. A decoding channel inside a mixer never reports itself stopped,
    /// so this is what stopped means here.
    pub fn stop(&self, channel: &Channel) -> bool {
        let Some(handle) = self.attached_handle(channel) else {
            return false;
        };
        let backend = &self.ctx.backend;
        let result = backend
            .channel_add_flag(handle, MixerFlags::PAUSE)
            .and_then(|()| backend.channel_set_position(handle, 0, PositionMode::BYTES.resetting()));
        match result {
            Ok(()) => {
                self.ctx.slots.with(channel.key(), |s| {
                    s.mixer_paused = true;
                    s.stopped = true;
                });
                true
            }
            Err(err) => {
                tracing::warn!(mixer = %self.name, channel = %handle, error = %err, "stop failed");
                false
            }
        }
    }

    /// Audible state of `channel`.
    ///
    /// A natively stopped or paused channel is reported as such. A natively
    /// playing or stalled channel is reported stopped after
    /// [`stop`](Self::stop), then paused while the mixer-level pause flag is
    /// set; the stopped flag wins over the pause flag.
    pub fn state(&self, channel: &Channel) -> PlaybackState {
        let Some(handle) = self.attached_handle(channel) else {
            return PlaybackState::Stopped;
        };
        match self.ctx.backend.channel_is_active(handle) {
            ChannelStatus::Stopped => PlaybackState::Stopped,
            ChannelStatus::Paused => PlaybackState::Paused,
            status @ (ChannelStatus::Playing | ChannelStatus::Stalled) => {
                let stopped = self
                    .ctx
                    .slots
                    .with(channel.key(), |s| s.stopped)
                    .unwrap_or(false);
                let paused = self
                    .ctx
                    .backend
                    .channel_flags(handle)
                    .is_ok_and(|f| f.contains(MixerFlags::PAUSE));
                if stopped {
                    PlaybackState::Stopped
                } else if paused {
                    PlaybackState::Paused
                } else if status == ChannelStatus::Stalled {
                    PlaybackState::Stalled
                } else {
                    PlaybackState::Playing
                }
            }
        }
    }

    /// Position of `channel` within the mixer.
    pub fn position(&self, channel: &Channel, mode: PositionMode) -> Option<u64> {
        let handle = self.attached_handle(channel)?;
        self.ctx
            .backend
            .channel_position(handle, mode)
            .inspect_err(|err| {
                tracing::warn!(mixer = %self.name, channel = %handle, error = %err, "position query failed");
            })
            .ok()
    }

    /// Moves `channel` within the mixer.
    pub fn set_position(&self, channel: &Channel, position: i64, mode: PositionMode) -> bool {
        let Some(handle) = self.attached_handle(channel) else {
            return false;
        };
        match self.ctx.backend.channel_set_position(handle, position, mode) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(mixer = %self.name, channel = %handle, error = %err, "seek failed");
                false
            }
        }
    }

    /// Peak levels of `channel`.
    pub fn level(&self, channel: &Channel) -> Option<(f32, f32)> {
        let handle = self.attached_handle(channel)?;
        self.ctx.backend.channel_level(handle).ok()
    }

    fn attached_handle(&self, channel: &Channel) -> Option<ChannelHandle> {
        self.state
            .lock()
            .members
            .get(channel.key())
            .map(|m| m.attached)
            .filter(|h| h.is_allocated())
    }

    // ── Device lifecycle ────────────────────────────────────────────────────

    /// Native stream handle, null until created and after disposal.
    ///
    /// Lock-free; may lag a concurrent mutation.
    pub fn stream_handle(&self) -> StreamHandle {
        StreamHandle::from_raw(self.published_stream.load(Ordering::Acquire))
    }

    /// Creates the native stream if there is none and the device is ready.
    pub fn ensure_stream(&self) {
        let node = self.this.clone();
        self.ctx.queue.schedule(move || {
            if let Some(node) = node.upgrade() {
                node.ensure_stream_now();
            }
            Ok(())
        });
    }

    /// Reacts to the output device changing: creates the stream if it does
    /// not exist yet, otherwise moves it to `device`.
    pub fn on_device_changed(&self, device: u32) {
        let node = self.this.clone();
        self.ctx.queue.schedule(move || {
            if let Some(node) = node.upgrade() {
                node.device_changed_now(device);
            }
            Ok(())
        });
    }

    /// Re-homes every member to the fallback mixer, releases the effects and
    /// frees the native stream. Later actions aimed at this node do nothing.
    pub fn dispose(&self) {
        let node = self.this.clone();
        self.ctx.queue.schedule(move || {
            if let Some(node) = node.upgrade() {
                node.dispose_now();
            }
            Ok(())
        });
    }

    // ── Audio thread bodies ─────────────────────────────────────────────────

    pub(crate) fn add_now(&self, key: ChannelKey) -> Result<(), MixerError> {
        if self.is_disposed() {
            return Err(MixerError::Disposed(self.name.clone()));
        }
        if !self.ctx.slots.is_live(key) {
            return Err(MixerError::ChannelGone(key));
        }
        if let Some(current) = self.ctx.slots.mixer(key) {
            if std::ptr::eq(Arc::as_ptr(&current), self) {
                return Ok(());
            }
            current.remove_now(key);
        }

        let mut state = self.state.lock();
        if !state.members.insert(key) {
            return Ok(());
        }
        self.ctx
            .slots
            .with(key, |s| s.mixer = Some(self.this.clone()));
        let stream = state.stream;
        let attached = match state.members.get_mut(key) {
            Some(member) => self.attach(stream, member),
            None => Ok(()),
        };
        tracing::debug!(mixer = %self.name, channel = %key, "channel added");
        self.publish(&state);
        // Membership stands even when the native plug-in failed.
        attached?;
        Ok(())
    }

    pub(crate) fn remove_now(&self, key: ChannelKey) -> bool {
        let mut state = self.state.lock();
        let Some(mut member) = state.members.remove(key) else {
            return false;
        };
        self.detach(&mut member);
        self.ctx.slots.with(key, |s| {
            if s.mixer.as_ref().is_some_and(|w| w.ptr_eq(&self.this)) {
                s.mixer = None;
            }
        });
        tracing::debug!(mixer = %self.name, channel = %key, "channel removed");
        self.publish(&state);
        true
    }

    /// Re-plugs a member after its native handle changed from `previous`.
    pub(crate) fn refresh_member(&self, key: ChannelKey, previous: ChannelHandle) {
        if self.is_disposed() {
            return;
        }
        let mut state = self.state.lock();
        let stream = state.stream;
        let Some(member) = state.members.get_mut(key) else {
            return;
        };
        if member.attached.is_allocated() {
            debug_assert_eq!(member.attached, previous);
            self.detach(member);
        }
        if let Err(err) = self.attach(stream, member) {
            tracing::warn!(mixer = %self.name, channel = %key, error = %err, "failed to attach channel");
        }
        self.publish(&state);
    }

    /// Sweeps members whose channel was dropped, unplugging what is still
    /// plugged in.
    pub(crate) fn prune_dead_members(&self) {
        let mut state = self.state.lock();
        for member in state.members.take_dead(&self.ctx.slots) {
            if let Some(handle) = member.attached.allocated() {
                // The channel may already be gone natively too.
                let _ = self.ctx.backend.channel_remove(handle);
            }
            tracing::trace!(mixer = %self.name, channel = %member.key, "dead member pruned");
        }
        self.publish(&state);
    }

    fn apply_effect_change(&self, change: ListChange<Arc<EffectParameters>>) {
        if self.is_disposed() {
            return;
        }
        let mut state = self.state.lock();
        let target = self.target(state.stream);
        state.chain.apply(change, target);
        self.publish(&state);
    }

    fn ensure_stream_now(&self) {
        if self.is_disposed() {
            return;
        }
        let mut state = self.state.lock();
        if state.stream.is_allocated() {
            return;
        }
        if !self.ctx.backend.is_initialized() {
            tracing::debug!(mixer = %self.name, "device not ready, stream creation deferred");
            return;
        }
        let format = self.ctx.format;
        let stream = match self
            .ctx
            .backend
            .stream_create(format.frequency, format.channels, format.flags)
        {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(mixer = %self.name, error = %err, "failed to create mixer stream");
                return;
            }
        };
        state.stream = stream;
        tracing::info!(mixer = %self.name, %stream, frequency = format.frequency, "mixer stream created");

        let NodeState { members, chain, .. } = &mut *state;
        for member in members.iter_mut() {
            if member.attached.is_null()
                && let Err(err) = self.attach(stream, member)
            {
                tracing::warn!(mixer = %self.name, channel = %member.key, error = %err, "failed to attach channel");
            }
        }
        if let Err(err) = self.ctx.backend.stream_play(stream) {
            tracing::warn!(mixer = %self.name, %stream, error = %err, "failed to start mixer stream");
        }
        chain.reapply(self.target(stream));
        self.publish(&state);
    }

    fn device_changed_now(&self, device: u32) {
        if self.is_disposed() {
            return;
        }
        let stream = self.state.lock().stream;
        if stream.is_null() {
            self.ensure_stream_now();
            return;
        }
        match self.ctx.backend.stream_set_device(stream, device) {
            Ok(()) => tracing::info!(mixer = %self.name, %stream, device, "mixer stream moved"),
            Err(err) => {
                tracing::warn!(mixer = %self.name, %stream, device, error = %err, "failed to move mixer stream");
            }
        }
    }

    fn dispose_now(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (keys, observer) = {
            let mut state = self.state.lock();
            (state.members.live_keys(&self.ctx.slots), state.observer.take())
        };
        if let Some(observer) = observer {
            self.effects.unobserve(observer);
        }

        for key in keys {
            self.remove_now(key);
            if let Some(fallback) = &self.fallback
                && let Err(err) = fallback.add_now(key)
            {
                tracing::warn!(mixer = %self.name, channel = %key, error = %err, "failed to re-home channel");
            }
        }

        let mut state = self.state.lock();
        release_native(self.ctx.backend.as_ref(), &self.ctx.slots, &self.name, &mut state);
        self.publish(&state);
        tracing::debug!(mixer = %self.name, "mixer disposed");
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    /// Plugs `member` into `stream` once both handles exist.
    ///
    /// Not being ready is not an error; the member is attached later when the
    /// stream or handle shows up.
    fn attach(&self, stream: StreamHandle, member: &mut Member) -> Result<(), BackendError> {
        let Some((handle, paused)) = self
            .ctx
            .slots
            .with(member.key, |s| (s.handle, s.mixer_paused))
        else {
            return Ok(());
        };
        if handle.is_null() || stream.is_null() {
            return Ok(());
        }
        debug_assert!(
            member.attached.is_null(),
            "channel {} attached twice",
            member.key
        );
        let mut flags = MixerFlags::BUFFER;
        if paused {
            flags |= MixerFlags::PAUSE;
        }
        self.ctx.backend.channel_add(stream, handle, flags)?;
        member.attached = handle;
        tracing::trace!(mixer = %self.name, channel = %handle, paused, "channel attached");
        Ok(())
    }

    fn detach(&self, member: &mut Member) {
        detach_member(self.ctx.backend.as_ref(), &self.ctx.slots, &self.name, member);
    }

    fn target(&self, stream: StreamHandle) -> ChainTarget<'_> {
        ChainTarget {
            backend: self.ctx.backend.as_ref(),
            stream,
            mixer: &self.name,
        }
    }

    fn publish(&self, state: &NodeState) {
        self.published_stream
            .store(state.stream.raw(), Ordering::Release);
        self.published_members
            .store(state.members.live_count(&self.ctx.slots), Ordering::Relaxed);
        self.published_effects
            .store(state.chain.allocated(), Ordering::Relaxed);
    }

    /// Live member count as of the last mutation. Lock-free.
    pub(crate) fn published_members(&self) -> usize {
        self.published_members.load(Ordering::Relaxed)
    }

    /// Allocated effect count as of the last mutation. Lock-free.
    pub(crate) fn published_effects(&self) -> usize {
        self.published_effects.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for MixerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixerNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("stream", &self.stream_handle())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Drop for MixerNode {
    /// Tears down a node that was never disposed.
    ///
    /// The native work is queued like any other mutation. Live members are
    /// re-homed to the fallback if it is still alive, otherwise they are left
    /// without a mixer.
    fn drop(&mut self) {
        if *self.disposed.get_mut() {
            return;
        }
        let mut state = std::mem::take(self.state.get_mut());
        if let Some(observer) = state.observer.take() {
            self.effects.unobserve(observer);
        }
        if state.members.is_empty() && state.stream.is_null() {
            return;
        }

        let name = self.name.clone();
        let backend = Arc::clone(&self.ctx.backend);
        let slots = self.ctx.slots.clone();
        let this = self.this.clone();
        let fallback = self.fallback.as_ref().map(Arc::downgrade);
        self.ctx.queue.schedule(move || {
            let fallback = fallback.as_ref().and_then(Weak::upgrade);
            for key in state.members.live_keys(&slots) {
                if let Some(mut member) = state.members.remove(key) {
                    detach_member(backend.as_ref(), &slots, &name, &mut member);
                }
                slots.with(key, |s| {
                    if s.mixer.as_ref().is_some_and(|w| w.ptr_eq(&this)) {
                        s.mixer = None;
                    }
                });
                if let Some(fallback) = &fallback
                    && let Err(err) = fallback.add_now(key)
                {
                    tracing::warn!(mixer = %name, channel = %key, error = %err, "failed to re-home channel");
                }
            }
            release_native(backend.as_ref(), &slots, &name, &mut state);
            tracing::debug!(mixer = %name, "dropped mixer torn down");
            Ok(())
        });
    }
}

/// Unplugs a member, recording its native pause flag in the channel slot so
/// it carries over to the next mixer.
fn detach_member(backend: &dyn Backend, slots: &ChannelSlots, mixer: &str, member: &mut Member) {
    let Some(handle) = member.attached.take() else {
        return;
    };
    if let Ok(flags) = backend.channel_flags(handle) {
        let paused = flags.contains(MixerFlags::PAUSE);
        slots.with(member.key, |s| s.mixer_paused = paused);
    }
    if let Err(err) = backend.channel_remove(handle) {
        tracing::warn!(mixer, channel = %handle, error = %err, "failed to detach channel");
    }
}

/// Unplugs dead members, releases the effect chain and frees the stream.
/// Live members must already have been moved out.
fn release_native(backend: &dyn Backend, slots: &ChannelSlots, mixer: &str, state: &mut NodeState) {
    for member in state.members.take_dead(slots) {
        if let Some(handle) = member.attached.allocated() {
            // The channel may already be gone natively too.
            let _ = backend.channel_remove(handle);
        }
    }
    state.chain.release_all(ChainTarget {
        backend,
        stream: state.stream,
        mixer,
    });
    if let Some(stream) = state.stream.take() {
        match backend.stream_free(stream) {
            Ok(()) => tracing::info!(mixer, %stream, "mixer stream released"),
            Err(err) => {
                tracing::warn!(mixer, %stream, error = %err, "failed to free mixer stream");
            }
        }
    }
}
