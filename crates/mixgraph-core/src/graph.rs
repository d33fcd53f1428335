//! The graph root: shared backend, queue, channel storage and mixers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::Backend;
use crate::channel::{Channel, ChannelSlots};
use crate::mixer::{MixerId, MixerNode, NodeContext, StreamFormat};
use crate::queue::CommandQueue;

/// Name of the fallback mixer every graph starts with.
pub const DEFAULT_MIXER_NAME: &str = "default";

/// Instrumentation snapshot of a graph.
///
/// Counts are read without locking the mixers and may be one mutation stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Mixers that have not been disposed, default included.
    pub mixers: usize,
    /// Live channels across the graph, routed or not.
    pub channels: usize,
    /// Channel memberships across all mixers.
    pub members: usize,
    /// Native effects allocated across all mixers.
    pub effects: usize,
    /// Actions waiting for the next tick.
    pub pending: usize,
}

/// A set of mixers sharing one backend and one audio execution context.
///
/// All mutations of every mixer in the graph go through the same
/// [`CommandQueue`], so they are globally ordered.
///
/// The graph owns its mixers until they are disposed. Dropping the graph
/// drops every mixer it still holds, which tears down their native streams.
pub struct MixerGraph {
    ctx: NodeContext,
    default_mixer: Arc<MixerNode>,
    mixers: Mutex<Vec<Arc<MixerNode>>>,
    next_id: AtomicU64,
}

impl MixerGraph {
    /// Creates a graph with its default mixer.
    ///
    /// The default mixer's stream is requested immediately; it is created on
    /// the next tick if the device is ready.
    pub fn new(backend: Arc<dyn Backend>, queue: CommandQueue, format: StreamFormat) -> Self {
        let ctx = NodeContext {
            backend,
            queue,
            slots: ChannelSlots::new(),
            format,
        };
        let default_mixer = MixerNode::new(
            MixerId(0),
            DEFAULT_MIXER_NAME.to_owned(),
            ctx.clone(),
            None,
        );
        default_mixer.ensure_stream();
        tracing::debug!(
            frequency = format.frequency,
            channels = format.channels,
            "mixer graph created"
        );
        Self {
            ctx,
            mixers: Mutex::new(vec![Arc::clone(&default_mixer)]),
            default_mixer,
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a graph with a fresh queue and the default stream format.
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self::new(backend, CommandQueue::new(), StreamFormat::default())
    }

    /// The backend every mixer talks to.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.ctx.backend
    }

    /// The graph's command queue.
    pub fn queue(&self) -> &CommandQueue {
        &self.ctx.queue
    }

    /// Stream format used for every mixer.
    pub fn format(&self) -> StreamFormat {
        self.ctx.format
    }

    /// The fallback mixer that receives channels from disposed mixers.
    pub fn default_mixer(&self) -> &Arc<MixerNode> {
        &self.default_mixer
    }

    /// Creates a mixer whose channels fall back to the default mixer.
    ///
    /// The graph keeps the mixer alive until it is disposed, so dropping the
    /// returned handle does not remove it.
    pub fn create_mixer(&self, name: impl Into<String>) -> Arc<MixerNode> {
        let id = MixerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let node = MixerNode::new(
            id,
            name.into(),
            self.ctx.clone(),
            Some(Arc::clone(&self.default_mixer)),
        );
        node.ensure_stream();
        let mut mixers = self.mixers.lock();
        mixers.retain(|m| !m.is_disposed());
        mixers.push(Arc::clone(&node));
        tracing::debug!(mixer = %node.name(), %id, "mixer created");
        node
    }

    /// Creates a channel with no native handle and no mixer.
    pub fn create_channel(&self) -> Channel {
        Channel::new(self.ctx.slots.clone(), self.ctx.queue.clone())
    }

    /// Undisposed mixers in creation order, default first.
    ///
    /// Disposed mixers are released from the graph here.
    pub fn mixers(&self) -> Vec<Arc<MixerNode>> {
        let mut mixers = self.mixers.lock();
        mixers.retain(|m| !m.is_disposed());
        mixers.clone()
    }

    /// First live mixer called `name`.
    pub fn mixer(&self, name: &str) -> Option<Arc<MixerNode>> {
        self.mixers().into_iter().find(|m| m.name() == name)
    }

    /// Tells every mixer the output device changed.
    pub fn on_device_changed(&self, device: u32) {
        tracing::info!(device, "output device changed");
        for mixer in self.mixers() {
            mixer.on_device_changed(device);
        }
    }

    /// Lock-free instrumentation counts.
    pub fn stats(&self) -> GraphStats {
        let mixers = self.mixers();
        GraphStats {
            mixers: mixers.len(),
            channels: self.ctx.slots.live_count(),
            members: mixers.iter().map(|m| m.published_members()).sum(),
            effects: mixers.iter().map(|m| m.published_effects()).sum(),
            pending: self.ctx.queue.pending(),
        }
    }
}

impl std::fmt::Debug for MixerGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixerGraph")
            .field("format", &self.ctx.format)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soft::SoftBackend;

    fn graph(backend: SoftBackend) -> (Arc<SoftBackend>, MixerGraph) {
        let backend = Arc::new(backend);
        let graph = MixerGraph::with_backend(backend.clone());
        graph.queue().bind_current_thread();
        graph.queue().tick();
        (backend, graph)
    }

    #[test]
    fn default_mixer_gets_a_stream_when_device_is_ready() {
        let (backend, graph) = graph(SoftBackend::with_device(1));
        let stream = graph.default_mixer().stream_handle();
        assert!(stream.is_allocated());
        assert!(backend.stream_is_playing(stream));
        assert_eq!(graph.default_mixer().name(), DEFAULT_MIXER_NAME);
        assert_eq!(graph.default_mixer().id().get(), 0);
    }

    #[test]
    fn mixers_lists_undisposed_nodes_in_order() {
        let (_backend, graph) = graph(SoftBackend::with_device(1));
        let music = graph.create_mixer("music");
        let sfx = graph.create_mixer("sfx");
        let names: Vec<_> = graph.mixers().iter().map(|m| m.name().to_owned()).collect();
        assert_eq!(names, ["default", "music", "sfx"]);
        assert_ne!(music.id(), sfx.id());

        sfx.dispose();
        assert!(graph.mixer("sfx").is_none());
        assert_eq!(graph.mixers().len(), 2);
    }

    #[test]
    fn graph_keeps_mixers_after_caller_drops_them() {
        let (backend, graph) = graph(SoftBackend::with_device(1));
        let music = graph.create_mixer("music");
        let stream = music.stream_handle();
        drop(music);

        let music = graph.mixer("music").expect("graph owns the mixer");
        assert_eq!(music.stream_handle(), stream);
        assert!(backend.stream_exists(stream));
        assert_eq!(graph.stats().mixers, 2);
    }

    #[test]
    fn disposed_mixers_are_released() {
        let (_backend, graph) = graph(SoftBackend::with_device(1));
        let music = graph.create_mixer("music");
        let weak = Arc::downgrade(&music);
        music.dispose();
        drop(music);
        graph.mixers();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn device_change_creates_missing_streams() {
        let (backend, graph) = graph(SoftBackend::new());
        let music = graph.create_mixer("music");
        assert!(music.stream_handle().is_null());

        backend.init_device(2);
        graph.on_device_changed(2);
        assert!(music.stream_handle().is_allocated());
        assert!(graph.default_mixer().stream_handle().is_allocated());
        assert_eq!(backend.stream_count(), 2);
    }

    #[test]
    fn device_change_moves_existing_streams() {
        let (backend, graph) = graph(SoftBackend::with_device(1));
        let stream = graph.default_mixer().stream_handle();
        backend.init_device(3);
        graph.on_device_changed(3);
        assert_eq!(graph.default_mixer().stream_handle(), stream);
        assert_eq!(backend.stream_device(stream), Some(3));
    }

    #[test]
    fn stats_count_channels_members_and_effects() {
        let (_backend, graph) = graph(SoftBackend::with_device(1));
        let music = graph.create_mixer("music");
        let a = graph.create_channel();
        let _b = graph.create_channel();
        music.add(&a);
        music.effects().push(Arc::new(crate::EffectParameters::new(
            crate::EffectKind::Reverb,
        )));

        let stats = graph.stats();
        assert_eq!(stats.mixers, 2);
        assert_eq!(stats.channels, 2);
        assert_eq!(stats.members, 1);
        assert_eq!(stats.effects, 1);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn off_thread_requests_wait_for_tick() {
        let backend = Arc::new(SoftBackend::with_device(1));
        let graph = MixerGraph::with_backend(backend);
        assert!(graph.default_mixer().stream_handle().is_null());
        assert_eq!(graph.stats().pending, 1);
        graph.queue().bind_current_thread();
        graph.queue().tick();
        assert!(graph.default_mixer().stream_handle().is_allocated());
    }
}
