//! mixgraph core - an audio mixing graph.
//!
//! Many independently playing channels are composed into one or more mixer
//! streams, each with an ordered effect chain. Every graph mutation is
//! serialized onto a single audio execution context no matter which thread
//! asks for it.
//!
//! # Core Abstractions
//!
//! ## Execution
//!
//! - [`CommandQueue`] - Runs actions inline on the audio thread, defers them elsewhere
//! - [`AudioThread`] - Worker that binds itself to a queue and drains it per tick
//!
//! ## Graph
//!
//! - [`MixerGraph`] - Root: backend, queue, channel storage, default mixer
//! - [`MixerNode`] - One mixer stream with members and an effect chain
//! - [`Channel`] - Application-owned source, weakly referenced by mixers
//!
//! ## Effects
//!
//! - [`ObservableList`] / [`ListChange`] - The edited effect list and its change events
//! - [`EffectChain`] - Reconciles list changes into native effects, priority == index
//! - [`EffectKind`] / [`EffectParameters`] - Effect types and their parameter bags
//!
//! ## Native boundary
//!
//! - [`Backend`] - Primitives consumed from the audio library
//! - [`SoftBackend`] - In-memory implementation for tests and simulation
//! - [`Handle`] - Typed native handle where 0 means unallocated
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mixgraph_core::{EffectKind, EffectParameters, MixerGraph, SoftBackend};
//!
//! let backend = Arc::new(SoftBackend::with_device(1));
//! let graph = MixerGraph::with_backend(backend.clone());
//! graph.queue().bind_current_thread();
//!
//! let music = graph.create_mixer("music");
//! let channel = graph.create_channel();
//! music.add(&channel);
//! channel.set_handle(backend.create_channel(44_100, 1 << 20));
//! music.effects().push(Arc::new(EffectParameters::new(EffectKind::Reverb)));
//! graph.queue().tick();
//!
//! assert!(music.contains(&channel));
//! assert_eq!(music.effect_snapshot()[0].priority, 0);
//! ```

pub mod audio_thread;
pub mod backend;
pub mod chain;
pub mod channel;
pub mod effect;
pub mod error;
pub mod graph;
pub mod handle;
pub mod mixer;
pub mod observable;
pub mod queue;
pub mod registry;
pub mod soft;

pub use audio_thread::{AudioThread, DEFAULT_TICK};
pub use backend::{
    Backend, BackendError, ChannelStatus, MixerFlags, PositionMode, PositionOrigin, PositionUnit,
    StreamFlags,
};
pub use chain::{ChainTarget, EffectChain, EffectSlot};
pub use channel::{Channel, ChannelKey, ChannelSlots};
pub use effect::{EffectCategory, EffectKind, EffectParameters, ParamSpec, UnknownEffectKind};
pub use error::MixerError;
pub use graph::{DEFAULT_MIXER_NAME, GraphStats, MixerGraph};
pub use handle::{
    ChannelHandle, ChannelTag, EffectHandle, EffectTag, Handle, HandleArena, StreamHandle,
    StreamTag,
};
pub use mixer::{EffectInfo, MixerId, MixerNode, PlaybackState, StreamFormat};
pub use observable::{ListChange, ObservableList, ObserverId};
pub use queue::{Command, CommandQueue};
pub use registry::{Member, MemberRegistry};
pub use soft::{SoftBackend, SoftEffectInfo};
