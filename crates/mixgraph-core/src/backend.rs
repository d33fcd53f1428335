//! The native audio backend boundary.
//!
//! The mixing graph never talks to hardware directly. Everything it needs from
//! the driver layer goes through [`Backend`]: a handful of transport
//! primitives over opaque [`Handle`](crate::Handle)s. Implementations must be
//! internally synchronized (`&self` methods, `Send + Sync`) and every call
//! must return promptly; the graph calls them from its audio thread and never
//! waits on them.
//!
//! [`SoftBackend`](crate::soft::SoftBackend) is the in-memory implementation
//! used by tests and the CLI.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use crate::effect::{EffectKind, EffectParameters};
use crate::handle::{ChannelHandle, EffectHandle, StreamHandle};

/// Errors reported by a native backend call.
///
/// These are transient, per-call failures. The graph logs them and keeps
/// mixing; none of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The output device has not been initialized yet.
    #[error("audio device not initialized")]
    NotInitialized,

    /// The handle does not refer to a live native resource.
    #[error("invalid handle {0}")]
    InvalidHandle(u32),

    /// The channel is already plugged into a mixer.
    #[error("channel {0} is already attached to a mixer")]
    AlreadyAttached(u32),

    /// The channel is not plugged into any mixer.
    #[error("channel {0} is not attached to a mixer")]
    NotAttached(u32),

    /// A position outside the channel's data was requested.
    #[error("position {0} is out of range")]
    InvalidPosition(i64),

    /// The device layer rejected the request.
    #[error("device error: {0}")]
    Device(String),
}

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $bit:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            /// No flags set.
            pub const NONE: Self = Self(0);
            $($(#[$fmeta])* pub const $flag: Self = Self($bit);)+

            /// Raw bit pattern.
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Whether every bit of `other` is set in `self`.
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether no bit is set.
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// `self` with the bits of `other` set.
            #[must_use]
            pub const fn with(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// `self` with the bits of `other` cleared.
            #[must_use]
            pub const fn without(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                self.with(rhs)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                *self = self.with(rhs);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut names = Vec::new();
                $(if self.contains(Self::$flag) { names.push(stringify!($flag)); })+
                write!(f, "{}({})", stringify!($name), names.join(" | "))
            }
        }
    };
}

flag_set! {
    /// Flags passed when creating a mixer stream.
    StreamFlags {
        /// Keep producing (silent) output when no channel is feeding it.
        NONSTOP = 1 << 0,
        /// 32-bit float sample output.
        FLOAT = 1 << 1,
        /// Decode-only stream, not sent to the device.
        DECODE = 1 << 2,
    }
}

flag_set! {
    /// Per-channel flags on a channel's association with a mixer.
    MixerFlags {
        /// Buffer source data so position and level queries are accurate.
        BUFFER = 1 << 0,
        /// The channel is held paused inside the mixer.
        PAUSE = 1 << 1,
    }
}

/// Unit of a channel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PositionUnit {
    /// Byte offset into the decoded sample data.
    #[default]
    Bytes,
    /// Milliseconds from the start of the data.
    Millis,
}

/// Reference point for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PositionOrigin {
    /// Absolute, from the start of the data.
    #[default]
    Start,
    /// Relative to the current position.
    Current,
}

/// How a channel position is read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PositionMode {
    /// Unit of the position value.
    pub unit: PositionUnit,
    /// Absolute or relative addressing. Only meaningful when setting.
    pub origin: PositionOrigin,
    /// Discard any audio the mixer has buffered but not yet played.
    pub reset_buffer: bool,
}

impl PositionMode {
    /// Absolute byte position.
    pub const BYTES: Self = Self {
        unit: PositionUnit::Bytes,
        origin: PositionOrigin::Start,
        reset_buffer: false,
    };

    /// Absolute millisecond position.
    pub const MILLIS: Self = Self {
        unit: PositionUnit::Millis,
        origin: PositionOrigin::Start,
        reset_buffer: false,
    };

    /// Same mode, relative to the current position.
    #[must_use]
    pub const fn relative(mut self) -> Self {
        self.origin = PositionOrigin::Current;
        self
    }

    /// Same mode, also discarding buffered audio.
    #[must_use]
    pub const fn resetting(mut self) -> Self {
        self.reset_buffer = true;
        self
    }
}

/// Raw activity status reported by the backend for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelStatus {
    /// Not producing audio: never started, freed, or out of data.
    Stopped,
    /// Producing audio.
    Playing,
    /// Paused at the channel level.
    Paused,
    /// Wants to play but is starved of data or output.
    Stalled,
}

/// Operations the mixing graph consumes from the native audio layer.
pub trait Backend: Send + Sync {
    /// Whether the output device is ready for stream creation.
    fn is_initialized(&self) -> bool;

    /// Creates a mixer stream.
    fn stream_create(
        &self,
        frequency: u32,
        channels: u32,
        flags: StreamFlags,
    ) -> Result<StreamHandle, BackendError>;

    /// Starts output of a mixer stream.
    fn stream_play(&self, stream: StreamHandle) -> Result<(), BackendError>;

    /// Releases a mixer stream, its effects, and its channel associations.
    fn stream_free(&self, stream: StreamHandle) -> Result<(), BackendError>;

    /// Moves a live mixer stream to another output device.
    fn stream_set_device(&self, stream: StreamHandle, device: u32) -> Result<(), BackendError>;

    /// Plugs a channel into a mixer stream.
    fn channel_add(
        &self,
        mixer: StreamHandle,
        channel: ChannelHandle,
        flags: MixerFlags,
    ) -> Result<(), BackendError>;

    /// Unplugs a channel from whichever mixer it is in.
    fn channel_remove(&self, channel: ChannelHandle) -> Result<(), BackendError>;

    /// Current mixer flags of a plugged-in channel.
    fn channel_flags(&self, channel: ChannelHandle) -> Result<MixerFlags, BackendError>;

    /// Sets mixer flags on a plugged-in channel.
    fn channel_add_flag(&self, channel: ChannelHandle, flag: MixerFlags)
    -> Result<(), BackendError>;

    /// Clears mixer flags on a plugged-in channel.
    fn channel_remove_flag(
        &self,
        channel: ChannelHandle,
        flag: MixerFlags,
    ) -> Result<(), BackendError>;

    /// Reads a channel's position inside its mixer.
    fn channel_position(
        &self,
        channel: ChannelHandle,
        mode: PositionMode,
    ) -> Result<u64, BackendError>;

    /// Moves a channel's position inside its mixer.
    fn channel_set_position(
        &self,
        channel: ChannelHandle,
        position: i64,
        mode: PositionMode,
    ) -> Result<(), BackendError>;

    /// Raw activity status of a channel.
    fn channel_is_active(&self, channel: ChannelHandle) -> ChannelStatus;

    /// Peak levels (left, right) of a plugged-in channel, linear `0.0..=1.0`.
    fn channel_level(&self, channel: ChannelHandle) -> Result<(f32, f32), BackendError>;

    /// Instantiates an effect on a mixer stream at the given priority.
    fn effect_set(
        &self,
        mixer: StreamHandle,
        kind: EffectKind,
        priority: u32,
    ) -> Result<EffectHandle, BackendError>;

    /// Pushes parameter values into a live effect.
    fn effect_set_parameters(
        &self,
        effect: EffectHandle,
        params: &EffectParameters,
    ) -> Result<(), BackendError>;

    /// Changes a live effect's position in its stream's chain.
    fn effect_set_priority(&self, effect: EffectHandle, priority: u32) -> Result<(), BackendError>;

    /// Removes an effect from a mixer stream.
    fn effect_remove(&self, mixer: StreamHandle, effect: EffectHandle) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_clear() {
        let flags = MixerFlags::BUFFER | MixerFlags::PAUSE;
        assert!(flags.contains(MixerFlags::PAUSE));
        assert!(flags.contains(MixerFlags::BUFFER));
        let cleared = flags.without(MixerFlags::PAUSE);
        assert!(!cleared.contains(MixerFlags::PAUSE));
        assert!(cleared.contains(MixerFlags::BUFFER));
        assert!(MixerFlags::NONE.is_empty());
    }

    #[test]
    fn flags_debug_lists_names() {
        let flags = StreamFlags::NONSTOP | StreamFlags::FLOAT;
        assert_eq!(format!("{flags:?}"), "StreamFlags(NONSTOP | FLOAT)");
    }

    #[test]
    fn position_mode_builders() {
        let mode = PositionMode::MILLIS.relative().resetting();
        assert_eq!(mode.unit, PositionUnit::Millis);
        assert_eq!(mode.origin, PositionOrigin::Current);
        assert!(mode.reset_buffer);
        assert_eq!(PositionMode::default(), PositionMode::BYTES);
    }

    #[test]
    fn backend_error_display() {
        assert_eq!(BackendError::InvalidHandle(4).to_string(), "invalid handle 4");
        assert_eq!(
            BackendError::NotInitialized.to_string(),
            "audio device not initialized"
        );
    }
}
