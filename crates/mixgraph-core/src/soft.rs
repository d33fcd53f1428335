//! In-memory reference implementation of [`Backend`].
//!
//! `SoftBackend` keeps every native resource in a [`HandleArena`] behind one
//! mutex and models just enough behavior for the mixing graph to be exercised
//! end to end: channels carry a byte length and a read position, mixer streams
//! carry an effect chain ordered by priority, and device availability can be
//! toggled to simulate hot-plugging.
//!
//! Decoding channels plugged into a mixer report [`ChannelStatus::Playing`] for
//! as long as they have data, regardless of the mixer-level pause flag. That
//! is the behavior real mixers have and the reason the graph derives playback
//! state in two layers.

use parking_lot::Mutex;

use crate::backend::{
    Backend, BackendError, ChannelStatus, MixerFlags, PositionMode, PositionOrigin, PositionUnit,
    StreamFlags,
};
use crate::effect::{EffectKind, EffectParameters};
use crate::handle::{
    ChannelHandle, ChannelTag, EffectHandle, EffectTag, HandleArena, StreamHandle, StreamTag,
};

/// Bytes per sample frame for the data the soft backend pretends to decode
/// (16-bit stereo).
const BYTES_PER_FRAME: u64 = 4;

#[derive(Debug)]
struct SoftStream {
    frequency: u32,
    channels: u32,
    flags: StreamFlags,
    device: u32,
    playing: bool,
}

#[derive(Debug)]
struct SoftChannel {
    frequency: u32,
    length: u64,
    position: u64,
    mixer: StreamHandle,
    flags: MixerFlags,
    buffered: u64,
    level: (f32, f32),
}

#[derive(Debug)]
struct SoftEffect {
    mixer: StreamHandle,
    kind: EffectKind,
    priority: u32,
    params: Option<EffectParameters>,
}

#[derive(Debug, Default)]
struct SoftState {
    device: Option<u32>,
    streams: HandleArena<StreamTag, SoftStream>,
    channels: HandleArena<ChannelTag, SoftChannel>,
    effects: HandleArena<EffectTag, SoftEffect>,
}

impl SoftState {
    fn channel_mut(&mut self, handle: ChannelHandle) -> Result<&mut SoftChannel, BackendError> {
        self.channels
            .get_mut(handle)
            .ok_or(BackendError::InvalidHandle(handle.raw()))
    }

    fn attached_channel_mut(
        &mut self,
        handle: ChannelHandle,
    ) -> Result<&mut SoftChannel, BackendError> {
        let channel = self.channel_mut(handle)?;
        if channel.mixer.is_null() {
            return Err(BackendError::NotAttached(handle.raw()));
        }
        Ok(channel)
    }
}

/// Snapshot of one effect instance on a soft mixer stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftEffectInfo {
    /// Native handle of the effect.
    pub handle: EffectHandle,
    /// Effect type.
    pub kind: EffectKind,
    /// Current priority.
    pub priority: u32,
    /// Last parameters pushed, if any.
    pub params: Option<EffectParameters>,
}

/// In-memory [`Backend`] for tests, simulations, and headless use.
#[derive(Debug, Default)]
pub struct SoftBackend {
    state: Mutex<SoftState>,
}

impl SoftBackend {
    /// Creates a backend whose device is not yet initialized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with `device` already initialized.
    pub fn with_device(device: u32) -> Self {
        let backend = Self::new();
        backend.init_device(device);
        backend
    }

    // ── Device control ──────────────────────────────────────────────────────

    /// Marks `device` as initialized and current.
    pub fn init_device(&self, device: u32) {
        self.state.lock().device = Some(device);
    }

    /// Marks the device as gone. Existing streams keep their handles.
    pub fn shutdown_device(&self) {
        self.state.lock().device = None;
    }

    /// Stops `stream` pulling data, as after an output underrun. Its channels
    /// report stalled until the stream is played again.
    ///
    /// Returns `false` if the stream is not live.
    pub fn stall_stream(&self, stream: StreamHandle) -> bool {
        match self.state.lock().streams.get_mut(stream) {
            Some(s) => {
                s.playing = false;
                true
            }
            None => false,
        }
    }

    /// Currently initialized device, if any.
    pub fn device(&self) -> Option<u32> {
        self.state.lock().device
    }

    // ── Channel control ─────────────────────────────────────────────────────

    /// Creates a decoding channel with `length` bytes of data at `frequency`.
    pub fn create_channel(&self, frequency: u32, length: u64) -> ChannelHandle {
        self.state.lock().channels.insert(SoftChannel {
            frequency,
            length,
            position: 0,
            mixer: StreamHandle::NULL,
            flags: MixerFlags::NONE,
            buffered: 0,
            level: (0.0, 0.0),
        })
    }

    /// Frees a decoding channel, unplugging it from its mixer.
    ///
    /// Returns `false` if the handle was not live.
    pub fn free_channel(&self, channel: ChannelHandle) -> bool {
        self.state.lock().channels.remove(channel).is_some()
    }

    /// Simulates the mixer consuming `bytes` of a channel's data.
    ///
    /// Paused channels and channels whose mixer is not playing don't move.
    /// Consumed data is also counted as buffered until the next reset.
    pub fn advance(&self, channel: ChannelHandle, bytes: u64) {
        let mut state = self.state.lock();
        let mixer_playing = state
            .channels
            .get(channel)
            .and_then(|c| state.streams.get(c.mixer))
            .is_some_and(|s| s.playing);
        if let Some(c) = state.channels.get_mut(channel)
            && mixer_playing
            && !c.flags.contains(MixerFlags::PAUSE)
        {
            c.position = c.position.saturating_add(bytes).min(c.length);
            c.buffered = c.buffered.saturating_add(bytes);
            c.level = if c.position < c.length {
                (0.5, 0.5)
            } else {
                (0.0, 0.0)
            };
        }
    }

    /// Bytes buffered by the mixer for `channel` since the last reset.
    pub fn buffered(&self, channel: ChannelHandle) -> u64 {
        self.state.lock().channels.get(channel).map_or(0, |c| c.buffered)
    }

    // ── Introspection ───────────────────────────────────────────────────────

    /// Number of live mixer streams.
    pub fn stream_count(&self) -> usize {
        self.state.lock().streams.len()
    }

    /// Whether `stream` is live.
    pub fn stream_exists(&self, stream: StreamHandle) -> bool {
        self.state.lock().streams.contains(stream)
    }

    /// Whether `stream` is live and outputting.
    pub fn stream_is_playing(&self, stream: StreamHandle) -> bool {
        self.state.lock().streams.get(stream).is_some_and(|s| s.playing)
    }

    /// Output device of a live stream.
    pub fn stream_device(&self, stream: StreamHandle) -> Option<u32> {
        self.state.lock().streams.get(stream).map(|s| s.device)
    }

    /// Creation parameters of a live stream: (frequency, channels, flags).
    pub fn stream_format(&self, stream: StreamHandle) -> Option<(u32, u32, StreamFlags)> {
        self.state
            .lock()
            .streams
            .get(stream)
            .map(|s| (s.frequency, s.channels, s.flags))
    }

    /// Channels plugged into `stream`, in handle order.
    pub fn attached_channels(&self, stream: StreamHandle) -> Vec<ChannelHandle> {
        if stream.is_null() {
            return Vec::new();
        }
        self.state
            .lock()
            .channels
            .iter()
            .filter(|(_, c)| c.mixer == stream)
            .map(|(h, _)| h)
            .collect()
    }

    /// Mixer a channel is plugged into, if any.
    pub fn channel_mixer(&self, channel: ChannelHandle) -> Option<StreamHandle> {
        self.state
            .lock()
            .channels
            .get(channel)
            .map(|c| c.mixer)
            .filter(|m| m.is_allocated())
    }

    /// Effects on `stream`, sorted by priority.
    pub fn effects_on(&self, stream: StreamHandle) -> Vec<SoftEffectInfo> {
        let state = self.state.lock();
        let mut effects: Vec<_> = state
            .effects
            .iter()
            .filter(|(_, e)| e.mixer == stream)
            .map(|(handle, e)| SoftEffectInfo {
                handle,
                kind: e.kind,
                priority: e.priority,
                params: e.params.clone(),
            })
            .collect();
        effects.sort_by_key(|e| e.priority);
        effects
    }

    /// Total number of live effect instances across all streams.
    pub fn effect_count(&self) -> usize {
        self.state.lock().effects.len()
    }

    fn bytes_to_millis(frequency: u32, bytes: u64) -> u64 {
        let frames = u128::from(bytes / BYTES_PER_FRAME);
        let millis = frames * 1000 / u128::from(frequency.max(1));
        u64::try_from(millis).unwrap_or(u64::MAX)
    }

    /// `None` when the byte offset does not fit in a `u64`.
    fn millis_to_bytes(frequency: u32, millis: u64) -> Option<u64> {
        millis
            .checked_mul(u64::from(frequency))
            .map(|frames_x1000| frames_x1000 / 1000)
            .and_then(|frames| frames.checked_mul(BYTES_PER_FRAME))
    }
}

impl Backend for SoftBackend {
    fn is_initialized(&self) -> bool {
        self.state.lock().device.is_some()
    }

    fn stream_create(
        &self,
        frequency: u32,
        channels: u32,
        flags: StreamFlags,
    ) -> Result<StreamHandle, BackendError> {
        let mut state = self.state.lock();
        let device = state.device.ok_or(BackendError::NotInitialized)?;
        if frequency == 0 || channels == 0 {
            return Err(BackendError::Device(format!(
                "unsupported format {frequency} Hz x {channels}"
            )));
        }
        Ok(state.streams.insert(SoftStream {
            frequency,
            channels,
            flags,
            device,
            playing: false,
        }))
    }

    fn stream_play(&self, stream: StreamHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let s = state
            .streams
            .get_mut(stream)
            .ok_or(BackendError::InvalidHandle(stream.raw()))?;
        s.playing = true;
        Ok(())
    }

    fn stream_free(&self, stream: StreamHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state
            .streams
            .remove(stream)
            .ok_or(BackendError::InvalidHandle(stream.raw()))?;
        state.effects.retain(|_, e| e.mixer != stream);
        for (_, channel) in state.channels.iter_mut() {
            if channel.mixer == stream {
                channel.mixer = StreamHandle::NULL;
                channel.flags = MixerFlags::NONE;
            }
        }
        Ok(())
    }

    fn stream_set_device(&self, stream: StreamHandle, device: u32) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if state.device.is_none() {
            return Err(BackendError::NotInitialized);
        }
        let s = state
            .streams
            .get_mut(stream)
            .ok_or(BackendError::InvalidHandle(stream.raw()))?;
        s.device = device;
        state.device = Some(device);
        Ok(())
    }

    fn channel_add(
        &self,
        mixer: StreamHandle,
        channel: ChannelHandle,
        flags: MixerFlags,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if !state.streams.contains(mixer) {
            return Err(BackendError::InvalidHandle(mixer.raw()));
        }
        let c = state.channel_mut(channel)?;
        if c.mixer.is_allocated() {
            return Err(BackendError::AlreadyAttached(channel.raw()));
        }
        c.mixer = mixer;
        c.flags = flags;
        Ok(())
    }

    fn channel_remove(&self, channel: ChannelHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let c = state.attached_channel_mut(channel)?;
        c.mixer = StreamHandle::NULL;
        c.flags = MixerFlags::NONE;
        c.buffered = 0;
        Ok(())
    }

    fn channel_flags(&self, channel: ChannelHandle) -> Result<MixerFlags, BackendError> {
        let mut state = self.state.lock();
        Ok(state.attached_channel_mut(channel)?.flags)
    }

    fn channel_add_flag(
        &self,
        channel: ChannelHandle,
        flag: MixerFlags,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let c = state.attached_channel_mut(channel)?;
        c.flags |= flag;
        Ok(())
    }

    fn channel_remove_flag(
        &self,
        channel: ChannelHandle,
        flag: MixerFlags,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let c = state.attached_channel_mut(channel)?;
        c.flags = c.flags.without(flag);
        Ok(())
    }

    fn channel_position(
        &self,
        channel: ChannelHandle,
        mode: PositionMode,
    ) -> Result<u64, BackendError> {
        let mut state = self.state.lock();
        let c = state.attached_channel_mut(channel)?;
        Ok(match mode.unit {
            PositionUnit::Bytes => c.position,
            PositionUnit::Millis => Self::bytes_to_millis(c.frequency, c.position),
        })
    }

    fn channel_set_position(
        &self,
        channel: ChannelHandle,
        position: i64,
        mode: PositionMode,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let c = state.attached_channel_mut(channel)?;
        let offset = match mode.unit {
            PositionUnit::Bytes => Some(position.unsigned_abs()),
            PositionUnit::Millis => Self::millis_to_bytes(c.frequency, position.unsigned_abs()),
        }
        .ok_or(BackendError::InvalidPosition(position))?;
        let target = match (mode.origin, position.is_negative()) {
            (PositionOrigin::Start, true) => return Err(BackendError::InvalidPosition(position)),
            (PositionOrigin::Start, false) => Some(offset),
            (PositionOrigin::Current, false) => c.position.checked_add(offset),
            (PositionOrigin::Current, true) => c.position.checked_sub(offset),
        };
        let target = target
            .filter(|&t| t <= c.length)
            .ok_or(BackendError::InvalidPosition(position))?;
        c.position = target;
        if mode.reset_buffer {
            c.buffered = 0;
        }
        Ok(())
    }

    fn channel_is_active(&self, channel: ChannelHandle) -> ChannelStatus {
        let state = self.state.lock();
        let Some(c) = state.channels.get(channel) else {
            return ChannelStatus::Stopped;
        };
        if c.position >= c.length {
            return ChannelStatus::Stopped;
        }
        match state.streams.get(c.mixer) {
            Some(stream) if stream.playing => ChannelStatus::Playing,
            Some(_) => ChannelStatus::Stalled,
            // A decoding channel outside any mixer is not being pulled.
            None => ChannelStatus::Stopped,
        }
    }

    fn channel_level(&self, channel: ChannelHandle) -> Result<(f32, f32), BackendError> {
        let mut state = self.state.lock();
        let c = state.attached_channel_mut(channel)?;
        if c.flags.contains(MixerFlags::PAUSE) {
            return Ok((0.0, 0.0));
        }
        Ok(c.level)
    }

    fn effect_set(
        &self,
        mixer: StreamHandle,
        kind: EffectKind,
        priority: u32,
    ) -> Result<EffectHandle, BackendError> {
        let mut state = self.state.lock();
        if !state.streams.contains(mixer) {
            return Err(BackendError::InvalidHandle(mixer.raw()));
        }
        Ok(state.effects.insert(SoftEffect {
            mixer,
            kind,
            priority,
            params: None,
        }))
    }

    fn effect_set_parameters(
        &self,
        effect: EffectHandle,
        params: &EffectParameters,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let e = state
            .effects
            .get_mut(effect)
            .ok_or(BackendError::InvalidHandle(effect.raw()))?;
        if e.kind != params.kind() {
            return Err(BackendError::Device(format!(
                "parameters for {} applied to {} effect",
                params.kind(),
                e.kind
            )));
        }
        e.params = Some(params.clone());
        Ok(())
    }

    fn effect_set_priority(&self, effect: EffectHandle, priority: u32) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let e = state
            .effects
            .get_mut(effect)
            .ok_or(BackendError::InvalidHandle(effect.raw()))?;
        e.priority = priority;
        Ok(())
    }

    fn effect_remove(&self, mixer: StreamHandle, effect: EffectHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        match state.effects.get(effect) {
            Some(e) if e.mixer == mixer => {
                state.effects.remove(effect);
                Ok(())
            }
            _ => Err(BackendError::InvalidHandle(effect.raw())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_with_stream() -> (SoftBackend, StreamHandle) {
        let backend = SoftBackend::with_device(1);
        let stream = backend
            .stream_create(44100, 2, StreamFlags::NONSTOP)
            .unwrap();
        (backend, stream)
    }

    #[test]
    fn stream_create_requires_device() {
        let backend = SoftBackend::new();
        assert!(!backend.is_initialized());
        assert_eq!(
            backend.stream_create(44100, 2, StreamFlags::NONE),
            Err(BackendError::NotInitialized)
        );
        backend.init_device(3);
        let stream = backend.stream_create(44100, 2, StreamFlags::NONE).unwrap();
        assert_eq!(backend.stream_device(stream), Some(3));
    }

    #[test]
    fn channel_attaches_to_one_mixer_only() {
        let (backend, stream) = backend_with_stream();
        let ch = backend.create_channel(44100, 1000);
        backend.channel_add(stream, ch, MixerFlags::BUFFER).unwrap();
        assert_eq!(
            backend.channel_add(stream, ch, MixerFlags::BUFFER),
            Err(BackendError::AlreadyAttached(ch.raw()))
        );
        assert_eq!(backend.attached_channels(stream), vec![ch]);
    }

    #[test]
    fn flag_ops_need_attachment() {
        let (backend, _) = backend_with_stream();
        let ch = backend.create_channel(44100, 1000);
        assert_eq!(
            backend.channel_add_flag(ch, MixerFlags::PAUSE),
            Err(BackendError::NotAttached(ch.raw()))
        );
    }

    #[test]
    fn decoding_channel_in_mixer_reports_playing_even_when_paused() {
        let (backend, stream) = backend_with_stream();
        let ch = backend.create_channel(44100, 1000);
        backend
            .channel_add(stream, ch, MixerFlags::BUFFER | MixerFlags::PAUSE)
            .unwrap();
        assert_eq!(backend.channel_is_active(ch), ChannelStatus::Stalled);
        backend.stream_play(stream).unwrap();
        assert_eq!(backend.channel_is_active(ch), ChannelStatus::Playing);
    }

    #[test]
    fn advance_respects_pause_and_end_of_data() {
        let (backend, stream) = backend_with_stream();
        backend.stream_play(stream).unwrap();
        let ch = backend.create_channel(44100, 100);
        backend.channel_add(stream, ch, MixerFlags::BUFFER).unwrap();

        backend.advance(ch, 40);
        assert_eq!(backend.channel_position(ch, PositionMode::BYTES), Ok(40));

        backend.channel_add_flag(ch, MixerFlags::PAUSE).unwrap();
        backend.advance(ch, 40);
        assert_eq!(backend.channel_position(ch, PositionMode::BYTES), Ok(40));

        backend.channel_remove_flag(ch, MixerFlags::PAUSE).unwrap();
        backend.advance(ch, 500);
        assert_eq!(backend.channel_position(ch, PositionMode::BYTES), Ok(100));
        assert_eq!(backend.channel_is_active(ch), ChannelStatus::Stopped);
    }

    #[test]
    fn set_position_relative_and_reset() {
        let (backend, stream) = backend_with_stream();
        backend.stream_play(stream).unwrap();
        let ch = backend.create_channel(44100, 1000);
        backend.channel_add(stream, ch, MixerFlags::BUFFER).unwrap();
        backend.advance(ch, 400);
        assert_eq!(backend.buffered(ch), 400);

        backend
            .channel_set_position(ch, -100, PositionMode::BYTES.relative())
            .unwrap();
        assert_eq!(backend.channel_position(ch, PositionMode::BYTES), Ok(300));

        backend
            .channel_set_position(ch, 0, PositionMode::BYTES.resetting())
            .unwrap();
        assert_eq!(backend.channel_position(ch, PositionMode::BYTES), Ok(0));
        assert_eq!(backend.buffered(ch), 0);

        assert_eq!(
            backend.channel_set_position(ch, 5000, PositionMode::BYTES),
            Err(BackendError::InvalidPosition(5000))
        );
    }

    #[test]
    fn millis_conversion() {
        let (backend, stream) = backend_with_stream();
        let ch = backend.create_channel(1000, 40_000);
        backend.channel_add(stream, ch, MixerFlags::BUFFER).unwrap();
        backend
            .channel_set_position(ch, 2000, PositionMode::MILLIS)
            .unwrap();
        assert_eq!(backend.channel_position(ch, PositionMode::BYTES), Ok(8000));
        assert_eq!(backend.channel_position(ch, PositionMode::MILLIS), Ok(2000));
    }

    #[test]
    fn oversized_positions_are_rejected() {
        let (backend, stream) = backend_with_stream();
        backend.stream_play(stream).unwrap();
        let ch = backend.create_channel(44100, u64::MAX);
        backend.channel_add(stream, ch, MixerFlags::BUFFER).unwrap();

        let huge = i64::MAX / 2;
        assert_eq!(
            backend.channel_set_position(ch, huge, PositionMode::MILLIS),
            Err(BackendError::InvalidPosition(huge))
        );
        assert_eq!(
            backend.channel_set_position(ch, -huge, PositionMode::MILLIS.relative()),
            Err(BackendError::InvalidPosition(-huge))
        );

        backend.advance(ch, u64::MAX - 8);
        backend.advance(ch, 64);
        assert_eq!(backend.channel_position(ch, PositionMode::BYTES), Ok(u64::MAX));
        assert_eq!(backend.buffered(ch), u64::MAX);
        assert!(backend.channel_position(ch, PositionMode::MILLIS).is_ok());
    }

    #[test]
    fn effects_sorted_by_priority_and_freed_with_stream() {
        let (backend, stream) = backend_with_stream();
        let a = backend.effect_set(stream, EffectKind::Echo, 1).unwrap();
        let b = backend.effect_set(stream, EffectKind::Reverb, 0).unwrap();
        let order: Vec<_> = backend.effects_on(stream).iter().map(|e| e.handle).collect();
        assert_eq!(order, vec![b, a]);

        backend.stream_free(stream).unwrap();
        assert_eq!(backend.effect_count(), 0);
        assert_eq!(
            backend.stream_free(stream),
            Err(BackendError::InvalidHandle(stream.raw()))
        );
    }

    #[test]
    fn effect_parameters_must_match_kind() {
        let (backend, stream) = backend_with_stream();
        let e = backend.effect_set(stream, EffectKind::Gain, 0).unwrap();
        let wrong = EffectParameters::new(EffectKind::Reverb);
        assert!(backend.effect_set_parameters(e, &wrong).is_err());
        let right = EffectParameters::new(EffectKind::Gain).with("gain", 0.5);
        backend.effect_set_parameters(e, &right).unwrap();
        assert_eq!(backend.effects_on(stream)[0].params, Some(right));
    }

    #[test]
    fn effect_remove_checks_owner_stream() {
        let (backend, stream) = backend_with_stream();
        let other = backend.stream_create(44100, 2, StreamFlags::NONE).unwrap();
        let e = backend.effect_set(stream, EffectKind::Gain, 0).unwrap();
        assert!(backend.effect_remove(other, e).is_err());
        backend.effect_remove(stream, e).unwrap();
        assert!(backend.effect_remove(stream, e).is_err());
    }

    #[test]
    fn freeing_stream_detaches_channels() {
        let (backend, stream) = backend_with_stream();
        let ch = backend.create_channel(44100, 1000);
        backend
            .channel_add(stream, ch, MixerFlags::BUFFER | MixerFlags::PAUSE)
            .unwrap();
        backend.stream_free(stream).unwrap();
        assert_eq!(backend.channel_mixer(ch), None);
        assert_eq!(backend.channel_flags(ch), Err(BackendError::NotAttached(ch.raw())));
    }

    #[test]
    fn shutdown_keeps_streams_but_blocks_creation() {
        let (backend, stream) = backend_with_stream();
        backend.shutdown_device();
        assert!(!backend.is_initialized());
        assert!(backend.stream_exists(stream));
        assert_eq!(
            backend.stream_create(44100, 2, StreamFlags::NONE),
            Err(BackendError::NotInitialized)
        );
    }

    #[test]
    fn freed_channel_leaves_its_mixer() {
        let (backend, stream) = backend_with_stream();
        let ch = backend.create_channel(44100, 1000);
        backend.channel_add(stream, ch, MixerFlags::BUFFER).unwrap();
        assert!(backend.free_channel(ch));
        assert!(backend.attached_channels(stream).is_empty());
        assert!(!backend.free_channel(ch));
    }
}
