//! Graph configuration file format and graph construction.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mixgraph_core::{Backend, CommandQueue, MixerGraph, StreamFlags, StreamFormat};
use serde::{Deserialize, Serialize};

use crate::effect_config::EffectConfig;
use crate::error::ConfigError;
use crate::validation::validate_config;

/// Mixer stream format settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate in Hz.
    pub frequency: u32,
    /// Output channel count.
    pub channels: u32,
    /// Keep producing output while no channel is playing.
    pub nonstop: bool,
    /// Mix in 32-bit float.
    pub float: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frequency: 44_100,
            channels: 2,
            nonstop: true,
            float: false,
        }
    }
}

impl StreamConfig {
    /// The core stream format these settings describe.
    pub fn format(&self) -> StreamFormat {
        let mut flags = StreamFlags::NONE;
        if self.nonstop {
            flags |= StreamFlags::NONSTOP;
        }
        if self.float {
            flags |= StreamFlags::FLOAT;
        }
        StreamFormat {
            frequency: self.frequency,
            channels: self.channels,
            flags,
        }
    }
}

/// One named mixer and its initial effect chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MixerConfig {
    /// Mixer name, unique within the graph.
    pub name: String,
    /// Effects in chain order.
    #[serde(default)]
    pub effects: Vec<EffectConfig>,
}

impl MixerConfig {
    /// A mixer with no effects.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            effects: Vec::new(),
        }
    }

    /// Append an effect to the chain.
    pub fn with_effect(mut self, effect: EffectConfig) -> Self {
        self.effects.push(effect);
        self
    }
}

/// A complete mixing graph description.
///
/// # TOML Format
///
/// ```toml
/// device = 1
/// tick_ms = 10
///
/// [stream]
/// frequency = 48000
/// channels = 2
///
/// [[mixers]]
/// name = "music"
///
/// [[mixers.effects]]
/// type = "reverb"
/// params = { room_size = "80%", mix = "0.3" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    /// Output device index to open.
    pub device: u32,
    /// Interval between audio thread queue drains, in milliseconds.
    pub tick_ms: u64,
    /// Mixer stream format.
    pub stream: StreamConfig,
    /// Mixers in addition to the built-in default mixer.
    pub mixers: Vec<MixerConfig>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            device: 1,
            tick_ms: 10,
            stream: StreamConfig::default(),
            mixers: Vec::new(),
        }
    }
}

impl GraphConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), mixers = config.mixers.len(), "config loaded");
        Ok(config)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Audio thread tick interval.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Builds a graph with a fresh command queue.
    ///
    /// See [`build_with_queue`](Self::build_with_queue).
    pub fn build(&self, backend: Arc<dyn Backend>) -> Result<MixerGraph, ConfigError> {
        self.build_with_queue(backend, CommandQueue::new())
    }

    /// Validates the configuration and builds a graph from it.
    ///
    /// Every configured mixer is created and its effect list filled. Like any
    /// mutation, stream creation and effect allocation happen when `queue` is
    /// next drained.
    pub fn build_with_queue(
        &self,
        backend: Arc<dyn Backend>,
        queue: CommandQueue,
    ) -> Result<MixerGraph, ConfigError> {
        validate_config(self)?;
        let chains = self
            .mixers
            .iter()
            .map(|mixer| {
                mixer
                    .effects
                    .iter()
                    .map(|effect| effect.to_parameters().map(Arc::new))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let graph = MixerGraph::new(backend, queue, self.stream.format());
        for (mixer, chain) in self.mixers.iter().zip(chains) {
            let node = graph.create_mixer(mixer.name.trim());
            if !chain.is_empty() {
                node.effects().insert_range(0, chain);
            }
        }
        tracing::info!(mixers = self.mixers.len(), "graph built from config");
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixgraph_core::SoftBackend;

    #[test]
    fn defaults() {
        let config = GraphConfig::default();
        assert_eq!(config.stream.frequency, 44_100);
        assert_eq!(config.stream.channels, 2);
        assert!(config.stream.nonstop);
        assert_eq!(config.device, 1);
        assert_eq!(config.tick(), Duration::from_millis(10));
        assert!(config.mixers.is_empty());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = GraphConfig::from_toml("").unwrap();
        assert_eq!(config, GraphConfig::default());
    }

    #[test]
    fn parses_documented_format() {
        let toml_str = r#"
device = 2
tick_ms = 5

[stream]
frequency = 48000
float = true

[[mixers]]
name = "music"

[[mixers.effects]]
type = "reverb"
params = { room_size = "80%", mix = "0.3" }

[[mixers.effects]]
type = "gain"

[[mixers]]
name = "sfx"
"#;
        let config = GraphConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.device, 2);
        assert_eq!(config.stream.frequency, 48_000);
        assert_eq!(config.stream.channels, 2);
        assert_eq!(
            config.stream.format().flags,
            StreamFlags::NONSTOP | StreamFlags::FLOAT
        );
        assert_eq!(config.mixers.len(), 2);
        assert_eq!(config.mixers[0].effects.len(), 2);
        assert_eq!(config.mixers[0].effects[0].get_param("room_size"), Some("80%"));
        assert!(config.mixers[1].effects.is_empty());
    }

    #[test]
    fn toml_string_round_trip() {
        let config = GraphConfig {
            mixers: vec![
                MixerConfig::new("music")
                    .with_effect(EffectConfig::new("echo").with_param("delay", "250ms")),
            ],
            ..GraphConfig::default()
        };
        let parsed = GraphConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn build_creates_mixers_and_chains() {
        let backend = Arc::new(SoftBackend::with_device(1));
        let config = GraphConfig {
            mixers: vec![
                MixerConfig::new("music")
                    .with_effect(EffectConfig::new("eq"))
                    .with_effect(EffectConfig::new("reverb")),
                MixerConfig::new("voice"),
            ],
            ..GraphConfig::default()
        };
        let graph = config.build(backend.clone()).unwrap();
        graph.queue().bind_current_thread();
        graph.queue().tick();

        let names: Vec<_> = graph.mixers().iter().map(|m| m.name().to_owned()).collect();
        assert_eq!(names, ["default", "music", "voice"]);
        let music = graph.mixer("music").unwrap();
        let chain = music.effect_snapshot();
        assert_eq!(chain.len(), 2);
        assert!(chain.iter().all(|e| e.handle.is_allocated()));
        assert_eq!(backend.effects_on(music.stream_handle()).len(), 2);
    }

    #[test]
    fn built_mixers_stay_in_the_graph_before_first_tick() {
        let backend = Arc::new(SoftBackend::with_device(1));
        let config = GraphConfig {
            mixers: vec![
                MixerConfig::new("music").with_effect(EffectConfig::new("gain")),
                MixerConfig::new("voice"),
            ],
            ..GraphConfig::default()
        };
        let graph = config.build(backend.clone()).unwrap();
        assert!(graph.mixer("music").is_some());
        assert!(graph.mixer("voice").is_some());
        assert_eq!(graph.stats().mixers, 3);
        assert_eq!(backend.stream_count(), 0);

        graph.queue().bind_current_thread();
        graph.queue().tick();
        assert_eq!(backend.stream_count(), 3);
        assert_eq!(backend.effect_count(), 1);
    }

    #[test]
    fn build_rejects_invalid_config() {
        let backend = Arc::new(SoftBackend::with_device(1));
        let config = GraphConfig {
            mixers: vec![MixerConfig::new("x").with_effect(EffectConfig::new("fuzzbox"))],
            ..GraphConfig::default()
        };
        let err = config.build(backend).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
