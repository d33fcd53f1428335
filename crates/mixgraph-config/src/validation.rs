//! Graph configuration validation.
//!
//! [`validate_config`] checks a whole [`GraphConfig`] and reports every
//! problem it finds at once, so a user fixing a config file sees the full
//! list instead of one error per run.
//!
//! # Example
//!
//! ```rust
//! use mixgraph_config::{validate_config, GraphConfig, MixerConfig, EffectConfig};
//!
//! let mut config = GraphConfig::default();
//! config.mixers.push(MixerConfig::new("music").with_effect(EffectConfig::new("reverb")));
//! validate_config(&config).expect("valid config");
//! ```

use std::collections::HashSet;

use mixgraph_core::{DEFAULT_MIXER_NAME, EffectKind};
use thiserror::Error;

use crate::effect_config::parse_param_value;
use crate::graph_config::GraphConfig;

/// Supported mixer sample rates.
pub const FREQUENCY_RANGE: std::ops::RangeInclusive<u32> = 8_000..=192_000;

/// Supported mixer output channel counts.
pub const CHANNEL_RANGE: std::ops::RangeInclusive<u32> = 1..=8;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Sample rate outside [`FREQUENCY_RANGE`].
    #[error("unsupported sample rate {0} Hz")]
    Frequency(u32),

    /// Channel count outside [`CHANNEL_RANGE`].
    #[error("unsupported channel count {0}")]
    Channels(u32),

    /// Tick interval of zero.
    #[error("tick interval must be at least 1 ms")]
    ZeroTick,

    /// Mixer with an empty name.
    #[error("mixer #{0} has an empty name")]
    EmptyMixerName(usize),

    /// Mixer named like the built-in fallback mixer.
    #[error("mixer name '{0}' is reserved")]
    ReservedMixerName(String),

    /// Two mixers with the same name.
    #[error("duplicate mixer name '{0}'")]
    DuplicateMixer(String),

    /// Unknown effect type.
    #[error("mixer '{mixer}': unknown effect type: {effect}")]
    UnknownEffect {
        /// Mixer holding the effect.
        mixer: String,
        /// The unrecognized type.
        effect: String,
    },

    /// Unknown parameter name.
    #[error("mixer '{mixer}': unknown parameter '{param}' for effect '{effect}'")]
    UnknownParameter {
        /// Mixer holding the effect.
        mixer: String,
        /// Effect type.
        effect: String,
        /// Name of the unrecognized parameter.
        param: String,
    },

    /// Parameter value out of range.
    #[error("mixer '{mixer}': parameter '{param}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Mixer holding the effect.
        mixer: String,
        /// Name of the parameter.
        param: String,
        /// The value that was out of range.
        value: f32,
        /// Minimum allowed value.
        min: f32,
        /// Maximum allowed value.
        max: f32,
    },

    /// Invalid parameter format.
    #[error("mixer '{mixer}': invalid format for parameter '{param}': {reason}")]
    InvalidFormat {
        /// Mixer holding the effect.
        mixer: String,
        /// Name of the parameter.
        param: String,
        /// Description of the format error.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// The individual errors, flattening [`ValidationError::Multiple`].
    pub fn errors(&self) -> Vec<&ValidationError> {
        match self {
            ValidationError::Multiple(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates that an effect type exists.
pub fn validate_effect(effect_type: &str) -> ValidationResult<EffectKind> {
    effect_type.parse().map_err(|_| ValidationError::UnknownEffect {
        mixer: String::new(),
        effect: effect_type.to_string(),
    })
}

/// Validates a full graph configuration, collecting every problem.
pub fn validate_config(config: &GraphConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if !FREQUENCY_RANGE.contains(&config.stream.frequency) {
        errors.push(ValidationError::Frequency(config.stream.frequency));
    }
    if !CHANNEL_RANGE.contains(&config.stream.channels) {
        errors.push(ValidationError::Channels(config.stream.channels));
    }
    if config.tick_ms == 0 {
        errors.push(ValidationError::ZeroTick);
    }

    let mut seen = HashSet::new();
    for (index, mixer) in config.mixers.iter().enumerate() {
        let name = mixer.name.trim();
        if name.is_empty() {
            errors.push(ValidationError::EmptyMixerName(index));
        } else if name.eq_ignore_ascii_case(DEFAULT_MIXER_NAME) {
            errors.push(ValidationError::ReservedMixerName(mixer.name.clone()));
        } else if !seen.insert(name) {
            errors.push(ValidationError::DuplicateMixer(mixer.name.clone()));
        }

        for effect in &mixer.effects {
            let Ok(kind) = effect.effect_type.parse::<EffectKind>() else {
                errors.push(ValidationError::UnknownEffect {
                    mixer: mixer.name.clone(),
                    effect: effect.effect_type.clone(),
                });
                continue;
            };
            for (param, text) in &effect.params {
                let Some(spec) = kind.param_spec(param) else {
                    errors.push(ValidationError::UnknownParameter {
                        mixer: mixer.name.clone(),
                        effect: effect.effect_type.clone(),
                        param: param.clone(),
                    });
                    continue;
                };
                match parse_param_value(text) {
                    None => errors.push(ValidationError::InvalidFormat {
                        mixer: mixer.name.clone(),
                        param: param.clone(),
                        reason: format!("cannot parse '{text}'"),
                    }),
                    Some(value) if !(spec.min..=spec.max).contains(&value) => {
                        errors.push(ValidationError::OutOfRange {
                            mixer: mixer.name.clone(),
                            param: param.clone(),
                            value,
                            min: spec.min,
                            max: spec.max,
                        });
                    }
                    Some(_) => {}
                }
            }
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EffectConfig, MixerConfig};

    fn config_with(mixers: Vec<MixerConfig>) -> GraphConfig {
        GraphConfig {
            mixers,
            ..GraphConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GraphConfig::default()).is_ok());
    }

    #[test]
    fn validate_effect_lookup() {
        assert_eq!(validate_effect("echo").unwrap(), EffectKind::Echo);
        assert!(validate_effect("fuzzbox").is_err());
    }

    #[test]
    fn stream_problems_are_reported() {
        let mut config = GraphConfig::default();
        config.stream.frequency = 1_000;
        config.stream.channels = 0;
        config.tick_ms = 0;
        let err = validate_config(&config).unwrap_err();
        let errors = err.errors();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&&ValidationError::Frequency(1_000)));
        assert!(errors.contains(&&ValidationError::Channels(0)));
        assert!(errors.contains(&&ValidationError::ZeroTick));
    }

    #[test]
    fn mixer_name_problems_are_reported() {
        let config = config_with(vec![
            MixerConfig::new("music"),
            MixerConfig::new("music"),
            MixerConfig::new(""),
            MixerConfig::new("Default"),
        ]);
        let err = validate_config(&config).unwrap_err();
        let errors = err.errors();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ValidationError::DuplicateMixer(n) if n == "music"));
        assert!(matches!(errors[1], ValidationError::EmptyMixerName(2)));
        assert!(matches!(errors[2], ValidationError::ReservedMixerName(_)));
    }

    #[test]
    fn effect_problems_are_reported() {
        let config = config_with(vec![
            MixerConfig::new("fx")
                .with_effect(EffectConfig::new("fuzzbox"))
                .with_effect(EffectConfig::new("gain").with_param("volume", "1"))
                .with_effect(EffectConfig::new("echo").with_param("delay", "5s"))
                .with_effect(EffectConfig::new("reverb").with_param("mix", "lots")),
        ]);
        let err = validate_config(&config).unwrap_err();
        let errors = err.errors();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ValidationError::UnknownEffect { .. }));
        assert!(matches!(errors[1], ValidationError::UnknownParameter { .. }));
        assert!(matches!(errors[2], ValidationError::OutOfRange { value, .. } if *value == 5.0));
        assert!(matches!(errors[3], ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn single_error_is_not_wrapped() {
        let mut config = GraphConfig::default();
        config.tick_ms = 0;
        assert_eq!(validate_config(&config), Err(ValidationError::ZeroTick));
    }
}
