//! Effect configuration types.

use std::collections::BTreeMap;

use mixgraph_core::{EffectKind, EffectParameters};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a single effect in a mixer's chain.
///
/// # Example
///
/// ```rust
/// use mixgraph_config::EffectConfig;
///
/// let config = EffectConfig::new("reverb")
///     .with_param("room_size", "80%")
///     .with_param("mix", "0.25");
///
/// let params = config.to_parameters().unwrap();
/// assert_eq!(params.value("room_size"), Some(0.8));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectConfig {
    /// Effect type name (e.g., "reverb", "eq").
    #[serde(rename = "type")]
    pub effect_type: String,

    /// Effect parameters as key-value pairs.
    /// Values are strings to support various formats (numbers, percentages, etc.)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl EffectConfig {
    /// Create a new effect configuration with no parameters.
    pub fn new(effect_type: impl Into<String>) -> Self {
        Self {
            effect_type: effect_type.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter to the configuration.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Get a parameter value.
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parse a parameter value as f32. See [`parse_param_value`].
    pub fn parse_param(&self, key: &str) -> Option<f32> {
        parse_param_value(self.params.get(key)?)
    }

    /// The effect kind named by `effect_type`.
    pub fn kind(&self) -> Result<EffectKind, ConfigError> {
        self.effect_type
            .parse()
            .map_err(|_| ConfigError::UnknownEffect(self.effect_type.clone()))
    }

    /// Resolves this entry into effect parameters.
    ///
    /// Unknown parameter names and unparseable values are errors. Values
    /// outside a parameter's range are clamped.
    pub fn to_parameters(&self) -> Result<EffectParameters, ConfigError> {
        let kind = self.kind()?;
        let mut params = EffectParameters::new(kind);
        for (name, text) in &self.params {
            let invalid = |reason: String| ConfigError::InvalidParameter {
                effect: self.effect_type.clone(),
                param: name.clone(),
                reason,
            };
            if kind.param_spec(name).is_none() {
                return Err(invalid("no such parameter".to_string()));
            }
            let value =
                parse_param_value(text).ok_or_else(|| invalid(format!("cannot parse '{text}'")))?;
            if !params.set(name, value) {
                return Err(invalid(format!("value {value} is not finite")));
            }
        }
        Ok(params)
    }
}

/// Parse a parameter value string into an f32.
///
/// Supports various formats:
/// - Plain numbers: "0.5", "1.2", "-0.3"
/// - Percentages: "50%", "120%" (divided by 100)
/// - Decibels: "-6dB", "+3dB" (converted to linear gain)
/// - Time in ms: "100ms" (converted to seconds)
/// - Time in s: "1.5s" (kept as seconds)
/// - Frequency in Hz: "440Hz"
/// - Frequency in kHz: "1.2kHz" (converted to Hz)
///
/// Parameters whose range is itself in dB (compressor threshold, EQ gain)
/// take plain numbers.
pub fn parse_param_value(value: &str) -> Option<f32> {
    let value = value.trim();

    if let Some(pct) = value.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(|v| v / 100.0);
    }

    if let Some(db) = value
        .strip_suffix("dB")
        .or_else(|| value.strip_suffix("db"))
    {
        return db
            .trim()
            .parse::<f32>()
            .ok()
            .map(|v| 10.0_f32.powf(v / 20.0));
    }

    if let Some(ms) = value.strip_suffix("ms") {
        return ms.trim().parse::<f32>().ok().map(|v| v / 1000.0);
    }

    if let Some(s) = value.strip_suffix('s') {
        return s.trim().parse::<f32>().ok();
    }

    if let Some(khz) = value
        .strip_suffix("kHz")
        .or_else(|| value.strip_suffix("khz"))
    {
        return khz.trim().parse::<f32>().ok().map(|v| v * 1000.0);
    }

    if let Some(hz) = value
        .strip_suffix("Hz")
        .or_else(|| value.strip_suffix("hz"))
    {
        return hz.trim().parse::<f32>().ok();
    }

    value.parse::<f32>().ok()
}
