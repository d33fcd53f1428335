//! Effect types and their parameter bags.
//!
//! An [`EffectParameters`] value is caller-owned, immutable reference data: the
//! effect type plus a name → value map. Mixer nodes never mutate it; they hand
//! it to the backend when allocating a native effect instance. Editing an
//! effect means replacing its entry in the mixer's effect list.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Category of effect for organization and listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectCategory {
    /// Compressors and other level processors.
    Dynamics,
    /// Distortion and waveshaping.
    Distortion,
    /// Chorus, flanger, and other modulated delays.
    Modulation,
    /// Echo and reverb.
    TimeBased,
    /// Equalizers and pass filters.
    Filter,
    /// Gain stages.
    Utility,
}

impl EffectCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            EffectCategory::Dynamics => "Dynamics",
            EffectCategory::Distortion => "Distortion",
            EffectCategory::Modulation => "Modulation",
            EffectCategory::TimeBased => "Time-Based",
            EffectCategory::Filter => "Filter",
            EffectCategory::Utility => "Utility",
        }
    }
}

/// Describes one parameter of an effect type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Parameter key (lowercase, no spaces).
    pub name: &'static str,
    /// Short description for listings.
    pub description: &'static str,
    /// Value used when the caller does not set one.
    pub default: f32,
    /// Inclusive lower bound.
    pub min: f32,
    /// Inclusive upper bound.
    pub max: f32,
}

const fn param(
    name: &'static str,
    description: &'static str,
    default: f32,
    min: f32,
    max: f32,
) -> ParamSpec {
    ParamSpec {
        name,
        description,
        default,
        min,
        max,
    }
}

const GAIN_PARAMS: &[ParamSpec] = &[param("gain", "Linear gain", 1.0, 0.0, 4.0)];

const COMPRESSOR_PARAMS: &[ParamSpec] = &[
    param("threshold", "Threshold in dB", -18.0, -60.0, 0.0),
    param("ratio", "Compression ratio", 4.0, 1.0, 20.0),
    param("attack", "Attack time in seconds", 0.01, 0.0001, 0.5),
    param("release", "Release time in seconds", 0.1, 0.01, 3.0),
    param("makeup", "Makeup gain in dB", 0.0, 0.0, 24.0),
];

const DISTORTION_PARAMS: &[ParamSpec] = &[
    param("drive", "Drive amount", 0.5, 0.0, 1.0),
    param("tone", "Post-drive tone", 0.5, 0.0, 1.0),
    param("mix", "Wet/dry mix", 1.0, 0.0, 1.0),
];

const ECHO_PARAMS: &[ParamSpec] = &[
    param("delay", "Delay time in seconds", 0.25, 0.001, 2.0),
    param("feedback", "Feedback amount", 0.4, 0.0, 0.95),
    param("mix", "Wet/dry mix", 0.3, 0.0, 1.0),
];

const CHORUS_PARAMS: &[ParamSpec] = &[
    param("rate", "LFO rate in Hz", 1.0, 0.05, 10.0),
    param("depth", "Modulation depth", 0.5, 0.0, 1.0),
    param("mix", "Wet/dry mix", 0.5, 0.0, 1.0),
];

const FLANGER_PARAMS: &[ParamSpec] = &[
    param("rate", "LFO rate in Hz", 0.5, 0.05, 10.0),
    param("depth", "Modulation depth", 0.5, 0.0, 1.0),
    param("feedback", "Feedback amount", 0.5, 0.0, 0.95),
    param("mix", "Wet/dry mix", 0.5, 0.0, 1.0),
];

const REVERB_PARAMS: &[ParamSpec] = &[
    param("room_size", "Room size", 0.5, 0.0, 1.0),
    param("damping", "High-frequency damping", 0.5, 0.0, 1.0),
    param("mix", "Wet/dry mix", 0.3, 0.0, 1.0),
];

const EQ_PARAMS: &[ParamSpec] = &[
    param("center", "Center frequency in Hz", 1000.0, 20.0, 20000.0),
    param("bandwidth", "Bandwidth in semitones", 12.0, 1.0, 36.0),
    param("gain", "Band gain in dB", 0.0, -15.0, 15.0),
];

const FILTER_PARAMS: &[ParamSpec] = &[
    param("cutoff", "Cutoff frequency in Hz", 1000.0, 20.0, 20000.0),
    param("resonance", "Filter Q", 0.707, 0.1, 10.0),
];

/// The effect types a native backend can instantiate on a mixer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    /// Volume adjustment.
    Gain,
    /// Dynamics compressor.
    Compressor,
    /// Waveshaping distortion.
    Distortion,
    /// Feedback echo.
    Echo,
    /// Modulated-delay chorus.
    Chorus,
    /// Short modulated-delay flanger.
    Flanger,
    /// Algorithmic reverb.
    Reverb,
    /// Single-band parametric equalizer.
    ParamEq,
    /// Resonant low-pass filter.
    LowPass,
    /// Resonant high-pass filter.
    HighPass,
}

impl EffectKind {
    /// Every effect kind, in listing order.
    pub const ALL: [EffectKind; 10] = [
        EffectKind::Gain,
        EffectKind::Compressor,
        EffectKind::Distortion,
        EffectKind::Echo,
        EffectKind::Chorus,
        EffectKind::Flanger,
        EffectKind::Reverb,
        EffectKind::ParamEq,
        EffectKind::LowPass,
        EffectKind::HighPass,
    ];

    /// Stable identifier used in configuration files.
    pub const fn id(&self) -> &'static str {
        match self {
            EffectKind::Gain => "gain",
            EffectKind::Compressor => "compressor",
            EffectKind::Distortion => "distortion",
            EffectKind::Echo => "echo",
            EffectKind::Chorus => "chorus",
            EffectKind::Flanger => "flanger",
            EffectKind::Reverb => "reverb",
            EffectKind::ParamEq => "eq",
            EffectKind::LowPass => "lowpass",
            EffectKind::HighPass => "highpass",
        }
    }

    /// Brief description for listings.
    pub const fn description(&self) -> &'static str {
        match self {
            EffectKind::Gain => "Linear volume adjustment",
            EffectKind::Compressor => "Dynamics compressor with soft knee",
            EffectKind::Distortion => "Waveshaping distortion",
            EffectKind::Echo => "Feedback echo with independent wet/dry",
            EffectKind::Chorus => "Dual-voice modulated delay chorus",
            EffectKind::Flanger => "Classic flanger with modulated short delay",
            EffectKind::Reverb => "Algorithmic room reverb",
            EffectKind::ParamEq => "Single-band peaking equalizer",
            EffectKind::LowPass => "Resonant low-pass filter",
            EffectKind::HighPass => "Resonant high-pass filter",
        }
    }

    /// Category used for grouping.
    pub const fn category(&self) -> EffectCategory {
        match self {
            EffectKind::Gain => EffectCategory::Utility,
            EffectKind::Compressor => EffectCategory::Dynamics,
            EffectKind::Distortion => EffectCategory::Distortion,
            EffectKind::Echo | EffectKind::Reverb => EffectCategory::TimeBased,
            EffectKind::Chorus | EffectKind::Flanger => EffectCategory::Modulation,
            EffectKind::ParamEq | EffectKind::LowPass | EffectKind::HighPass => {
                EffectCategory::Filter
            }
        }
    }

    /// Parameters understood by this effect kind.
    pub const fn params(&self) -> &'static [ParamSpec] {
        match self {
            EffectKind::Gain => GAIN_PARAMS,
            EffectKind::Compressor => COMPRESSOR_PARAMS,
            EffectKind::Distortion => DISTORTION_PARAMS,
            EffectKind::Echo => ECHO_PARAMS,
            EffectKind::Chorus => CHORUS_PARAMS,
            EffectKind::Flanger => FLANGER_PARAMS,
            EffectKind::Reverb => REVERB_PARAMS,
            EffectKind::ParamEq => EQ_PARAMS,
            EffectKind::LowPass | EffectKind::HighPass => FILTER_PARAMS,
        }
    }

    /// Looks up a parameter spec by name.
    pub fn param_spec(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|p| p.name == name)
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Returned when a string does not name an [`EffectKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown effect type: {0}")]
pub struct UnknownEffectKind(pub String);

impl FromStr for EffectKind {
    type Err = UnknownEffectKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        EffectKind::ALL
            .into_iter()
            .find(|k| k.id() == key)
            .ok_or(UnknownEffectKind(s.to_string()))
    }
}

/// Effect type plus parameter values.
///
/// Values missing from the map fall back to the kind's defaults when read
/// through [`value`](EffectParameters::value). Values are clamped to the
/// parameter's range on insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectParameters {
    kind: EffectKind,
    values: BTreeMap<&'static str, f32>,
}

impl EffectParameters {
    /// Parameters for `kind` with every value at its default.
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            values: BTreeMap::new(),
        }
    }

    /// Builder form of [`set`](EffectParameters::set). Unknown names are ignored.
    pub fn with(mut self, name: &str, value: f32) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a parameter, clamping to its range.
    ///
    /// Returns `false` (and changes nothing) if `name` is not a parameter of
    /// this kind or `value` is not finite.
    pub fn set(&mut self, name: &str, value: f32) -> bool {
        let Some(spec) = self.kind.param_spec(name) else {
            return false;
        };
        if !value.is_finite() {
            return false;
        }
        self.values.insert(spec.name, value.clamp(spec.min, spec.max));
        true
    }

    /// The effect type.
    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    /// Current value of `name`, falling back to the default.
    pub fn value(&self, name: &str) -> Option<f32> {
        let spec = self.kind.param_spec(name)?;
        Some(self.values.get(spec.name).copied().unwrap_or(spec.default))
    }

    /// All parameter values in declaration order, defaults filled in.
    pub fn resolved(&self) -> Vec<(&'static str, f32)> {
        self.kind
            .params()
            .iter()
            .map(|p| (p.name, self.values.get(p.name).copied().unwrap_or(p.default)))
            .collect()
    }
}
