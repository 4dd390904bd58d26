use thiserror::Error;

/// Errors raised by the building energy model core.
///
/// Construction and deserialization errors are raised before any simulation
/// starts. `Fatal` is the terminal outcome of a step whose indoor conditions
/// left their physical bounds; unmet HVAC load is never an error and is
/// reported through the building state instead.
#[derive(Debug, Error)]
pub enum BemError {
    #[error("Invalid material '{name}': {reason}")]
    InvalidMaterial { name: String, reason: String },
    #[error("Invalid element '{name}': {reason}")]
    InvalidElement { name: String, reason: String },
    #[error("Invalid building parameter: {0}")]
    InvalidBuilding(String),
    #[error("Invalid urban geometry: {0}")]
    InvalidGeometry(String),
    #[error("Expected mapping of type '{expected}' but found type '{found}'")]
    TypeTagMismatch { expected: String, found: String },
    #[error("Unsupported {entity} format version {found} (supported: {supported})")]
    UnsupportedVersion {
        entity: &'static str,
        found: u32,
        supported: u32,
    },
    #[error("Could not deserialize {entity}: {message}")]
    Deserialization {
        entity: &'static str,
        message: String,
    },
    #[error("Could not serialize {entity}: {message}")]
    Serialization {
        entity: &'static str,
        message: String,
    },
    #[error(
        "Timestep of {dt}s exceeds the stable limit of {limit}s for layer {layer} of element '{name}'"
    )]
    UnstableTimestep {
        name: String,
        layer: usize,
        dt: f64,
        limit: f64,
    },
    #[error("Conduction system for element '{0}' could not be solved")]
    SingularSystem(String),
    #[error("Building must be autosized before it can be simulated")]
    NotSized,
    #[error("Building parameters can only be overridden before autosizing")]
    AlreadySized,
    #[error("Building is in a faulted state after a fatal error and cannot be stepped")]
    Faulted,
    #[error(
        "FATAL ERROR at step {step}: indoor conditions out of bounds (temperature {indoor_temp}K, humidity ratio {indoor_hum}kg/kg)"
    )]
    Fatal {
        step: usize,
        indoor_temp: f64,
        indoor_hum: f64,
    },
    #[error("Psychrometric calculation failed: {0}")]
    Psychrometrics(#[from] crate::core::units::BelowAbsoluteZeroError),
}

impl BemError {
    pub(crate) fn deserialization(entity: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Deserialization {
            entity,
            message: err.to_string(),
        }
    }

    /// Whether this error ends the simulation run for the building that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::Faulted)
    }
}
