use thiserror::Error;

use crate::types::ParticleKind;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the simulation core.
///
/// None of these are expected at runtime in a correctly wired embedding; they
/// flag programmer errors and propagate to the caller untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A particle kind name that is not one of `H`, `O` or `H2O`.
    #[error("invalid particle kind: {0:?}")]
    InvalidKind(String),

    /// A kind that can only be created at an explicit site was requested without one.
    #[error("{0} particles must be created at an explicit position")]
    MissingPosition(ParticleKind),

    /// Simulation area that is not finite and strictly positive.
    #[error("invalid bounds: {width} x {height}")]
    InvalidBounds { width: f64, height: f64 },

    /// Configuration value outside its valid range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_kind_names_the_input() {
        let msg = Error::InvalidKind("X".into()).to_string();
        assert!(msg.contains("invalid particle kind"));
        assert!(msg.contains("\"X\""));
    }

    #[test]
    fn missing_position_names_the_kind() {
        let msg = Error::MissingPosition(ParticleKind::Water).to_string();
        assert_eq!(msg, "H2O particles must be created at an explicit position");
    }
}
