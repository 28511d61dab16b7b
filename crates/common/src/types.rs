use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The three particle populations of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParticleKind {
    Hydrogen,
    Oxygen,
    Water,
}

impl ParticleKind {
    pub const ALL: [ParticleKind; 3] = [Self::Hydrogen, Self::Oxygen, Self::Water];

    /// Chemical symbol used as the kind's canonical name.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Hydrogen => "H",
            Self::Oxygen => "O",
            Self::Water => "H2O",
        }
    }
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ParticleKind {
    type Err = Error;

    /// Accepts the chemical symbols; `H2o` is also accepted for water.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "H" => Ok(Self::Hydrogen),
            "O" => Ok(Self::Oxygen),
            "H2O" | "H2o" => Ok(Self::Water),
            other => Err(Error::InvalidKind(other.to_string())),
        }
    }
}

/// Fixed rectangular simulation area with its origin at the top-left corner.
///
/// Fields are private so the area cannot change once a world holds it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    width: f64,
    height: f64,
}

impl Bounds {
    /// Validate and build an area. Both sides must be finite and > 0.
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(Error::InvalidBounds { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
