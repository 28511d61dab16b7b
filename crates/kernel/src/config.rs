use mizu_common::{Error, ParticleKind, Result};
use serde::{Deserialize, Serialize};

/// Tunable constants of the simulation.
///
/// Glyph sizes are the rendered widths of the atom labels at a 24px font and
/// double as collision diameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Magnitude of the random impulse added to H/O velocity every tick.
    pub impulse: f64,
    /// Upper bound on H/O speed; faster velocities are rescaled to it.
    pub max_speed: f64,
    /// Uniform multiplier applied to every particle size.
    pub scale: f64,
    /// Size of a free hydrogen ("H").
    pub hydrogen_size: f64,
    /// Size of a merged hydrogen ("H2"), applied on merge.
    pub merged_hydrogen_size: f64,
    /// Size of an oxygen ("O").
    pub oxygen_size: f64,
    /// Smallest droplet size before scaling.
    pub droplet_base: f64,
    /// Random spread added on top of `droplet_base`.
    pub droplet_spread: f64,
    /// Fraction of its own size a droplet falls per tick.
    pub fall_rate: f64,
    /// Upper bound of the random phase noise in the droplet sway.
    pub drift_noise: f64,
    /// Vertical distance of one radian of droplet sway.
    pub drift_period: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            impulse: 0.075,
            max_speed: 1.05,
            scale: 1.0,
            hydrogen_size: 17.33,
            merged_hydrogen_size: 30.67,
            oxygen_size: 18.67,
            droplet_base: 18.0,
            droplet_spread: 10.0,
            fall_rate: 0.1,
            drift_noise: 5.0,
            drift_period: 100.0,
        }
    }
}

impl SimConfig {
    /// Check every value is finite and inside its usable range.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_speed", self.max_speed),
            ("scale", self.scale),
            ("hydrogen_size", self.hydrogen_size),
            ("merged_hydrogen_size", self.merged_hydrogen_size),
            ("oxygen_size", self.oxygen_size),
            ("droplet_base", self.droplet_base),
            ("fall_rate", self.fall_rate),
            ("drift_period", self.drift_period),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be finite and > 0, got {value}"
                )));
            }
        }
        let non_negative = [
            ("impulse", self.impulse),
            ("droplet_spread", self.droplet_spread),
            ("drift_noise", self.drift_noise),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Scaled size of a freshly created atom. Droplets are sized randomly by
    /// the factory and return `None` here.
    pub fn atom_size(&self, kind: ParticleKind) -> Option<f64> {
        match kind {
            ParticleKind::Hydrogen => Some(self.hydrogen_size * self.scale),
            ParticleKind::Oxygen => Some(self.oxygen_size * self.scale),
            ParticleKind::Water => None,
        }
    }

    /// Scaled size of a hydrogen after it merged.
    pub fn merged_size(&self) -> f64 {
        self.merged_hydrogen_size * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn negative_speed_rejected() {
        let cfg = SimConfig {
            max_speed: -1.0,
            ..SimConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_speed"));
    }

    #[test]
    fn nan_impulse_rejected() {
        let cfg = SimConfig {
            impulse: f64::NAN,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_impulse_allowed() {
        let cfg = SimConfig {
            impulse: 0.0,
            ..SimConfig::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn sizes_follow_scale() {
        let cfg = SimConfig {
            scale: 2.0,
            ..SimConfig::default()
        };
        assert_eq!(cfg.atom_size(ParticleKind::Hydrogen), Some(34.66));
        assert_eq!(cfg.atom_size(ParticleKind::Oxygen), Some(37.34));
        assert_eq!(cfg.atom_size(ParticleKind::Water), None);
        assert_eq!(cfg.merged_size(), 61.34);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: SimConfig = serde_json::from_str(r#"{"scale": 1.5}"#).unwrap();
        assert_eq!(cfg.scale, 1.5);
        assert_eq!(cfg.impulse, 0.075);
        assert_eq!(cfg.max_speed, 1.05);
    }
}
