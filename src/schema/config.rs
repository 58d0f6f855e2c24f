//! Configuration types for tensegrity growth and physics parameters.
//!
//! Role lengths default to the classic expanded-octahedron proportions: a push
//! of length PHI spans a brick whose triangle cables have unit length.

use serde::{Deserialize, Serialize};

use super::{EvolutionConfig, EvolutionConfigError, Tenscript, TenscriptError};

/// The golden ratio, length of a push in a unit brick.
pub const PHI: f32 = 1.618_034;
/// Square root of two.
pub const ROOT2: f32 = std::f32::consts::SQRT_2;
/// Square root of three.
pub const ROOT3: f32 = 1.732_050_8;

fn default_gravity() -> f32 {
    1e-5
}
fn default_drag() -> f32 {
    0.02
}
fn default_stiffness() -> f32 {
    0.02
}
fn default_push_over_pull() -> f32 {
    4.0
}
fn default_pretenst_factor() -> f32 {
    0.03
}
fn default_pretenst_countdown() -> u32 {
    3000
}
fn default_floor_friction() -> f32 {
    0.5
}

/// Numeric integration parameters for the scalar physics engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Downward acceleration per tick, applied from `Pretensing` onward.
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Fraction of velocity removed each tick (0.0-1.0).
    #[serde(default = "default_drag")]
    pub drag: f32,
    /// Spring constant of a pull interval.
    #[serde(default = "default_stiffness")]
    pub stiffness: f32,
    /// Push stiffness relative to pull stiffness.
    #[serde(default = "default_push_over_pull")]
    pub push_over_pull: f32,
    /// Fractional lengthening of every push while pretensing.
    #[serde(default = "default_pretenst_factor")]
    pub pretenst_factor: f32,
    /// Ticks taken to reach full pretension.
    #[serde(default = "default_pretenst_countdown")]
    pub pretenst_countdown: u32,
    /// Horizontal velocity lost by a joint touching the floor (0.0-1.0).
    #[serde(default = "default_floor_friction")]
    pub floor_friction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            drag: default_drag(),
            stiffness: default_stiffness(),
            push_over_pull: default_push_over_pull(),
            pretenst_factor: default_pretenst_factor(),
            pretenst_countdown: default_pretenst_countdown(),
            floor_friction: default_floor_friction(),
        }
    }
}

impl PhysicsConfig {
    /// Validate physics parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.drag) {
            return Err(ConfigError::InvalidDrag(self.drag));
        }
        if self.stiffness <= 0.0 || self.push_over_pull <= 0.0 {
            return Err(ConfigError::InvalidStiffness);
        }
        if !(0.0..=1.0).contains(&self.floor_friction) {
            return Err(ConfigError::InvalidFriction(self.floor_friction));
        }
        Ok(())
    }
}

fn default_push_length() -> f32 {
    PHI
}
fn default_triangle_length() -> f32 {
    1.0
}
fn default_ring_length() -> f32 {
    (2.0 - 2.0 * (2.0_f32 / 3.0).sqrt()).sqrt()
}
fn default_cross_length() -> f32 {
    let cross1 = 0.5;
    let cross2 = (PHI / 3.0 - 1.0 / 6.0) * ROOT3;
    let cross3 = PHI / 3.0 * ROOT3 - 1.0 + ROOT2 / ROOT3;
    (cross1 * cross1 + cross2 * cross2 + cross3 * cross3).sqrt()
}
fn default_bow_mid_length() -> f32 {
    0.4
}
fn default_bow_end_length() -> f32 {
    0.6
}
fn default_interval_countdown() -> f32 {
    1000.0
}

/// Rest lengths per interval role and the countdown budget for length changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    #[serde(default = "default_push_length")]
    pub push_length: f32,
    #[serde(default = "default_triangle_length")]
    pub triangle_length: f32,
    #[serde(default = "default_ring_length")]
    pub ring_length: f32,
    #[serde(default = "default_cross_length")]
    pub cross_length: f32,
    #[serde(default = "default_bow_mid_length")]
    pub bow_mid_length: f32,
    #[serde(default = "default_bow_end_length")]
    pub bow_end_length: f32,
    /// Ticks spent per unit of length change when an interval changes target.
    #[serde(default = "default_interval_countdown")]
    pub interval_countdown: f32,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            push_length: default_push_length(),
            triangle_length: default_triangle_length(),
            ring_length: default_ring_length(),
            cross_length: default_cross_length(),
            bow_mid_length: default_bow_mid_length(),
            bow_end_length: default_bow_end_length(),
            interval_countdown: default_interval_countdown(),
        }
    }
}

impl FabricConfig {
    /// Validate role lengths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lengths = [
            ("push", self.push_length),
            ("triangle", self.triangle_length),
            ("ring", self.ring_length),
            ("cross", self.cross_length),
            ("bow-mid", self.bow_mid_length),
            ("bow-end", self.bow_end_length),
        ];
        for (role, length) in lengths {
            if length <= 0.0 {
                return Err(ConfigError::InvalidLength { role, length });
            }
        }
        if self.interval_countdown < 0.0 {
            return Err(ConfigError::InvalidCountdown);
        }
        Ok(())
    }
}

fn default_connector_length() -> f32 {
    0.05
}
fn default_connector_target() -> f32 {
    0.01
}
fn default_distancer_factor() -> f32 {
    0.75
}
fn default_brick_gap() -> f32 {
    0.3
}

/// Parameters of the growth process that are not part of a tenscript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthConfig {
    /// Apex distance at or below which a connector merges its faces.
    #[serde(default = "default_connector_length")]
    pub connector_length: f32,
    /// Target length given to a connector axis.
    #[serde(default = "default_connector_target")]
    pub connector_target: f32,
    /// Fraction of its initial length a distancer axis grows by.
    #[serde(default = "default_distancer_factor")]
    pub distancer_factor: f32,
    /// Clearance between a face and the base of a brick grown on it.
    #[serde(default = "default_brick_gap")]
    pub brick_gap: f32,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            connector_length: default_connector_length(),
            connector_target: default_connector_target(),
            distancer_factor: default_distancer_factor(),
            brick_gap: default_brick_gap(),
        }
    }
}

impl GrowthConfig {
    /// Validate growth parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connector_length <= 0.0 {
            return Err(ConfigError::InvalidConnectorLength(self.connector_length));
        }
        if self.distancer_factor <= 0.0 {
            return Err(ConfigError::InvalidDistancerFactor(self.distancer_factor));
        }
        if self.brick_gap < 0.0 {
            return Err(ConfigError::InvalidBrickGap(self.brick_gap));
        }
        Ok(())
    }
}

fn default_target_distance() -> f32 {
    7.0
}

/// Top-level experiment document: what to grow and, optionally, how to evolve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    /// Growth program.
    pub tenscript: Tenscript,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub fabric: FabricConfig,
    #[serde(default)]
    pub growth: GrowthConfig,
    /// Distance along +x of the target runners race towards.
    #[serde(default = "default_target_distance")]
    pub target_distance: f32,
    /// Evolution settings, if the grown structure should be evolved.
    #[serde(default)]
    pub evolution: Option<EvolutionConfig>,
}

impl Default for Experiment {
    fn default() -> Self {
        Self {
            tenscript: Tenscript::default(),
            physics: PhysicsConfig::default(),
            fabric: FabricConfig::default(),
            growth: GrowthConfig::default(),
            target_distance: default_target_distance(),
            evolution: Some(EvolutionConfig::default()),
        }
    }
}

impl Experiment {
    /// Validate every section of the experiment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tenscript.validate()?;
        self.physics.validate()?;
        self.fabric.validate()?;
        self.growth.validate()?;
        if let Some(evolution) = &self.evolution {
            evolution.validate()?;
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Drag {0} must be in [0, 1)")]
    InvalidDrag(f32),
    #[error("Stiffness and push-over-pull must be positive")]
    InvalidStiffness,
    #[error("Floor friction {0} must be in [0, 1]")]
    InvalidFriction(f32),
    #[error("Length {length} of role {role} must be positive")]
    InvalidLength { role: &'static str, length: f32 },
    #[error("Interval countdown must be non-negative")]
    InvalidCountdown,
    #[error("Connector length {0} must be positive")]
    InvalidConnectorLength(f32),
    #[error("Distancer factor {0} must be positive")]
    InvalidDistancerFactor(f32),
    #[error("Brick gap {0} must be non-negative")]
    InvalidBrickGap(f32),
    #[error("Tenscript rejected: {0}")]
    Tenscript(#[from] TenscriptError),
    #[error("Evolution config rejected: {0}")]
    Evolution(#[from] EvolutionConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_experiment_valid() {
        let experiment = Experiment::default();
        assert!(experiment.validate().is_ok());
    }

    #[test]
    fn test_role_lengths() {
        let fabric = FabricConfig::default();
        assert!((fabric.ring_length - 0.6058).abs() < 1e-3);
        assert!((fabric.cross_length - 1.1091).abs() < 1e-3);
        assert!(fabric.push_length > fabric.cross_length);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let json = r#"{ "tenscript": { "name": "pillar", "tree": { "steps": 3 } } }"#;
        let experiment: Experiment = serde_json::from_str(json).unwrap();
        assert_eq!(experiment.tenscript.tree.steps, 3);
        assert_eq!(experiment.growth.distancer_factor, 0.75);
        assert!(experiment.evolution.is_none());
    }

    #[test]
    fn test_invalid_drag() {
        let physics = PhysicsConfig {
            drag: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            physics.validate(),
            Err(ConfigError::InvalidDrag(_))
        ));
    }
}
