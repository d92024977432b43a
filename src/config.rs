use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::EnvironmentError;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvConfig {
    pub num_envs: usize,
    pub max_episode_length: u32,
    pub enable_debug_vis: bool,
    pub env_spacing: f64,
    pub seed: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            num_envs: 64,
            max_episode_length: 500,
            enable_debug_vis: false,
            env_spacing: 1.25,
            seed: 42,
        }
    }
}

/// Draw ranges for new targets: x, y ~ U(0, xyRange), z ~ U(zMin, zMin + zRange).
///
/// The defaults reproduce the near-degenerate spread the task was tuned with;
/// widen them to make the task spatially meaningful.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetConfig {
    pub xy_range: f64,
    pub z_min: f64,
    pub z_range: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            xy_range: 0.001,
            z_min: 1.0,
            z_range: 0.01,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Per-rotor thrust limit in newtons.
    pub max_thrust: f64,
    /// Body-rate command limits in rad/s, per axis.
    pub max_body_rate: [f64; 3],
    /// Proportional gains of the body-rate loop, per axis (1/s).
    pub rate_gains: [f64; 3],
    /// Principal moments of inertia (kg m^2).
    pub inertia_diagonal: [f64; 3],
    /// Rotor arm half-spacing along each body axis (m).
    pub rotor_offset: f64,
    /// Rotor drag-to-thrust ratio used for yaw allocation.
    pub rotor_torque_coefficient: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            max_thrust: 2.0,
            max_body_rate: [4.0 * std::f64::consts::PI; 3],
            rate_gains: [20.0, 20.0, 18.0],
            inertia_diagonal: [1.4e-5, 1.4e-5, 2.17e-5],
            rotor_offset: 0.0325,
            rotor_torque_coefficient: 0.0059,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct DragConfig {
    /// Quadratic drag coefficient opposing linear velocity of the drone body.
    pub coefficient: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        DragConfig { coefficient: 0.02 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CrazyflieEnvironmentConfig {
    pub env: EnvConfig,
    pub target: TargetConfig,
    pub controller: ControllerConfig,
    pub drag: DragConfig,
}

impl CrazyflieEnvironmentConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, EnvironmentError> {
        let contents = fs::read_to_string(path)?;
        let config: CrazyflieEnvironmentConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), EnvironmentError> {
        let yaml_string = serde_yaml::to_string(self)?;
        fs::write(path, yaml_string)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), EnvironmentError> {
        if self.env.num_envs == 0 {
            return Err(EnvironmentError::InvalidConfig(
                "numEnvs must be at least 1".to_string(),
            ));
        }
        if self.env.max_episode_length == 0 {
            return Err(EnvironmentError::InvalidConfig(
                "maxEpisodeLength must be at least 1".to_string(),
            ));
        }
        if self.target.xy_range < 0.0 || self.target.z_range < 0.0 {
            return Err(EnvironmentError::InvalidConfig(
                "target draw ranges must be non-negative".to_string(),
            ));
        }
        if self.controller.max_thrust <= 0.0 {
            return Err(EnvironmentError::InvalidConfig(
                "maxThrust must be positive".to_string(),
            ));
        }
        if self.drag.coefficient < 0.0 {
            return Err(EnvironmentError::InvalidConfig(
                "drag coefficient must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
