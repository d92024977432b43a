mod actors;
mod config;
mod controller;
mod errors;
mod observation_info_utils;
mod physics;
mod reward;

use log::{debug, info};
use nalgebra::Vector3;
use numpy::{PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple, PyType};
use pyo3::IntoPyObjectExt;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub use actors::{actor_index, Actor, Drone, Marker, RootState, BODIES_PER_ENV, DRONE_SLOT, MARKER_SLOT};
pub use config::{
    ControllerConfig, CrazyflieEnvironmentConfig, DragConfig, EnvConfig, TargetConfig,
};
pub use controller::{rotor_layout, CascadedRateController, ControlOutput, RateThrustController};
pub use errors::{ensure_shape, EnvironmentError};
pub use observation_info_utils::{Information, Observation};
pub use physics::{PhysicsEngine, PyPhysicsEngine};
pub use reward::{
    compute_reward_and_reset, reward_terms, RewardTerms, MAX_TARGET_DISTANCE, MIN_FLIGHT_HEIGHT,
};

/// Targets are re-drawn whenever an episode's step count crosses this boundary.
pub const TARGET_RESET_INTERVAL: u32 = 500;
/// Spawn height of the drone's stored initial pose.
pub const DEFAULT_SPAWN_HEIGHT: f64 = 1.0;

/// Result of one environment step.
#[derive(Debug)]
pub struct StepOutcome {
    pub observation: Observation,
    pub rewards: Vec<f64>,
    pub resets: Vec<bool>,
}

/// One line segment of rotor-thrust debug geometry, in env-local coordinates.
#[derive(Clone, Copy, Debug)]
pub struct DebugLine {
    pub start: Vector3<f64>,
    pub end: Vector3<f64>,
}

// Batched Crazyflie hover environment. Owns all per-environment state; the
// physics engine is an external collaborator handed to `reset` and `step`.
pub struct CrazyflieEnvironment {
    config: CrazyflieEnvironmentConfig,
    drones: Vec<Drone>,
    markers: Vec<Marker>,
    target_positions: Vec<Vector3<f64>>,
    progress: Vec<u32>,
    reset_flags: Vec<bool>,
    controller: Box<dyn RateThrustController + Send + Sync>,
    rng: ChaCha8Rng,
    // scratch buffers, env-major over bodies
    forces: Vec<Vector3<f64>>,
    friction: Vec<Vector3<f64>>,
    torques: Vec<Vector3<f64>>,
    resets_this_step: usize,
    retargets_this_step: usize,
}

impl CrazyflieEnvironment {
    pub fn new(config: CrazyflieEnvironmentConfig) -> Result<Self, EnvironmentError> {
        let controller = Box::new(CascadedRateController::new(
            config.env.num_envs,
            &config.controller,
        )?);
        Self::with_controller(config, controller)
    }

    /// Build the environment around an externally supplied controller.
    pub fn with_controller(
        config: CrazyflieEnvironmentConfig,
        controller: Box<dyn RateThrustController + Send + Sync>,
    ) -> Result<Self, EnvironmentError> {
        config.validate()?;
        let num_envs = config.env.num_envs;
        let spawn = Vector3::new(0.0, 0.0, DEFAULT_SPAWN_HEIGHT);
        let initial_state = RootState::at_position(spawn);

        info!(
            "creating crazyflie environment: {} instances, episode cap {}",
            num_envs, config.env.max_episode_length
        );

        Ok(CrazyflieEnvironment {
            drones: (0..num_envs).map(|i| Drone::new(i, initial_state)).collect(),
            markers: (0..num_envs).map(|i| Marker::new(i, spawn)).collect(),
            target_positions: vec![spawn; num_envs],
            progress: vec![0; num_envs],
            reset_flags: vec![false; num_envs],
            controller,
            rng: ChaCha8Rng::seed_from_u64(config.env.seed),
            forces: vec![Vector3::zeros(); num_envs * BODIES_PER_ENV],
            friction: vec![Vector3::zeros(); num_envs * BODIES_PER_ENV],
            torques: vec![Vector3::zeros(); num_envs],
            resets_this_step: 0,
            retargets_this_step: 0,
            config,
        })
    }

    pub fn num_envs(&self) -> usize {
        self.config.env.num_envs
    }

    pub fn config(&self) -> &CrazyflieEnvironmentConfig {
        &self.config
    }

    pub fn drones(&self) -> &[Drone] {
        &self.drones
    }

    pub fn target_positions(&self) -> &[Vector3<f64>] {
        &self.target_positions
    }

    pub fn marker_positions(&self) -> Vec<Vector3<f64>> {
        self.markers.iter().map(|m| m.position).collect()
    }

    pub fn progress(&self) -> &[u32] {
        &self.progress
    }

    /// Draw new targets for the given environments and mirror them into the
    /// markers. Returns the affected marker actor indices.
    pub fn set_targets(&mut self, env_ids: &[usize]) -> Vec<usize> {
        let target = &self.config.target;
        for &i in env_ids {
            let x = draw(&mut self.rng, target.xy_range);
            let y = draw(&mut self.rng, target.xy_range);
            let z = target.z_min + draw(&mut self.rng, target.z_range);
            let position = Vector3::new(x, y, z);
            self.target_positions[i] = position;
            self.markers[i].move_to(position);
        }
        env_ids
            .iter()
            .map(|&i| actor_index(i, MARKER_SLOT))
            .collect()
    }

    /// Restore the stored initial pose of the given environments, re-draw their
    /// targets and clear their episode bookkeeping. Returns the sorted,
    /// deduplicated union of affected actor indices for one indexed engine write.
    pub fn reset_envs(&mut self, env_ids: &[usize]) -> Vec<usize> {
        let mut indices = self.set_targets(env_ids);
        for &i in env_ids {
            self.drones[i].reset_to_initial();
            self.reset_flags[i] = false;
            self.progress[i] = 0;
            indices.push(actor_index(i, DRONE_SLOT));
        }
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Reset every environment and push the fresh states into the engine.
    pub fn reset(
        &mut self,
        engine: &mut dyn PhysicsEngine,
    ) -> Result<Observation, EnvironmentError> {
        self.check_engine(engine)?;
        let all: Vec<usize> = (0..self.num_envs()).collect();
        let touched = self.reset_envs(&all);
        let states = self.gather_states(&touched);
        engine.write_root_states(&touched, &states)?;
        self.resets_this_step = all.len();
        self.retargets_this_step = all.len();
        info!("reset all {} environments", all.len());
        Ok(self.observation())
    }

    /// Advance the batch by one step: resolve targets and resets, run the
    /// controller, apply forces, step the engine and evaluate reward and
    /// termination on the refreshed states.
    pub fn step(
        &mut self,
        actions: &[[f64; 4]],
        engine: &mut dyn PhysicsEngine,
    ) -> Result<StepOutcome, EnvironmentError> {
        self.check_engine(engine)?;
        let num_envs = self.num_envs();
        ensure_shape("actions", num_envs, actions.len())?;

        // Periodic target refresh; environments about to be fully reset get
        // their draw from the reset path instead, never twice.
        let retarget_ids: Vec<usize> = (0..num_envs)
            .filter(|&i| self.due_for_retarget(i))
            .collect();
        let mut touched = self.set_targets(&retarget_ids);

        let reset_ids: Vec<usize> = (0..num_envs).filter(|&i| self.reset_flags[i]).collect();
        touched.extend(self.reset_envs(&reset_ids));
        touched.sort_unstable();
        touched.dedup();

        if !touched.is_empty() {
            debug!(
                "pushing {} root state writes ({} retargets, {} resets)",
                touched.len(),
                retarget_ids.len(),
                reset_ids.len()
            );
            let states = self.gather_states(&touched);
            engine.write_root_states(&touched, &states)?;
        }
        self.retargets_this_step = retarget_ids.len() + reset_ids.len();
        self.resets_this_step = reset_ids.len();

        // Controller sees post-reset states.
        let orientations: Vec<_> = self.drones.iter().map(|d| d.state.orientation).collect();
        let linear_velocities: Vec<_> =
            self.drones.iter().map(|d| d.state.linear_velocity).collect();
        let angular_velocities: Vec<_> =
            self.drones.iter().map(|d| d.state.angular_velocity).collect();
        let output = self.controller.update(
            actions,
            &orientations,
            &linear_velocities,
            &angular_velocities,
        )?;
        ensure_shape("controller torques", num_envs, output.torques.len())?;
        ensure_shape(
            "controller thrust forces",
            num_envs,
            output.thrust_forces.len(),
        )?;

        // Quadratic friction opposes the drone body's linear velocity.
        let k = self.config.drag.coefficient;
        for i in 0..num_envs {
            let v = self.drones[i].state.linear_velocity;
            self.friction[actor_index(i, DRONE_SLOT)] =
                v.map(|c| -k * c.signum() * c * c);
            self.friction[actor_index(i, MARKER_SLOT)] = Vector3::zeros();
        }

        // Thrust and friction buffers must cover the same bodies.
        ensure_shape("friction", self.forces.len(), self.friction.len())?;
        for i in 0..num_envs {
            let drone_body = actor_index(i, DRONE_SLOT);
            self.forces[drone_body] = output.thrust_forces[i] + self.friction[drone_body];
            self.forces[actor_index(i, MARKER_SLOT)] = Vector3::zeros();
            self.torques[i] = output.torques[i];
        }

        // Don't actuate states that were just overwritten.
        for &i in &reset_ids {
            self.forces[actor_index(i, DRONE_SLOT)] = Vector3::zeros();
            self.torques[i] = Vector3::zeros();
        }

        engine.apply_body_forces(&self.forces, &self.torques)?;
        engine.step()?;

        let mut refreshed = vec![RootState::default(); num_envs * BODIES_PER_ENV];
        engine.read_root_states(&mut refreshed)?;
        for i in 0..num_envs {
            self.drones[i].state = refreshed[actor_index(i, DRONE_SLOT)];
        }

        for steps in &mut self.progress {
            *steps += 1;
        }

        let observation = self.observation();
        let positions: Vec<_> = self.drones.iter().map(|d| d.state.position).collect();
        let angular_velocities: Vec<_> =
            self.drones.iter().map(|d| d.state.angular_velocity).collect();
        let orientations: Vec<_> = self.drones.iter().map(|d| d.state.orientation).collect();
        let (rewards, resets) = compute_reward_and_reset(
            &positions,
            &self.target_positions,
            &orientations,
            &angular_velocities,
            &self.progress,
            self.config.env.max_episode_length,
        );
        self.reset_flags.copy_from_slice(&resets);

        Ok(StepOutcome {
            observation,
            rewards,
            resets,
        })
    }

    pub fn observation(&self) -> Observation {
        let num_envs = self.num_envs();
        let mut target_offsets = Vec::with_capacity(num_envs);
        let mut orientations = Vec::with_capacity(num_envs);
        let mut linear_velocities = Vec::with_capacity(num_envs);
        let mut angular_velocities = Vec::with_capacity(num_envs);

        for i in 0..num_envs {
            let state = &self.drones[i].state;
            target_offsets.push((self.target_positions[i] - state.position) / 3.0);
            let q = state.orientation.coords;
            orientations.push([q.x, q.y, q.z, q.w]);
            linear_velocities.push(state.linear_velocity / 2.0);
            angular_velocities.push(state.angular_velocity / std::f64::consts::PI);
        }

        Observation {
            target_offsets,
            orientations,
            linear_velocities,
            angular_velocities,
        }
    }

    pub fn get_information(&self) -> Information {
        let total: f64 = self
            .drones
            .iter()
            .zip(&self.target_positions)
            .map(|(d, t)| (t - d.state.position).norm())
            .sum();
        Information {
            resets_this_step: self.resets_this_step,
            retargets_this_step: self.retargets_this_step,
            mean_target_distance: total / self.num_envs() as f64,
        }
    }

    /// Rotor-thrust debug geometry for the last step, empty unless
    /// `enableDebugVis` is set and the controller models rotors.
    pub fn debug_thrust_lines(&self) -> Vec<DebugLine> {
        if !self.config.env.enable_debug_vis {
            return Vec::new();
        }
        let Some(rotor_thrusts) = self.controller.rotor_thrusts() else {
            return Vec::new();
        };
        let offsets = rotor_layout(self.config.controller.rotor_offset);

        let mut lines = Vec::with_capacity(self.num_envs() * offsets.len());
        for (drone, thrusts) in self.drones.iter().zip(rotor_thrusts) {
            let orientation = drone.state.orientation;
            let down = -(orientation * Vector3::z());
            for (offset, thrust) in offsets.iter().zip(thrusts) {
                let start = drone.state.position + orientation * offset;
                lines.push(DebugLine {
                    start,
                    end: start + 0.1 * *thrust * down,
                });
            }
        }
        lines
    }

    fn due_for_retarget(&self, env_index: usize) -> bool {
        self.progress[env_index] % TARGET_RESET_INTERVAL == 0 && !self.reset_flags[env_index]
    }

    fn check_engine(&self, engine: &dyn PhysicsEngine) -> Result<(), EnvironmentError> {
        ensure_shape("engine environments", self.num_envs(), engine.num_envs())?;
        ensure_shape("engine bodies per env", BODIES_PER_ENV, engine.bodies_per_env())?;
        Ok(())
    }

    fn gather_states(&self, actor_indices: &[usize]) -> Vec<RootState> {
        actor_indices
            .iter()
            .map(|&index| {
                let env_index = index / BODIES_PER_ENV;
                if index % BODIES_PER_ENV == DRONE_SLOT {
                    self.drones[env_index].state
                } else {
                    self.markers[env_index].root_state()
                }
            })
            .collect()
    }

    #[cfg(test)]
    fn force_reset_flag(&mut self, env_index: usize) {
        self.reset_flags[env_index] = true;
    }
}

fn draw(rng: &mut ChaCha8Rng, range: f64) -> f64 {
    if range > 0.0 {
        rng.gen_range(0.0..range)
    } else {
        0.0
    }
}

fn to_py_err(err: EnvironmentError) -> PyErr {
    match &err {
        EnvironmentError::Io(_) | EnvironmentError::Serialization(_) => {
            pyo3::exceptions::PyIOError::new_err(err.to_string())
        }
        _ => pyo3::exceptions::PyValueError::new_err(err.to_string()),
    }
}

#[pyclass]
struct CrazyflieEnvironmentWrapper {
    environment: CrazyflieEnvironment,
    engine: PyPhysicsEngine,
}

#[pymethods]
impl CrazyflieEnvironmentWrapper {
    #[new]
    fn new(
        engine: Py<PyAny>,
        num_envs: usize,
        max_episode_length: u32,
        enable_debug_vis: bool,
        env_spacing: f64,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let mut config = CrazyflieEnvironmentConfig::default();
        config.env.num_envs = num_envs;
        config.env.max_episode_length = max_episode_length;
        config.env.enable_debug_vis = enable_debug_vis;
        config.env.env_spacing = env_spacing;
        if let Some(seed) = seed {
            config.env.seed = seed;
        }
        Ok(CrazyflieEnvironmentWrapper {
            environment: CrazyflieEnvironment::new(config).map_err(to_py_err)?,
            engine: PyPhysicsEngine::new(engine, num_envs),
        })
    }

    #[classmethod]
    fn from_yaml_config(
        _cls: &Bound<'_, PyType>,
        engine: Py<PyAny>,
        config_path: String,
    ) -> PyResult<Self> {
        match CrazyflieEnvironmentConfig::from_yaml_file(config_path) {
            Ok(config) => {
                let num_envs = config.env.num_envs;
                Ok(CrazyflieEnvironmentWrapper {
                    environment: CrazyflieEnvironment::new(config).map_err(to_py_err)?,
                    engine: PyPhysicsEngine::new(engine, num_envs),
                })
            }
            Err(e) => Err(pyo3::exceptions::PyIOError::new_err(format!(
                "Failed to load config: {}",
                e
            ))),
        }
    }

    fn reset(&mut self) -> PyResult<Py<PyDict>> {
        let observation = self
            .environment
            .reset(&mut self.engine)
            .map_err(to_py_err)?;
        Python::with_gil(|py| observation.to_numpy_dict(py))
    }

    /// Take a step in the environment. Actions are an (num_envs, 4) float array;
    /// returns (observation dict, rewards, resets, info) in numpy format.
    fn step<'py>(
        &mut self,
        py: Python<'py>,
        actions: PyReadonlyArray2<'py, f64>,
    ) -> PyResult<Py<PyTuple>> {
        let view = actions.as_array();
        let (rows, cols) = view.dim();
        ensure_shape("action rows", self.environment.num_envs(), rows).map_err(to_py_err)?;
        ensure_shape("action columns", 4, cols).map_err(to_py_err)?;

        let mut batch = vec![[0.0; 4]; rows];
        for i in 0..rows {
            for j in 0..4 {
                batch[i][j] = view[[i, j]];
            }
        }

        let outcome = self
            .environment
            .step(&batch, &mut self.engine)
            .map_err(to_py_err)?;

        let observation = outcome.observation.to_numpy_dict(py)?.into_py_any(py)?;
        let rewards =
            observation_info_utils::rewards_to_numpy(py, &outcome.rewards).into_py_any(py)?;
        let resets =
            observation_info_utils::resets_to_numpy(py, &outcome.resets).into_py_any(py)?;
        let info = self
            .environment
            .get_information()
            .to_py_dict(py)?
            .into_py_any(py)?;

        let result = PyTuple::new(py, &[observation, rewards, resets, info])?;
        Ok(result.unbind())
    }

    fn get_observation(&self) -> PyResult<Py<PyDict>> {
        Python::with_gil(|py| self.environment.observation().to_numpy_dict(py))
    }

    fn get_information(&self) -> PyResult<Py<PyDict>> {
        Python::with_gil(|py| self.environment.get_information().to_py_dict(py))
    }

    fn get_target_positions<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let rows: Vec<Vec<f64>> = self
            .environment
            .target_positions()
            .iter()
            .map(|t| vec![t.x, t.y, t.z])
            .collect();
        Ok(PyArray2::from_vec2(py, &rows)?)
    }

    /// Rotor thrust line segments as a (num_lines, 6) array of start/end triples.
    fn get_debug_thrust_lines<'py>(
        &self,
        py: Python<'py>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let rows: Vec<Vec<f64>> = self
            .environment
            .debug_thrust_lines()
            .iter()
            .map(|line| {
                vec![
                    line.start.x,
                    line.start.y,
                    line.start.z,
                    line.end.x,
                    line.end.y,
                    line.end.z,
                ]
            })
            .collect();
        Ok(PyArray2::from_vec2(py, &rows)?)
    }

    fn num_envs(&self) -> usize {
        self.environment.num_envs()
    }
}

// Python module definition
#[pymodule]
#[pyo3(name = "_lib")]
fn crazyflie_environment(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();
    m.add_class::<CrazyflieEnvironmentWrapper>()?;
    Ok(())
}
