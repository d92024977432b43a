use nalgebra::Vector3;
use numpy::{PyArray1, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

use crate::actors::{RootState, BODIES_PER_ENV};
use crate::errors::{ensure_shape, EnvironmentError};

/// Call contract to the external simulator.
///
/// The engine owns integration and collision handling; this crate only pushes
/// indexed state writes and per-step forces into it and reads refreshed root
/// states back. Body buffers are flattened env-major: the body in slot `s` of
/// environment `i` lives at `i * bodies_per_env + s`.
pub trait PhysicsEngine {
    fn num_envs(&self) -> usize;

    fn bodies_per_env(&self) -> usize;

    /// Overwrite the root states of the given actors in one indexed batch.
    fn write_root_states(
        &mut self,
        actor_indices: &[usize],
        states: &[RootState],
    ) -> Result<(), EnvironmentError>;

    /// Apply per-body forces and per-environment drone torques, both expressed
    /// in the body's local reference frame, for the upcoming step.
    fn apply_body_forces(
        &mut self,
        forces: &[Vector3<f64>],
        torques: &[Vector3<f64>],
    ) -> Result<(), EnvironmentError>;

    /// Advance the simulation by one step.
    fn step(&mut self) -> Result<(), EnvironmentError>;

    /// Read the refreshed root state of every actor into `out`.
    fn read_root_states(&self, out: &mut [RootState]) -> Result<(), EnvironmentError>;
}

fn engine_err(err: PyErr) -> EnvironmentError {
    EnvironmentError::Engine(err.to_string())
}

/// Adapter driving a Python-side simulator through the `PhysicsEngine` contract.
///
/// The wrapped object is duck-typed and must provide `set_actor_root_states
/// (indices, states)`, `apply_body_forces(forces, torques)`, `step()` and
/// `root_states()`; states cross the boundary as numpy arrays in the 13-wide
/// root-state layout.
pub struct PyPhysicsEngine {
    engine: Py<PyAny>,
    num_envs: usize,
}

impl PyPhysicsEngine {
    pub fn new(engine: Py<PyAny>, num_envs: usize) -> Self {
        PyPhysicsEngine { engine, num_envs }
    }
}

impl PhysicsEngine for PyPhysicsEngine {
    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn bodies_per_env(&self) -> usize {
        BODIES_PER_ENV
    }

    fn write_root_states(
        &mut self,
        actor_indices: &[usize],
        states: &[RootState],
    ) -> Result<(), EnvironmentError> {
        ensure_shape("root state writes", actor_indices.len(), states.len())?;
        Python::with_gil(|py| {
            let indices: Vec<i32> = actor_indices.iter().map(|&i| i as i32).collect();
            let indices = PyArray1::from_slice(py, &indices);

            let rows: Vec<Vec<f64>> = states.iter().map(|s| s.to_array().to_vec()).collect();
            let states = PyArray2::from_vec2(py, &rows).map_err(|e| {
                EnvironmentError::Engine(format!("root state rows are ragged: {e}"))
            })?;

            self.engine
                .bind(py)
                .call_method1("set_actor_root_states", (indices, states))
                .map_err(engine_err)?;
            Ok(())
        })
    }

    fn apply_body_forces(
        &mut self,
        forces: &[Vector3<f64>],
        torques: &[Vector3<f64>],
    ) -> Result<(), EnvironmentError> {
        ensure_shape("forces", self.num_envs * BODIES_PER_ENV, forces.len())?;
        ensure_shape("torques", self.num_envs, torques.len())?;
        Python::with_gil(|py| {
            let force_rows: Vec<Vec<f64>> =
                forces.iter().map(|f| vec![f.x, f.y, f.z]).collect();
            let torque_rows: Vec<Vec<f64>> =
                torques.iter().map(|t| vec![t.x, t.y, t.z]).collect();
            let forces = PyArray2::from_vec2(py, &force_rows)
                .map_err(|e| EnvironmentError::Engine(format!("force rows are ragged: {e}")))?;
            let torques = PyArray2::from_vec2(py, &torque_rows)
                .map_err(|e| EnvironmentError::Engine(format!("torque rows are ragged: {e}")))?;

            self.engine
                .bind(py)
                .call_method1("apply_body_forces", (forces, torques))
                .map_err(engine_err)?;
            Ok(())
        })
    }

    fn step(&mut self) -> Result<(), EnvironmentError> {
        Python::with_gil(|py| {
            self.engine
                .bind(py)
                .call_method0("step")
                .map_err(engine_err)?;
            Ok(())
        })
    }

    fn read_root_states(&self, out: &mut [RootState]) -> Result<(), EnvironmentError> {
        ensure_shape("root states", self.num_envs * BODIES_PER_ENV, out.len())?;
        Python::with_gil(|py| {
            let result = self
                .engine
                .bind(py)
                .call_method0("root_states")
                .map_err(engine_err)?;
            let array: PyReadonlyArray2<f64> = result.extract().map_err(engine_err)?;
            let view = array.as_array();
            let (rows, cols) = view.dim();
            ensure_shape("root state rows", out.len(), rows)?;
            ensure_shape("root state columns", 13, cols)?;

            for i in 0..rows {
                let mut values = [0.0; 13];
                for j in 0..13 {
                    values[j] = view[[i, j]];
                }
                out[i] = RootState::from_array(&values);
            }
            Ok(())
        })
    }
}
