use nalgebra::Vector3;
use numpy::{PyArray1, PyArray2};
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Batched observation, one row per environment. Components carry the
/// normalization the policy was trained with: target offset over 3, linear
/// velocity over 2, angular velocity over pi.
#[derive(Debug, Clone)]
pub struct Observation {
    pub target_offsets: Vec<Vector3<f64>>,
    pub orientations: Vec<[f64; 4]>, // quaternion x, y, z, w
    pub linear_velocities: Vec<Vector3<f64>>,
    pub angular_velocities: Vec<Vector3<f64>>,
}

impl Observation {
    pub fn num_envs(&self) -> usize {
        self.target_offsets.len()
    }

    /// Flat 13-wide rows: offset, quaternion, linear velocity, angular velocity.
    pub fn flat_rows(&self) -> Vec<[f64; 13]> {
        let mut rows = Vec::with_capacity(self.num_envs());
        for i in 0..self.num_envs() {
            let offset = self.target_offsets[i];
            let quat = self.orientations[i];
            let linvel = self.linear_velocities[i];
            let angvel = self.angular_velocities[i];
            rows.push([
                offset.x, offset.y, offset.z, quat[0], quat[1], quat[2], quat[3], linvel.x,
                linvel.y, linvel.z, angvel.x, angvel.y, angvel.z,
            ]);
        }
        rows
    }

    // Convert to Python dictionary with numpy arrays for PyO3 compatibility
    pub fn to_numpy_dict(&self, py: Python) -> PyResult<Py<PyDict>> {
        let dict = PyDict::new(py);

        // Target offsets as 2D numpy array (shape: [num_envs, 3])
        let offsets_array = PyArray2::from_vec2(
            py,
            &self
                .target_offsets
                .iter()
                .map(|v| vec![v.x, v.y, v.z])
                .collect::<Vec<_>>(),
        )?;
        dict.set_item("target_offsets", offsets_array)?;

        // Orientation quaternions (shape: [num_envs, 4])
        let orientations_array = PyArray2::from_vec2(
            py,
            &self
                .orientations
                .iter()
                .map(|q| q.to_vec())
                .collect::<Vec<_>>(),
        )?;
        dict.set_item("orientations", orientations_array)?;

        // Linear velocities (shape: [num_envs, 3])
        let linvels_array = PyArray2::from_vec2(
            py,
            &self
                .linear_velocities
                .iter()
                .map(|v| vec![v.x, v.y, v.z])
                .collect::<Vec<_>>(),
        )?;
        dict.set_item("linear_velocities", linvels_array)?;

        // Angular velocities (shape: [num_envs, 3])
        let angvels_array = PyArray2::from_vec2(
            py,
            &self
                .angular_velocities
                .iter()
                .map(|v| vec![v.x, v.y, v.z])
                .collect::<Vec<_>>(),
        )?;
        dict.set_item("angular_velocities", angvels_array)?;

        // Flat 13-wide observation rows (shape: [num_envs, 13])
        let flat_array = PyArray2::from_vec2(
            py,
            &self
                .flat_rows()
                .iter()
                .map(|row| row.to_vec())
                .collect::<Vec<_>>(),
        )?;
        dict.set_item("flat", flat_array)?;

        Ok(dict.unbind())
    }
}

pub struct Information {
    pub resets_this_step: usize,
    pub retargets_this_step: usize,
    pub mean_target_distance: f64,
}

impl Information {
    pub fn to_py_dict(&self, py: Python) -> PyResult<Py<PyDict>> {
        let dict = PyDict::new(py);

        dict.set_item("resets_this_step", self.resets_this_step as i64)?;
        dict.set_item("retargets_this_step", self.retargets_this_step as i64)?;
        dict.set_item("mean_target_distance", self.mean_target_distance)?;

        Ok(dict.unbind())
    }
}

/// Rewards as a numpy array (shape: [num_envs]).
pub fn rewards_to_numpy<'py>(py: Python<'py>, rewards: &[f64]) -> Bound<'py, PyArray1<f64>> {
    PyArray1::from_slice(py, rewards)
}

/// Reset flags as a numpy i8 array (shape: [num_envs]).
pub fn resets_to_numpy<'py>(py: Python<'py>, resets: &[bool]) -> Bound<'py, PyArray1<i8>> {
    let flags: Vec<i8> = resets.iter().map(|&r| i8::from(r)).collect();
    PyArray1::from_slice(py, &flags)
}
