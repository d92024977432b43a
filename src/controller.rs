use nalgebra::{Matrix3, Matrix4, UnitQuaternion, Vector3, Vector4};

use crate::config::ControllerConfig;
use crate::errors::{ensure_shape, EnvironmentError};

/// Batched controller output: one body torque and one body-frame thrust force
/// per environment.
#[derive(Clone, Debug)]
pub struct ControlOutput {
    pub torques: Vec<Vector3<f64>>,
    pub thrust_forces: Vec<Vector3<f64>>,
}

/// Converts a 4-dimensional policy action into commanded torque and thrust.
///
/// Invoked once per simulation step with the refreshed drone states. All slices
/// are batched over the environments; implementations must reject length
/// mismatches.
pub trait RateThrustController {
    fn update(
        &mut self,
        actions: &[[f64; 4]],
        orientations: &[UnitQuaternion<f64>],
        linear_velocities: &[Vector3<f64>],
        angular_velocities: &[Vector3<f64>],
    ) -> Result<ControlOutput, EnvironmentError>;

    /// Per-rotor thrusts of the last update, if the controller models rotors.
    fn rotor_thrusts(&self) -> Option<&[[f64; 4]]> {
        None
    }
}

/// Collective-thrust / body-rate controller.
///
/// `action[0]` maps to collective thrust in `[0, 4 * max_thrust]`, `action[1..4]`
/// to desired body rates. A proportional loop on the rate error plus the
/// gyroscopic feedforward produces the torque command, which is allocated to
/// four rotors, clamped per rotor, and recomposed so that saturation degrades
/// thrust and torque consistently.
pub struct CascadedRateController {
    num_envs: usize,
    max_thrust: f64,
    max_body_rate: Vector3<f64>,
    rate_gains: Vector3<f64>,
    inertia: Matrix3<f64>,
    rotor_offset: f64,
    allocation: Matrix4<f64>,
    allocation_inverse: Matrix4<f64>,
    rotor_thrusts: Vec<[f64; 4]>,
}

impl CascadedRateController {
    pub fn new(num_envs: usize, config: &ControllerConfig) -> Result<Self, EnvironmentError> {
        let offset = config.rotor_offset;
        let drag = config.rotor_torque_coefficient;
        // Wrench rows: collective thrust, roll, pitch, yaw. Columns are the four
        // rotors at body positions (-o,-o), (o,-o), (-o,o), (o,o).
        let allocation = Matrix4::new(
            1.0, 1.0, 1.0, 1.0, //
            -offset, -offset, offset, offset, //
            offset, -offset, offset, -offset, //
            drag, -drag, -drag, drag,
        );
        let allocation_inverse =
            allocation
                .try_inverse()
                .ok_or_else(|| EnvironmentError::Controller(
                    "rotor allocation matrix is singular; check rotorOffset and rotorTorqueCoefficient".to_string(),
                ))?;

        Ok(CascadedRateController {
            num_envs,
            max_thrust: config.max_thrust,
            max_body_rate: Vector3::from(config.max_body_rate),
            rate_gains: Vector3::from(config.rate_gains),
            inertia: Matrix3::from_diagonal(&Vector3::from(config.inertia_diagonal)),
            rotor_offset: offset,
            allocation,
            allocation_inverse,
            rotor_thrusts: vec![[0.0; 4]; num_envs],
        })
    }

    /// Rotor positions in the body frame, ordered to match the allocation matrix.
    pub fn rotor_body_offsets(&self) -> [Vector3<f64>; 4] {
        rotor_layout(self.rotor_offset)
    }
}

/// Body-frame rotor positions for an X layout with the given half-spacing,
/// ordered to match the allocation matrix columns.
pub fn rotor_layout(offset: f64) -> [Vector3<f64>; 4] {
    [
        Vector3::new(-offset, -offset, 0.0),
        Vector3::new(offset, -offset, 0.0),
        Vector3::new(-offset, offset, 0.0),
        Vector3::new(offset, offset, 0.0),
    ]
}

impl RateThrustController for CascadedRateController {
    fn update(
        &mut self,
        actions: &[[f64; 4]],
        _orientations: &[UnitQuaternion<f64>],
        _linear_velocities: &[Vector3<f64>],
        angular_velocities: &[Vector3<f64>],
    ) -> Result<ControlOutput, EnvironmentError> {
        ensure_shape("controller actions", self.num_envs, actions.len())?;
        ensure_shape(
            "controller angular velocities",
            self.num_envs,
            angular_velocities.len(),
        )?;

        let mut torques = Vec::with_capacity(self.num_envs);
        let mut thrust_forces = Vec::with_capacity(self.num_envs);

        for i in 0..self.num_envs {
            let collective =
                (actions[i][0].clamp(-1.0, 1.0) + 1.0) * 0.5 * (4.0 * self.max_thrust);
            let desired_rates = Vector3::new(
                actions[i][1].clamp(-1.0, 1.0) * self.max_body_rate.x,
                actions[i][2].clamp(-1.0, 1.0) * self.max_body_rate.y,
                actions[i][3].clamp(-1.0, 1.0) * self.max_body_rate.z,
            );

            let rate_error = desired_rates - angular_velocities[i];
            let gyroscopic =
                angular_velocities[i].cross(&(self.inertia * angular_velocities[i]));
            let torque_command =
                self.inertia * self.rate_gains.component_mul(&rate_error) + gyroscopic;

            let wrench = Vector4::new(
                collective,
                torque_command.x,
                torque_command.y,
                torque_command.z,
            );
            let mut rotors = self.allocation_inverse * wrench;
            for k in 0..4 {
                rotors[k] = rotors[k].clamp(0.0, self.max_thrust);
            }
            self.rotor_thrusts[i] = [rotors[0], rotors[1], rotors[2], rotors[3]];

            let achieved = self.allocation * rotors;
            torques.push(Vector3::new(achieved[1], achieved[2], achieved[3]));
            thrust_forces.push(Vector3::new(0.0, 0.0, achieved[0]));
        }

        Ok(ControlOutput {
            torques,
            thrust_forces,
        })
    }

    fn rotor_thrusts(&self) -> Option<&[[f64; 4]]> {
        Some(&self.rotor_thrusts)
    }
}
