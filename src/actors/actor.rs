use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Bodies the physics engine holds per environment: the drone and its target marker.
pub const BODIES_PER_ENV: usize = 2;
pub const DRONE_SLOT: usize = 0;
pub const MARKER_SLOT: usize = 1;

pub trait Actor {
    fn actor_index(&self) -> usize;
    fn position(&self) -> Vector3<f64>;
}

/// Global actor index of the body in `slot` of environment `env_index`.
pub fn actor_index(env_index: usize, slot: usize) -> usize {
    env_index * BODIES_PER_ENV + slot
}

/// 13-component pose/velocity of an actor's base body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootState {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub linear_velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
}

impl Default for RootState {
    fn default() -> Self {
        RootState::at_position(Vector3::zeros())
    }
}

impl RootState {
    /// Upright, at rest, at the given position.
    pub fn at_position(position: Vector3<f64>) -> Self {
        RootState {
            position,
            orientation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }

    /// Flat layout used on the engine boundary: position, quaternion (x, y, z, w),
    /// linear velocity, angular velocity.
    pub fn to_array(&self) -> [f64; 13] {
        let q = self.orientation.coords;
        [
            self.position.x,
            self.position.y,
            self.position.z,
            q.x,
            q.y,
            q.z,
            q.w,
            self.linear_velocity.x,
            self.linear_velocity.y,
            self.linear_velocity.z,
            self.angular_velocity.x,
            self.angular_velocity.y,
            self.angular_velocity.z,
        ]
    }

    pub fn from_array(values: &[f64; 13]) -> Self {
        RootState {
            position: Vector3::new(values[0], values[1], values[2]),
            orientation: UnitQuaternion::from_quaternion(Quaternion::new(
                values[6], values[3], values[4], values[5],
            )),
            linear_velocity: Vector3::new(values[7], values[8], values[9]),
            angular_velocity: Vector3::new(values[10], values[11], values[12]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn actor_indices_interleave_drone_and_marker() {
        assert_eq!(actor_index(0, DRONE_SLOT), 0);
        assert_eq!(actor_index(0, MARKER_SLOT), 1);
        assert_eq!(actor_index(3, DRONE_SLOT), 6);
        assert_eq!(actor_index(3, MARKER_SLOT), 7);
    }

    #[test]
    fn root_state_array_round_trip() {
        let state = RootState {
            position: Vector3::new(0.5, -1.0, 1.2),
            orientation: UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3),
            linear_velocity: Vector3::new(0.1, 0.2, -0.3),
            angular_velocity: Vector3::new(-0.4, 0.5, 0.6),
        };

        let restored = RootState::from_array(&state.to_array());

        assert_relative_eq!(restored.position, state.position, epsilon = 1e-12);
        assert_relative_eq!(
            restored.orientation.coords,
            state.orientation.coords,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            restored.linear_velocity,
            state.linear_velocity,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            restored.angular_velocity,
            state.angular_velocity,
            epsilon = 1e-12
        );
    }
}
