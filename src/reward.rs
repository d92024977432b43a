use nalgebra::{UnitQuaternion, Vector3};

/// Episode ends when the drone drifts further than this from its target.
pub const MAX_TARGET_DISTANCE: f64 = 0.5;
/// Episode ends when the drone sinks below this height.
pub const MIN_FLIGHT_HEIGHT: f64 = 0.3;

/// Per-environment reward components. Only the position term drives the combined
/// reward; uprightness and spin are reported for diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct RewardTerms {
    pub distance: f64,
    pub position_reward: f64,
    pub upright_reward: f64,
    pub spin_reward: f64,
}

impl RewardTerms {
    pub fn combined(&self) -> f64 {
        self.position_reward
    }
}

pub fn reward_terms(
    position: &Vector3<f64>,
    target_position: &Vector3<f64>,
    orientation: &UnitQuaternion<f64>,
    angular_velocity: &Vector3<f64>,
) -> RewardTerms {
    let distance = (target_position - position).norm();
    let position_reward = 1.0 / (1.0 + distance * distance);

    let up = orientation * Vector3::z();
    let tilt = (1.0 - up.z).abs();
    let upright_reward = 1.0 / (1.0 + tilt * tilt);

    let spin = angular_velocity.z.abs();
    let spin_reward = 1.0 / (1.0 + spin * spin);

    RewardTerms {
        distance,
        position_reward,
        upright_reward,
        spin_reward,
    }
}

/// Batched reward and termination. Pure function of the inputs: no environment
/// state is read or written here.
pub fn compute_reward_and_reset(
    positions: &[Vector3<f64>],
    target_positions: &[Vector3<f64>],
    orientations: &[UnitQuaternion<f64>],
    angular_velocities: &[Vector3<f64>],
    progress: &[u32],
    max_episode_length: u32,
) -> (Vec<f64>, Vec<bool>) {
    let num_envs = positions.len();
    debug_assert_eq!(target_positions.len(), num_envs);
    debug_assert_eq!(orientations.len(), num_envs);
    debug_assert_eq!(angular_velocities.len(), num_envs);
    debug_assert_eq!(progress.len(), num_envs);

    let mut rewards = Vec::with_capacity(num_envs);
    let mut resets = Vec::with_capacity(num_envs);

    for i in 0..num_envs {
        let terms = reward_terms(
            &positions[i],
            &target_positions[i],
            &orientations[i],
            &angular_velocities[i],
        );
        rewards.push(terms.combined());

        let died = terms.distance > MAX_TARGET_DISTANCE || positions[i].z < MIN_FLIGHT_HEIGHT;
        let timed_out = progress[i] + 1 >= max_episode_length;
        resets.push(died || timed_out);
    }

    (rewards, resets)
}
