use crazyflie_environment::{EnvironmentError, PhysicsEngine, RootState, BODIES_PER_ENV};
use nalgebra::Vector3;

/// State-holding engine double. Applies no dynamics; tests mutate `states`
/// directly to emulate whatever the simulator would have produced.
pub struct TestEngine {
    pub num_envs: usize,
    pub states: Vec<RootState>,
    pub last_forces: Vec<Vector3<f64>>,
    pub last_torques: Vec<Vector3<f64>>,
    pub written_indices: Vec<usize>,
    pub steps_taken: usize,
}

impl TestEngine {
    pub fn new(num_envs: usize) -> Self {
        TestEngine {
            num_envs,
            states: vec![RootState::default(); num_envs * BODIES_PER_ENV],
            last_forces: vec![Vector3::zeros(); num_envs * BODIES_PER_ENV],
            last_torques: vec![Vector3::zeros(); num_envs],
            written_indices: Vec::new(),
            steps_taken: 0,
        }
    }
}

impl PhysicsEngine for TestEngine {
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
        for (&index, &state) in actor_indices.iter().zip(states) {
            self.states[index] = state;
            self.written_indices.push(index);
        }
        Ok(())
    }

    fn apply_body_forces(
        &mut self,
        forces: &[Vector3<f64>],
        torques: &[Vector3<f64>],
    ) -> Result<(), EnvironmentError> {
        self.last_forces.copy_from_slice(forces);
        self.last_torques.copy_from_slice(torques);
        Ok(())
    }

    fn step(&mut self) -> Result<(), EnvironmentError> {
        self.steps_taken += 1;
        Ok(())
    }

    fn read_root_states(&self, out: &mut [RootState]) -> Result<(), EnvironmentError> {
        out.copy_from_slice(&self.states);
        Ok(())
    }
}
