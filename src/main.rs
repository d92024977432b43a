use crazyflie_environment::{
    CrazyflieEnvironment, CrazyflieEnvironmentConfig, EnvironmentError, PhysicsEngine, RootState,
    BODIES_PER_ENV,
};
use nalgebra::Vector3;

/// Stand-in collaborator for the demo: holds root states, applies nothing.
/// A real deployment plugs a GPU simulator in behind `PhysicsEngine`.
struct FrozenEngine {
    num_envs: usize,
    states: Vec<RootState>,
}

impl FrozenEngine {
    fn new(num_envs: usize) -> Self {
        FrozenEngine {
            num_envs,
            states: vec![RootState::default(); num_envs * BODIES_PER_ENV],
        }
    }
}

impl PhysicsEngine for FrozenEngine {
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
        }
        Ok(())
    }

    fn apply_body_forces(
        &mut self,
        _forces: &[Vector3<f64>],
        _torques: &[Vector3<f64>],
    ) -> Result<(), EnvironmentError> {
        Ok(())
    }

    fn step(&mut self) -> Result<(), EnvironmentError> {
        Ok(())
    }

    fn read_root_states(&self, out: &mut [RootState]) -> Result<(), EnvironmentError> {
        out.copy_from_slice(&self.states);
        Ok(())
    }
}

fn main() -> Result<(), EnvironmentError> {
    env_logger::init();

    println!("Initializing Crazyflie Environment...");
    let mut config = CrazyflieEnvironmentConfig::default();
    config.env.num_envs = 4;

    let mut env = CrazyflieEnvironment::new(config)?;
    let mut engine = FrozenEngine::new(env.num_envs());

    let obs = env.reset(&mut engine)?;
    println!("Initial target offsets: {:?}", obs.target_offsets);

    let hover = vec![[0.0; 4]; env.num_envs()];
    for step in 0..3 {
        let outcome = env.step(&hover, &mut engine)?;
        println!("Step {}: rewards {:?}", step, outcome.rewards);
    }

    Ok(())
}
