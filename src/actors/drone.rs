use crate::actors::actor::{actor_index, Actor, RootState, DRONE_SLOT};
use nalgebra::Vector3;

// Drone representation
#[derive(Clone, Debug)]
pub struct Drone {
    pub env_index: usize,
    pub state: RootState,
    initial_state: RootState,
}

impl Actor for Drone {
    fn actor_index(&self) -> usize {
        actor_index(self.env_index, DRONE_SLOT)
    }

    fn position(&self) -> Vector3<f64> {
        self.state.position
    }
}

impl Drone {
    pub fn new(env_index: usize, initial_state: RootState) -> Self {
        Drone {
            env_index,
            state: initial_state,
            initial_state,
        }
    }

    pub fn initial_state(&self) -> RootState {
        self.initial_state
    }

    /// Copy the stored initial pose back into the live state.
    pub fn reset_to_initial(&mut self) {
        self.state = self.initial_state;
    }
}
