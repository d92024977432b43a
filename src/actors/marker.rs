use crate::actors::actor::{actor_index, Actor, RootState, MARKER_SLOT};
use nalgebra::Vector3;

// Visualization marker mirroring an environment's target position. The marker is a
// fixed-base actor: its root state carries a pose but never a velocity.
#[derive(Clone, Debug)]
pub struct Marker {
    pub env_index: usize,
    pub position: Vector3<f64>,
}

impl Actor for Marker {
    fn actor_index(&self) -> usize {
        actor_index(self.env_index, MARKER_SLOT)
    }

    fn position(&self) -> Vector3<f64> {
        self.position
    }
}

impl Marker {
    pub fn new(env_index: usize, position: Vector3<f64>) -> Self {
        Marker {
            env_index,
            position,
        }
    }

    pub fn move_to(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    pub fn root_state(&self) -> RootState {
        RootState::at_position(self.position)
    }
}
