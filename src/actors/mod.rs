pub mod actor;
pub mod drone;
pub mod marker;

pub use actor::{actor_index, Actor, RootState, BODIES_PER_ENV, DRONE_SLOT, MARKER_SLOT};
pub use drone::Drone;
pub use marker::Marker;
