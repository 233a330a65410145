mod body;
mod step;
mod vector;

pub use body::{Dynamic, Hero};
pub use step::{step_body, PhysicsConfig, StepOutcome};
pub use vector::Vector2D;
