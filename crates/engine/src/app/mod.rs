mod input;
mod loop_runner;
mod metrics;
mod presenter;
mod simulation;

pub use input::{InputAction, InputFrame, SharedInput};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SessionSetup};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use presenter::{PresentError, Presenter};
pub use simulation::{
    Camera, CameraConfig, SessionConfig, SessionOutcome, Simulation, SimulationConfig,
    SimulationError, TickReport,
};
