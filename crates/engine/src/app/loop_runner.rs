use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::render::TexturePack;
use crate::world::LevelData;

use super::input::ActionStates;
use super::metrics::{FrameSample, MetricsAccumulator};
use super::{
    InputAction, MetricsHandle, Presenter, SessionOutcome, SharedInput, Simulation,
    SimulationConfig, SimulationError,
};

const DEFAULT_TARGET_FPS: u32 = 24;
const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(50);
const DEFAULT_MIN_FRAME_SLEEP: Duration = Duration::from_millis(5);
const DEFAULT_METRICS_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_fps: u32,
    /// Longest frame delta fed to the simulation; longer stalls are clamped.
    pub max_frame_delta_ms: u64,
    /// Sleep floor between frames even when a frame ran over budget.
    pub min_frame_sleep_ms: u64,
    pub metrics_log_interval_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Glowtile".to_string(),
            window_width: 800,
            window_height: 600,
            target_fps: DEFAULT_TARGET_FPS,
            max_frame_delta_ms: DEFAULT_MAX_FRAME_DELTA.as_millis() as u64,
            min_frame_sleep_ms: DEFAULT_MIN_FRAME_SLEEP.as_millis() as u64,
            metrics_log_interval_ms: DEFAULT_METRICS_LOG_INTERVAL.as_millis() as u64,
        }
    }
}

impl LoopConfig {
    pub fn frame_target(&self) -> Duration {
        let fps = if self.target_fps == 0 {
            DEFAULT_TARGET_FPS
        } else {
            self.target_fps
        };
        Duration::from_secs_f64(1.0 / fps as f64)
    }

    pub fn max_frame_delta(&self) -> Duration {
        normalize_non_zero_duration(
            Duration::from_millis(self.max_frame_delta_ms),
            DEFAULT_MAX_FRAME_DELTA,
        )
    }

    pub fn min_frame_sleep(&self) -> Duration {
        Duration::from_millis(self.min_frame_sleep_ms)
    }

    pub fn metrics_log_interval(&self) -> Duration {
        normalize_non_zero_duration(
            Duration::from_millis(self.metrics_log_interval_ms),
            DEFAULT_METRICS_LOG_INTERVAL,
        )
    }
}

/// Everything needed to start a play session once the window exists.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub level: LevelData,
    pub textures: Arc<TexturePack>,
    pub config: SimulationConfig,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize pixel surface: {0}")]
    CreatePresenter(#[source] PixelsError),
    #[error("failed to start simulation: {0}")]
    Simulation(#[from] SimulationError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, setup: SessionSetup) -> Result<SessionOutcome, AppError> {
    run_app_with_metrics(config, setup, MetricsHandle::default())
}

/// Opens the window and runs one session until it ends or the window closes.
///
/// Returns the session outcome; a closed window reports [`SessionOutcome::Running`].
pub fn run_app_with_metrics(
    config: LoopConfig,
    setup: SessionSetup,
    metrics_handle: MetricsHandle,
) -> Result<SessionOutcome, AppError> {
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let window_for_loop = Arc::clone(&window);
    let mut presenter = Presenter::new(window).map_err(AppError::CreatePresenter)?;
    let mut simulation = Simulation::new(
        &setup.level,
        setup.textures,
        presenter.viewport(),
        setup.config,
    )?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let frame_target = config.frame_target();
    let max_frame_delta = config.max_frame_delta();
    let min_frame_sleep = config.min_frame_sleep();
    let metrics_log_interval = config.metrics_log_interval();
    info!(
        target_fps = config.target_fps,
        frame_target_ms = frame_target.as_secs_f64() * 1000.0,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        min_frame_sleep_ms = min_frame_sleep.as_millis() as u64,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        viewport_width = presenter.viewport().width,
        viewport_height = presenter.viewport().height,
        "loop_config"
    );

    let shared_input = SharedInput::default();
    let mut input_collector = InputCollector::new(shared_input.clone());
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, last_frame_instant);
    let final_outcome = Rc::new(Cell::new(SessionOutcome::Running));
    let outcome_for_loop = Rc::clone(&final_outcome);

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window_for_loop.id() => {
                match event {
                    WindowEvent::CloseRequested => {
                        info!(reason = "window_close", "shutdown_requested");
                        window_target.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        resize_surface(&mut presenter, &mut simulation, new_size.width, new_size.height);
                    }
                    WindowEvent::ScaleFactorChanged { .. } => {
                        let size = window_for_loop.inner_size();
                        resize_surface(&mut presenter, &mut simulation, size.width, size.height);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        input_collector.handle_key(event.physical_key, event.state);
                        if input_collector.quit_requested {
                            info!(reason = "escape_key", "shutdown_requested");
                            window_target.exit();
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        let frame_start = Instant::now();
                        let raw_frame_dt = frame_start.saturating_duration_since(last_frame_instant);
                        last_frame_instant = frame_start;
                        let frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);

                        let report = match simulation.tick(frame_dt, shared_input.take()) {
                            Ok(report) => report,
                            Err(error) => {
                                error!(error = %error, "simulation_tick_failed");
                                window_target.exit();
                                return;
                            }
                        };

                        if let Err(error) = presenter.present(&mut simulation) {
                            warn!(error = %error, "present_failed");
                            window_target.exit();
                            return;
                        }

                        if report.outcome != SessionOutcome::Running {
                            outcome_for_loop.set(report.outcome);
                            info!(
                                outcome = ?report.outcome,
                                frames = simulation.frames(),
                                "session_finished"
                            );
                            window_target.exit();
                            return;
                        }

                        let work = frame_start.elapsed();
                        let sleep = compute_frame_sleep(work, frame_target, min_frame_sleep);
                        thread::sleep(sleep);

                        metrics_accumulator.record_frame(FrameSample {
                            work,
                            sleep,
                            clamped: raw_frame_dt > max_frame_delta,
                        });
                        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
                            metrics_handle.publish(snapshot);
                            info!(
                                fps = snapshot.fps,
                                work_ms = snapshot.work_ms,
                                sleep_ms = snapshot.sleep_ms,
                                clamped_frames = snapshot.clamped_frames,
                                bursts = simulation.bursts().len(),
                                "loop_metrics"
                            );
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                window_for_loop.request_redraw();
            }
            Event::LoopExiting => {
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)?;

    Ok(final_outcome.get())
}

fn resize_surface(presenter: &mut Presenter, simulation: &mut Simulation, width: u32, height: u32) {
    match presenter.resize(width, height) {
        Ok(true) => simulation.resize(presenter.viewport()),
        Ok(false) => {}
        Err(error) => warn!(error = %error, width, height, "surface_resize_failed"),
    }
}

/// Keyboard state for the play loop. Steering is republished to [`SharedInput`] on every change;
/// jump is an edge that fires once per press.
#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    action_states: ActionStates,
    shared: SharedInput,
}

impl InputCollector {
    fn new(shared: SharedInput) -> Self {
        Self {
            shared,
            ..Self::default()
        }
    }

    fn handle_key(&mut self, key: PhysicalKey, state: ElementState) {
        let is_pressed = state == ElementState::Pressed;
        let Some(action) = action_for_key(key) else {
            return;
        };
        match action {
            InputAction::Jump => {
                if is_pressed && !self.action_states.is_down(InputAction::Jump) {
                    self.shared.request_jump();
                }
            }
            InputAction::Quit => {
                if is_pressed {
                    self.quit_requested = true;
                }
            }
            _ => {}
        }
        self.action_states.set(action, is_pressed);
        self.shared.set_direction(self.action_states.direction());
    }
}

fn action_for_key(key: PhysicalKey) -> Option<InputAction> {
    match key {
        PhysicalKey::Code(KeyCode::KeyW) | PhysicalKey::Code(KeyCode::ArrowUp) => {
            Some(InputAction::MoveUp)
        }
        PhysicalKey::Code(KeyCode::KeyS) | PhysicalKey::Code(KeyCode::ArrowDown) => {
            Some(InputAction::MoveDown)
        }
        PhysicalKey::Code(KeyCode::KeyA) | PhysicalKey::Code(KeyCode::ArrowLeft) => {
            Some(InputAction::MoveLeft)
        }
        PhysicalKey::Code(KeyCode::KeyD) | PhysicalKey::Code(KeyCode::ArrowRight) => {
            Some(InputAction::MoveRight)
        }
        PhysicalKey::Code(KeyCode::Space) => Some(InputAction::Jump),
        PhysicalKey::Code(KeyCode::Escape) => Some(InputAction::Quit),
        _ => None,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

/// `max(min_sleep, target - spent)`.
fn compute_frame_sleep(spent: Duration, target: Duration, min_sleep: Duration) -> Duration {
    target.saturating_sub(spent).max(min_sleep)
}

#[cfg(test)]
mod tests {
    use crate::physics::Vector2D;

    use super::*;

    fn collector() -> (InputCollector, SharedInput) {
        let shared = SharedInput::default();
        (InputCollector::new(shared.clone()), shared)
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(50);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(30), max_frame_delta),
            Duration::from_millis(30)
        );
    }

    #[test]
    fn frame_sleep_fills_remaining_budget() {
        let target = Duration::from_millis(40);
        let sleep = compute_frame_sleep(Duration::from_millis(10), target, Duration::from_millis(5));
        assert_eq!(sleep, Duration::from_millis(30));
    }

    #[test]
    fn frame_sleep_never_drops_below_minimum() {
        let target = Duration::from_millis(40);
        let min = Duration::from_millis(5);
        assert_eq!(compute_frame_sleep(Duration::from_millis(39), target, min), min);
        assert_eq!(compute_frame_sleep(Duration::from_millis(90), target, min), min);
    }

    #[test]
    fn zero_config_values_fall_back_to_defaults() {
        let config = LoopConfig {
            target_fps: 0,
            max_frame_delta_ms: 0,
            metrics_log_interval_ms: 0,
            ..LoopConfig::default()
        };
        assert!((config.frame_target().as_secs_f64() - 1.0 / 24.0).abs() < 1e-9);
        assert_eq!(config.max_frame_delta(), Duration::from_millis(50));
        assert_eq!(config.metrics_log_interval(), Duration::from_secs(1));
    }

    #[test]
    fn wasd_and_arrow_keys_publish_direction() {
        let (mut input, shared) = collector();
        input.handle_key(PhysicalKey::Code(KeyCode::KeyW), ElementState::Pressed);
        input.handle_key(PhysicalKey::Code(KeyCode::ArrowLeft), ElementState::Pressed);
        assert_eq!(shared.peek().direction, Vector2D::new(-1.0, 1.0));
    }

    #[test]
    fn key_release_clears_direction() {
        let (mut input, shared) = collector();
        input.handle_key(PhysicalKey::Code(KeyCode::KeyD), ElementState::Pressed);
        input.handle_key(PhysicalKey::Code(KeyCode::KeyD), ElementState::Released);
        assert_eq!(shared.peek().direction, Vector2D::ZERO);
    }

    #[test]
    fn held_space_does_not_repeat_jump() {
        let (mut input, shared) = collector();

        input.handle_key(PhysicalKey::Code(KeyCode::Space), ElementState::Pressed);
        let first = shared.take();

        input.handle_key(PhysicalKey::Code(KeyCode::Space), ElementState::Pressed);
        let second = shared.take();

        input.handle_key(PhysicalKey::Code(KeyCode::Space), ElementState::Released);
        input.handle_key(PhysicalKey::Code(KeyCode::Space), ElementState::Pressed);
        let third = shared.take();

        assert!(first.jump_requested);
        assert!(!second.jump_requested);
        assert!(third.jump_requested);
    }

    #[test]
    fn escape_requests_quit() {
        let (mut input, _shared) = collector();
        input.handle_key(PhysicalKey::Code(KeyCode::KeyQ), ElementState::Pressed);
        assert!(!input.quit_requested);
        input.handle_key(PhysicalKey::Code(KeyCode::Escape), ElementState::Pressed);
        assert!(input.quit_requested);
    }
}
