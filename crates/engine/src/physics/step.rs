use serde::{Deserialize, Serialize};

use crate::world::{escape_x, escape_y, CellCoord, Tile, TileGrid};

use super::{Dynamic, Vector2D};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Vertical acceleration in px/s^2; negative pulls toward row 0.
    pub gravity: f64,
    /// Force applied while a movement key is held.
    pub move_force: f64,
    /// Vertical speed set by a jump from the ground.
    pub jump_speed: f64,
    /// Horizontal drag coefficient per second.
    pub drag: f64,
    /// Vertical drag as a fraction of the horizontal coefficient.
    pub vertical_drag_ratio: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: -1200.0,
            move_force: 1000.0,
            jump_speed: 600.0,
            drag: 5.0,
            vertical_drag_ratio: 0.2,
        }
    }
}

impl PhysicsConfig {
    pub fn vertical_drag(&self) -> f64 {
        self.drag * self.vertical_drag_ratio
    }
}

/// What one physics step ran into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub hit_x: Option<CellCoord>,
    pub hit_y: Option<CellCoord>,
    /// A Y hit while falling.
    pub landed: bool,
}

/// Advances `body` by `dt_seconds`: drag, gravity plus input force, integration, then X move and
/// resolve followed by Y move and resolve.
///
/// X is resolved completely before Y moves, so corners can clip. Velocity on an axis is zeroed
/// whenever that axis hits a solid cell, even if the escape itself was discarded.
pub fn step_body<B: Dynamic>(
    body: &mut B,
    input_force: Vector2D,
    grid: &TileGrid,
    config: &PhysicsConfig,
    dt_seconds: f64,
) -> StepOutcome {
    body.apply_drag(config, dt_seconds);

    body.apply_force(Vector2D::new(0.0, config.gravity));
    body.apply_force(input_force);
    body.integrate(dt_seconds);

    let mut outcome = StepOutcome::default();

    let displacement_x = body.velocity().x * dt_seconds;
    body.translate(displacement_x as i32, 0);
    if let Some(cell) = grid.probe_where(body.bounds(), Tile::is_solid) {
        body.translate(escape_x(body.bounds(), displacement_x, cell), 0);
        let velocity = body.velocity();
        body.set_velocity(Vector2D::new(0.0, velocity.y));
        outcome.hit_x = Some(cell);
    }

    let velocity_y = body.velocity().y;
    let displacement_y = velocity_y * dt_seconds;
    body.translate(0, displacement_y as i32);
    if let Some(cell) = grid.probe_where(body.bounds(), Tile::is_solid) {
        body.translate(0, escape_y(body.bounds(), displacement_y, cell));
        let velocity = body.velocity();
        body.set_velocity(Vector2D::new(velocity.x, 0.0));
        outcome.hit_y = Some(cell);
        outcome.landed = velocity_y < 0.0;
    }
    body.set_on_ground(outcome.landed);

    outcome
}
