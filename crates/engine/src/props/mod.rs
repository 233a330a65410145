mod burst;
mod light;

use std::time::Duration;

use crate::geometry::{PointPx, Rect};
use crate::world::{TileGrid, TileGridError};

pub use burst::Burst;
pub use light::{Light, LightConfig, LightConfigError, LIGHT_COOLDOWN, MAX_LIGHT_RADIUS};

/// World-anchored object that reacts when a body's bounds touch it.
pub trait Trigger {
    fn is_triggered(&self, bbox: Rect, now: Duration) -> bool;

    /// Fires the trigger and returns the world region whose static pixels changed.
    fn trigger(&mut self, grid: &mut TileGrid, now: Duration) -> Result<Rect, TileGridError>;

    /// Where effects spawned by this trigger appear.
    fn anchor(&self) -> PointPx;
}
