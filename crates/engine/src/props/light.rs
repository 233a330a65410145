use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::geometry::{GeometryError, PointPx, Rect};
use crate::render::{channel_to_u8, PixelBuffer, StaticProp};
use crate::world::{CellCoord, Tile, TileGrid, TileGridError, CELL_SIZE};

use super::Trigger;

/// Minimum time between two toggles of the same light.
pub const LIGHT_COOLDOWN: Duration = Duration::from_millis(500);

/// Largest radius a configured light may draw. Each glow patch holds `(2r)^2` pixels.
pub const MAX_LIGHT_RADIUS: i32 = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LightConfigError {
    #[error("light min_radius must be positive, got {min_radius}")]
    NonPositiveRadius { min_radius: i32 },
    #[error(
        "light radii from {min_radius} spanning {radius_span} exceed the {max} px limit",
        max = MAX_LIGHT_RADIUS
    )]
    RadiusTooLarge { min_radius: i32, radius_span: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Smallest random radius in pixels.
    pub min_radius: i32,
    /// Random radii fall in `[min_radius, min_radius + radius_span)`.
    pub radius_span: i32,
    /// RGB in `[0, 1]`.
    pub color: [f64; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            min_radius: 75,
            radius_span: 100,
            color: [0.8235, 0.7059, 0.5098],
        }
    }
}

impl LightConfig {
    /// Checks that every radius [`LightConfig::random_radius`] can return is in
    /// `1..=MAX_LIGHT_RADIUS`.
    pub fn validate(&self) -> Result<(), LightConfigError> {
        if self.min_radius <= 0 {
            return Err(LightConfigError::NonPositiveRadius {
                min_radius: self.min_radius,
            });
        }
        let largest = if self.radius_span > 0 {
            self.min_radius.checked_add(self.radius_span - 1)
        } else {
            Some(self.min_radius)
        };
        match largest {
            Some(radius) if radius <= MAX_LIGHT_RADIUS => Ok(()),
            _ => Err(LightConfigError::RadiusTooLarge {
                min_radius: self.min_radius,
                radius_span: self.radius_span,
            }),
        }
    }

    pub fn random_radius<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        let end = self.min_radius.saturating_add(self.radius_span);
        if end <= self.min_radius {
            return self.min_radius;
        }
        rng.random_range(self.min_radius..end)
    }
}

/// A lamp anchored on one tile. Contact toggles it, and while on, its radial glow is added to
/// the static layer.
#[derive(Debug, Clone)]
pub struct Light {
    position: PointPx,
    cell: CellCoord,
    radius: i32,
    color: [f64; 3],
    bounds: Rect,
    glow: PixelBuffer,
    on: bool,
    safe_after: Duration,
}

impl Light {
    pub fn new(position: PointPx, radius: i32, color: [f64; 3]) -> Result<Self, GeometryError> {
        let glow = radial_glow(radius, color)?;
        Ok(Self {
            position,
            cell: CellCoord::containing(position),
            radius,
            color,
            bounds: glow_bounds(position, radius),
            glow,
            on: false,
            safe_after: Duration::ZERO,
        })
    }

    /// Light centered on the tile whose corner is `cell_corner`.
    pub fn for_cell<R: Rng + ?Sized>(
        cell_corner: PointPx,
        config: &LightConfig,
        rng: &mut R,
    ) -> Result<Self, GeometryError> {
        let center = cell_corner.offset(CELL_SIZE / 2, CELL_SIZE / 2);
        Self::new(center, config.random_radius(rng), config.color)
    }

    pub fn position(&self) -> PointPx {
        self.position
    }

    pub fn cell(&self) -> CellCoord {
        self.cell
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    pub fn color(&self) -> [f64; 3] {
        self.color
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn set_radius(&mut self, radius: i32) -> Result<(), GeometryError> {
        self.glow = radial_glow(radius, self.color)?;
        self.radius = radius;
        self.bounds = glow_bounds(self.position, radius);
        Ok(())
    }

    pub fn set_color(&mut self, color: [f64; 3]) -> Result<(), GeometryError> {
        self.glow = radial_glow(self.radius, color)?;
        self.color = color;
        Ok(())
    }

    /// Color as `0xRRGGBB`.
    pub fn packed_rgb(&self) -> u32 {
        let [r, g, b] = self.color.map(|channel| u32::from(channel_to_u8(channel)));
        (r << 16) | (g << 8) | b
    }
}

impl StaticProp for Light {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn pixels(&self) -> &PixelBuffer {
        &self.glow
    }

    fn is_drawn(&self) -> bool {
        self.on
    }
}

impl Trigger for Light {
    fn is_triggered(&self, bbox: Rect, now: Duration) -> bool {
        bbox.contains_point_strict(self.position) && now > self.safe_after
    }

    fn trigger(&mut self, grid: &mut TileGrid, now: Duration) -> Result<Rect, TileGridError> {
        let tile = if self.on { Tile::LightOff } else { Tile::LightOn };
        grid.set(self.cell.col, self.cell.row, tile)?;
        self.on = !self.on;
        self.safe_after = now + LIGHT_COOLDOWN;
        debug!(
            x = self.position.x,
            y = self.position.y,
            on = self.on,
            "light_toggled"
        );
        Ok(self.bounds.union(&self.cell.rect()))
    }

    fn anchor(&self) -> PointPx {
        self.position
    }
}

fn glow_bounds(position: PointPx, radius: i32) -> Rect {
    Rect::new(
        position.x - radius,
        position.y - radius,
        radius * 2,
        radius * 2,
    )
}

/// `max(0, 1 - d / r)^2 * color` over a `2r x 2r` patch, computed on one quadrant and mirrored.
fn radial_glow(radius: i32, color: [f64; 3]) -> Result<PixelBuffer, GeometryError> {
    if radius <= 0 {
        return Err(GeometryError::Degenerate {
            what: "light radius",
            width: i64::from(radius) * 2,
            height: i64::from(radius) * 2,
        });
    }
    let size = radius as u32 * 2;
    let r = radius as u32;
    let mut glow = PixelBuffer::new(size, size)?;
    for x in 0..r {
        for y in 0..r {
            let dx = f64::from(r - x);
            let dy = f64::from(r - y);
            let distance = (dx * dx + dy * dy).sqrt();
            let falloff = (1.0 - distance / f64::from(radius)).max(0.0).powi(2);
            let rgba = [
                falloff * color[0],
                falloff * color[1],
                falloff * color[2],
                1.0,
            ];
            let mirror_x = size - 1 - x;
            let mirror_y = size - 1 - y;
            glow.set_pixel(x, y, rgba);
            glow.set_pixel(mirror_x, y, rgba);
            glow.set_pixel(x, mirror_y, rgba);
            glow.set_pixel(mirror_x, mirror_y, rgba);
        }
    }
    Ok(glow)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use super::*;
    use crate::render::TexturePack;

    fn grid_with_lamp() -> TileGrid {
        let textures = Arc::new(TexturePack::procedural().expect("textures"));
        let mut grid = TileGrid::new(6, 6, textures).expect("grid");
        grid.set(2, 2, Tile::LightOff).expect("lamp");
        grid
    }

    fn lamp() -> Light {
        Light::new(PointPx::new(75, 75), 80, [1.0, 0.5, 0.25]).expect("light")
    }

    fn covering_box() -> Rect {
        Rect::new(65, 65, 19, 19)
    }

    #[test]
    fn contact_inside_cooldown_toggles_once() {
        let mut grid = grid_with_lamp();
        let mut light = lamp();
        let mut toggles = 0;
        for now_ms in [100u64, 300, 599] {
            let now = Duration::from_millis(now_ms);
            if light.is_triggered(covering_box(), now) {
                light.trigger(&mut grid, now).expect("trigger");
                toggles += 1;
            }
        }
        assert_eq!(toggles, 1);
        assert!(light.is_on());
        assert_eq!(grid.get(2, 2), Tile::LightOn);
    }

    #[test]
    fn contacts_spaced_past_cooldown_each_toggle() {
        let mut grid = grid_with_lamp();
        let mut light = lamp();
        let mut toggles = 0;
        for now_ms in [100u64, 700, 1300] {
            let now = Duration::from_millis(now_ms);
            if light.is_triggered(covering_box(), now) {
                light.trigger(&mut grid, now).expect("trigger");
                toggles += 1;
            }
        }
        assert_eq!(toggles, 3);
        assert!(light.is_on());
    }

    #[test]
    fn toggle_writes_tile_and_reports_region() {
        let mut grid = grid_with_lamp();
        let mut light = lamp();
        let region = light
            .trigger(&mut grid, Duration::from_millis(1))
            .expect("on");
        assert_eq!(region, Rect::new(-5, -5, 160, 160));
        assert!(light.is_drawn());

        light
            .trigger(&mut grid, Duration::from_secs(2))
            .expect("off");
        assert_eq!(grid.get(2, 2), Tile::LightOff);
        assert!(!light.is_drawn());
    }

    #[test]
    fn point_on_box_border_does_not_trigger() {
        let light = lamp();
        assert!(!light.is_triggered(Rect::new(75, 60, 20, 20), Duration::from_secs(1)));
    }

    #[test]
    fn glow_is_symmetric_and_fades_to_zero() {
        let light = lamp();
        let glow = light.pixels();
        assert_eq!((glow.width(), glow.height()), (160, 160));
        assert_eq!(glow.pixel(0, 0), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(glow.pixel(10, 40), glow.pixel(149, 40));
        assert_eq!(glow.pixel(10, 40), glow.pixel(10, 119));
        let center = glow.pixel(79, 79);
        assert!(center[0] > 0.95 && center[0] <= 1.0);
        assert!(center[0] > glow.pixel(40, 79)[0]);
    }

    #[test]
    fn zero_radius_is_rejected() {
        assert!(matches!(
            Light::new(PointPx::new(0, 0), 0, [1.0; 3]),
            Err(GeometryError::Degenerate { .. })
        ));
        let mut light = lamp();
        assert!(light.set_radius(-4).is_err());
        assert_eq!(light.radius(), 80);
    }

    #[test]
    fn packed_rgb_uses_byte_channels() {
        let light = Light::new(PointPx::new(0, 0), 10, [1.0, 0.5, 0.0]).expect("light");
        assert_eq!(light.packed_rgb(), 0xFF7F00);
    }

    #[test]
    fn seeded_radius_is_reproducible_and_in_range() {
        let config = LightConfig::default();
        let mut a = Pcg32::seed_from_u64(7);
        let mut b = Pcg32::seed_from_u64(7);
        for _ in 0..32 {
            let radius = config.random_radius(&mut a);
            assert_eq!(radius, config.random_radius(&mut b));
            assert!((75..175).contains(&radius));
        }
    }

    #[test]
    fn set_color_rebuilds_glow_and_keeps_geometry() {
        let mut light = lamp();
        let bounds = light.bounds();
        let before = light.pixels().pixel(79, 79);

        light.set_color([0.0, 1.0, 0.0]).expect("color");

        let after = light.pixels().pixel(79, 79);
        assert_eq!(light.color(), [0.0, 1.0, 0.0]);
        assert_eq!(light.radius(), 80);
        assert_eq!(light.bounds(), bounds);
        assert_eq!(after[0], 0.0);
        assert!((after[1] - before[0]).abs() < 1e-12);
        assert_eq!(after[2], 0.0);
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(LightConfig::default().validate(), Ok(()));
    }

    #[test]
    fn config_rejects_non_positive_and_oversized_radii() {
        let config = |min_radius, radius_span| LightConfig {
            min_radius,
            radius_span,
            ..LightConfig::default()
        };
        assert_eq!(
            config(0, 10).validate(),
            Err(LightConfigError::NonPositiveRadius { min_radius: 0 })
        );
        assert_eq!(
            config(i32::MAX - 10, 100).validate(),
            Err(LightConfigError::RadiusTooLarge {
                min_radius: i32::MAX - 10,
                radius_span: 100,
            })
        );
        assert!(config(1000, 100).validate().is_err());
        assert_eq!(config(MAX_LIGHT_RADIUS, 1).validate(), Ok(()));
        assert_eq!(config(MAX_LIGHT_RADIUS, -5).validate(), Ok(()));
    }

    #[test]
    fn random_radius_near_i32_max_does_not_overflow() {
        let config = LightConfig {
            min_radius: i32::MAX - 10,
            radius_span: 100,
            ..LightConfig::default()
        };
        let mut rng = Pcg32::seed_from_u64(3);
        let radius = config.random_radius(&mut rng);
        assert!(radius >= i32::MAX - 10);
    }

    #[test]
    fn light_for_cell_sits_at_cell_center() {
        let mut rng = Pcg32::seed_from_u64(1);
        let light =
            Light::for_cell(PointPx::new(60, 30), &LightConfig::default(), &mut rng).expect("light");
        assert_eq!(light.position(), PointPx::new(75, 45));
        assert_eq!(light.cell(), CellCoord::new(2, 1));
    }
}
