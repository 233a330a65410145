use std::time::Duration;

use crate::geometry::{GeometryError, PointPx, Rect};
use crate::render::{DynamicProp, SpriteStamp, TexturePack};
use crate::world::TextureId;

use super::{PhysicsConfig, Vector2D};

/// Capability of anything the physics step can move.
///
/// Forces accumulate between integrations and are cleared by [`Dynamic::integrate`]. Mass is
/// implicitly 1.
pub trait Dynamic {
    /// Collision box in world pixels.
    fn bounds(&self) -> Rect;
    fn translate(&mut self, dx: i32, dy: i32);
    fn velocity(&self) -> Vector2D;
    fn set_velocity(&mut self, velocity: Vector2D);
    fn accumulated_force(&self) -> Vector2D;
    fn set_accumulated_force(&mut self, force: Vector2D);
    fn set_on_ground(&mut self, on_ground: bool);

    /// Damps velocity by `1 - coefficient * dt` per axis, with the weaker vertical coefficient
    /// on Y.
    fn apply_drag(&mut self, config: &PhysicsConfig, dt_seconds: f64) {
        let factor_x = 1.0 - config.drag * dt_seconds;
        let factor_y = 1.0 - config.vertical_drag() * dt_seconds;
        self.set_velocity(self.velocity().scaled_axes(factor_x, factor_y));
    }

    fn apply_force(&mut self, force: Vector2D) {
        self.set_accumulated_force(self.accumulated_force() + force);
    }

    fn integrate(&mut self, dt_seconds: f64) {
        let velocity = self.velocity() + self.accumulated_force().scaled(dt_seconds);
        self.set_velocity(velocity);
        self.set_accumulated_force(Vector2D::ZERO);
    }
}

/// The player body. `position` is the minimum corner of the collision box; the sprite is
/// larger and drawn centered on the box.
#[derive(Debug, Clone, PartialEq)]
pub struct Hero {
    position: PointPx,
    velocity: Vector2D,
    force: Vector2D,
    box_width: i32,
    box_height: i32,
    sprite_width: i32,
    sprite_height: i32,
    sprite: TextureId,
    on_ground: bool,
}

impl Hero {
    pub const COLLISION_SCALE: f64 = 0.65;

    pub fn new(position: PointPx, sprite_width: u32, sprite_height: u32) -> Result<Self, GeometryError> {
        let box_width = (f64::from(sprite_width) * Self::COLLISION_SCALE) as i32;
        let box_height = (f64::from(sprite_height) * Self::COLLISION_SCALE) as i32;
        if box_width <= 0 || box_height <= 0 {
            return Err(GeometryError::Degenerate {
                what: "hero collision box",
                width: i64::from(box_width),
                height: i64::from(box_height),
            });
        }
        Ok(Self {
            position,
            velocity: Vector2D::ZERO,
            force: Vector2D::ZERO,
            box_width,
            box_height,
            sprite_width: sprite_width as i32,
            sprite_height: sprite_height as i32,
            sprite: TextureId::Hero,
            on_ground: false,
        })
    }

    pub fn position(&self) -> PointPx {
        self.position
    }

    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    pub fn sprite(&self) -> TextureId {
        self.sprite
    }

    pub fn set_sprite(&mut self, sprite: TextureId) {
        self.sprite = sprite;
    }

    pub fn sprite_size(&self) -> (i32, i32) {
        (self.sprite_width, self.sprite_height)
    }

    /// World-pixel corner where the sprite is drawn.
    pub fn sprite_origin(&self) -> PointPx {
        self.position.offset(
            -(self.sprite_width - self.box_width) / 2,
            -(self.sprite_height - self.box_height) / 2,
        )
    }
}

impl Dynamic for Hero {
    fn bounds(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.box_width,
            self.box_height,
        )
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        self.position = self.position.offset(dx, dy);
    }

    fn velocity(&self) -> Vector2D {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vector2D) {
        self.velocity = velocity;
    }

    fn accumulated_force(&self) -> Vector2D {
        self.force
    }

    fn set_accumulated_force(&mut self, force: Vector2D) {
        self.force = force;
    }

    fn set_on_ground(&mut self, on_ground: bool) {
        self.on_ground = on_ground;
    }
}

impl DynamicProp for Hero {
    fn push_stamps<'a>(
        &self,
        _now: Duration,
        textures: &'a TexturePack,
        out: &mut Vec<SpriteStamp<'a>>,
    ) {
        out.push(SpriteStamp {
            origin: self.sprite_origin(),
            sprite: textures.get(self.sprite),
        });
    }
}
