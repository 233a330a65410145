use std::time::Duration;

use crate::geometry::PointPx;
use crate::render::{DynamicProp, SpriteStamp, TexturePack};
use crate::world::TextureId;

const SPEED_PX_PER_SEC: f64 = 120.0;
const MAX_RADIUS_PX: i32 = 50;
const DIAGONAL: f64 = 0.707;

/// Eight sparks flying out from a point until they reach [`MAX_RADIUS_PX`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burst {
    center: PointPx,
    birth: Duration,
}

impl Burst {
    pub fn new(center: PointPx, birth: Duration) -> Self {
        Self { center, birth }
    }

    pub fn center(&self) -> PointPx {
        self.center
    }

    pub fn radius(&self, now: Duration) -> i32 {
        let age = now.saturating_sub(self.birth);
        (age.as_secs_f64() * SPEED_PX_PER_SEC) as i32
    }

    /// Once true, stays true for any later `now`.
    pub fn is_expired(&self, now: Duration) -> bool {
        self.radius(now) >= MAX_RADIUS_PX
    }

    /// Spark centers at the current radius, clockwise from the upper right.
    pub fn spark_centers(&self, now: Duration) -> [PointPx; 8] {
        let r = self.radius(now);
        let d = (f64::from(r) * DIAGONAL) as i32;
        [
            (d, d),
            (r, 0),
            (d, -d),
            (0, -r),
            (-d, -d),
            (-r, 0),
            (-d, d),
            (0, r),
        ]
        .map(|(dx, dy)| self.center.offset(dx, dy))
    }
}

impl DynamicProp for Burst {
    fn push_stamps<'a>(
        &self,
        now: Duration,
        textures: &'a TexturePack,
        out: &mut Vec<SpriteStamp<'a>>,
    ) {
        if self.is_expired(now) {
            return;
        }
        let sprite = textures.get(TextureId::Spark);
        let half_w = sprite.width() as i32 / 2;
        let half_h = sprite.height() as i32 / 2;
        for center in self.spark_centers(now) {
            out.push(SpriteStamp {
                origin: center.offset(-half_w, -half_h),
                sprite,
            });
        }
    }
}
