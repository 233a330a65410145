use crate::geometry::PointPx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Screen position (top-left origin, +Y down) of a world pixel. `camera` is the world pixel
/// shown at the bottom-left corner of the screen.
pub fn world_to_screen_px(world: PointPx, camera: PointPx, viewport: Viewport) -> (i32, i32) {
    let x = world.x - camera.x;
    let y = viewport.height as i32 - 1 - (world.y - camera.y);
    (x, y)
}
