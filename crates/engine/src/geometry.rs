use thiserror::Error;

/// Integer world-pixel coordinate. World space has its origin at the bottom-left with +Y up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PointPx {
    pub x: i32,
    pub y: i32,
}

impl PointPx {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned rectangle in world pixels; `(x, y)` is the minimum (bottom-left) corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn top(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Overlap of two rectangles, `None` when they share no pixel.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let bottom = self.y.max(other.y);
        let right = self.right().min(other.right());
        let top = self.top().min(other.top());
        if left >= right || bottom >= top {
            return None;
        }
        Some(Rect::new(left, bottom, right - left, top - bottom))
    }

    /// Smallest rectangle covering both inputs. Empty inputs are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let left = self.x.min(other.x);
        let bottom = self.y.min(other.y);
        let right = self.right().max(other.right());
        let top = self.top().max(other.top());
        Rect::new(left, bottom, right - left, top - bottom)
    }

    /// Strict containment: points on the border are outside.
    pub fn contains_point_strict(&self, point: PointPx) -> bool {
        point.x > self.x && point.x < self.right() && point.y > self.y && point.y < self.top()
    }

    pub fn contains_point(&self, point: PointPx) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.top()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("{what} has degenerate size {width}x{height}")]
    Degenerate {
        what: &'static str,
        width: i64,
        height: i64,
    },
}
