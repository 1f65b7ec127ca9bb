//! Rectangle and point value types used by the transform algebra.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle given by its four edges.
///
/// `Rect` is `Copy`: every binding is an independent value, so mutating one
/// through [`Rect::offset`] or [`Rect::set`] never affects a rect handed out
/// elsewhere. Equality is exact edge equality.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rect of the given size with its top-left corner at the origin.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Rect of the given size centered on `(cx, cy)`.
    pub fn centered(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.center_x(), self.center_y())
    }

    /// Shift all four edges in place.
    pub fn offset(&mut self, dx: f64, dy: f64) -> &mut Self {
        self.left += dx;
        self.right += dx;
        self.top += dy;
        self.bottom += dy;
        self
    }

    /// Copy of `self` shifted by `(dx, dy)`.
    pub fn offset_by(mut self, dx: f64, dy: f64) -> Self {
        self.offset(dx, dy);
        self
    }

    pub fn set(&mut self, left: f64, top: f64, right: f64, bottom: f64) -> &mut Self {
        self.left = left;
        self.top = top;
        self.right = right;
        self.bottom = bottom;
        self
    }

    /// Finite edges with `right >= left` and `bottom >= top`. Zero-area rects
    /// are valid.
    pub fn is_valid(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite()
            && self.right >= self.left
            && self.bottom >= self.top
    }

    /// Edge-wise linear interpolation towards `to`.
    pub fn lerp(&self, to: &Rect, progress: f64) -> Rect {
        Rect::new(
            self.left + (to.left - self.left) * progress,
            self.top + (to.top - self.top) * progress,
            self.right + (to.right - self.right) * progress,
            self.bottom + (to.bottom - self.bottom) * progress,
        )
    }
}
