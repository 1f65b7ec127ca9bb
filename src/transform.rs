//! Affine view transforms (scale + translate about an optional pivot) and the
//! rectangle algebra built on them.

use serde::Serialize;
use thiserror::Error;

use crate::geometry::{Point, Rect};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("invalid rect: {0:?}")]
    InvalidRect(Rect),
    #[error("invalid transform: scale={scale}, translate=({translate_x}, {translate_y})")]
    InvalidTransform {
        scale: f64,
        translate_x: f64,
        translate_y: f64,
    },
    #[error("invalid pivot: ({0}, {1})")]
    InvalidPivot(f64, f64),
}

/// Scale about `pivot` (or the rect's own center when absent), then translate
/// by `(translate_x, translate_y) * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    scale: f64,
    translate_x: f64,
    translate_y: f64,
    pivot: Option<Point>,
}

impl Transform {
    pub fn new(scale: f64, translate_x: f64, translate_y: f64) -> Result<Self, GeometryError> {
        let t = Self::unchecked(scale, translate_x, translate_y, None);
        t.validate()?;
        Ok(t)
    }

    pub fn with_pivot(
        scale: f64,
        translate_x: f64,
        translate_y: f64,
        pivot: Point,
    ) -> Result<Self, GeometryError> {
        let t = Self::unchecked(scale, translate_x, translate_y, Some(pivot));
        t.validate()?;
        Ok(t)
    }

    pub fn identity() -> Self {
        Self::unchecked(1.0, 0.0, 0.0, None)
    }

    fn unchecked(scale: f64, translate_x: f64, translate_y: f64, pivot: Option<Point>) -> Self {
        Self {
            scale,
            translate_x,
            translate_y,
            pivot,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translate_x(&self) -> f64 {
        self.translate_x
    }

    pub fn translate_y(&self) -> f64 {
        self.translate_y
    }

    pub fn pivot(&self) -> Option<Point> {
        self.pivot
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if !(self.scale.is_finite()
            && self.scale > 0.0
            && self.translate_x.is_finite()
            && self.translate_y.is_finite())
        {
            return Err(GeometryError::InvalidTransform {
                scale: self.scale,
                translate_x: self.translate_x,
                translate_y: self.translate_y,
            });
        }
        if let Some(p) = self.pivot {
            if !p.is_finite() {
                return Err(GeometryError::InvalidPivot(p.x, p.y));
            }
        }
        Ok(())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Largest rect with `aspect_ratio` (width / height) centered inside `container`.
pub fn fit_center_rect(aspect_ratio: f64, container: &Rect) -> Rect {
    let mut w = container.width();
    let mut h = container.height();
    let view_aspect_ratio = w / h;

    if aspect_ratio > view_aspect_ratio {
        h = w / aspect_ratio;
    } else {
        w = h * aspect_ratio;
    }

    Rect::centered(container.center_x(), container.center_y(), w, h)
}

pub fn transformed_rect(rect: &Rect, transform: &Transform) -> Result<Rect, GeometryError> {
    if !rect.is_valid() {
        return Err(GeometryError::InvalidRect(*rect));
    }
    transform.validate()?;

    let scale = transform.scale;
    let width = rect.width() * scale;
    let height = rect.height() * scale;
    let center_x = rect.center_x() + transform.translate_x * scale;
    let center_y = rect.center_y() + transform.translate_y * scale;
    let mut result = Rect::centered(center_x, center_y, width, height);

    if let Some(pivot) = transform.pivot {
        // keep the pivot at the same relative position inside the result
        let dx = (scale - 1.0) * (pivot.x - result.center_x());
        let dy = (scale - 1.0) * (pivot.y - result.center_y());
        result.offset(-dx, -dy);
    }
    Ok(result)
}

/// Pivot-less transform mapping `from` onto `to`.
///
/// Caller must ensure `from.width() > 0`; a degenerate source yields a
/// non-finite transform that [`transformed_rect`] will reject.
pub fn get_transform(from: &Rect, to: &Rect) -> Transform {
    let scale = to.width() / from.width();
    let translate_x = (to.center_x() - from.center_x()) / scale;
    let translate_y = (to.center_y() - from.center_y()) / scale;
    Transform::unchecked(scale, translate_x, translate_y, None)
}

/// Shift `rect` so it leaves no avoidable empty space inside `viewport`.
///
/// Per axis: a rect larger than the viewport has its gap-exposing edge snapped
/// to the viewport edge; a smaller rect is centered.
pub fn aligned_rect(rect: &Rect, viewport: &Rect) -> Rect {
    let dx = if rect.width() > viewport.width() {
        if rect.left > viewport.left {
            viewport.left - rect.left
        } else if rect.right < viewport.right {
            viewport.right - rect.right
        } else {
            0.0
        }
    } else {
        viewport.center_x() - rect.center_x()
    };

    let dy = if rect.height() > viewport.height() {
        if rect.top > viewport.top {
            viewport.top - rect.top
        } else if rect.bottom < viewport.bottom {
            viewport.bottom - rect.bottom
        } else {
            0.0
        }
    } else {
        viewport.center_y() - rect.center_y()
    };

    rect.offset_by(dx, dy)
}

/// Remaining pan room on each side of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TranslateSpace {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// Margins by which `rect` overhangs `viewport` on each side; negative values
/// mean the rect no longer covers the viewport there.
pub fn available_translate_space(rect: &Rect, viewport: &Rect) -> TranslateSpace {
    TranslateSpace {
        left: viewport.left - rect.left,
        right: rect.right - viewport.right,
        top: viewport.top - rect.top,
        bottom: rect.bottom - viewport.bottom,
    }
}
