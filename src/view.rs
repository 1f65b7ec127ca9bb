//! Turns gesture notifications into a scale / translate view state.
//!
//! The controller owns no timers or renderers. It emits [`ViewEvent`]s and
//! expects an animation driver to call [`ViewTransformer::on_animation_frame`]
//! with progress in `[0, 1]` after an [`ViewEvent::AnimationStarted`].

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::gestures::{GestureNotification, GestureState};
use crate::transform::{
    GeometryError, Transform, aligned_rect, available_translate_space, fit_center_rect,
    get_transform, transformed_rect,
};

pub const DEFAULT_ANIMATION_MS: u64 = 200;

/// Content past the viewport edge moves at a third of the finger speed.
const RESISTANCE_FACTOR: f64 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewProps {
    /// Overrun past which resisted panning stops altogether.
    pub max_over_scroll_distance: f64,
    pub enable_scale: bool,
    pub enable_translate: bool,
    pub enable_transform: bool,
    pub max_scale: f64,
    pub enable_resistance: bool,
    pub content_aspect_ratio: Option<f64>,
    /// The host handles releases itself: only `Released` is emitted, with no
    /// double-tap zoom, fling or bounce.
    pub release_handled_by_host: bool,
}

impl Default for ViewProps {
    fn default() -> Self {
        Self {
            max_over_scroll_distance: 20.0,
            enable_scale: true,
            enable_translate: true,
            enable_transform: true,
            max_scale: 1.0,
            enable_resistance: false,
            content_aspect_ratio: None,
            release_handled_by_host: false,
        }
    }
}

/// Measured size of the hosting surface and its absolute page position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    pub page_x: f64,
    pub page_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewEvent {
    TransformStart,
    Transformed(ViewTransform),
    AnimationStarted { from: Rect, to: Rect, duration_ms: u64 },
    AnimationStopped,
    /// Fingers lifted with residual velocity; continuation is up to the host.
    Fling { vx: f64, vy: f64 },
    SingleTapConfirmed,
    /// Fingers lifted (or the gesture was terminated) with the view in this state.
    Released(ViewTransform),
}

#[derive(Debug, Clone, Copy)]
struct Animation {
    from: Rect,
    to: Rect,
}

#[derive(Debug)]
pub struct ViewTransformer {
    props: ViewProps,
    layout: Layout,
    scale: f64,
    translate_x: f64,
    translate_y: f64,
    animation: Option<Animation>,
}

impl ViewTransformer {
    pub fn new(props: ViewProps, layout: Layout) -> Self {
        Self {
            props,
            layout,
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            animation: None,
        }
    }

    pub fn props(&self) -> &ViewProps {
        &self.props
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    pub fn view_transform(&self) -> ViewTransform {
        ViewTransform {
            scale: self.scale,
            translate_x: self.translate_x,
            translate_y: self.translate_y,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn viewport_rect(&self) -> Rect {
        Rect::from_size(self.layout.width, self.layout.height)
    }

    /// Content framed inside the viewport at scale 1.
    pub fn content_rect(&self) -> Rect {
        let viewport = self.viewport_rect();
        match self.props.content_aspect_ratio {
            Some(ar) if ar > 0.0 => fit_center_rect(ar, &viewport),
            _ => viewport,
        }
    }

    pub fn current_transform(&self) -> Result<Transform, GeometryError> {
        Transform::new(self.scale, self.translate_x, self.translate_y)
    }

    /// Where the content currently sits on screen.
    pub fn transformed_content_rect(&self) -> Result<Rect, GeometryError> {
        let rect = transformed_rect(&self.viewport_rect(), &self.current_transform()?)?;
        Ok(match self.props.content_aspect_ratio {
            Some(ar) if ar > 0.0 => fit_center_rect(ar, &rect),
            _ => rect,
        })
    }

    /// Overwrite the view state; `transform`'s pivot is ignored.
    pub fn set_transform(&mut self, transform: &Transform) -> ViewEvent {
        self.scale = transform.scale();
        self.translate_x = transform.translate_x();
        self.translate_y = transform.translate_y();
        ViewEvent::Transformed(self.view_transform())
    }

    pub fn handle(
        &mut self,
        notification: &GestureNotification,
    ) -> Result<Vec<ViewEvent>, GeometryError> {
        if !self.props.enable_transform {
            return Ok(Vec::new());
        }
        match notification {
            GestureNotification::Grant(_) => {
                let mut out = Vec::new();
                if self.cancel_animation() {
                    out.push(ViewEvent::AnimationStopped);
                }
                out.push(ViewEvent::TransformStart);
                Ok(out)
            }
            GestureNotification::Move(state) => self.on_move(state),
            GestureNotification::Release(state) | GestureNotification::Terminate(state) => {
                let mut out = vec![ViewEvent::Released(self.view_transform())];
                if self.props.release_handled_by_host {
                    debug!("release left to the host");
                } else {
                    out.extend(self.on_release(state)?);
                }
                Ok(out)
            }
            GestureNotification::SingleTapConfirmed(_) => Ok(vec![ViewEvent::SingleTapConfirmed]),
            GestureNotification::Reject(_)
            | GestureNotification::Start(_)
            | GestureNotification::End(_) => Ok(Vec::new()),
        }
    }

    fn on_move(&mut self, state: &GestureState) -> Result<Vec<ViewEvent>, GeometryError> {
        let mut out = Vec::new();
        if self.cancel_animation() {
            out.push(ViewEvent::AnimationStopped);
        }

        let mut dx = state.move_x - state.previous_move_x;
        let mut dy = state.move_y - state.previous_move_y;
        if self.props.enable_resistance {
            (dx, dy) = self.apply_resistance(dx, dy)?;
        }
        if !self.props.enable_translate {
            dx = 0.0;
            dy = 0.0;
        }

        // fingers meeting (zero distance) carry no usable ratio; pan instead
        let pinch = match (state.pinch, state.previous_pinch) {
            (Some(p), Some(prev)) if self.props.enable_scale && p > 0.0 && prev > 0.0 => {
                Some(p / prev).filter(|s| s.is_finite() && *s > 0.0)
            }
            _ => None,
        };

        if let Some(scale_by) = pinch {
            let pivot = Point::new(
                state.move_x - self.layout.page_x,
                state.move_y - self.layout.page_y,
            );
            let content = self.content_rect();
            let current = transformed_rect(&content, &self.current_transform()?)?;
            let rect = transformed_rect(
                &current,
                &Transform::with_pivot(scale_by, dx, dy, pivot)?,
            )?;
            let next = get_transform(&content, &rect);
            next.validate()?;
            out.push(self.set_transform(&next));
        } else {
            if dx.abs() > 2.0 * dy.abs() {
                dy = 0.0;
            } else if dy.abs() > 2.0 * dx.abs() {
                dx = 0.0;
            }
            self.translate_x += dx / self.scale;
            self.translate_y += dy / self.scale;
            out.push(ViewEvent::Transformed(self.view_transform()));
        }
        Ok(out)
    }

    /// Damp a pan delta that drags content further past the viewport edge.
    pub fn apply_resistance(&self, dx: f64, dy: f64) -> Result<(f64, f64), GeometryError> {
        let space =
            available_translate_space(&self.transformed_content_rect()?, &self.viewport_rect());
        let max = self.props.max_over_scroll_distance;
        let damp = |d: f64, overrun: f64| {
            if overrun >= max {
                0.0
            } else {
                d / RESISTANCE_FACTOR
            }
        };

        let dx = if dx > 0.0 && space.left < 0.0 {
            damp(dx, -space.left)
        } else if dx < 0.0 && space.right < 0.0 {
            damp(dx, -space.right)
        } else {
            dx
        };
        let dy = if dy > 0.0 && space.top < 0.0 {
            damp(dy, -space.top)
        } else if dy < 0.0 && space.bottom < 0.0 {
            damp(dy, -space.bottom)
        } else {
            dy
        };
        Ok((dx, dy))
    }

    fn on_release(&mut self, state: &GestureState) -> Result<Vec<ViewEvent>, GeometryError> {
        if state.double_tap_up {
            if !self.props.enable_scale {
                return Ok(self.animate_bounce()?.into_iter().collect());
            }
            let pivot = if state.dx != 0.0 || state.dy != 0.0 {
                Point::new(
                    state.move_x - self.layout.page_x,
                    state.move_y - self.layout.page_y,
                )
            } else {
                Point::new(state.x0 - self.layout.page_x, state.y0 - self.layout.page_y)
            };
            return Ok(self.perform_double_tap_up(pivot)?.into_iter().collect());
        }

        let mut out = Vec::new();
        if self.props.enable_translate {
            out.push(ViewEvent::Fling {
                vx: state.vx,
                vy: state.vy,
            });
            if (1.0..=self.props.max_scale).contains(&self.scale) {
                return Ok(out);
            }
        }
        out.extend(self.animate_bounce()?);
        Ok(out)
    }

    /// Toggle between fit and `max_scale` around `pivot`, then bring the
    /// pivot to the viewport center.
    pub fn perform_double_tap_up(
        &mut self,
        pivot: Point,
    ) -> Result<Option<ViewEvent>, GeometryError> {
        debug!("double tap at ({}, {})", pivot.x, pivot.y);
        let max_scale = self.props.max_scale;
        let scale_by = if self.scale > (1.0 + max_scale) / 2.0 {
            1.0 / self.scale
        } else {
            max_scale / self.scale
        };

        let viewport = self.viewport_rect();
        let rect = transformed_rect(
            &self.transformed_content_rect()?,
            &Transform::with_pivot(scale_by, 0.0, 0.0, pivot)?,
        )?;
        let rect = transformed_rect(
            &rect,
            &Transform::new(1.0, viewport.center_x() - pivot.x, viewport.center_y() - pivot.y)?,
        )?;
        let target = aligned_rect(&rect, &viewport);
        self.animate(target, DEFAULT_ANIMATION_MS)
    }

    /// Animate back into `[1, max_scale]` about the viewport center and
    /// re-align.
    pub fn animate_bounce(&mut self) -> Result<Option<ViewEvent>, GeometryError> {
        let target_scale = self.scale.clamp(1.0, self.props.max_scale.max(1.0));
        let scale_by = target_scale / self.scale;

        let viewport = self.viewport_rect();
        let rect = transformed_rect(
            &self.transformed_content_rect()?,
            &Transform::with_pivot(scale_by, 0.0, 0.0, viewport.center())?,
        )?;
        let target = aligned_rect(&rect, &viewport);
        self.animate(target, DEFAULT_ANIMATION_MS)
    }

    /// Start animating the content rect towards `target`. Returns `None` when
    /// the content is already there.
    pub fn animate(
        &mut self,
        target: Rect,
        duration_ms: u64,
    ) -> Result<Option<ViewEvent>, GeometryError> {
        let from = self.transformed_content_rect()?;
        if from == target {
            debug!("animate: already at target, skipping");
            return Ok(None);
        }
        self.animation = Some(Animation { from, to: target });
        Ok(Some(ViewEvent::AnimationStarted {
            from,
            to: target,
            duration_ms,
        }))
    }

    /// Apply one animation frame. Frames after cancellation or completion are
    /// ignored.
    pub fn on_animation_frame(
        &mut self,
        progress: f64,
    ) -> Result<Option<ViewEvent>, GeometryError> {
        let Some(anim) = self.animation else {
            return Ok(None);
        };
        let progress = progress.clamp(0.0, 1.0);
        let rect = anim.from.lerp(&anim.to, progress);
        let next = get_transform(&self.content_rect(), &rect);
        next.validate()?;
        if progress >= 1.0 {
            self.animation = None;
        }
        Ok(Some(self.set_transform(&next)))
    }

    /// Stop producing frames. Returns whether an animation was running.
    pub fn cancel_animation(&mut self) -> bool {
        self.animation.take().is_some()
    }
}
