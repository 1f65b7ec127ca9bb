//! Replays recorded touch traces through tracker → responder → view.
//!
//! A trace is JSON lines, one touch sample per line:
//!
//! ```text
//! {"kind":"down","t":0,"id":0,"x":120.0,"y":300.0}
//! {"kind":"move","t":16,"touches":[{"id":0,"x":124.0,"y":301.0}]}
//! {"kind":"up","t":40,"id":0}
//! {"kind":"cancel","t":90}
//! ```
//!
//! The pipeline stands in for the platform: it negotiates the responder the
//! way a view hierarchy with a single surface would, runs the tap timer and
//! drives animations with linear progress on the trace clock.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Profile;
use crate::gestures::{
    GestureNotification, GestureResponder, InteractionHandle, ResponderEvent, ResponderHost,
    TapToken,
};
use crate::touch::Timestamp;
use crate::tracker::Tracker;
use crate::transform::GeometryError;
use crate::view::{ViewEvent, ViewTransformer};

pub const DEFAULT_FRAME_MS: u64 = 16;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TracePoint {
    pub id: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TraceEvent {
    Down {
        t: Timestamp,
        id: usize,
        x: f64,
        y: f64,
    },
    Move {
        t: Timestamp,
        touches: Vec<TracePoint>,
    },
    Up {
        t: Timestamp,
        id: usize,
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    Cancel {
        t: Timestamp,
    },
}

impl TraceEvent {
    pub fn t(&self) -> Timestamp {
        match *self {
            Self::Down { t, .. }
            | Self::Move { t, .. }
            | Self::Up { t, .. }
            | Self::Cancel { t } => t,
        }
    }
}

/// Parse a JSON-lines trace. Blank lines and `#` comments are skipped.
pub fn parse_trace(text: &str) -> Result<Vec<TraceEvent>, TraceError> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ev = serde_json::from_str(line).map_err(|source| TraceError::Parse {
            line: i + 1,
            source,
        })?;
        out.push(ev);
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PipelineEvent {
    Gesture {
        t: Timestamp,
        notification: GestureNotification,
    },
    View {
        t: Timestamp,
        event: ViewEvent,
    },
}

/// Timer and interaction-handle facility on the trace clock.
#[derive(Debug, Default)]
pub struct ReplayHost {
    now: Timestamp,
    timers: Vec<(Timestamp, TapToken)>,
    next_handle: u64,
    live_handle: Option<u64>,
}

impl ReplayHost {
    fn next_due(&self) -> Option<(Timestamp, TapToken)> {
        self.timers.iter().min_by_key(|(due, _)| *due).copied()
    }

    fn remove(&mut self, token: TapToken) {
        self.timers.retain(|(_, t)| *t != token);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn interaction_live(&self) -> bool {
        self.live_handle.is_some()
    }
}

impl ResponderHost for ReplayHost {
    fn create_interaction_handle(&mut self) -> InteractionHandle {
        self.next_handle += 1;
        self.live_handle = Some(self.next_handle);
        InteractionHandle::new(self.next_handle)
    }

    fn clear_interaction_handle(&mut self, handle: InteractionHandle) {
        if self.live_handle == Some(handle.id()) {
            self.live_handle = None;
        } else {
            warn!("cleared unknown interaction handle {}", handle.id());
        }
    }

    fn schedule_tap_confirm(&mut self, token: TapToken, delay_ms: u64) {
        self.timers.push((self.now.saturating_add(delay_ms), token));
    }

    fn cancel_tap_confirm(&mut self, token: TapToken) {
        self.remove(token);
    }
}

#[derive(Debug, Clone, Copy)]
struct AnimationClock {
    start: Timestamp,
    duration_ms: u64,
    next_frame: Timestamp,
}

pub struct Pipeline {
    tracker: Tracker,
    responder: GestureResponder,
    view: ViewTransformer,
    host: ReplayHost,
    granted: bool,
    animation: Option<AnimationClock>,
    frame_ms: u64,
    last_t: Option<Timestamp>,
    events: Vec<PipelineEvent>,
}

impl Pipeline {
    pub fn new(profile: &Profile, frame_ms: u64) -> Self {
        Self {
            tracker: Tracker::new(),
            responder: GestureResponder::new(profile.responder.clone()),
            view: ViewTransformer::new(profile.view.clone(), profile.viewport),
            host: ReplayHost::default(),
            granted: false,
            animation: None,
            frame_ms: frame_ms.max(1),
            last_t: None,
            events: Vec::new(),
        }
    }

    pub fn view(&self) -> &ViewTransformer {
        &self.view
    }

    pub fn host(&self) -> &ReplayHost {
        &self.host
    }

    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<PipelineEvent> {
        self.events
    }

    pub fn feed(&mut self, ev: &TraceEvent) -> Result<(), GeometryError> {
        let t = ev.t();
        if self.last_t.is_some_and(|last| t < last) {
            warn!("trace goes back in time at t={t}; velocities will be meaningless");
        }
        self.last_t = Some(t);
        self.advance_to(t)?;
        self.host.now = t;

        match ev {
            TraceEvent::Down { id, x, y, .. } => {
                self.tracker.touch_down(*id, *x, *y, t);
                let touches = self.tracker.active_count();
                let capture = self.send(ResponderEvent::StartShouldSetCapture { touches })?;
                if !self.granted {
                    let claim = capture == Some(true)
                        || self.send(ResponderEvent::StartShouldSet)? == Some(true);
                    if claim {
                        self.grant()?;
                    }
                }
                if self.granted {
                    self.send(ResponderEvent::Start)?;
                }
            }
            TraceEvent::Move { touches, .. } => {
                for p in touches {
                    self.tracker.touch_move(p.id, p.x, p.y, t);
                }
                if !self.granted {
                    let claim = self.send(ResponderEvent::MoveShouldSetCapture)? == Some(true)
                        || self.send(ResponderEvent::MoveShouldSet)? == Some(true);
                    if claim {
                        self.grant()?;
                    }
                }
                if self.granted {
                    self.send(ResponderEvent::Move)?;
                }
            }
            TraceEvent::Up { id, x, y, .. } => {
                let pos = x.zip(*y);
                self.tracker.touch_up(*id, pos, t);
                if self.granted {
                    self.send(ResponderEvent::End)?;
                    if self.tracker.active_count() == 0 {
                        self.send(ResponderEvent::Release)?;
                        self.granted = false;
                    }
                }
            }
            TraceEvent::Cancel { .. } => {
                self.tracker.cancel_all(t);
                if self.granted {
                    self.send(ResponderEvent::Terminate)?;
                    self.granted = false;
                }
            }
        }
        Ok(())
    }

    /// Run every pending timer and animation frame to completion.
    pub fn finish(&mut self) -> Result<(), GeometryError> {
        self.advance_to(Timestamp::MAX)
    }

    fn grant(&mut self) -> Result<(), GeometryError> {
        let block = self.send(ResponderEvent::Grant)?;
        debug!("responder granted (block native: {block:?})");
        self.granted = true;
        Ok(())
    }

    fn advance_to(&mut self, t: Timestamp) -> Result<(), GeometryError> {
        loop {
            let timer = self.host.next_due().filter(|(due, _)| *due <= t);
            let frame = self.animation.map(|a| a.next_frame).filter(|f| *f <= t);
            match (timer, frame) {
                (Some((due, token)), Some(f)) if due <= f => self.fire_timer(due, token)?,
                (_, Some(f)) => self.fire_frame(f)?,
                (Some((due, token)), None) => self.fire_timer(due, token)?,
                (None, None) => return Ok(()),
            }
        }
    }

    fn fire_timer(&mut self, due: Timestamp, token: TapToken) -> Result<(), GeometryError> {
        self.host.remove(token);
        self.host.now = due;
        self.send(ResponderEvent::TapConfirmDue(token))?;
        Ok(())
    }

    fn fire_frame(&mut self, at: Timestamp) -> Result<(), GeometryError> {
        let Some(mut clock) = self.animation else {
            return Ok(());
        };
        self.host.now = at;
        let elapsed = at.saturating_sub(clock.start);
        let next_frame = at.saturating_add(self.frame_ms);
        // no later frame exists at the end of the clock: land on the target
        let progress = if clock.duration_ms == 0 || next_frame == at {
            1.0
        } else {
            (elapsed as f64 / clock.duration_ms as f64).min(1.0)
        };
        if let Some(ev) = self.view.on_animation_frame(progress)? {
            self.events.push(PipelineEvent::View { t: at, event: ev });
        }
        if progress >= 1.0 {
            self.animation = None;
        } else {
            clock.next_frame = next_frame;
            self.animation = Some(clock);
        }
        Ok(())
    }

    fn send(&mut self, event: ResponderEvent) -> Result<Option<bool>, GeometryError> {
        let t = self.host.now;
        let transition = self
            .responder
            .handle(event, self.tracker.history(), &mut self.host);
        for n in transition.notifications {
            let view_events = self.view.handle(&n)?;
            self.events.push(PipelineEvent::Gesture {
                t,
                notification: n,
            });
            for ve in view_events {
                match ve {
                    ViewEvent::AnimationStarted { duration_ms, .. } => {
                        self.animation = Some(AnimationClock {
                            start: t,
                            duration_ms,
                            next_frame: t.saturating_add(self.frame_ms),
                        });
                    }
                    ViewEvent::AnimationStopped => self.animation = None,
                    _ => {}
                }
                self.events.push(PipelineEvent::View { t, event: ve });
            }
        }
        Ok(transition.claim)
    }
}

/// Replay a whole trace and return everything it produced.
pub fn replay(
    profile: &Profile,
    trace: &[TraceEvent],
    frame_ms: u64,
) -> Result<Vec<PipelineEvent>, TraceError> {
    let mut pipeline = Pipeline::new(profile, frame_ms);
    for ev in trace {
        pipeline.feed(ev)?;
    }
    pipeline.finish()?;
    Ok(pipeline.into_events())
}
