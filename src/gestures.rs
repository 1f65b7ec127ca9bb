//! Responder lifecycle for one surface: tap / drag / pinch disambiguation.
//!
//! The platform (or [`crate::pipeline`]) feeds [`ResponderEvent`]s one at a
//! time together with the current [`TouchHistory`]; each call returns a
//! [`Transition`] carrying the claim decision, if the event asks for one, and
//! the notifications for the surface.
//!
//! Preconditions: timestamps in the ledger are monotonic and the ledger is
//! well formed. Nothing here validates that.

use log::debug;
use serde::Serialize;

use crate::config::ResponderConfig;
use crate::touch::{
    Sample, Timestamp, TouchHistory, convert_to_millis_if_needed, current_centroid_x,
    current_centroid_y, current_centroid_x_of_touches_changed_after,
    current_centroid_y_of_touches_changed_after, pinch_distance,
    previous_centroid_x_of_touches_changed_after, previous_centroid_y_of_touches_changed_after,
};

/// Per-session gesture record. Reset when the first finger lands and after
/// release / terminate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GestureState {
    pub move_x: f64,
    pub move_y: f64,
    pub previous_move_x: f64,
    pub previous_move_y: f64,
    pub x0: f64,
    pub y0: f64,
    pub dx: f64,
    pub dy: f64,
    pub vx: f64,
    pub vy: f64,
    pub number_active_touches: usize,
    pub pinch: Option<f64>,
    pub previous_pinch: Option<f64>,
    pub single_tap_up: bool,
    pub double_tap_up: bool,
    #[serde(skip)]
    pub(crate) accounts_for_moves_up_to: Timestamp,
    #[serde(skip)]
    pub(crate) grant_timestamp: Timestamp,
    #[serde(skip)]
    pub(crate) single_tap_failed: bool,
}

impl GestureState {
    /// Newest ledger timestamp already folded into this state.
    pub fn accounts_for_moves_up_to(&self) -> Timestamp {
        self.accounts_for_moves_up_to
    }
}

/// Opaque "gesture in flight" token issued by the host.
#[derive(Debug, PartialEq, Eq)]
pub struct InteractionHandle(u64);

impl InteractionHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Identity of one deferred single-tap confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TapToken(u64);

impl TapToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Facilities the responder borrows from its host.
pub trait ResponderHost {
    fn create_interaction_handle(&mut self) -> InteractionHandle;
    fn clear_interaction_handle(&mut self, handle: InteractionHandle);
    /// Deliver [`ResponderEvent::TapConfirmDue`] with `token` after `delay_ms`.
    fn schedule_tap_confirm(&mut self, token: TapToken, delay_ms: u64);
    fn cancel_tap_confirm(&mut self, token: TapToken);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderEvent {
    /// A finger landed; `touches` is the number of touches on screen.
    StartShouldSetCapture { touches: usize },
    StartShouldSet,
    MoveShouldSetCapture,
    MoveShouldSet,
    Grant,
    Reject,
    Start,
    Move,
    End,
    Release,
    Terminate,
    TerminationRequest,
    TapConfirmDue(TapToken),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum GestureNotification {
    Grant(GestureState),
    Reject(GestureState),
    Start(GestureState),
    Move(GestureState),
    End(GestureState),
    Release(GestureState),
    Terminate(GestureState),
    SingleTapConfirmed(GestureState),
}

impl GestureNotification {
    pub fn state(&self) -> &GestureState {
        match self {
            Self::Grant(s)
            | Self::Reject(s)
            | Self::Start(s)
            | Self::Move(s)
            | Self::End(s)
            | Self::Release(s)
            | Self::Terminate(s)
            | Self::SingleTapConfirmed(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    /// Answer to a claim / block / termination query; `None` for plain events.
    pub claim: Option<bool>,
    pub notifications: Vec<GestureNotification>,
}

impl Transition {
    fn claim(value: bool) -> Self {
        Self {
            claim: Some(value),
            notifications: Vec::new(),
        }
    }

    fn notify(n: GestureNotification) -> Self {
        Self {
            claim: None,
            notifications: vec![n],
        }
    }
}

#[derive(Debug)]
pub struct GestureResponder {
    config: ResponderConfig,
    state: GestureState,
    interaction: Option<InteractionHandle>,
    pending_tap: Option<(TapToken, GestureState)>,
    next_token: u64,
    last_tap_release: Option<Timestamp>,
}

impl GestureResponder {
    pub fn new(config: ResponderConfig) -> Self {
        Self {
            config,
            state: GestureState::default(),
            interaction: None,
            pending_tap: None,
            next_token: 0,
            last_tap_release: None,
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn holds_interaction(&self) -> bool {
        self.interaction.is_some()
    }

    pub fn pending_tap(&self) -> Option<TapToken> {
        self.pending_tap.map(|(token, _)| token)
    }

    pub fn handle<H: ResponderHost + ?Sized>(
        &mut self,
        event: ResponderEvent,
        history: &TouchHistory,
        host: &mut H,
    ) -> Transition {
        match event {
            ResponderEvent::StartShouldSetCapture { touches } => {
                self.log("start_should_set_capture");
                self.cancel_single_tap_confirm(host);
                if touches == 1 {
                    self.state = GestureState::default();
                }
                self.state.number_active_touches = history.number_active_touches;
                Transition::claim(self.config.claim.start_capture)
            }
            ResponderEvent::StartShouldSet => {
                self.log("start_should_set");
                self.cancel_single_tap_confirm(host);
                Transition::claim(self.config.claim.start)
            }
            ResponderEvent::MoveShouldSetCapture => {
                self.log("move_should_set_capture");
                if self.state.accounts_for_moves_up_to == history.most_recent_timestamp {
                    return Transition::claim(false);
                }
                self.update_on_move(history);
                Transition::claim(self.config.claim.move_capture && self.effective_move())
            }
            ResponderEvent::MoveShouldSet => {
                self.log("move_should_set");
                Transition::claim(self.config.claim.on_move && self.effective_move())
            }
            ResponderEvent::Grant => self.on_grant(history, host),
            ResponderEvent::Reject => {
                self.log("reject");
                self.clear_interaction(host);
                Transition::notify(GestureNotification::Reject(self.state))
            }
            ResponderEvent::Start => {
                self.log("start");
                self.state.number_active_touches = history.number_active_touches;
                Transition::notify(GestureNotification::Start(self.state))
            }
            ResponderEvent::Move => {
                if self.state.accounts_for_moves_up_to == history.most_recent_timestamp {
                    return Transition::default();
                }
                self.update_on_move(history);
                self.log("move");
                if self.effective_move() {
                    Transition::notify(GestureNotification::Move(self.state))
                } else {
                    Transition::default()
                }
            }
            ResponderEvent::End => self.on_end(history, host),
            ResponderEvent::Release => self.on_release(history, host),
            ResponderEvent::Terminate => {
                self.log("terminate");
                self.clear_interaction(host);
                let n = GestureNotification::Terminate(self.state);
                self.state = GestureState::default();
                Transition::notify(n)
            }
            ResponderEvent::TerminationRequest => {
                self.log("termination_request");
                Transition::claim(self.config.allow_termination)
            }
            ResponderEvent::TapConfirmDue(token) => match self.pending_tap {
                Some((pending, snapshot)) if pending == token => {
                    self.pending_tap = None;
                    self.log("single_tap_confirmed");
                    Transition::notify(GestureNotification::SingleTapConfirmed(snapshot))
                }
                _ => {
                    debug!("stale tap confirmation {} ignored", token.id());
                    Transition::default()
                }
            },
        }
    }

    fn on_grant<H: ResponderHost + ?Sized>(
        &mut self,
        history: &TouchHistory,
        host: &mut H,
    ) -> Transition {
        self.log("grant");
        self.cancel_single_tap_confirm(host);
        if self.interaction.is_none() {
            self.interaction = Some(host.create_interaction_handle());
        }
        self.state.grant_timestamp = history.most_recent_timestamp;
        self.state.x0 = current_centroid_x(history).unwrap_or(self.state.x0);
        self.state.y0 = current_centroid_y(history).unwrap_or(self.state.y0);
        self.state.dx = 0.0;
        self.state.dy = 0.0;
        Transition {
            claim: Some(self.config.block_native_responder),
            notifications: vec![GestureNotification::Grant(self.state)],
        }
    }

    fn on_end<H: ResponderHost + ?Sized>(
        &mut self,
        history: &TouchHistory,
        host: &mut H,
    ) -> Transition {
        let th = &self.config.thresholds;
        self.state.number_active_touches = history.number_active_touches;

        let since_grant = convert_to_millis_if_needed(
            history
                .most_recent_timestamp
                .saturating_sub(self.state.grant_timestamp) as f64,
        );
        if history.number_active_touches > 0
            || since_grant > th.tap_ms as f64
            || self.state.dx.abs() >= th.tap_move_tol
            || self.state.dy.abs() >= th.tap_move_tol
        {
            self.state.single_tap_failed = true;
        }
        if !self.state.single_tap_failed {
            self.state.single_tap_up = true;
        }

        self.log("end");
        self.clear_interaction(host);
        Transition::notify(GestureNotification::End(self.state))
    }

    fn on_release<H: ResponderHost + ?Sized>(
        &mut self,
        history: &TouchHistory,
        host: &mut H,
    ) -> Transition {
        let now = history.most_recent_timestamp;
        let tap_ms = self.config.thresholds.tap_ms;

        if self.state.single_tap_up {
            if let Some(last) = self.last_tap_release.take() {
                let gap = convert_to_millis_if_needed(now.saturating_sub(last) as f64);
                if gap < tap_ms as f64 {
                    self.state.double_tap_up = true;
                }
            }
            if !self.state.double_tap_up {
                self.cancel_single_tap_confirm(host);
                let token = TapToken(self.next_token);
                self.next_token += 1;
                self.pending_tap = Some((token, self.state));
                host.schedule_tap_confirm(token, tap_ms);
                self.last_tap_release = Some(now);
            }
        } else {
            self.last_tap_release = None;
        }

        self.log("release");
        self.clear_interaction(host);
        let n = GestureNotification::Release(self.state);
        self.state = GestureState::default();
        Transition::notify(n)
    }

    fn update_on_move(&mut self, history: &TouchHistory) {
        let moved_after = self.state.accounts_for_moves_up_to;
        let x = current_centroid_x_of_touches_changed_after(history, moved_after)
            .unwrap_or(self.state.move_x);
        let y = current_centroid_y_of_touches_changed_after(history, moved_after)
            .unwrap_or(self.state.move_y);
        let prev_x =
            previous_centroid_x_of_touches_changed_after(history, moved_after).unwrap_or(x);
        let prev_y =
            previous_centroid_y_of_touches_changed_after(history, moved_after).unwrap_or(y);
        let dx = x - prev_x;
        let dy = y - prev_y;

        let s = &mut self.state;
        s.number_active_touches = history.number_active_touches;
        s.move_x = x;
        s.move_y = y;

        let dt = convert_to_millis_if_needed(
            history.most_recent_timestamp.saturating_sub(moved_after) as f64,
        );
        if dt > 0.0 {
            s.vx = dx / dt;
            s.vy = dy / dt;
        } else {
            s.vx = 0.0;
            s.vy = 0.0;
        }
        s.dx += dx;
        s.dy += dy;
        s.accounts_for_moves_up_to = history.most_recent_timestamp;

        s.previous_move_x = prev_x;
        s.previous_move_y = prev_y;
        s.pinch = pinch_distance(history, moved_after, Sample::Current);
        s.previous_pinch = pinch_distance(history, moved_after, Sample::Previous);
    }

    fn effective_move(&self) -> bool {
        if self.state.number_active_touches > 1 {
            return true;
        }
        let th = self.config.thresholds.move_threshold;
        self.state.dx.abs() >= th || self.state.dy.abs() >= th
    }

    fn cancel_single_tap_confirm<H: ResponderHost + ?Sized>(&mut self, host: &mut H) {
        if let Some((token, _)) = self.pending_tap.take() {
            host.cancel_tap_confirm(token);
        }
    }

    fn clear_interaction<H: ResponderHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(handle) = self.interaction.take() {
            host.clear_interaction_handle(handle);
        }
    }

    fn log(&self, what: &str) {
        if self.config.debug {
            debug!("{what}: {:?}", self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Tracker;

    #[derive(Default)]
    struct FakeHost {
        next_handle: u64,
        live_handles: Vec<u64>,
        scheduled: Vec<(TapToken, u64)>,
        cancelled: Vec<TapToken>,
    }

    impl ResponderHost for FakeHost {
        fn create_interaction_handle(&mut self) -> InteractionHandle {
            self.next_handle += 1;
            self.live_handles.push(self.next_handle);
            InteractionHandle::new(self.next_handle)
        }

        fn clear_interaction_handle(&mut self, handle: InteractionHandle) {
            let before = self.live_handles.len();
            self.live_handles.retain(|h| *h != handle.id());
            assert_eq!(before - 1, self.live_handles.len(), "double release");
        }

        fn schedule_tap_confirm(&mut self, token: TapToken, delay_ms: u64) {
            self.scheduled.push((token, delay_ms));
        }

        fn cancel_tap_confirm(&mut self, token: TapToken) {
            self.cancelled.push(token);
        }
    }

    struct Rig {
        tracker: Tracker,
        responder: GestureResponder,
        host: FakeHost,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                tracker: Tracker::new(),
                responder: GestureResponder::new(ResponderConfig::default()),
                host: FakeHost::default(),
            }
        }

        fn send(&mut self, event: ResponderEvent) -> Transition {
            self.responder
                .handle(event, self.tracker.history(), &mut self.host)
        }

        fn down(&mut self, id: usize, x: f64, y: f64, t: u64) {
            self.tracker.touch_down(id, x, y, t);
            let touches = self.tracker.active_count();
            self.send(ResponderEvent::StartShouldSetCapture { touches });
            if !self.responder.holds_interaction() {
                self.send(ResponderEvent::StartShouldSet);
                self.send(ResponderEvent::Grant);
            }
            self.send(ResponderEvent::Start);
        }

        fn up(&mut self, id: usize, t: u64) -> Vec<GestureNotification> {
            self.tracker.touch_up(id, None, t);
            let mut out = self.send(ResponderEvent::End).notifications;
            if self.tracker.active_count() == 0 {
                out.extend(self.send(ResponderEvent::Release).notifications);
            }
            out
        }

        fn tap(&mut self, t: u64, hold: u64) -> GestureState {
            self.down(0, 50.0, 50.0, t);
            let out = self.up(0, t + hold);
            *out.last().unwrap().state()
        }
    }

    #[test]
    fn quick_still_press_is_single_tap() {
        let mut rig = Rig::new();
        let released = rig.tap(1_000, 150);
        assert!(released.single_tap_up);
        assert!(!released.double_tap_up);
        assert_eq!(rig.host.scheduled.len(), 1);
        assert_eq!(rig.host.scheduled[0].1, 200);
        assert!(!rig.responder.holds_interaction());
        // state resets after release
        assert!(!rig.responder.state().single_tap_up);
    }

    #[test]
    fn second_tap_within_window_is_double() {
        let mut rig = Rig::new();
        rig.tap(1_000, 50);
        let first = rig.responder.pending_tap().unwrap();
        let second = rig.tap(1_100, 50);
        assert!(second.single_tap_up);
        assert!(second.double_tap_up);
        // second touch-down cancelled the first confirmation
        assert!(rig.host.cancelled.contains(&first));
        assert_eq!(rig.responder.pending_tap(), None);

        let stale = rig.send(ResponderEvent::TapConfirmDue(first));
        assert!(stale.notifications.is_empty());
    }

    #[test]
    fn slow_second_tap_is_not_double() {
        let mut rig = Rig::new();
        rig.tap(1_000, 50);
        let second = rig.tap(1_350, 50);
        assert!(second.single_tap_up);
        assert!(!second.double_tap_up);
    }

    #[test]
    fn long_press_is_not_a_tap() {
        let mut rig = Rig::new();
        let released = rig.tap(1_000, 250);
        assert!(!released.single_tap_up);
        assert!(rig.host.scheduled.is_empty());
    }

    #[test]
    fn dragging_fails_tap() {
        let mut rig = Rig::new();
        rig.down(0, 50.0, 50.0, 1_000);
        rig.tracker.touch_move(0, 65.0, 50.0, 1_020);
        rig.send(ResponderEvent::Move);
        let out = rig.up(0, 1_050);
        assert!(!out.last().unwrap().state().single_tap_up);
    }

    #[test]
    fn lifting_one_of_two_fingers_fails_tap() {
        let mut rig = Rig::new();
        rig.down(0, 50.0, 50.0, 1_000);
        rig.down(1, 80.0, 50.0, 1_010);
        let out = rig.up(1, 1_030);
        assert!(!out[0].state().single_tap_up);
        let out = rig.up(0, 1_040);
        // failure is sticky for the session
        assert!(!out.last().unwrap().state().single_tap_up);
    }

    #[test]
    fn confirmation_fires_for_current_token() {
        let mut rig = Rig::new();
        rig.tap(1_000, 30);
        let token = rig.host.scheduled[0].0;
        let t = rig.send(ResponderEvent::TapConfirmDue(token));
        assert!(matches!(
            t.notifications.as_slice(),
            [GestureNotification::SingleTapConfirmed(s)] if s.single_tap_up
        ));
        // only once
        assert!(
            rig.send(ResponderEvent::TapConfirmDue(token))
                .notifications
                .is_empty()
        );
    }

    #[test]
    fn move_threshold_gates_claim() {
        let mut rig = Rig::new();
        rig.tracker.touch_down(0, 10.0, 10.0, 1);
        rig.send(ResponderEvent::StartShouldSetCapture { touches: 1 });

        rig.tracker.touch_move(0, 11.0, 10.0, 2);
        let claim = rig.send(ResponderEvent::MoveShouldSetCapture).claim;
        assert_eq!(claim, Some(false));

        rig.tracker.touch_move(0, 13.0, 10.0, 3);
        let claim = rig.send(ResponderEvent::MoveShouldSetCapture).claim;
        assert_eq!(claim, Some(true));
        assert_eq!(rig.responder.state().dx, 3.0);
    }

    #[test]
    fn second_finger_makes_any_move_effective() {
        let mut rig = Rig::new();
        rig.down(0, 10.0, 10.0, 1);
        rig.down(1, 30.0, 10.0, 2);
        rig.tracker.touch_move(1, 30.5, 10.0, 3);
        let t = rig.send(ResponderEvent::Move);
        assert_eq!(t.notifications.len(), 1);
    }

    #[test]
    fn duplicate_timestamp_is_ignored() {
        let mut rig = Rig::new();
        rig.down(0, 0.0, 0.0, 10);
        rig.tracker.touch_move(0, 5.0, 0.0, 20);
        assert_eq!(rig.send(ResponderEvent::Move).notifications.len(), 1);
        let dx = rig.responder.state().dx;
        assert!(rig.send(ResponderEvent::Move).notifications.is_empty());
        assert_eq!(rig.responder.state().dx, dx);
    }

    #[test]
    fn velocity_uses_elapsed_millis() {
        let mut rig = Rig::new();
        rig.down(0, 0.0, 0.0, 10);
        rig.tracker.touch_move(0, 4.0, 0.0, 20);
        rig.send(ResponderEvent::Move);
        rig.tracker.touch_move(0, 12.0, 2.0, 24);
        rig.send(ResponderEvent::Move);
        let s = rig.responder.state();
        assert_eq!(s.vx, 2.0);
        assert_eq!(s.vy, 0.5);
        assert_eq!(s.dx, 12.0);
        assert_eq!(s.previous_move_x, 4.0);
    }

    #[test]
    fn nanosecond_intervals_are_normalized() {
        let mut rig = Rig::new();
        rig.down(0, 0.0, 0.0, 10_000_000);
        rig.tracker.touch_move(0, 4.0, 0.0, 20_000_000);
        rig.send(ResponderEvent::Move);
        rig.tracker.touch_move(0, 24.0, 0.0, 30_000_000);
        rig.send(ResponderEvent::Move);
        assert_eq!(rig.responder.state().vx, 2.0);
    }

    #[test]
    fn pinch_is_tracked_between_moves() {
        let mut rig = Rig::new();
        rig.down(0, 0.0, 0.0, 1);
        rig.down(1, 30.0, 40.0, 1);
        rig.tracker.touch_move(0, 0.0, 0.0, 5);
        rig.tracker.touch_move(1, 60.0, 80.0, 5);
        rig.send(ResponderEvent::Move);
        let s = rig.responder.state();
        assert_eq!(s.pinch, Some(100.0));
        assert_eq!(s.previous_pinch, Some(50.0));
        assert_eq!(s.number_active_touches, 2);
    }

    #[test]
    fn terminate_releases_handle_and_resets() {
        let mut rig = Rig::new();
        rig.down(0, 0.0, 0.0, 1);
        assert!(rig.responder.holds_interaction());
        rig.tracker.touch_move(0, 20.0, 0.0, 5);
        rig.send(ResponderEvent::Move);
        let t = rig.send(ResponderEvent::Terminate);
        assert!(matches!(t.notifications[0], GestureNotification::Terminate(s) if s.dx == 20.0));
        assert!(!rig.responder.holds_interaction());
        assert!(rig.host.live_handles.is_empty());
        assert_eq!(*rig.responder.state(), GestureState::default());
    }

    #[test]
    fn grant_is_idempotent_for_handles() {
        let mut rig = Rig::new();
        rig.tracker.touch_down(0, 0.0, 0.0, 1);
        rig.send(ResponderEvent::Grant);
        rig.send(ResponderEvent::Grant);
        assert_eq!(rig.host.live_handles.len(), 1);
        rig.send(ResponderEvent::Reject);
        assert!(rig.host.live_handles.is_empty());
    }

    #[test]
    fn grant_records_origin() {
        let mut rig = Rig::new();
        rig.tracker.touch_down(0, 40.0, 60.0, 7);
        let t = rig.send(ResponderEvent::Grant);
        assert_eq!(t.claim, Some(true));
        let s = t.notifications[0].state();
        assert_eq!((s.x0, s.y0), (40.0, 60.0));
    }

    #[test]
    fn termination_request_follows_config() {
        let mut rig = Rig::new();
        assert_eq!(rig.send(ResponderEvent::TerminationRequest).claim, Some(true));

        let mut config = ResponderConfig::default();
        config.allow_termination = false;
        rig.responder = GestureResponder::new(config);
        assert_eq!(
            rig.send(ResponderEvent::TerminationRequest).claim,
            Some(false)
        );
    }
}
