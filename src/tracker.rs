//! Per-finger touch ledger fed from raw down/move/up samples.
//!
//! This is the touch-history collaborator the responder reads from; the
//! gesture core never writes to it.

use log::warn;

use crate::touch::{Timestamp, TouchHistory, TouchRecord};

const INITIAL_SLOTS: usize = 10;
const MAX_SLOTS: usize = 64;

#[derive(Debug)]
pub struct Tracker {
    history: TouchHistory,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            history: TouchHistory {
                touch_bank: vec![None; INITIAL_SLOTS],
                ..TouchHistory::default()
            },
        }
    }

    pub fn history(&self) -> &TouchHistory {
        &self.history
    }

    pub fn active_count(&self) -> usize {
        self.history.number_active_touches
    }

    fn slot_mut(&mut self, id: usize) -> Option<&mut Option<TouchRecord>> {
        if id >= MAX_SLOTS {
            warn!("touch id {id} exceeds {MAX_SLOTS} slots; ignored");
            return None;
        }
        if id >= self.history.touch_bank.len() {
            self.history.touch_bank.resize(id + 1, None);
        }
        self.history.touch_bank.get_mut(id)
    }

    pub fn touch_down(&mut self, id: usize, x: f64, y: f64, t: Timestamp) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        // new touch → fresh record, previous == current
        *slot = Some(TouchRecord {
            touch_active: true,
            start_page_x: x,
            start_page_y: y,
            start_timestamp: t,
            current_page_x: x,
            current_page_y: y,
            current_timestamp: t,
            previous_page_x: x,
            previous_page_y: y,
            previous_timestamp: t,
        });
        self.finish_sample(t);
    }

    pub fn touch_move(&mut self, id: usize, x: f64, y: f64, t: Timestamp) {
        let Some(Some(rec)) = self.slot_mut(id) else {
            warn!("move for unknown touch id {id}");
            return;
        };
        if !rec.touch_active {
            warn!("move for lifted touch id {id}");
            return;
        }
        rec.previous_page_x = rec.current_page_x;
        rec.previous_page_y = rec.current_page_y;
        rec.previous_timestamp = rec.current_timestamp;
        rec.current_page_x = x;
        rec.current_page_y = y;
        rec.current_timestamp = t;
        self.finish_sample(t);
    }

    /// Lift a finger. The lift position defaults to the last known one.
    pub fn touch_up(&mut self, id: usize, pos: Option<(f64, f64)>, t: Timestamp) {
        let Some(Some(rec)) = self.slot_mut(id) else {
            warn!("up for unknown touch id {id}");
            return;
        };
        let (x, y) = pos.unwrap_or((rec.current_page_x, rec.current_page_y));
        rec.previous_page_x = rec.current_page_x;
        rec.previous_page_y = rec.current_page_y;
        rec.previous_timestamp = rec.current_timestamp;
        rec.current_page_x = x;
        rec.current_page_y = y;
        rec.current_timestamp = t;
        rec.touch_active = false;
        self.finish_sample(t);
    }

    /// Platform cancelled every touch.
    pub fn cancel_all(&mut self, t: Timestamp) {
        for rec in self.history.touch_bank.iter_mut().flatten() {
            rec.touch_active = false;
        }
        self.finish_sample(t);
    }

    fn finish_sample(&mut self, t: Timestamp) {
        let h = &mut self.history;
        h.most_recent_timestamp = t;
        h.number_active_touches = 0;
        for (i, rec) in h.touch_bank.iter().enumerate() {
            if rec.is_some_and(|r| r.touch_active) {
                if h.number_active_touches == 0 {
                    h.index_of_single_active_touch = i;
                }
                h.number_active_touches += 1;
            }
        }
    }
}
