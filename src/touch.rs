//! Touch-history ledger types and the centroid / pinch math over them.
//!
//! Everything here is read-only over a [`TouchHistory`]; the ledger itself is
//! maintained by whoever delivers touches (see [`crate::tracker::Tracker`]).

use serde::Serialize;

/// Timestamp as delivered by the platform. Usually milliseconds, but some
/// platforms report nanoseconds; see [`convert_to_millis_if_needed`].
pub type Timestamp = u64;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TouchRecord {
    pub touch_active: bool,
    pub start_page_x: f64,
    pub start_page_y: f64,
    pub start_timestamp: Timestamp,
    pub current_page_x: f64,
    pub current_page_y: f64,
    pub current_timestamp: Timestamp,
    pub previous_page_x: f64,
    pub previous_page_y: f64,
    pub previous_timestamp: Timestamp,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TouchHistory {
    pub touch_bank: Vec<Option<TouchRecord>>,
    pub number_active_touches: usize,
    pub index_of_single_active_touch: usize,
    pub most_recent_timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    Current,
    Previous,
}

impl TouchRecord {
    fn coord(&self, axis: Axis, sample: Sample) -> f64 {
        match (sample, axis) {
            (Sample::Current, Axis::X) => self.current_page_x,
            (Sample::Current, Axis::Y) => self.current_page_y,
            (Sample::Previous, Axis::X) => self.previous_page_x,
            (Sample::Previous, Axis::Y) => self.previous_page_y,
        }
    }
}

impl TouchHistory {
    fn active_touches(&self) -> impl Iterator<Item = &TouchRecord> {
        self.touch_bank.iter().flatten().filter(|t| t.touch_active)
    }
}

/// Centroid on one axis of the touches that moved at or after
/// `touches_changed_after`.
///
/// A lone active touch counts only if it moved strictly after the cutoff.
pub fn centroid_dimension(
    history: &TouchHistory,
    touches_changed_after: Timestamp,
    axis: Axis,
    sample: Sample,
) -> Option<f64> {
    if history.number_active_touches == 1 {
        let one = history
            .touch_bank
            .get(history.index_of_single_active_touch)
            .copied()
            .flatten()?;
        if one.touch_active && one.current_timestamp > touches_changed_after {
            return Some(one.coord(axis, sample));
        }
        return None;
    }

    let mut total = 0.0;
    let mut count = 0usize;
    for t in history
        .active_touches()
        .filter(|t| t.current_timestamp >= touches_changed_after)
    {
        total += t.coord(axis, sample);
        count += 1;
    }
    (count > 0).then(|| total / count as f64)
}

pub fn current_centroid_x_of_touches_changed_after(
    history: &TouchHistory,
    touches_changed_after: Timestamp,
) -> Option<f64> {
    centroid_dimension(history, touches_changed_after, Axis::X, Sample::Current)
}

pub fn current_centroid_y_of_touches_changed_after(
    history: &TouchHistory,
    touches_changed_after: Timestamp,
) -> Option<f64> {
    centroid_dimension(history, touches_changed_after, Axis::Y, Sample::Current)
}

pub fn previous_centroid_x_of_touches_changed_after(
    history: &TouchHistory,
    touches_changed_after: Timestamp,
) -> Option<f64> {
    centroid_dimension(history, touches_changed_after, Axis::X, Sample::Previous)
}

pub fn previous_centroid_y_of_touches_changed_after(
    history: &TouchHistory,
    touches_changed_after: Timestamp,
) -> Option<f64> {
    centroid_dimension(history, touches_changed_after, Axis::Y, Sample::Previous)
}

pub fn current_centroid_x(history: &TouchHistory) -> Option<f64> {
    current_centroid_x_of_touches_changed_after(history, 0)
}

pub fn current_centroid_y(history: &TouchHistory) -> Option<f64> {
    current_centroid_y_of_touches_changed_after(history, 0)
}

/// Distance between the first two active touches that moved at or after the
/// cutoff. `None` with fewer than two such touches.
pub fn pinch_distance(
    history: &TouchHistory,
    touches_changed_after: Timestamp,
    sample: Sample,
) -> Option<f64> {
    if history.number_active_touches < 2 {
        return None;
    }
    let mut eligible = history
        .active_touches()
        .filter(|t| t.current_timestamp >= touches_changed_after);
    let a = eligible.next()?;
    let b = eligible.next()?;
    let dx = a.coord(Axis::X, sample) - b.coord(Axis::X, sample);
    let dy = a.coord(Axis::Y, sample) - b.coord(Axis::Y, sample);
    Some((dx * dx + dy * dy).sqrt())
}

/// Intervals above one million are taken to be nanoseconds and scaled down
/// to milliseconds.
pub fn convert_to_millis_if_needed(interval: f64) -> f64 {
    if interval > 1_000_000.0 {
        interval / 1_000_000.0
    } else {
        interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(x: f64, y: f64, prev_x: f64, prev_y: f64, ts: Timestamp) -> TouchRecord {
        TouchRecord {
            touch_active: true,
            start_page_x: prev_x,
            start_page_y: prev_y,
            start_timestamp: 0,
            current_page_x: x,
            current_page_y: y,
            current_timestamp: ts,
            previous_page_x: prev_x,
            previous_page_y: prev_y,
            previous_timestamp: 0,
        }
    }

    fn history(records: Vec<Option<TouchRecord>>) -> TouchHistory {
        let active: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_some_and(|r| r.touch_active))
            .map(|(i, _)| i)
            .collect();
        let most_recent = records
            .iter()
            .flatten()
            .map(|r| r.current_timestamp)
            .max()
            .unwrap_or(0);
        TouchHistory {
            number_active_touches: active.len(),
            index_of_single_active_touch: active.first().copied().unwrap_or(0),
            most_recent_timestamp: most_recent,
            touch_bank: records,
        }
    }

    #[test]
    fn single_touch_centroid() {
        let h = history(vec![Some(touch(10.0, 20.0, 7.0, 18.0, 5))]);
        assert_eq!(current_centroid_x_of_touches_changed_after(&h, 0), Some(10.0));
        assert_eq!(current_centroid_y_of_touches_changed_after(&h, 0), Some(20.0));
        assert_eq!(previous_centroid_x_of_touches_changed_after(&h, 0), Some(7.0));
        assert_eq!(previous_centroid_y_of_touches_changed_after(&h, 0), Some(18.0));
    }

    #[test]
    fn single_touch_needs_strictly_newer_timestamp() {
        let h = history(vec![Some(touch(10.0, 20.0, 7.0, 18.0, 5))]);
        assert_eq!(current_centroid_x_of_touches_changed_after(&h, 5), None);
        assert_eq!(current_centroid_x_of_touches_changed_after(&h, 4), Some(10.0));
    }

    #[test]
    fn multi_touch_averages_eligible_touches() {
        let h = history(vec![
            Some(touch(0.0, 0.0, 0.0, 0.0, 10)),
            None,
            Some(touch(10.0, 30.0, 4.0, 2.0, 12)),
            Some(touch(100.0, 100.0, 100.0, 100.0, 3)),
        ]);
        // cutoff 10 leaves the first two
        assert_eq!(current_centroid_x_of_touches_changed_after(&h, 10), Some(5.0));
        assert_eq!(current_centroid_y_of_touches_changed_after(&h, 10), Some(15.0));
        assert_eq!(previous_centroid_x_of_touches_changed_after(&h, 10), Some(2.0));
        assert_eq!(current_centroid_x(&h), Some(110.0 / 3.0));
    }

    #[test]
    fn no_qualifying_touch_has_no_centroid() {
        let h = history(vec![
            Some(touch(0.0, 0.0, 0.0, 0.0, 1)),
            Some(touch(1.0, 1.0, 0.0, 0.0, 2)),
        ]);
        assert_eq!(current_centroid_x_of_touches_changed_after(&h, 50), None);
        assert_eq!(current_centroid_y(&TouchHistory::default()), None);
    }

    #[test]
    fn inactive_touches_are_ignored() {
        let mut lifted = touch(500.0, 500.0, 500.0, 500.0, 9);
        lifted.touch_active = false;
        let h = history(vec![
            Some(lifted),
            Some(touch(2.0, 4.0, 0.0, 0.0, 9)),
            Some(touch(4.0, 8.0, 0.0, 0.0, 9)),
        ]);
        assert_eq!(current_centroid_x(&h), Some(3.0));
    }

    #[test]
    fn pinch_distance_three_four_five() {
        let h = history(vec![
            Some(touch(0.0, 0.0, 0.0, 0.0, 1)),
            Some(touch(3.0, 4.0, 6.0, 8.0, 1)),
        ]);
        assert_eq!(pinch_distance(&h, 0, Sample::Current), Some(5.0));
        assert_eq!(pinch_distance(&h, 0, Sample::Previous), Some(10.0));
    }

    #[test]
    fn pinch_distance_needs_two_touches() {
        let h = history(vec![Some(touch(0.0, 0.0, 0.0, 0.0, 1))]);
        assert_eq!(pinch_distance(&h, 0, Sample::Current), None);

        let stale = history(vec![
            Some(touch(0.0, 0.0, 0.0, 0.0, 1)),
            Some(touch(3.0, 4.0, 0.0, 0.0, 8)),
        ]);
        assert_eq!(pinch_distance(&stale, 5, Sample::Current), None);
    }

    #[test]
    fn millis_conversion() {
        assert_eq!(convert_to_millis_if_needed(16.0), 16.0);
        assert_eq!(convert_to_millis_if_needed(1_000_000.0), 1_000_000.0);
        assert_eq!(convert_to_millis_if_needed(16_000_000.0), 16.0);
    }
}
