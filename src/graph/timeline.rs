//! Parameter Automation
//!
//! Every graph parameter owns a timeline of scheduled events. Control code
//! writes events ahead of the render position and the renderer samples the
//! timeline once per frame, so a change always lands on an exact frame
//! instead of at the start of whatever block happens to be playing.
//!
//! ```text
//!  value
//!   1.0 ┤      ╱╲
//!       │     ╱  ╲________
//!   0.5 ┤    ╱            ╲
//!       │   ╱              ╲
//!   0.0 ┼──●────────────────●──▶ time
//!          set   ramp  ramp   ramp
//! ```
//!
//! Two event kinds exist:
//!
//!   SetValue { time, value }    Jump to `value` at `time`.
//!   LinearRamp { time, value }  Arrive at `value` at `time`, interpolating
//!                               linearly from the previous event.
//!
//! Events are kept sorted by time. Events at equal times keep insertion
//! order, so a set followed by a ramp at the same instant behaves as written.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationEvent {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
}

impl AutomationEvent {
    pub fn time(&self) -> f64 {
        match *self {
            AutomationEvent::SetValue { time, .. } | AutomationEvent::LinearRamp { time, .. } => {
                time
            }
        }
    }

    pub fn value(&self) -> f32 {
        match *self {
            AutomationEvent::SetValue { value, .. } | AutomationEvent::LinearRamp { value, .. } => {
                value
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Timeline {
    default: f32,
    events: Vec<AutomationEvent>,
}

impl Timeline {
    pub fn new(value: f32) -> Self {
        Self {
            default: value,
            events: Vec::new(),
        }
    }

    /// Value used before the first event, or always when nothing is scheduled.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Immediate write: drops all automation and holds `value`.
    pub fn set(&mut self, value: f32) {
        self.events.clear();
        self.default = value;
    }

    pub fn set_value_at(&mut self, value: f32, time: f64) {
        self.insert(AutomationEvent::SetValue { time, value });
    }

    /// Ramp from the previous event to `value`, arriving at `end_time`.
    ///
    /// With nothing scheduled the ramp starts from the held value at `now`.
    pub fn linear_ramp_to(&mut self, value: f32, end_time: f64, now: f64) {
        if self.events.is_empty() {
            self.events.push(AutomationEvent::SetValue {
                time: now,
                value: self.default,
            });
        }
        self.insert(AutomationEvent::LinearRamp {
            time: end_time,
            value,
        });
    }

    /// Remove every event at or after `time`.
    pub fn cancel_scheduled(&mut self, time: f64) {
        self.events.retain(|event| event.time() < time);
    }

    /// Remove events at or after `time` but keep the curve continuous: the
    /// value the timeline would have had at `time` is pinned there.
    ///
    /// A ramp that was still travelling at `time` is cut short rather than
    /// replaced by a jump, so the trajectory up to `time` is unchanged.
    pub fn cancel_and_hold(&mut self, time: f64) {
        let held = self.value_at(time);
        let idx = self.events.partition_point(|event| event.time() <= time);
        let ramp_in_flight = matches!(
            self.events.get(idx),
            Some(AutomationEvent::LinearRamp { .. })
        );

        self.cancel_scheduled(time);

        let event = if ramp_in_flight && !self.events.is_empty() {
            AutomationEvent::LinearRamp { time, value: held }
        } else {
            AutomationEvent::SetValue { time, value: held }
        };
        self.events.push(event);
    }

    pub fn value_at(&self, time: f64) -> f32 {
        let idx = self.events.partition_point(|event| event.time() <= time);
        let previous = idx.checked_sub(1).map(|i| self.events[i]);

        match (previous, self.events.get(idx)) {
            (None, None) => self.default,
            (Some(prev), None) => prev.value(),
            (None, Some(_)) => self.default,
            (Some(prev), Some(AutomationEvent::SetValue { .. })) => prev.value(),
            (Some(prev), Some(&AutomationEvent::LinearRamp { time: end, value })) => {
                let start = prev.time();
                let span = end - start;
                if span <= 0.0 {
                    return value;
                }
                let frac = ((time - start) / span) as f32;
                prev.value() + (value - prev.value()) * frac
            }
        }
    }

    /// Drop events the render position has moved past.
    ///
    /// The latest event at or before `time` survives because a ramp after it
    /// still interpolates from it. Once everything is in the past the final
    /// value becomes the new default.
    pub fn prune(&mut self, time: f64) {
        let idx = self.events.partition_point(|event| event.time() <= time);
        if idx == 0 {
            return;
        }
        if idx == self.events.len() {
            self.default = self.events[idx - 1].value();
            self.events.clear();
        } else if idx > 1 {
            self.events.drain(..idx - 1);
        }
    }

    fn insert(&mut self, event: AutomationEvent) {
        let time = event.time();
        let idx = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(idx, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn empty_timeline_holds_default() {
        let timeline = Timeline::new(0.25);
        assert_eq!(timeline.value_at(0.0), 0.25);
        assert_eq!(timeline.value_at(100.0), 0.25);
    }

    #[test]
    fn set_value_takes_effect_at_its_time() {
        let mut timeline = Timeline::new(0.0);
        timeline.set_value_at(1.0, 0.5);

        assert_eq!(timeline.value_at(0.49), 0.0);
        assert_eq!(timeline.value_at(0.5), 1.0);
        assert_eq!(timeline.value_at(2.0), 1.0);
    }

    #[test]
    fn ramp_interpolates_from_previous_event() {
        let mut timeline = Timeline::new(0.0);
        timeline.set_value_at(0.0, 1.0);
        timeline.linear_ramp_to(1.0, 2.0, 0.0);

        assert!(close(timeline.value_at(1.0), 0.0));
        assert!(close(timeline.value_at(1.5), 0.5));
        assert!(close(timeline.value_at(2.0), 1.0));
        assert!(close(timeline.value_at(3.0), 1.0));
    }

    #[test]
    fn ramp_on_empty_timeline_starts_now() {
        let mut timeline = Timeline::new(100.0);
        timeline.linear_ramp_to(200.0, 1.0, 0.5);

        assert!(close(timeline.value_at(0.5), 100.0));
        assert!(close(timeline.value_at(0.75), 150.0));
    }

    #[test]
    fn events_stay_sorted() {
        let mut timeline = Timeline::new(0.0);
        timeline.set_value_at(3.0, 3.0);
        timeline.set_value_at(1.0, 1.0);
        timeline.set_value_at(2.0, 2.0);

        let times: Vec<f64> = timeline.events().iter().map(|e| e.time()).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn cancel_scheduled_drops_future_events() {
        let mut timeline = Timeline::new(0.0);
        timeline.set_value_at(1.0, 1.0);
        timeline.set_value_at(2.0, 2.0);
        timeline.cancel_scheduled(1.5);

        assert_eq!(timeline.events().len(), 1);
        assert_eq!(timeline.value_at(5.0), 1.0);
    }

    #[test]
    fn cancel_and_hold_pins_mid_ramp_value() {
        let mut timeline = Timeline::new(0.0);
        timeline.set_value_at(0.0, 0.0);
        timeline.linear_ramp_to(1.0, 1.0, 0.0);
        timeline.linear_ramp_to(0.0, 2.0, 0.0);

        timeline.cancel_and_hold(0.5);

        assert!(close(timeline.value_at(0.25), 0.25));
        assert!(close(timeline.value_at(0.5), 0.5));
        assert!(close(timeline.value_at(1.5), 0.5));
    }

    #[test]
    fn cancel_and_hold_on_static_value() {
        let mut timeline = Timeline::new(0.7);
        timeline.cancel_and_hold(1.0);
        timeline.linear_ramp_to(0.0, 2.0, 1.0);

        assert!(close(timeline.value_at(1.0), 0.7));
        assert!(close(timeline.value_at(1.5), 0.35));
    }

    #[test]
    fn live_write_clears_automation() {
        let mut timeline = Timeline::new(0.0);
        timeline.set_value_at(1.0, 1.0);
        timeline.set(0.3);

        assert!(timeline.is_empty());
        assert_eq!(timeline.value_at(2.0), 0.3);
    }

    #[test]
    fn prune_keeps_ramp_anchor() {
        let mut timeline = Timeline::new(0.0);
        timeline.set_value_at(0.0, 0.0);
        timeline.set_value_at(0.0, 0.5);
        timeline.linear_ramp_to(1.0, 2.0, 0.0);

        timeline.prune(1.0);

        assert_eq!(timeline.events().len(), 2);
        assert!(close(timeline.value_at(1.25), 0.5));
    }

    #[test]
    fn prune_past_everything_folds_into_default() {
        let mut timeline = Timeline::new(0.0);
        timeline.set_value_at(0.4, 0.1);
        timeline.linear_ramp_to(0.9, 0.2, 0.0);

        timeline.prune(1.0);

        assert!(timeline.is_empty());
        assert!(close(timeline.default_value(), 0.9));
    }
}
