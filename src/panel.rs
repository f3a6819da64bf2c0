//! Collapsible panel transition
//!
//! A boolean flag drives the panel through entering/entered and
//! exiting/exited. Each state maps to a minimum height; the panel never
//! drops below its base height. Purely visual.

use std::time::{Duration, Instant};

/// Length of an enter/exit transition
pub const TRANSITION_DURATION: Duration = Duration::from_millis(300);

/// Height of the panel, in percent of the available area, before the
/// state's minimum applies
pub const BASE_HEIGHT_PERCENT: u16 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Entering,
    Entered,
    Exiting,
    Exited,
}

impl TransitionState {
    /// Minimum height in percent for this state
    pub fn min_height_percent(self) -> u16 {
        match self {
            TransitionState::Entering | TransitionState::Entered => 80,
            TransitionState::Exiting | TransitionState::Exited => 10,
        }
    }

    /// Resulting height once the transition has settled
    pub fn height_percent(self) -> u16 {
        BASE_HEIGHT_PERCENT.max(self.min_height_percent())
    }
}

#[derive(Debug, Clone)]
pub struct PanelTransition {
    flag: bool,
    changed_at: Option<Instant>,
    // Height the current transition started from
    from_percent: u16,
}

impl PanelTransition {
    /// Start settled in the state the flag implies, no animation
    pub fn new(flag: bool) -> Self {
        let settled = if flag { TransitionState::Entered } else { TransitionState::Exited };
        Self {
            flag,
            changed_at: None,
            from_percent: settled.height_percent(),
        }
    }

    /// Feed the current flag value. Changes start a new transition from
    /// wherever the height currently is.
    pub fn set_flag(&mut self, flag: bool, now: Instant) {
        if flag == self.flag {
            return;
        }
        self.from_percent = self.height_percent(now);
        self.flag = flag;
        self.changed_at = Some(now);
    }

    pub fn state(&self, now: Instant) -> TransitionState {
        let running = self.progress(now) < 1.0;
        match (self.flag, running) {
            (true, true) => TransitionState::Entering,
            (true, false) => TransitionState::Entered,
            (false, true) => TransitionState::Exiting,
            (false, false) => TransitionState::Exited,
        }
    }

    /// Whether a redraw would show a different height than the settled one
    pub fn is_animating(&self, now: Instant) -> bool {
        self.progress(now) < 1.0
    }

    /// Current height, eased between the start and target heights
    pub fn height_percent(&self, now: Instant) -> u16 {
        let target = self.state(now).height_percent();
        let t = self.progress(now);
        if t >= 1.0 {
            return target;
        }
        let eased = ease_in_out(t);
        let from = f64::from(self.from_percent);
        let to = f64::from(target);
        (from + (to - from) * eased).round() as u16
    }

    fn progress(&self, now: Instant) -> f64 {
        match self.changed_at {
            None => 1.0,
            Some(start) => {
                let elapsed = now.saturating_duration_since(start);
                (elapsed.as_secs_f64() / TRANSITION_DURATION.as_secs_f64()).min(1.0)
            }
        }
    }
}

/// Cubic ease-in-out over 0..=1
fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
