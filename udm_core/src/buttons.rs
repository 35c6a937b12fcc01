//! Button chords and alarm threshold adjustment.
//!
//! States are ordered: everything from `AlarmView` on is "alarm territory",
//! where the display shows the threshold instead of the distance.
use udm_traits::ButtonLevels;

use crate::config::{ButtonCount, HoldCfg};

/// Largest threshold the display can show.
pub const MAX_THRESHOLD_CM: u8 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ButtonState {
    #[default]
    Normal,
    NormalHeld,
    AlarmView,
    AlarmViewHeld,
    AlarmDecrement,
    AlarmIncrement,
}

impl ButtonState {
    pub fn is_alarm_territory(self) -> bool {
        self >= Self::AlarmView
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::NormalHeld => "normal-held",
            Self::AlarmView => "alarm-view",
            Self::AlarmViewHeld => "alarm-view-held",
            Self::AlarmDecrement => "alarm-decrement",
            Self::AlarmIncrement => "alarm-increment",
        }
    }
}

/// Pure transition function. SET takes priority over MINUS, MINUS over PLUS.
pub fn next_state(last: ButtonState, levels: ButtonLevels, count: ButtonCount) -> ButtonState {
    use ButtonState::*;
    let alarm = last.is_alarm_territory();
    match count {
        ButtonCount::None => {}
        ButtonCount::Two => {
            if levels.minus {
                return if alarm { AlarmDecrement } else { AlarmViewHeld };
            }
            if levels.plus {
                return if alarm { AlarmIncrement } else { AlarmViewHeld };
            }
        }
        ButtonCount::Three => {
            if levels.set {
                return if matches!(last, Normal | AlarmViewHeld) {
                    AlarmViewHeld
                } else {
                    NormalHeld
                };
            }
            if levels.minus {
                return if alarm { AlarmDecrement } else { Normal };
            }
            if levels.plus {
                return if alarm { AlarmIncrement } else { Normal };
            }
        }
    }
    if alarm { AlarmView } else { Normal }
}

/// Result of one [`ButtonStateMachine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonStep {
    pub state: ButtonState,
    pub changed: bool,
    /// The machine settled back into `Normal`; the threshold should be saved.
    pub persist: bool,
    pub threshold_changed: bool,
}

#[derive(Debug, Clone)]
pub struct ButtonStateMachine {
    count: ButtonCount,
    holds: HoldCfg,
    state: ButtonState,
    hold: u16,
}

impl ButtonStateMachine {
    pub fn new(count: ButtonCount, holds: HoldCfg) -> Self {
        Self {
            count,
            holds,
            state: ButtonState::Normal,
            hold: 0,
        }
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    pub fn hold_ticks(&self) -> u16 {
        self.hold
    }

    /// Evaluate one slow tick, adjusting `threshold_cm` in place.
    pub fn step(&mut self, levels: ButtonLevels, threshold_cm: &mut u8) -> ButtonStep {
        let next = next_state(self.state, levels, self.count);
        if next != self.state {
            tracing::debug!(from = self.state.name(), to = next.name(), "button state");
            self.state = next;
            self.hold = 0;
            return ButtonStep {
                state: next,
                changed: true,
                persist: next == ButtonState::Normal,
                threshold_changed: false,
            };
        }

        self.hold = self.hold.saturating_add(1);
        let before = *threshold_cm;
        if self.hold >= self.holds.hold_button && next == ButtonState::AlarmDecrement {
            *threshold_cm = threshold_cm.saturating_sub(1);
            self.hold = 0;
        } else if self.hold >= self.holds.hold_button && next == ButtonState::AlarmIncrement {
            if *threshold_cm < MAX_THRESHOLD_CM {
                *threshold_cm += 1;
            }
            self.hold = 0;
        } else if self.count == ButtonCount::Two
            && self.hold >= self.holds.hold_alarm
            && next == ButtonState::AlarmView
        {
            // Idle in the alarm view: fall back so the next tick settles into
            // Normal and saves.
            self.state = ButtonState::NormalHeld;
            self.hold = 0;
        }

        ButtonStep {
            state: self.state,
            changed: false,
            persist: false,
            threshold_changed: before != *threshold_cm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ButtonState::*;
    use rstest::rstest;

    const NONE: ButtonLevels = ButtonLevels {
        minus: false,
        plus: false,
        set: false,
    };
    const MINUS: ButtonLevels = ButtonLevels {
        minus: true,
        plus: false,
        set: false,
    };
    const PLUS: ButtonLevels = ButtonLevels {
        minus: false,
        plus: true,
        set: false,
    };
    const SET: ButtonLevels = ButtonLevels {
        minus: false,
        plus: false,
        set: true,
    };
    const ALL: ButtonLevels = ButtonLevels {
        minus: true,
        plus: true,
        set: true,
    };

    #[rstest]
    #[case(Normal, NONE, Normal)]
    #[case(NormalHeld, NONE, Normal)]
    #[case(AlarmViewHeld, NONE, AlarmView)]
    #[case(Normal, MINUS, AlarmViewHeld)]
    #[case(Normal, PLUS, AlarmViewHeld)]
    #[case(AlarmView, MINUS, AlarmDecrement)]
    #[case(AlarmViewHeld, PLUS, AlarmIncrement)]
    #[case(AlarmIncrement, SET, AlarmView)]
    fn two_button_transitions(
        #[case] last: ButtonState,
        #[case] levels: ButtonLevels,
        #[case] expected: ButtonState,
    ) {
        assert_eq!(next_state(last, levels, ButtonCount::Two), expected);
    }

    #[rstest]
    #[case(Normal, SET, AlarmViewHeld)]
    #[case(AlarmViewHeld, SET, AlarmViewHeld)]
    #[case(AlarmView, SET, NormalHeld)]
    #[case(NormalHeld, SET, NormalHeld)]
    #[case(Normal, MINUS, Normal)]
    #[case(AlarmView, MINUS, AlarmDecrement)]
    #[case(AlarmView, PLUS, AlarmIncrement)]
    #[case(AlarmView, ALL, NormalHeld)]
    #[case(AlarmView, NONE, AlarmView)]
    fn three_button_transitions(
        #[case] last: ButtonState,
        #[case] levels: ButtonLevels,
        #[case] expected: ButtonState,
    ) {
        assert_eq!(next_state(last, levels, ButtonCount::Three), expected);
    }

    #[test]
    fn no_buttons_never_leaves_normal() {
        assert_eq!(next_state(Normal, ALL, ButtonCount::None), Normal);
    }

    fn machine(count: ButtonCount) -> ButtonStateMachine {
        ButtonStateMachine::new(count, HoldCfg::default())
    }

    #[test]
    fn holding_minus_steps_once_per_hold_period() {
        let mut m = machine(ButtonCount::Two);
        let mut t = 35;
        // enter the alarm view, release, then hold MINUS
        m.step(MINUS, &mut t);
        m.step(NONE, &mut t);
        let s = m.step(MINUS, &mut t);
        assert_eq!(s.state, AlarmDecrement);
        assert!(s.changed);

        for _ in 0..39 {
            m.step(MINUS, &mut t);
        }
        assert_eq!(t, 35);
        let s = m.step(MINUS, &mut t);
        assert!(s.threshold_changed);
        assert_eq!(t, 34);
        for _ in 0..40 * 3 {
            m.step(MINUS, &mut t);
        }
        assert_eq!(t, 31);
    }

    #[test]
    fn threshold_clamps_at_both_ends() {
        let mut m = machine(ButtonCount::Two);
        let mut t = 1;
        m.step(PLUS, &mut t);
        m.step(NONE, &mut t);
        for _ in 0..40 * 5 + 1 {
            m.step(MINUS, &mut t);
        }
        assert_eq!(t, 0);

        let mut t = 98;
        m.step(NONE, &mut t);
        for _ in 0..40 * 5 + 1 {
            m.step(PLUS, &mut t);
        }
        assert_eq!(t, MAX_THRESHOLD_CM);
    }

    #[test]
    fn two_button_alarm_view_times_out_and_persists() {
        let mut m = machine(ButtonCount::Two);
        let mut t = 35;
        m.step(PLUS, &mut t);
        assert_eq!(m.step(NONE, &mut t).state, AlarmView);
        for _ in 0..599 {
            assert_eq!(m.step(NONE, &mut t).state, AlarmView);
        }
        assert_eq!(m.step(NONE, &mut t).state, NormalHeld);
        let s = m.step(NONE, &mut t);
        assert_eq!(s.state, Normal);
        assert!(s.persist);
    }

    #[test]
    fn three_button_alarm_view_does_not_time_out() {
        let mut m = machine(ButtonCount::Three);
        let mut t = 35;
        m.step(SET, &mut t);
        for _ in 0..2000 {
            assert_eq!(m.step(NONE, &mut t).state, AlarmView);
        }
        m.step(SET, &mut t);
        let s = m.step(NONE, &mut t);
        assert_eq!(s.state, Normal);
        assert!(s.persist);
    }
}
