use proptest::prelude::*;
use udm_core::buttons::next_state;
use udm_core::distance::estimate;
use udm_core::{AlarmController, ButtonCount, ButtonStateMachine, Distance, HoldCfg};
use udm_traits::ButtonLevels;

fn levels() -> impl Strategy<Value = ButtonLevels> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(minus, plus, set)| ButtonLevels {
        minus,
        plus,
        set,
    })
}

fn count() -> impl Strategy<Value = ButtonCount> {
    prop_oneof![Just(ButtonCount::Two), Just(ButtonCount::Three)]
}

proptest! {
    #[test]
    fn estimate_is_monotonic_over_the_high_window(a in 0u32..=500, b in 0u32..=500) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let dl = estimate(lo, 50, 34655);
        let dh = estimate(hi, 50, 34655);
        prop_assert!(dl.level_cm() <= dh.level_cm());
    }

    #[test]
    fn estimate_rounds_half_up_on_the_dropped_millimeter(ticks in 1u32..=500) {
        let mm = u64::from(ticks) * 25 * 34655 / 100_000;
        let d = estimate(ticks, 50, 34655);
        let expected = (mm + 5) / 10;
        prop_assert_eq!(u64::from(d.level_cm()), expected);
    }

    #[test]
    fn threshold_stays_in_range_and_moves_by_at_most_one(
        count in count(),
        start in 0u8..=99,
        script in proptest::collection::vec(levels(), 1..400),
    ) {
        let mut m = ButtonStateMachine::new(count, HoldCfg { hold_button: 3, hold_alarm: 10 });
        let mut t = start;
        for l in script {
            let before = t;
            let step = m.step(l, &mut t);
            prop_assert!(t <= 99);
            prop_assert!(before.abs_diff(t) <= 1);
            prop_assert_eq!(step.threshold_changed, before != t);
            if step.persist {
                prop_assert_eq!(step.state, udm_core::ButtonState::Normal);
            }
        }
    }

    #[test]
    fn transitions_without_input_leave_adjust_states(count in count(), last in 0usize..6) {
        use udm_core::ButtonState::*;
        let states = [Normal, NormalHeld, AlarmView, AlarmViewHeld, AlarmDecrement, AlarmIncrement];
        let last = states[last];
        let next = next_state(last, ButtonLevels::default(), count);
        prop_assert!(matches!(next, Normal | AlarmView));
        prop_assert_eq!(next.is_alarm_territory(), last.is_alarm_territory());
    }

    #[test]
    fn alarm_is_silent_outside_the_zone(tick in any::<u8>(), m in 0u8..10, cm in 0u8..100, thr in 0u8..=99) {
        let d = Distance::new(m, cm);
        let mut a = AlarmController::new(200);
        let on = a.update(tick, d, thr);
        if !AlarmController::is_active(d, thr) {
            prop_assert!(!on);
        }
    }
}
