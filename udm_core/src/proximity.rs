//! Nine-lane LED ladder.
use udm_traits::LED_LANES;

use crate::config::LedMode;
use crate::distance::Distance;

/// Proximity mode: lane i lit when `level <= PROXIMITY_LEVELS[i]`.
pub const PROXIMITY_LEVELS: [u16; LED_LANES] = [35, 31, 27, 23, 19, 15, 11, 7, 3];
/// Distance mode: lane i lit when `level >= DISTANCE_LEVELS[i]`.
pub const DISTANCE_LEVELS: [u16; LED_LANES] = [30, 60, 90, 120, 150, 180, 210, 240, 270];

#[derive(Debug, Clone, Copy)]
pub struct ProximityIndicator {
    mode: LedMode,
}

impl ProximityIndicator {
    pub fn new(mode: LedMode) -> Self {
        Self { mode }
    }

    pub fn lanes(&self, d: Distance) -> [bool; LED_LANES] {
        let level = d.level_cm();
        match self.mode {
            LedMode::Proximity => PROXIMITY_LEVELS.map(|l| level <= l),
            LedMode::Distance => DISTANCE_LEVELS.map(|l| level >= l),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn lit(lanes: [bool; LED_LANES]) -> usize {
        lanes.iter().filter(|l| **l).count()
    }

    #[rstest]
    #[case(Distance::new(0, 36), 0)]
    #[case(Distance::new(0, 35), 1)]
    #[case(Distance::new(0, 20), 4)]
    #[case(Distance::new(0, 3), 9)]
    #[case(Distance::OUT_OF_RANGE, 0)]
    fn proximity_mode(#[case] d: Distance, #[case] expected: usize) {
        let ind = ProximityIndicator::new(LedMode::Proximity);
        assert_eq!(lit(ind.lanes(d)), expected);
    }

    #[rstest]
    #[case(Distance::new(0, 29), 0)]
    #[case(Distance::new(0, 30), 1)]
    #[case(Distance::new(1, 73), 5)]
    #[case(Distance::OUT_OF_RANGE, 9)]
    fn distance_mode(#[case] d: Distance, #[case] expected: usize) {
        let ind = ProximityIndicator::new(LedMode::Distance);
        assert_eq!(lit(ind.lanes(d)), expected);
    }

    #[test]
    fn lanes_fill_from_the_first() {
        let lanes = ProximityIndicator::new(LedMode::Proximity).lanes(Distance::new(0, 20));
        assert_eq!(
            lanes,
            [true, true, true, true, false, false, false, false, false]
        );
    }
}
