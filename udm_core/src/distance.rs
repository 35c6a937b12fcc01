//! Echo duration to distance conversion.

/// A reading in meters and centimeters.
///
/// `centimeters` may reach 100 after half-up rounding; such a reading is
/// beyond what the display can show and counts as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Distance {
    pub meters: u8,
    pub centimeters: u8,
}

impl Distance {
    /// Reading forced after sustained echo loss.
    pub const OUT_OF_RANGE: Self = Self {
        meters: 10,
        centimeters: 0,
    };

    pub const fn new(meters: u8, centimeters: u8) -> Self {
        Self {
            meters,
            centimeters,
        }
    }

    /// True for readings the display cannot show, and for a zero reading.
    pub fn is_error(&self) -> bool {
        self.meters >= 10 || self.centimeters >= 100 || (self.meters == 0 && self.centimeters == 0)
    }

    /// Total in centimeters (`meters * 100 + centimeters`).
    pub fn level_cm(&self) -> u16 {
        u16::from(self.meters) * 100 + u16::from(self.centimeters)
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} m {} cm", self.meters, self.centimeters)
    }
}

/// Convert an echo pulse length into a distance.
///
/// `mm = high_ticks * (tick_us / 2) * speed_cm_s / 100_000`, all integer and
/// truncating; the centimeter remainder is rounded half-up on the dropped
/// millimeter.
pub fn estimate(high_ticks: u32, tick_us: u32, speed_cm_s: u32) -> Distance {
    let half_tick = u64::from(tick_us / 2);
    let mm = u64::from(high_ticks) * half_tick * u64::from(speed_cm_s) / 100_000;
    let cm = mm / 10;
    let meters = cm / 100;
    let rem = cm % 100 + u64::from(mm % 10 >= 5);
    Distance {
        meters: u8::try_from(meters).unwrap_or(u8::MAX),
        // rem <= 100
        centimeters: u8::try_from(rem).unwrap_or(u8::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, 1, 73)] // 1732 mm
    #[case(23, 0, 20)] // 199 mm rounds up
    #[case(24, 0, 21)] // 207 mm
    #[case(2, 0, 2)] // 17 mm, minimum accepted pulse
    #[case(500, 4, 33)] // 4331 mm, maximum accepted pulse
    #[case(0, 0, 0)]
    fn reference_conversions(#[case] ticks: u32, #[case] m: u8, #[case] cm: u8) {
        assert_eq!(estimate(ticks, 50, 34655), Distance::new(m, cm));
    }

    #[test]
    fn rounding_can_overflow_the_centimeter_digit() {
        // 115 ticks -> 996 mm -> 99 cm, rounded up to 100
        let d = estimate(115, 50, 34655);
        assert_eq!(d, Distance::new(0, 100));
        assert!(d.is_error());
    }

    #[test]
    fn error_classification() {
        assert!(Distance::new(0, 0).is_error());
        assert!(Distance::OUT_OF_RANGE.is_error());
        assert!(!Distance::new(0, 1).is_error());
        assert!(!Distance::new(9, 99).is_error());
        assert_eq!(Distance::new(2, 5).level_cm(), 205);
    }
}
