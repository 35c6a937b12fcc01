//! Three-digit multiplexed 7-segment display.
//!
//! One digit is lit per slow tick, rotating meters → tens of cm → cm. The
//! previous digit is switched off before the segment bus changes.
use udm_traits::{DIGITS, HwResult, SegmentDisplay};

use crate::distance::Distance;

/// Digit glyphs, positive logic, bit order `dp g f e d c b a`.
pub const GLYPHS: [u8; 10] = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7C, 0x07, 0x7F, 0x67];
pub const GLYPH_E: u8 = 0x79;
pub const GLYPH_R: u8 = 0x50;
pub const BLANK: u8 = 0x00;

/// What the display should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Distance(Distance),
    /// Alarm threshold in centimeters; zero is a valid value here.
    Threshold(u8),
}

/// Segment patterns for all three positions, meters first.
pub fn render(reading: Reading) -> [u8; DIGITS] {
    let (m, cm, err) = match reading {
        Reading::Distance(d) => (d.meters, d.centimeters, d.is_error()),
        Reading::Threshold(t) => (0, t, t >= 100),
    };
    if err {
        return [GLYPH_E, GLYPH_R, GLYPH_R];
    }
    let meters = if m == 0 { BLANK } else { GLYPHS[usize::from(m)] };
    let tens = if m != 0 || cm >= 10 {
        GLYPHS[usize::from(cm / 10)]
    } else {
        BLANK
    };
    [meters, tens, GLYPHS[usize::from(cm % 10)]]
}

/// Inverse of the glyph table, for logs and the simulated panel.
pub fn decode_glyph(pattern: u8) -> char {
    match pattern {
        BLANK => ' ',
        GLYPH_E => 'E',
        GLYPH_R => 'r',
        p => GLYPHS
            .iter()
            .position(|g| *g == p)
            .and_then(|i| u32::try_from(i).ok())
            .and_then(|d| char::from_digit(d, 10))
            .unwrap_or('?'),
    }
}

/// Human-readable frame, e.g. `"173"`, `" 20"` or `"Err"`.
pub fn frame_text(frame: &[u8; DIGITS]) -> String {
    frame.iter().map(|p| decode_glyph(*p)).collect()
}

#[derive(Debug, Default)]
pub struct DisplayMultiplexer {
    current: usize,
}

impl DisplayMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position that the next `refresh` will light.
    pub fn current_digit(&self) -> usize {
        self.current
    }

    /// Advance the rotation by one digit.
    pub fn refresh<D: SegmentDisplay + ?Sized>(
        &mut self,
        display: &mut D,
        reading: Reading,
    ) -> HwResult<()> {
        let frame = render(reading);
        let prev = (self.current + DIGITS - 1) % DIGITS;
        display.select_digit(prev, false)?;
        display.write_segments(frame[self.current])?;
        display.select_digit(self.current, true)?;
        self.current = (self.current + 1) % DIGITS;
        Ok(())
    }

    /// Switch every digit off.
    pub fn blank<D: SegmentDisplay + ?Sized>(&mut self, display: &mut D) -> HwResult<()> {
        for d in 0..DIGITS {
            display.select_digit(d, false)?;
        }
        display.write_segments(BLANK)?;
        self.current = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Reading::Distance(Distance::new(1, 73)), "173")]
    #[case(Reading::Distance(Distance::new(0, 20)), " 20")]
    #[case(Reading::Distance(Distance::new(0, 7)), "  7")]
    #[case(Reading::Distance(Distance::new(2, 5)), "205")]
    #[case(Reading::Distance(Distance::new(0, 0)), "Err")]
    #[case(Reading::Distance(Distance::new(0, 100)), "Err")]
    #[case(Reading::Distance(Distance::OUT_OF_RANGE), "Err")]
    #[case(Reading::Threshold(35), " 35")]
    #[case(Reading::Threshold(0), "  0")]
    #[case(Reading::Threshold(9), "  9")]
    fn renders_expected_text(#[case] reading: Reading, #[case] text: &str) {
        assert_eq!(frame_text(&render(reading)), text);
    }

    #[test]
    fn error_glyphs() {
        assert_eq!(
            render(Reading::Distance(Distance::OUT_OF_RANGE)),
            [GLYPH_E, GLYPH_R, GLYPH_R]
        );
    }

    #[derive(Default)]
    struct Recorder {
        ops: Vec<(char, usize, u8)>,
    }

    impl SegmentDisplay for Recorder {
        fn select_digit(&mut self, digit: usize, enabled: bool) -> HwResult<()> {
            self.ops.push((if enabled { '+' } else { '-' }, digit, 0));
            Ok(())
        }
        fn write_segments(&mut self, pattern: u8) -> HwResult<()> {
            self.ops.push(('=', 0, pattern));
            Ok(())
        }
    }

    #[test]
    fn rotation_disables_previous_before_writing_bus() {
        let mut mux = DisplayMultiplexer::new();
        let mut rec = Recorder::default();
        let r = Reading::Distance(Distance::new(1, 73));
        for _ in 0..4 {
            mux.refresh(&mut rec, r).unwrap();
        }
        assert_eq!(
            rec.ops,
            vec![
                ('-', 2, 0),
                ('=', 0, GLYPHS[1]),
                ('+', 0, 0),
                ('-', 0, 0),
                ('=', 0, GLYPHS[7]),
                ('+', 1, 0),
                ('-', 1, 0),
                ('=', 0, GLYPHS[3]),
                ('+', 2, 0),
                ('-', 2, 0),
                ('=', 0, GLYPHS[1]),
                ('+', 0, 0),
            ]
        );
        assert_eq!(mux.current_digit(), 1);
    }
}
