//! Buzzer duty cycle.
//!
//! Closer objects beep faster: the gap between beeps is
//! `cm * (ticks_per_sec / threshold)` slow ticks, and each beep lasts two
//! ticks. Tick stamps are 8-bit and wrap.
use crate::distance::Distance;
use crate::util::tick_delta;

/// Slow ticks a beep stays on.
pub const BEEP_TICKS: u8 = 2;

#[derive(Debug, Clone)]
pub struct AlarmController {
    ticks_per_sec: u8,
    last_beep: u8,
    on: bool,
}

impl AlarmController {
    pub fn new(ticks_per_sec: u8) -> Self {
        Self {
            ticks_per_sec,
            last_beep: 0,
            on: false,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Whether a reading is inside the alarm zone.
    pub fn is_active(d: Distance, threshold_cm: u8) -> bool {
        d.meters == 0 && d.centimeters > 0 && d.centimeters <= threshold_cm
    }

    /// Beep interval in slow ticks, truncated to 8 bits.
    pub fn interval(&self, centimeters: u8, threshold_cm: u8) -> u8 {
        let per_cm = u32::from(self.ticks_per_sec) / u32::from(threshold_cm.max(1));
        let raw = u32::from(centimeters) * per_cm;
        u8::try_from(raw).unwrap_or(u8::MAX)
    }

    /// Evaluate one slow tick; returns the new buzzer state.
    pub fn update(&mut self, tick: u8, d: Distance, threshold_cm: u8) -> bool {
        if !Self::is_active(d, threshold_cm) {
            self.on = false;
            return false;
        }
        let delta = tick_delta(tick, self.last_beep);
        if delta > self.interval(d.centimeters, threshold_cm) {
            self.on = true;
            self.last_beep = tick;
        } else if delta >= BEEP_TICKS {
            self.on = false;
        }
        self.on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_cm_at_threshold_35_beeps_every_hundred_ticks() {
        let mut a = AlarmController::new(200);
        let d = Distance::new(0, 20);
        assert_eq!(a.interval(20, 35), 100);

        let mut on_ticks = Vec::new();
        let mut off_ticks = Vec::new();
        let mut was = false;
        for t in 1..=210u16 {
            let tick = u8::try_from(t % 256).unwrap();
            let on = a.update(tick, d, 35);
            if on && !was {
                on_ticks.push(t);
            }
            if !on && was {
                off_ticks.push(t);
            }
            was = on;
        }
        assert_eq!(on_ticks, vec![101, 202]);
        assert_eq!(off_ticks, vec![103, 204]);
    }

    #[test]
    fn outside_zone_forces_off() {
        let mut a = AlarmController::new(200);
        assert!(a.update(200, Distance::new(0, 5), 35));
        assert!(!a.update(201, Distance::new(0, 50), 35));
        assert!(!a.update(202, Distance::new(1, 5), 35));
        assert!(!a.update(203, Distance::new(0, 0), 35));
    }

    #[test]
    fn zero_threshold_never_sounds() {
        let mut a = AlarmController::new(200);
        for t in 0..=255u8 {
            assert!(!a.update(t, Distance::new(0, 1), 0));
        }
    }

    #[test]
    fn wraps_across_tick_counter_overflow() {
        let mut a = AlarmController::new(200);
        let d = Distance::new(0, 35);
        // interval = 35 * (200 / 35) = 175
        assert!(a.update(200, d, 35));
        assert!(!a.update(202, d, 35));
        // 200 + 176 wraps to 120
        assert!(!a.update(119, d, 35));
        assert!(a.update(120, d, 35));
    }
}
