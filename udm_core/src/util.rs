//! Tick arithmetic shared by the two periodic activities.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u32 = 1_000_000;

/// Ticks per second for a tick length in microseconds.
/// Clamps `tick_us` to at least 1 to avoid division by zero.
#[inline]
pub fn ticks_per_sec(tick_us: u32) -> u32 {
    MICROS_PER_SEC / tick_us.max(1)
}

/// Whole ticks that fit in `window_us` (truncating).
#[inline]
pub fn window_ticks(window_us: u32, tick_us: u32) -> u32 {
    window_us / tick_us.max(1)
}

/// Consecutive failed measurements tolerated before the reading is forced to
/// out-of-range: roughly one second worth of measurement attempts.
#[inline]
pub fn echo_loss_limit(slow_tick_us: u32, echo_rate: u32) -> u8 {
    let per_sec = ticks_per_sec(slow_tick_us) / echo_rate.max(1);
    u8::try_from(per_sec).unwrap_or(u8::MAX)
}

/// Elapsed slow ticks between two wrapping 8-bit tick stamps.
#[inline]
pub fn tick_delta(now: u8, then: u8) -> u8 {
    now.wrapping_sub(then)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_board_numbers() {
        assert_eq!(ticks_per_sec(5000), 200);
        assert_eq!(window_ticks(5800, 50), 116);
        assert_eq!(window_ticks(120, 50), 2);
        assert_eq!(window_ticks(25000, 50), 500);
        assert_eq!(echo_loss_limit(5000, 64), 3);
    }

    #[test]
    fn zero_inputs_do_not_divide_by_zero() {
        assert_eq!(ticks_per_sec(0), MICROS_PER_SEC);
        assert_eq!(window_ticks(10, 0), 10);
        assert_eq!(echo_loss_limit(5000, 0), 200);
        assert_eq!(echo_loss_limit(1, 1), u8::MAX);
    }

    #[test]
    fn delta_wraps() {
        assert_eq!(tick_delta(3, 250), 9);
        assert_eq!(tick_delta(250, 3), 247);
    }
}
