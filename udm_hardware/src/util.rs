use std::time::{Duration, Instant};

use udm_traits::{EchoLine, TriggerLine};

use crate::error::{HwError, Result};

/// Minimum trigger pulse accepted by HC-SR04 style sensors.
pub const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Poll `echo` until it reads low or `timeout` expires, sleeping `poll`
/// between reads. Returns how long the line was seen high.
///
/// A line still high after the longest legitimate echo means the sensor
/// output is held high or miswired.
pub fn wait_echo_idle<E: EchoLine + ?Sized>(
    echo: &E,
    timeout: Duration,
    poll: Duration,
) -> Result<Duration> {
    let start = Instant::now();
    while echo.is_high() {
        let waited = start.elapsed();
        if waited >= timeout {
            tracing::debug!(?waited, "echo line still high");
            return Err(HwError::EchoIdleTimeout);
        }
        std::thread::sleep(poll);
    }
    Ok(start.elapsed())
}

/// Fire one trigger pulse, give the sensor `lead` to raise its echo, then
/// wait for the echo to end within `timeout`.
///
/// Exercises the whole trigger/echo path outside the control loop. A sensor
/// with nothing in range never raises the echo and passes as idle.
pub fn ping_and_wait<T, E>(
    trigger: &mut T,
    echo: &E,
    lead: Duration,
    timeout: Duration,
) -> Result<Duration>
where
    T: TriggerLine + ?Sized,
    E: EchoLine + ?Sized,
{
    let gpio = |e: Box<dyn std::error::Error + Send + Sync>| HwError::Gpio(e.to_string());
    trigger.set_trigger(true).map_err(gpio)?;
    std::thread::sleep(TRIGGER_PULSE);
    trigger.set_trigger(false).map_err(gpio)?;
    std::thread::sleep(lead);
    wait_echo_idle(echo, timeout, Duration::from_micros(200))
}
