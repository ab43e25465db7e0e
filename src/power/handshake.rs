//! Pin-level acknowledgement polling
//!
//! Radio modules acknowledge sleep and wake requests by driving a status
//! line. [`wait_for_level`] polls that line with a bounded timeout.

use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;

/// Poll `pin` until it reads `high`, pausing `step_ms` between reads.
///
/// Returns `Ok(true)` once the level matches, `Ok(false)` if it still does
/// not match after `timeout_ms` worth of steps. The pin is read one final
/// time after the last pause.
pub async fn wait_for_level<P, D>(
    pin: &mut P,
    high: bool,
    timeout_ms: u32,
    step_ms: u32,
    delay: &mut D,
) -> Result<bool, P::Error>
where
    P: InputPin,
    D: DelayNs,
{
    let step_ms = step_ms.max(1);
    let mut waited_ms = 0;

    loop {
        if pin.is_high()? == high {
            return Ok(true);
        }
        if waited_ms >= timeout_ms {
            return Ok(false);
        }
        delay.delay_ms(step_ms).await;
        waited_ms += step_ms;
    }
}
