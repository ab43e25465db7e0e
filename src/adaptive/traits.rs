//! Clock and analog sampling capabilities used by the controller
//!
//! The controller never touches hardware directly. It reads time through
//! [`Clock`] and battery samples through [`AdcSource`], so the same state
//! machine runs on the node and inside host tests.

/// Monotonic millisecond tick counter.
///
/// The counter is 32 bits wide and is expected to wrap (about every 49.7
/// days). Callers must compare ticks with wrapping arithmetic.
pub trait Clock {
    /// Current tick in milliseconds
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Single analog channel wired to the battery divider tap.
pub trait AdcSource {
    /// Take one raw conversion
    fn read_raw(&mut self) -> u16;

    /// Wait between consecutive conversions.
    ///
    /// Defaults to no delay, which is what host implementations want.
    fn settle(&mut self) {}
}

impl<A: AdcSource + ?Sized> AdcSource for &mut A {
    fn read_raw(&mut self) -> u16 {
        (**self).read_raw()
    }

    fn settle(&mut self) {
        (**self).settle()
    }
}

/// Placeholder source for controllers built without a battery channel.
///
/// It has no values, so a controller typed with it can only ever hold `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoAdc {}

impl AdcSource for NoAdc {
    fn read_raw(&mut self) -> u16 {
        match *self {}
    }
}
