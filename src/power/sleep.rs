//! Deep-sleep scheduling
//!
//! Low-power timers on small MCUs only offer a fixed menu of durations. A
//! requested sleep is broken down greedily into those steps, largest first.

use core::future::Future;
use embedded_hal_async::delay::DelayNs;

/// One hardware power-down interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepStep {
    S8,
    S4,
    S2,
    S1,
    Ms500,
    Ms250,
    Ms120,
    Ms60,
    Ms30,
    Ms15,
}

impl SleepStep {
    /// All steps, longest first
    pub const ALL: [SleepStep; 10] = [
        SleepStep::S8,
        SleepStep::S4,
        SleepStep::S2,
        SleepStep::S1,
        SleepStep::Ms500,
        SleepStep::Ms250,
        SleepStep::Ms120,
        SleepStep::Ms60,
        SleepStep::Ms30,
        SleepStep::Ms15,
    ];

    /// Shortest step, also the polling granularity while waiting on a pin
    pub const SHORTEST: SleepStep = SleepStep::Ms15;

    /// Duration in milliseconds
    pub fn as_ms(self) -> u32 {
        match self {
            SleepStep::S8 => 8_000,
            SleepStep::S4 => 4_000,
            SleepStep::S2 => 2_000,
            SleepStep::S1 => 1_000,
            SleepStep::Ms500 => 500,
            SleepStep::Ms250 => 250,
            SleepStep::Ms120 => 120,
            SleepStep::Ms60 => 60,
            SleepStep::Ms30 => 30,
            SleepStep::Ms15 => 15,
        }
    }
}

/// Iterator over the steps that make up one sleep request
#[derive(Debug, Clone)]
pub struct SleepPlan {
    remaining_ms: u32,
}

impl SleepPlan {
    /// Time left over that is shorter than any step
    pub fn remainder_ms(&self) -> u32 {
        self.remaining_ms
    }
}

impl Iterator for SleepPlan {
    type Item = SleepStep;

    fn next(&mut self) -> Option<SleepStep> {
        let step = SleepStep::ALL
            .into_iter()
            .find(|step| self.remaining_ms >= step.as_ms())?;
        self.remaining_ms -= step.as_ms();
        Some(step)
    }
}

/// Break `ms` into power-down steps. Anything under 15 ms is dropped.
pub fn sleep_plan(ms: u32) -> SleepPlan {
    SleepPlan { remaining_ms: ms }
}

/// Platform power-down primitive
pub trait DeepSleep {
    /// Stop the core for one step, peripherals off, then resume
    fn power_down(&mut self, step: SleepStep) -> impl Future<Output = ()>;
}

impl<S: DeepSleep + ?Sized> DeepSleep for &mut S {
    fn power_down(&mut self, step: SleepStep) -> impl Future<Output = ()> {
        (**self).power_down(step)
    }
}

/// Adapts a [`DeepSleep`] into a [`DelayNs`] by rounding to whole steps.
///
/// Delays shorter than the shortest step still sleep for one step so that
/// polling loops make progress.
pub struct StepDelay<S>(pub S);

impl<S: DeepSleep> DelayNs for StepDelay<S> {
    async fn delay_ns(&mut self, ns: u32) {
        let ms = (ns / 1_000_000).max(SleepStep::SHORTEST.as_ms());
        for step in sleep_plan(ms) {
            self.0.power_down(step).await;
        }
    }
}

#[cfg(test)]
pub mod mock {
    //! Mock deep-sleep primitive for testing

    use super::*;
    use core::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Records every requested power-down
    #[derive(Clone, Default)]
    pub struct MockSleeper {
        steps: Rc<RefCell<Vec<SleepStep>>>,
    }

    impl MockSleeper {
        pub fn new() -> Self {
            Self::default()
        }

        /// Steps taken so far
        pub fn steps(&self) -> Vec<SleepStep> {
            self.steps.borrow().clone()
        }

        /// Total time slept, milliseconds
        pub fn slept_ms(&self) -> u32 {
            self.steps.borrow().iter().map(|s| s.as_ms()).sum()
        }
    }

    impl DeepSleep for MockSleeper {
        async fn power_down(&mut self, step: SleepStep) {
            self.steps.borrow_mut().push(step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockSleeper;
    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_plan_largest_first() {
        let steps: Vec<_> = sleep_plan(13_775).collect();
        assert_eq!(
            steps,
            [
                SleepStep::S8,
                SleepStep::S4,
                SleepStep::S1,
                SleepStep::Ms500,
                SleepStep::Ms250,
                SleepStep::Ms15,
            ]
        );
    }

    #[test]
    fn test_plan_repeats_long_steps() {
        let steps: Vec<_> = sleep_plan(24_000).collect();
        assert_eq!(steps, [SleepStep::S8, SleepStep::S8, SleepStep::S8]);
    }

    #[test]
    fn test_plan_repeats_short_steps() {
        // 249 -> 120 + 120 with 9 left
        let mut plan = sleep_plan(249);
        assert_eq!(plan.next(), Some(SleepStep::Ms120));
        assert_eq!(plan.next(), Some(SleepStep::Ms120));
        assert_eq!(plan.next(), None);
        assert_eq!(plan.remainder_ms(), 9);
    }

    #[test]
    fn test_plan_drops_sub_step_remainder() {
        assert_eq!(sleep_plan(14).count(), 0);
        assert_eq!(sleep_plan(0).count(), 0);
    }

    #[test]
    fn test_plan_covers_request() {
        for ms in [15, 16, 999, 1_000, 7_999, 8_001, 65_535, 120_000] {
            let total: u32 = sleep_plan(ms).map(SleepStep::as_ms).sum();
            assert!(total <= ms);
            assert!(ms - total < 15, "{} ms left {} ms", ms, ms - total);
        }
    }

    #[test]
    fn test_step_delay_rounds_up_to_shortest() {
        let sleeper = MockSleeper::new();
        let mut delay = StepDelay(sleeper.clone());

        futures::executor::block_on(async {
            delay.delay_ms(1).await;
            delay.delay_ms(1_030).await;
        });

        assert_eq!(
            sleeper.steps(),
            [SleepStep::Ms15, SleepStep::S1, SleepStep::Ms30]
        );
    }
}
