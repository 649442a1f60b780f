//! Fixed-timestep accumulator shared by server simulation and client prediction.

use std::time::Duration;

/// Simulation rate. Both sides must agree on it or prediction drifts.
pub const TICKS_PER_SECOND: u32 = 200;

/// Duration of one simulation step.
pub const STEP: Duration = Duration::from_nanos(1_000_000_000 / TICKS_PER_SECOND as u64);

/// Upper bound on steps taken by a single [`FixedStep::advance`].
///
/// A stalled caller (debugger, suspended laptop) would otherwise replay
/// seconds of simulation in one frame.
pub const MAX_CATCH_UP_STEPS: u32 = 40;

/// Converts wall-clock time into whole simulation steps.
///
/// Leftover time smaller than one [`STEP`] is carried into the next call.
#[derive(Debug, Clone, Default)]
pub struct FixedStep {
    carry: Duration,
}

impl FixedStep {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `elapsed` and return how many steps are now due.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.carry += elapsed;
        let due = self.carry.as_nanos() / STEP.as_nanos();
        if due > u128::from(MAX_CATCH_UP_STEPS) {
            self.carry = Duration::ZERO;
            return MAX_CATCH_UP_STEPS;
        }
        let due = due as u32;
        self.carry -= STEP * due;
        due
    }

    /// Time accumulated toward the next step.
    #[must_use]
    pub fn carry(&self) -> Duration {
        self.carry
    }
}
