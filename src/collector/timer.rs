//! GC phase timer (C5): a stack of phase markers with per-phase cumulative
//! stopwatches that accumulate across re-entries.

use std::time::{Duration, Instant};

/// The five phases a run moves through. `None` is the baseline — time spent
/// there is bookkeeping/checkpoint-gate overhead outside the other four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Baseline: no phase active (checkpoint gate, setup, teardown).
    None,
    /// Iterating the candidate index and classifying candidates.
    Collecting,
    /// Issuing conditional/unconditional delete batches.
    Deleting,
    /// Finalizing the external-memory sorted sets.
    Sorting,
    /// Delegating split-document reclamation to the store.
    SplitsCleanup,
}

impl Phase {
    /// Number of distinct phases, including `None`.
    pub const COUNT: usize = 5;

    /// Stable array index for this phase, used to index per-phase stats.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::None => 0,
            Self::Collecting => 1,
            Self::Deleting => 2,
            Self::Sorting => 3,
            Self::SplitsCleanup => 4,
        }
    }
}

/// A stack-based phase timer. `start(p)` suspends whatever phase is
/// currently on top, pushes `p`, and resumes counting for it. `stop(p)`
/// pops only if `p` is on top (a mismatch is a no-op) and resumes whatever
/// phase is now on top.
pub struct PhaseTimer {
    stack: Vec<Phase>,
    cumulative: [Duration; Phase::COUNT],
    current_start: Option<Instant>,
    overall_start: Instant,
}

impl PhaseTimer {
    /// A fresh timer, with `Phase::None` as the base of the stack.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            stack: vec![Phase::None],
            cumulative: [Duration::ZERO; Phase::COUNT],
            current_start: Some(now),
            overall_start: now,
        }
    }

    /// Suspend the current top-of-stack phase and start/resume `phase`.
    pub fn start(&mut self, phase: Phase) {
        self.suspend_top();
        self.stack.push(phase);
        self.current_start = Some(Instant::now());
    }

    /// Pop `phase` if it is on top, accumulating its elapsed time and
    /// resuming whatever phase is now on top. A mismatched `phase` (not on
    /// top) is a no-op.
    pub fn stop(&mut self, phase: Phase) {
        if self.stack.last().copied() != Some(phase) {
            return;
        }
        self.suspend_top();
        self.stack.pop();
        if !self.stack.is_empty() {
            self.current_start = Some(Instant::now());
        }
    }

    /// Drain the stack, accumulating every still-open phase's elapsed time.
    pub fn close(&mut self) {
        while self.stack.len() > 1 {
            let top = *self.stack.last().expect("non-empty stack");
            self.stop(top);
        }
        self.suspend_top();
        self.current_start = None;
    }

    /// Cumulative duration spent in each phase so far.
    #[must_use]
    pub fn durations(&self) -> [Duration; Phase::COUNT] {
        self.cumulative
    }

    /// Total wall-clock time since the timer was constructed.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.overall_start.elapsed()
    }

    fn suspend_top(&mut self) {
        if let (Some(start), Some(&top)) = (self.current_start.take(), self.stack.last()) {
            self.cumulative[top.index()] += start.elapsed();
        }
    }
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn start_stop_accumulates_time_in_named_phase() {
        let mut timer = PhaseTimer::new();
        timer.start(Phase::Collecting);
        sleep(Duration::from_millis(5));
        timer.stop(Phase::Collecting);
        assert!(timer.durations()[Phase::Collecting.index()] >= Duration::from_millis(5));
    }

    #[test]
    fn mismatched_stop_is_a_no_op() {
        let mut timer = PhaseTimer::new();
        timer.start(Phase::Collecting);
        timer.stop(Phase::Sorting); // wrong phase, top is Collecting
        assert_eq!(timer.durations()[Phase::Sorting.index()], Duration::ZERO);
        timer.stop(Phase::Collecting);
        assert!(timer.durations()[Phase::Collecting.index()] > Duration::ZERO);
    }

    #[test]
    fn nested_reentry_accumulates_across_visits() {
        let mut timer = PhaseTimer::new();
        timer.start(Phase::Collecting);
        sleep(Duration::from_millis(2));
        timer.start(Phase::Deleting);
        sleep(Duration::from_millis(2));
        timer.stop(Phase::Deleting);
        sleep(Duration::from_millis(2));
        timer.start(Phase::Deleting);
        sleep(Duration::from_millis(2));
        timer.stop(Phase::Deleting);
        timer.stop(Phase::Collecting);

        let deleting = timer.durations()[Phase::Deleting.index()];
        assert!(deleting >= Duration::from_millis(4));
    }

    #[test]
    fn close_drains_the_stack() {
        let mut timer = PhaseTimer::new();
        timer.start(Phase::Collecting);
        timer.start(Phase::Deleting);
        timer.close();
        assert!(timer.durations()[Phase::Collecting.index()] >= Duration::ZERO);
        assert!(timer.durations()[Phase::Deleting.index()] >= Duration::ZERO);
    }
}
