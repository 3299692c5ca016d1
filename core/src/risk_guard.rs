//! Long-run guard: duration and check-in budgeting for
//! unattended runs, layered on top of
//! [`orchestrator_kernel::risk::analyze`]'s pure classification.

use std::time::{Duration, Instant};

use orchestrator_kernel::risk::RiskAssessment;
use parking_lot::Mutex;

struct State {
    start_time: Instant,
    last_check_in: Instant,
    operations: u64,
    risk_events: u64,
    paused: bool,
    pause_reason: Option<String>,
}

pub struct LongRunGuard {
    state: Mutex<State>,
    max_duration: Duration,
    check_in_interval: Duration,
    pause_on_risk_at_or_above: orchestrator_kernel::risk::RiskLevel,
}

impl LongRunGuard {
    pub fn new(max_duration: Duration, check_in_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(State {
                start_time: now,
                last_check_in: now,
                operations: 0,
                risk_events: 0,
                paused: false,
                pause_reason: None,
            }),
            max_duration,
            check_in_interval,
            pause_on_risk_at_or_above: orchestrator_kernel::risk::RiskLevel::High,
        }
    }

    pub fn record_operation(&self) {
        self.state.lock().operations += 1;
    }

    /// Returns `(continue, reason)`: continues until `max_duration` is
    /// reached or an external pause has been set.
    pub fn check_in(&self) -> (bool, Option<String>) {
        let mut state = self.state.lock();
        state.last_check_in = Instant::now();

        if state.paused {
            return (false, state.pause_reason.clone());
        }
        if state.start_time.elapsed() >= self.max_duration {
            let reason = format!("max duration of {:?} exceeded", self.max_duration);
            state.paused = true;
            state.pause_reason = Some(reason.clone());
            return (false, Some(reason));
        }
        (true, None)
    }

    pub fn needs_check_in(&self) -> bool {
        self.state.lock().last_check_in.elapsed() >= self.check_in_interval
    }

    /// Gates on configuration: a risk assessment at or above the
    /// configured threshold forces a pause.
    pub fn should_pause_for_risk(&self, assessment: &RiskAssessment) -> bool {
        let mut state = self.state.lock();
        if assessment.level >= self.pause_on_risk_at_or_above {
            state.risk_events += 1;
            state.paused = true;
            state.pause_reason = Some(format!("risk level {:?} requires operator confirmation", assessment.level));
            true
        } else {
            false
        }
    }

    pub fn external_pause(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        state.paused = true;
        state.pause_reason = Some(reason.into());
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        state.paused = false;
        state.pause_reason = None;
    }

    pub fn operations(&self) -> u64 {
        self.state.lock().operations
    }

    pub fn risk_events(&self) -> u64 {
        self.state.lock().risk_events
    }
}
