//! Self-heal retry bookkeeping and the central liveness guarantee: same
//! failure + no progress => stop.

use std::collections::BTreeMap;

/// Snapshot of which of a task's declared files exist, taken before a
/// self-heal attempt so the next attempt can tell whether anything
/// actually changed on disk.
pub type FileSnapshot = BTreeMap<String, bool>;

pub fn snapshot_changed(previous: &FileSnapshot, current: &FileSnapshot) -> bool {
    previous != current
}

#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    pub attempt: u32,
    /// The error produced by the most recently completed self-heal
    /// attempt. `None` until at least one attempt has run — the first
    /// attempt never has a prior self-heal outcome to compare against,
    /// so it always proceeds.
    last_outcome_error: Option<String>,
    pub changed: bool,
    pub file_snapshot: FileSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Proceed,
    MaxRetriesExceeded,
    LoopDetected,
}

impl RetryContext {
    pub fn new(_initial_error: impl Into<String>, initial_snapshot: FileSnapshot) -> Self {
        Self {
            attempt: 0,
            last_outcome_error: None,
            changed: false,
            file_snapshot: initial_snapshot,
        }
    }

    /// Records the outcome of the attempt that just completed (`error`,
    /// `new_snapshot`) and decides whether the *next* attempt may proceed.
    ///
    /// Attempt 1 always proceeds (no prior self-heal outcome exists yet
    /// to compare against). From attempt 2 onward, if this attempt's
    /// error is identical to the immediately preceding attempt's error
    /// *and* no task file appeared or disappeared between the two
    /// attempts' snapshots, the next attempt is refused: attempt i and
    /// attempt i+1 identical with no progress means attempt i+2 never
    /// runs (e.g. two failed attempts with error "X" abort with
    /// `attempt == 2`).
    pub fn record_attempt(
        &mut self,
        max_retries: u32,
        error: impl Into<String>,
        new_snapshot: FileSnapshot,
    ) -> RetryOutcome {
        let error = error.into();
        let changed = snapshot_changed(&self.file_snapshot, &new_snapshot);
        let is_repeat_of_prior = self.last_outcome_error.as_deref() == Some(error.as_str()) && !changed;
        let had_prior_attempt = self.last_outcome_error.is_some();

        self.attempt += 1;
        self.changed = changed;
        self.file_snapshot = new_snapshot;
        self.last_outcome_error = Some(error);

        if had_prior_attempt && is_repeat_of_prior {
            return RetryOutcome::LoopDetected;
        }
        if self.attempt >= max_retries {
            return RetryOutcome::MaxRetriesExceeded;
        }
        RetryOutcome::Proceed
    }
}
