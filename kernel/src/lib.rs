//! Pure domain types and decision functions for the orchestrator.
//!
//! Nothing in this crate touches a filesystem, a clock, or a network socket.
//! Every public function here is a total function over its inputs so that
//! `core` (and tests) can exercise the hard logic — dependency gating, retry
//! loop detection, review approval, risk classification — without spinning
//! up a model client or a git repository.

pub mod plan;
pub mod retry;
pub mod review;
pub mod risk;
pub mod scheduler;
pub mod slug;

pub use plan::{Plan, PlanConfig, PlanContext, Task, TaskPhase, TaskStatus, TaskType, TrustLevel};
