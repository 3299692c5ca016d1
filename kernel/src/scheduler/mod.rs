//! Dependency gating and phase-walk decisions, expressed as pure
//! facts-in/decision-out functions so the executor's ordering logic is
//! testable without a model client or a filesystem.

mod eval;

pub use eval::{
    DependencyReadiness, next_phase, phase_requires_builder_first, ready_dependencies,
};
