//! Phase state machine: `observer -> architect -> oracle`.
//!
//! Two entry points share one transition table:
//!
//! - [`determine_phase`]: read-only inference used while composing a
//!   snapshot. Never writes.
//! - [`should_transition`]: the scheduler's explicit check, whose result the
//!   engine commits to the facts store.
//!
//! Phases never regress and never skip a step.

mod machine;
mod phases;

pub use machine::{
    architect_mastered, determine_phase, fire, observer_matured, observer_ready,
    should_transition, PhaseSignals, PhaseTrigger, TransitionRule, TRANSITIONS,
};
pub use phases::AiPhase;
