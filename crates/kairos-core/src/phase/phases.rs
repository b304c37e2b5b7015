//! Coaching phases a user progresses through.
//!
//! - Observer: the coach listens and mirrors, building a picture of the user
//! - Architect: the coach designs structure around known drift and avoidance
//! - Oracle: the coach reflects long-run meaning back to the user

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Coarse maturity stage gating tone and content of downstream prompts.
///
/// Variants are declared in progression order, so `Ord` is the progression
/// order: `Observer < Architect < Oracle`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AiPhase {
    /// Listening and discovery.
    #[default]
    Observer,
    /// Designing structure.
    Architect,
    /// Reflecting meaning. Terminal.
    Oracle,
}

impl AiPhase {
    /// The next phase in the progression, `None` for the terminal phase.
    pub fn next(&self) -> Option<AiPhase> {
        match self {
            AiPhase::Observer => Some(AiPhase::Architect),
            AiPhase::Architect => Some(AiPhase::Oracle),
            AiPhase::Oracle => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}
