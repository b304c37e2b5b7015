//! Phase transition table.
//!
//! Transitions are data: each rule names a source phase, the trigger that may
//! fire it, the target phase and a pure guard. Every rule targets
//! `from.next()`, which is what keeps phases monotonic and forbids skipping
//! from observer straight to oracle.

use serde::{Deserialize, Serialize};

use super::AiPhase;
use crate::config::PhaseThresholds;

/// Inputs every guard is evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseSignals {
    pub discovery_completed: bool,
    pub account_age_days: i64,
    /// Days since the recorded phase started.
    pub days_in_phase: i64,
    pub depth_score: u32,
    pub consistency_score: u32,
    /// Theme count used by the committed observer gate.
    pub theme_count: usize,
}

/// What is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTrigger {
    /// Read-only inference during snapshot composition.
    Inferred,
    /// Explicit evaluation by the scheduler, which may commit.
    Committed,
}

type Guard = fn(&PhaseSignals, &PhaseThresholds) -> bool;

/// One row of the transition table.
#[derive(Clone, Copy)]
pub struct TransitionRule {
    pub from: AiPhase,
    pub trigger: PhaseTrigger,
    pub to: AiPhase,
    pub guard: Guard,
}

/// Observer has been around long enough and writes with enough depth.
pub fn observer_matured(s: &PhaseSignals, t: &PhaseThresholds) -> bool {
    s.discovery_completed
        && s.account_age_days >= t.architect_min_account_days
        && s.depth_score >= t.architect_min_depth
}

/// Observer has finished discovery and shows recurring themes.
pub fn observer_ready(s: &PhaseSignals, t: &PhaseThresholds) -> bool {
    s.discovery_completed
        && s.theme_count >= t.architect_min_themes
        && s.depth_score >= t.architect_commit_min_depth
}

/// Architect has held the phase long enough with consistent, deep work.
pub fn architect_mastered(s: &PhaseSignals, t: &PhaseThresholds) -> bool {
    s.days_in_phase >= t.oracle_min_days_in_phase
        && s.depth_score >= t.oracle_min_depth
        && s.consistency_score >= t.oracle_min_consistency
}

pub const TRANSITIONS: [TransitionRule; 4] = [
    TransitionRule {
        from: AiPhase::Observer,
        trigger: PhaseTrigger::Inferred,
        to: AiPhase::Architect,
        guard: observer_matured,
    },
    TransitionRule {
        from: AiPhase::Architect,
        trigger: PhaseTrigger::Inferred,
        to: AiPhase::Oracle,
        guard: architect_mastered,
    },
    TransitionRule {
        from: AiPhase::Observer,
        trigger: PhaseTrigger::Committed,
        to: AiPhase::Architect,
        guard: observer_ready,
    },
    TransitionRule {
        from: AiPhase::Architect,
        trigger: PhaseTrigger::Committed,
        to: AiPhase::Oracle,
        guard: architect_mastered,
    },
];

/// Look up the transition out of `from` for `trigger`, if its guard passes.
pub fn fire(
    from: AiPhase,
    trigger: PhaseTrigger,
    signals: &PhaseSignals,
    thresholds: &PhaseThresholds,
) -> Option<AiPhase> {
    TRANSITIONS
        .iter()
        .find(|rule| rule.from == from && rule.trigger == trigger)
        .filter(|rule| (rule.guard)(signals, thresholds))
        .map(|rule| rule.to)
}

/// Read-only phase inference for snapshot composition.
///
/// The observer gate is evaluated from scratch; the architect gate only when
/// the recorded phase is architect, because `days_in_phase` counts days in
/// the recorded phase. A recorded phase later than the computed one wins.
pub fn determine_phase(
    recorded: AiPhase,
    signals: &PhaseSignals,
    thresholds: &PhaseThresholds,
) -> AiPhase {
    let computed = fire(AiPhase::Observer, PhaseTrigger::Inferred, signals, thresholds)
        .unwrap_or(AiPhase::Observer);
    let current = recorded.max(computed);

    if recorded == AiPhase::Architect {
        if let Some(next) = fire(AiPhase::Architect, PhaseTrigger::Inferred, signals, thresholds) {
            return next;
        }
    }
    current
}

/// Scheduler check: the phase `current` should advance to, if any.
pub fn should_transition(
    current: AiPhase,
    signals: &PhaseSignals,
    thresholds: &PhaseThresholds,
) -> Option<AiPhase> {
    fire(current, PhaseTrigger::Committed, signals, thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn thresholds() -> PhaseThresholds {
        PhaseThresholds::default()
    }

    fn mature_observer() -> PhaseSignals {
        PhaseSignals {
            discovery_completed: true,
            account_age_days: 20,
            days_in_phase: 20,
            depth_score: 6,
            consistency_score: 60,
            theme_count: 3,
        }
    }

    #[test]
    fn test_table_only_moves_one_step_forward() {
        for rule in TRANSITIONS.iter() {
            assert_eq!(Some(rule.to), rule.from.next());
        }
        for phase in AiPhase::iter().filter(AiPhase::is_terminal) {
            assert!(TRANSITIONS.iter().all(|r| r.from != phase));
        }
    }

    #[test]
    fn test_observer_stays_without_discovery() {
        let signals = PhaseSignals {
            discovery_completed: false,
            ..mature_observer()
        };
        assert_eq!(
            determine_phase(AiPhase::Observer, &signals, &thresholds()),
            AiPhase::Observer
        );
    }

    #[test]
    fn test_observer_stays_while_account_young() {
        let signals = PhaseSignals {
            account_age_days: 13,
            ..mature_observer()
        };
        assert_eq!(
            determine_phase(AiPhase::Observer, &signals, &thresholds()),
            AiPhase::Observer
        );
    }

    #[test]
    fn test_inferred_architect() {
        assert_eq!(
            determine_phase(AiPhase::Observer, &mature_observer(), &thresholds()),
            AiPhase::Architect
        );
    }

    #[test]
    fn test_recorded_phase_wins_over_recomputation() {
        let weak = PhaseSignals::default();
        assert_eq!(
            determine_phase(AiPhase::Oracle, &weak, &thresholds()),
            AiPhase::Oracle
        );
        assert_eq!(
            determine_phase(AiPhase::Architect, &weak, &thresholds()),
            AiPhase::Architect
        );
    }

    #[test]
    fn test_no_skip_from_observer_to_oracle() {
        let strong = PhaseSignals {
            days_in_phase: 90,
            depth_score: 10,
            consistency_score: 100,
            ..mature_observer()
        };
        assert_eq!(
            determine_phase(AiPhase::Observer, &strong, &thresholds()),
            AiPhase::Architect
        );
    }

    #[test]
    fn test_inferred_oracle_from_recorded_architect() {
        let signals = PhaseSignals {
            days_in_phase: 30,
            depth_score: 7,
            consistency_score: 60,
            ..mature_observer()
        };
        assert_eq!(
            determine_phase(AiPhase::Architect, &signals, &thresholds()),
            AiPhase::Oracle
        );
    }

    #[test]
    fn test_should_transition_observer() {
        assert_eq!(
            should_transition(AiPhase::Observer, &mature_observer(), &thresholds()),
            Some(AiPhase::Architect)
        );

        let few_themes = PhaseSignals {
            theme_count: 2,
            ..mature_observer()
        };
        assert_eq!(
            should_transition(AiPhase::Observer, &few_themes, &thresholds()),
            None
        );

        let shallow = PhaseSignals {
            depth_score: 3,
            ..mature_observer()
        };
        assert_eq!(
            should_transition(AiPhase::Observer, &shallow, &thresholds()),
            None
        );
    }

    #[test]
    fn test_should_transition_architect_boundaries() {
        let ready = PhaseSignals {
            days_in_phase: 30,
            depth_score: 7,
            consistency_score: 60,
            ..Default::default()
        };
        assert_eq!(
            should_transition(AiPhase::Architect, &ready, &thresholds()),
            Some(AiPhase::Oracle)
        );

        for not_ready in [
            PhaseSignals { days_in_phase: 29, ..ready.clone() },
            PhaseSignals { depth_score: 6, ..ready.clone() },
            PhaseSignals { consistency_score: 59, ..ready.clone() },
        ] {
            assert_eq!(
                should_transition(AiPhase::Architect, &not_ready, &thresholds()),
                None
            );
        }
    }

    #[test]
    fn test_oracle_is_terminal() {
        let everything = PhaseSignals {
            discovery_completed: true,
            account_age_days: 1000,
            days_in_phase: 1000,
            depth_score: 10,
            consistency_score: 100,
            theme_count: 10,
        };
        assert_eq!(
            should_transition(AiPhase::Oracle, &everything, &thresholds()),
            None
        );
    }
}
