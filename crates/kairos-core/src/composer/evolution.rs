//! `next_evolution` priority chain.

use crate::types::{BehaviorPatterns, NextEvolution};

type Rule = (fn(&BehaviorPatterns, usize, u32) -> bool, NextEvolution);

fn consistent_without_meaning(p: &BehaviorPatterns, themes: usize, _depth: u32) -> bool {
    p.consistency_score > 70 && themes < 3
}

fn avoiding(p: &BehaviorPatterns, _themes: usize, _depth: u32) -> bool {
    p.avoidance_triggers.len() > 3
}

fn shallow(_p: &BehaviorPatterns, _themes: usize, depth: u32) -> bool {
    depth < 5
}

fn drifting(p: &BehaviorPatterns, _themes: usize, _depth: u32) -> bool {
    p.drift_windows.len() > 2
}

/// Evaluated in order; the first matching rule wins.
const RULES: [Rule; 4] = [
    (consistent_without_meaning, NextEvolution::DeepenMeaning),
    (avoiding, NextEvolution::ConfrontAvoidance),
    (shallow, NextEvolution::DeepenReflection),
    (drifting, NextEvolution::BuildStructure),
];

/// What the coach should push on next, given patterns, theme count and depth.
pub fn next_evolution(
    patterns: &BehaviorPatterns,
    theme_count: usize,
    depth_score: u32,
) -> NextEvolution {
    RULES
        .iter()
        .find(|(applies, _)| applies(patterns, theme_count, depth_score))
        .map(|(_, next)| *next)
        .unwrap_or(NextEvolution::MaintainMomentum)
}
