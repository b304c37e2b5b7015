//! Phase-indexed voice intensity.

use crate::phase::AiPhase;
use crate::types::{ArchitectVoice, ObserverVoice, OracleVoice, VoiceIntensity};

/// Themes at which the observer voice is fully direct.
pub const OBSERVER_FULL_THEMES: f64 = 10.0;
/// Days in phase at which the oracle voice is fully still.
pub const ORACLE_FULL_DAYS: f64 = 60.0;

fn unit(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

pub fn observer_voice(theme_count: usize) -> ObserverVoice {
    let p = unit(theme_count as f64 / OBSERVER_FULL_THEMES);
    ObserverVoice {
        curiosity: unit(1.0 - 0.3 * p),
        gentleness: 0.9,
        directness: unit(0.4 * p),
    }
}

pub fn architect_voice(consistency_score: u32) -> ArchitectVoice {
    let i = unit(f64::from(consistency_score) / 100.0);
    ArchitectVoice {
        precision: unit(0.8 + 0.2 * i),
        authority: unit(0.6 + 0.3 * i),
        empathy: unit(0.5 - 0.2 * i),
    }
}

pub fn oracle_voice(days_in_phase: i64) -> OracleVoice {
    let m = unit(days_in_phase as f64 / ORACLE_FULL_DAYS);
    OracleVoice {
        stillness: unit(0.5 + 0.5 * m),
        wisdom: unit(0.7 + 0.3 * m),
        mystery: unit(0.6 * m),
    }
}

/// Voice parameters for `phase`, every value in `[0, 1]`.
pub fn voice_intensity(
    phase: AiPhase,
    theme_count: usize,
    consistency_score: u32,
    days_in_phase: i64,
) -> VoiceIntensity {
    match phase {
        AiPhase::Observer => VoiceIntensity::Observer(observer_voice(theme_count)),
        AiPhase::Architect => VoiceIntensity::Architect(architect_voice(consistency_score)),
        AiPhase::Oracle => VoiceIntensity::Oracle(oracle_voice(days_in_phase)),
    }
}
