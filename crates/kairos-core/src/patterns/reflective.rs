//! Free-text detectors: return protocols and emotional arc.
//!
//! Both look only at the most recent reflective events (chat messages,
//! reflection answers, debriefs). Callers pass events newest-first.

use crate::lexicon;
use crate::text::truncate_chars;
use crate::types::{EmotionalArc, Event, EventPayload, Protocol};

/// Reflective events inspected by either detector.
pub const RECENT_REFLECTIVE_LIMIT: usize = 10;
pub const PROTOCOL_TEXT_CHARS: usize = 100;
pub const PROTOCOL_LIMIT: usize = 5;
/// Below this many messages the arc is always flat.
pub const ARC_MIN_MESSAGES: usize = 5;

fn recent_reflective<'a, 'b>(events: &'b [&'a Event]) -> impl Iterator<Item = &'a Event> + 'b {
    events
        .iter()
        .copied()
        .filter(|e| e.kind.is_reflective())
        .take(RECENT_REFLECTIVE_LIMIT)
}

/// Messages where the user describes getting back on track.
pub fn return_protocols(events: &[&Event]) -> Vec<Protocol> {
    recent_reflective(events)
        .filter_map(|event| {
            let EventPayload::Text { text } = event.payload() else {
                return None;
            };
            lexicon::contains_return_phrase(text).then(|| Protocol {
                text: truncate_chars(text, PROTOCOL_TEXT_CHARS),
                worked_count: 1,
                last_used: event.timestamp,
            })
        })
        .take(PROTOCOL_LIMIT)
        .collect()
}

/// Sentiment direction across the recent reflective messages.
pub fn emotional_arc(events: &[&Event]) -> EmotionalArc {
    let recent: Vec<&Event> = recent_reflective(events).collect();
    if recent.len() < ARC_MIN_MESSAGES {
        return EmotionalArc::Flat;
    }

    let (positive, negative) = recent
        .iter()
        .copied()
        .filter_map(|e| match e.payload() {
            EventPayload::Text { text } => Some(text),
            _ => None,
        })
        .fold((0usize, 0usize), |(pos, neg), text| {
            (
                pos + lexicon::positive_hits(text),
                neg + lexicon::negative_hits(text),
            )
        });

    // pos > 1.5 * neg, kept in integers
    if positive * 2 > negative * 3 {
        EmotionalArc::Ascending
    } else if negative * 2 > positive * 3 {
        EmotionalArc::Descending
    } else {
        EmotionalArc::Flat
    }
}
