//! Habit-tracking detectors: drift windows, consistency, avoidance.

use chrono::{Duration, Timelike};
use std::collections::BTreeMap;

use crate::types::{Event, EventKind, EventPayload, TimeWindow};

/// Ticks an hour needs before its completion rate is trusted.
pub const DRIFT_MIN_TICKS: usize = 3;
/// Hours at or above this completion rate are not drift.
pub const DRIFT_MAX_RATE: f64 = 0.5;
pub const DRIFT_WINDOW_LIMIT: usize = 3;
/// Misses of one habit before it counts as avoided.
pub const AVOIDANCE_MIN_MISSES: usize = 5;

#[derive(Debug, Default, Clone, Copy)]
struct HourTally {
    total: usize,
    completed: usize,
}

/// Hours of the day where habit ticks are mostly missed.
///
/// Ordered by tick count descending, ties by hour ascending, at most
/// [`DRIFT_WINDOW_LIMIT`] entries.
pub fn drift_windows(events: &[&Event], tz_offset_minutes: i32) -> Vec<TimeWindow> {
    let offset = Duration::minutes(i64::from(tz_offset_minutes));
    let mut hours: BTreeMap<u32, HourTally> = BTreeMap::new();

    for event in events.iter().filter(|e| e.kind == EventKind::HabitTick) {
        let EventPayload::Habit { completed, .. } = event.payload() else {
            continue;
        };
        let tally = hours.entry((event.timestamp + offset).hour()).or_default();
        tally.total += 1;
        tally.completed += usize::from(completed);
    }

    let mut windows: Vec<(u32, TimeWindow)> = hours
        .into_iter()
        .filter(|(_, t)| t.total >= DRIFT_MIN_TICKS)
        .filter_map(|(hour, t)| {
            let rate = t.completed as f64 / t.total as f64;
            (rate < DRIFT_MAX_RATE).then(|| {
                (
                    hour,
                    TimeWindow {
                        time: format!("{}:00", hour),
                        description: format!(
                            "Low completion rate ({}%)",
                            (rate * 100.0).round() as u32
                        ),
                        frequency: t.total,
                    },
                )
            })
        })
        .collect();

    windows.sort_by(|(ha, a), (hb, b)| b.frequency.cmp(&a.frequency).then(ha.cmp(hb)));
    windows
        .into_iter()
        .take(DRIFT_WINDOW_LIMIT)
        .map(|(_, w)| w)
        .collect()
}

/// Percentage of habit ticks marked completed, 0 when there are none.
pub fn consistency_score(events: &[&Event]) -> u32 {
    let (total, completed) = events
        .iter()
        .filter(|e| e.kind == EventKind::HabitTick)
        .fold((0usize, 0usize), |(total, done), e| {
            let completed = matches!(e.payload(), EventPayload::Habit { completed: true, .. });
            (total + 1, done + usize::from(completed))
        });

    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u32
}

/// Habit ids missed at least [`AVOIDANCE_MIN_MISSES`] times.
///
/// Ordered by miss count descending, then habit id ascending.
pub fn avoidance_triggers(events: &[&Event]) -> Vec<String> {
    let mut misses: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events
        .iter()
        .copied()
        .filter(|e| e.kind == EventKind::HabitAction)
    {
        if let EventPayload::Habit {
            habit_id: Some(habit_id),
            completed: false,
        } = event.payload()
        {
            *misses.entry(habit_id).or_default() += 1;
        }
    }

    let mut avoided: Vec<(&str, usize)> = misses
        .into_iter()
        .filter(|(_, count)| *count >= AVOIDANCE_MIN_MISSES)
        .collect();
    // BTreeMap iteration already sorted ids; a stable sort keeps that for ties.
    avoided.sort_by(|a, b| b.1.cmp(&a.1));
    avoided.into_iter().map(|(id, _)| id.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn tick(hour: u32, minute: u32, completed: bool) -> Event {
        Event::new(
            "u1",
            EventKind::HabitTick,
            json!({ "completed": completed }),
            Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap(),
        )
    }

    fn miss(habit_id: &str) -> Event {
        Event::new(
            "u1",
            EventKind::HabitAction,
            json!({ "habitId": habit_id, "completed": false }),
            Utc::now(),
        )
    }

    fn refs(events: &[Event]) -> Vec<&Event> {
        events.iter().collect()
    }

    #[test]
    fn test_sparse_hour_never_drifts() {
        let events = vec![tick(9, 0, false), tick(9, 30, false)];
        assert!(drift_windows(&refs(&events), 0).is_empty());
    }

    #[test]
    fn test_low_rate_hour_drifts() {
        let events = vec![
            tick(9, 0, true),
            tick(9, 10, false),
            tick(9, 20, false),
            tick(9, 30, false),
        ];
        let windows = drift_windows(&refs(&events), 0);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].time, "9:00");
        assert_eq!(windows[0].description, "Low completion rate (25%)");
        assert_eq!(windows[0].frequency, 4);
    }

    #[test]
    fn test_half_rate_is_not_drift() {
        let events = vec![
            tick(7, 0, true),
            tick(7, 1, true),
            tick(7, 2, false),
            tick(7, 3, false),
        ];
        assert!(drift_windows(&refs(&events), 0).is_empty());
    }

    #[test]
    fn test_drift_top_three_by_frequency_then_hour() {
        let mut events = Vec::new();
        for (hour, count) in [(6, 3), (8, 5), (14, 3), (22, 4)] {
            for m in 0..count {
                events.push(tick(hour, m, false));
            }
        }
        let times: Vec<String> = drift_windows(&refs(&events), 0)
            .into_iter()
            .map(|w| w.time)
            .collect();
        assert_eq!(times, vec!["8:00", "22:00", "6:00"]);
    }

    #[test]
    fn test_timezone_offset_shifts_hour() {
        let events = vec![tick(23, 0, false), tick(23, 1, false), tick(23, 2, false)];
        let windows = drift_windows(&refs(&events), 120);
        assert_eq!(windows[0].time, "1:00");
    }

    #[test]
    fn test_consistency_score() {
        assert_eq!(consistency_score(&[]), 0);

        let mut events: Vec<Event> = (0..6).map(|m| tick(7, m, true)).collect();
        events.extend((6..10).map(|m| tick(7, m, false)));
        assert_eq!(consistency_score(&refs(&events)), 60);

        let events = vec![tick(7, 0, true), tick(7, 1, true), tick(7, 2, false)];
        assert_eq!(consistency_score(&refs(&events)), 67);
    }

    #[test]
    fn test_consistency_ignores_habit_actions() {
        let events = vec![miss("H1"), tick(7, 0, true)];
        assert_eq!(consistency_score(&refs(&events)), 100);
    }

    #[test]
    fn test_avoidance_triggers() {
        let mut events: Vec<Event> = (0..6).map(|_| miss("H1")).collect();
        events.extend((0..4).map(|_| miss("H2")));
        assert_eq!(avoidance_triggers(&refs(&events)), vec!["H1".to_string()]);
    }

    #[test]
    fn test_avoidance_ordering() {
        let mut events: Vec<Event> = (0..5).map(|_| miss("b")).collect();
        events.extend((0..5).map(|_| miss("a")));
        events.extend((0..7).map(|_| miss("c")));
        assert_eq!(avoidance_triggers(&refs(&events)), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_completed_actions_and_missing_ids_are_not_misses() {
        let mut events: Vec<Event> = (0..5)
            .map(|_| {
                Event::new(
                    "u1",
                    EventKind::HabitAction,
                    json!({ "habitId": "H1", "completed": true }),
                    Utc::now(),
                )
            })
            .collect();
        events.extend(
            (0..5).map(|_| Event::new("u1", EventKind::HabitAction, json!({}), Utc::now())),
        );
        assert!(avoidance_triggers(&refs(&events)).is_empty());
    }

    #[test]
    fn test_snake_case_id_and_non_boolean_completed() {
        let events: Vec<Event> = (0..5)
            .map(|_| {
                Event::new(
                    "u1",
                    EventKind::HabitAction,
                    json!({ "habit_id": "H9", "completed": "true" }),
                    Utc::now(),
                )
            })
            .collect();
        assert_eq!(avoidance_triggers(&refs(&events)), vec!["H9"]);

        let ticks: Vec<Event> = (0..3)
            .map(|m| {
                Event::new(
                    "u1",
                    EventKind::HabitTick,
                    json!({ "completed": 1 }),
                    Utc.with_ymd_and_hms(2026, 3, 2, 9, m, 0).unwrap(),
                )
            })
            .collect();
        assert_eq!(consistency_score(&refs(&ticks)), 0);
        assert_eq!(drift_windows(&refs(&ticks), 0)[0].time, "9:00");
    }
}
