//! Behavioral events read from the append-only event log.
//!
//! Events are written by other services (habit tracker, chat, scheduler) and
//! are never mutated here. The raw `payload` stays untyped JSON on the record;
//! [`Event::payload`] decodes it into an [`EventPayload`] with explicit
//! defaults so extraction code never has to probe JSON by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event type, an open set of snake_case strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    HabitTick,
    HabitAction,
    ChatMessage,
    ReflectionAnswer,
    Debrief,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::HabitTick => "habit_tick",
            EventKind::HabitAction => "habit_action",
            EventKind::ChatMessage => "chat_message",
            EventKind::ReflectionAnswer => "reflection_answer",
            EventKind::Debrief => "debrief",
            EventKind::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "habit_tick" => EventKind::HabitTick,
            "habit_action" => EventKind::HabitAction,
            "chat_message" => EventKind::ChatMessage,
            "reflection_answer" => EventKind::ReflectionAnswer,
            "debrief" => EventKind::Debrief,
            other => EventKind::Other(other.to_string()),
        }
    }

    /// Free-text kinds: chat messages, reflection answers and debriefs.
    pub fn is_reflective(&self) -> bool {
        matches!(
            self,
            EventKind::ChatMessage | EventKind::ReflectionAnswer | EventKind::Debrief
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EventKind::parse(&s))
    }
}

/// A single immutable record from the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Decoded view of an event payload, borrowing from the event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventPayload<'a> {
    /// `habit_tick` / `habit_action`.
    Habit {
        habit_id: Option<&'a str>,
        completed: bool,
    },
    /// `chat_message` / `reflection_answer` / `debrief`. Empty when no text
    /// field is present.
    Text { text: &'a str },
    /// Any other kind.
    Unknown,
}

const TEXT_FIELDS: [&str; 4] = ["text", "content", "message", "answer"];
const HABIT_ID_FIELDS: [&str; 2] = ["habitId", "habit_id"];

impl Event {
    /// Create a new event with a generated id.
    pub fn new(
        user_id: impl Into<String>,
        kind: EventKind,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind,
            payload,
            timestamp,
        }
    }

    /// Decode the payload according to the event kind. Never fails.
    ///
    /// `completed` is false unless it is literally `true`.
    pub fn payload(&self) -> EventPayload<'_> {
        match self.kind {
            EventKind::HabitTick | EventKind::HabitAction => EventPayload::Habit {
                habit_id: self.first_str(&HABIT_ID_FIELDS),
                completed: self
                    .payload
                    .get("completed")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            },
            EventKind::ChatMessage | EventKind::ReflectionAnswer | EventKind::Debrief => {
                EventPayload::Text {
                    text: self.first_str(&TEXT_FIELDS).unwrap_or_default(),
                }
            }
            EventKind::Other(_) => EventPayload::Unknown,
        }
    }

    fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|k| self.payload.get(*k).and_then(|v| v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_strings() {
        assert_eq!(EventKind::parse("habit_tick"), EventKind::HabitTick);
        assert_eq!(EventKind::Debrief.as_str(), "debrief");
        assert_eq!(
            EventKind::parse("push_opened"),
            EventKind::Other("push_opened".to_string())
        );
    }

    #[test]
    fn test_habit_payload_defaults() {
        let e = Event::new("u1", EventKind::HabitTick, json!({"completed": "yes"}), Utc::now());
        assert_eq!(
            e.payload(),
            EventPayload::Habit {
                habit_id: None,
                completed: false
            }
        );

        let e = Event::new(
            "u1",
            EventKind::HabitAction,
            json!({"habit_id": "H1", "completed": true}),
            Utc::now(),
        );
        assert_eq!(
            e.payload(),
            EventPayload::Habit {
                habit_id: Some("H1"),
                completed: true
            }
        );
    }

    #[test]
    fn test_text_payload_field_fallbacks() {
        let e = Event::new("u1", EventKind::Debrief, json!({"answer": "ok"}), Utc::now());
        assert_eq!(e.payload(), EventPayload::Text { text: "ok" });

        let e = Event::new(
            "u1",
            EventKind::ChatMessage,
            json!({"message": "second", "text": "first"}),
            Utc::now(),
        );
        assert_eq!(e.payload(), EventPayload::Text { text: "first" });

        let e = Event::new("u1", EventKind::ChatMessage, json!(null), Utc::now());
        assert_eq!(e.payload(), EventPayload::Text { text: "" });

        let e = Event::new("u1", EventKind::parse("push_opened"), json!({"text": "x"}), Utc::now());
        assert_eq!(e.payload(), EventPayload::Unknown);
    }

    #[test]
    fn test_event_json_shape() {
        let raw = json!({
            "id": "e1",
            "userId": "u1",
            "type": "reflection_answer",
            "payload": {"text": "hello"},
            "timestamp": "2026-01-01T09:00:00Z"
        });
        let e: Event = serde_json::from_value(raw).unwrap();
        assert_eq!(e.kind, EventKind::ReflectionAnswer);
        assert_eq!(e.user_id, "u1");
        let back = serde_json::to_value(&e).unwrap();
        assert_eq!(back["type"], "reflection_answer");
    }
}
