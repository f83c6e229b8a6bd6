//! Session transcript log

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One learner utterance and the tutor's answer
///
/// `audio` is `None` only when the reply was generated but synthesis
/// failed; such turns are kept so the text stays visible in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub input_text: String,
    pub reply_text: String,
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Whether synthesized audio exists for this turn
    #[must_use]
    pub const fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// Append-only, chronologically ordered record of turns for one client
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    turns: Vec<Turn>,
}

impl Session {
    /// Create an empty session
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
        }
    }

    /// Create an empty session with a random identifier
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `n` turns, oldest first
    #[must_use]
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(input: &str) -> Turn {
        Turn {
            input_text: input.to_string(),
            reply_text: format!("reply to {input}"),
            audio: Some(vec![1, 2, 3]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn keeps_insertion_order() {
        let mut session = Session::new("s1");
        for input in ["one", "two", "three"] {
            session.push(turn(input));
        }
        let inputs: Vec<_> = session.turns().iter().map(|t| t.input_text.as_str()).collect();
        assert_eq!(inputs, ["one", "two", "three"]);
    }

    #[test]
    fn recent_returns_tail() {
        let mut session = Session::new("s1");
        for i in 0..7 {
            session.push(turn(&i.to_string()));
        }
        let recent = session.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].input_text, "2");
        assert_eq!(recent[4].input_text, "6");
        assert_eq!(session.recent(50).len(), 7);
    }

    #[test]
    fn serialized_turn_omits_audio_bytes() {
        let json = serde_json::to_value(turn("hi")).unwrap();
        assert!(json.get("audio").is_none());
        assert_eq!(json["input_text"], "hi");
    }
}
