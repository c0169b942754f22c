//! Topic lifecycle states and the events emitted when they change

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::TopicId;

/// Lifecycle state derived from a topic's score history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicState {
    /// Fewer than two observations
    New,

    /// Score above the floor and rising faster than the threshold
    Emerging,

    /// Tracked, neither rising nor falling quickly
    Established,

    /// Score falling faster than the decline threshold
    Declining,

    /// Not observed within the inactivity window
    Stale,
}

impl TopicState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Emerging => "EMERGING",
            Self::Established => "ESTABLISHED",
            Self::Declining => "DECLINING",
            Self::Stale => "STALE",
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::New,
            Self::Emerging,
            Self::Established,
            Self::Declining,
            Self::Stale,
        ]
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::New => "🆕",
            Self::Emerging => "🚀",
            Self::Established => "📊",
            Self::Declining => "📉",
            Self::Stale => "💤",
        }
    }
}

impl fmt::Display for TopicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted by the tracker when a topic changes state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEvent {
    pub topic_id: TopicId,
    pub old_state: TopicState,
    pub new_state: TopicState,

    /// Latest score of the topic
    pub score: f64,

    /// Score points per minute
    pub velocity: f64,

    pub at: DateTime<Utc>,
}

impl ClassificationEvent {
    /// Whether this is a transition into EMERGING
    pub fn is_emergence(&self) -> bool {
        self.new_state == TopicState::Emerging && self.old_state != TopicState::Emerging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&TopicState::Emerging).unwrap();
        assert_eq!(json, "\"EMERGING\"");
        assert_eq!(TopicState::Stale.to_string(), "STALE");
    }
}
