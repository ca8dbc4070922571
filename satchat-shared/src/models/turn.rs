use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The author of a turn in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Sender {
    /// Turn typed by the user.
    User,
    /// Turn produced by the assistant.
    #[serde(rename = "AI")]
    Ai,
}

impl Sender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Ai => "AI",
        }
    }
}

impl TryFrom<&str> for Sender {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "User" => Ok(Self::User),
            "AI" => Ok(Self::Ai),
            _ => Err("invalid sender"),
        }
    }
}

impl Display for Sender {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// One message in a transcript.
///
/// `graph` and `table` are opaque display hints attached by the backend
/// (a ticker symbol to chart, tabular data to render); the sync core carries
/// them through without interpreting them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// Who authored the turn.
    pub sender: Sender,

    /// The message text. May carry rich-text markup rendered elsewhere.
    pub message: String,

    /// Optional ticker symbol for an attached chart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,

    /// Optional tabular data attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<serde_json::Value>,
}

impl Turn {
    /// Creates a plain user turn with no attachments.
    #[must_use]
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            message: message.into(),
            graph: None,
            table: None,
        }
    }

    /// Creates a plain assistant turn with no attachments.
    #[must_use]
    pub fn ai(message: impl Into<String>) -> Self {
        Self {
            sender: Sender::Ai,
            message: message.into(),
            graph: None,
            table: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sender_wire_names() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), "\"User\"");
        assert_eq!(serde_json::to_string(&Sender::Ai).unwrap(), "\"AI\"");
    }

    #[test]
    fn test_sender_round_trip() {
        for sender in [Sender::User, Sender::Ai] {
            let parsed = Sender::try_from(sender.as_str()).unwrap();
            assert_eq!(parsed, sender);
        }
        assert!(Sender::try_from("Robot").is_err());
    }

    #[test]
    fn test_turn_constructors() {
        let turn = Turn::user("hello");
        assert_eq!(turn.sender, Sender::User);
        assert_eq!(turn.message, "hello");
        assert!(turn.graph.is_none());
        assert!(turn.table.is_none());

        let turn = Turn::ai("hi there");
        assert_eq!(turn.sender, Sender::Ai);
    }

    #[test]
    fn test_turn_serialization_omits_empty_attachments() {
        let json = serde_json::to_string(&Turn::user("hey")).unwrap();
        assert!(!json.contains("graph"));
        assert!(!json.contains("table"));
    }

    #[test]
    fn test_turn_deserializes_backend_payload() {
        let json = json!({
            "sender": "AI",
            "message": "<p>BTC is up</p>",
            "graph": "BTCUSD",
            "table": {"rows": [["price", "67k"]]},
            "_id": "abc123"
        });
        let turn: Turn = serde_json::from_value(json).unwrap();
        assert_eq!(turn.sender, Sender::Ai);
        assert_eq!(turn.graph.as_deref(), Some("BTCUSD"));
        assert!(turn.table.is_some());
    }

    #[test]
    fn test_turn_round_trip() {
        let turn = Turn {
            sender: Sender::Ai,
            message: "look at this".into(),
            graph: Some("ETHUSD".into()),
            table: Some(json!([1, 2, 3])),
        };
        let json = serde_json::to_string(&turn).unwrap();
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
