use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }

    pub fn is_user(self) -> bool {
        self == Sender::User
    }

    pub fn is_bot(self) -> bool {
        self == Sender::Bot
    }
}

impl TryFrom<&str> for Sender {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Sender::User),
            "bot" => Ok(Sender::Bot),
            _ => Err(format!("invalid sender: {value}")),
        }
    }
}

impl TryFrom<String> for Sender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Sender> for String {
    fn from(value: Sender) -> Self {
        value.as_str().to_string()
    }
}

/// One entry in the conversation.
///
/// Turns are immutable once created. The serialized form doubles as the
/// durable history record: `{ "text", "sender", "timestamp" }`, with the
/// timestamp written as an RFC 3339 instant at millisecond precision so a
/// persisted turn restores to an equal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    text: String,
    sender: Sender,
    #[serde(with = "millis_timestamp")]
    timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self::with_timestamp(sender, text, Utc::now())
    }

    pub fn with_timestamp(sender: Sender, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            sender,
            timestamp: at.trunc_subsecs(3),
        }
    }

    /// Builds a user turn from raw input, or `None` when the input is blank.
    pub fn user(input: &str) -> Option<Self> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self::new(Sender::User, text))
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Sender::Bot, text)
    }

    /// Error turns are ordinary bot turns; only the text marks them.
    pub fn bot_error(message: &str) -> Self {
        Self::new(Sender::Bot, format!("{ERROR_PREFIX}{}", message.trim()))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_user(&self) -> bool {
        self.sender.is_user()
    }

    pub fn is_bot(&self) -> bool {
        self.sender.is_bot()
    }

    pub fn is_error(&self) -> bool {
        self.is_bot() && self.text.starts_with(ERROR_PREFIX)
    }
}

pub const ERROR_PREFIX: &str = "Error: ";

mod millis_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn blank_user_input_is_rejected() {
        assert!(ChatTurn::user("").is_none());
        assert!(ChatTurn::user("   \n\t ").is_none());
    }

    #[test]
    fn user_input_is_trimmed() {
        let turn = ChatTurn::user("  What is X?  ").expect("turn");
        assert_eq!(turn.text(), "What is X?");
        assert!(turn.is_user());
    }

    #[test]
    fn error_turns_are_bot_turns_with_prefix() {
        let turn = ChatTurn::bot_error(" index unavailable ");
        assert!(turn.is_bot());
        assert!(turn.is_error());
        assert_eq!(turn.text(), "Error: index unavailable");
    }

    #[test]
    fn record_uses_sender_names_and_iso_timestamps() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let turn = ChatTurn::with_timestamp(Sender::Bot, "X is Y.", at);
        let json = serde_json::to_value(&turn).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "text": "X is Y.",
                "sender": "bot",
                "timestamp": "2024-05-01T12:30:00.000Z"
            })
        );
    }

    #[test]
    fn records_written_by_browsers_are_accepted() {
        let turn: ChatTurn = serde_json::from_str(
            r#"{"text":"hi","sender":"user","timestamp":"2024-05-01T12:30:00.123Z"}"#,
        )
        .expect("parse");
        assert!(turn.is_user());
        assert_eq!(turn.timestamp().timestamp_subsec_millis(), 123);
    }

    #[test]
    fn unknown_senders_are_rejected() {
        assert!(Sender::try_from("assistant").is_err());
        let parsed = serde_json::from_str::<ChatTurn>(
            r#"{"text":"hi","sender":"system","timestamp":"2024-05-01T12:30:00Z"}"#,
        );
        assert!(parsed.is_err());
    }
}
