//! Derived session statistics.

use serde::{Deserialize, Serialize};
use strata_core::ChatSession;

/// Aggregates computed over one session at export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    /// Mean message length in characters.
    pub average_message_length: f64,
    /// Mean seconds between a user message and the next assistant reply.
    /// `None` when the session has no such pair.
    pub average_response_seconds: Option<f64>,
}

/// Compute statistics for a session.
///
/// Messages are sorted chronologically first; stored order is not trusted
/// when pairing user messages with assistant replies.
pub fn compute_statistics(session: &ChatSession) -> SessionStatistics {
    let messages = session.sorted_messages();

    let total_messages = messages.len();
    let assistant_messages = messages.iter().filter(|m| m.from_assistant).count();
    let user_messages = total_messages - assistant_messages;

    let average_message_length = if total_messages == 0 {
        0.0
    } else {
        let total_chars: usize = messages.iter().map(|m| m.text.chars().count()).sum();
        total_chars as f64 / total_messages as f64
    };

    // Pair each user message with the first assistant reply after it.
    let mut response_seconds = Vec::new();
    let mut awaiting_reply = None;
    for message in &messages {
        if message.from_assistant {
            if let Some(asked_at) = awaiting_reply.take() {
                let delta = message.timestamp.signed_duration_since(asked_at);
                response_seconds.push(delta.num_milliseconds() as f64 / 1000.0);
            }
        } else {
            awaiting_reply = Some(message.timestamp);
        }
    }
    let average_response_seconds = if response_seconds.is_empty() {
        None
    } else {
        Some(response_seconds.iter().sum::<f64>() / response_seconds.len() as f64)
    };

    SessionStatistics {
        total_messages,
        user_messages,
        assistant_messages,
        average_message_length,
        average_response_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use strata_core::ChatMessage;

    #[test]
    fn test_counts_and_average_length() {
        let mut session = ChatSession::new("Support");
        session.push(ChatMessage::new("1234", "user", false));
        session.push(ChatMessage::new("12345678", "assistant", true));

        let stats = compute_statistics(&session);
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.user_messages, 1);
        assert_eq!(stats.assistant_messages, 1);
        assert!((stats.average_message_length - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_response_time_pairs_user_then_assistant() {
        let now = Utc::now();
        let mut session = ChatSession::new("Support");
        session.push(ChatMessage::new("help", "user", false).at(now));
        session.push(
            ChatMessage::new("on it", "assistant", true).at(now + chrono::Duration::seconds(4)),
        );
        session.push(
            ChatMessage::new("thanks", "user", false).at(now + chrono::Duration::seconds(10)),
        );
        session.push(
            ChatMessage::new("anytime", "assistant", true)
                .at(now + chrono::Duration::seconds(12)),
        );

        let stats = compute_statistics(&session);
        assert_eq!(stats.average_response_seconds, Some(3.0));
    }

    #[test]
    fn test_response_time_sorts_defensively() {
        // Stored out of order: the reply appears before the question.
        let now = Utc::now();
        let mut session = ChatSession::new("Shuffled");
        session.push(
            ChatMessage::new("reply", "assistant", true).at(now + chrono::Duration::seconds(5)),
        );
        session.push(ChatMessage::new("question", "user", false).at(now));

        let stats = compute_statistics(&session);
        assert_eq!(stats.average_response_seconds, Some(5.0));
    }

    #[test]
    fn test_no_reply_means_no_response_time() {
        let mut session = ChatSession::new("Monologue");
        session.push(ChatMessage::new("anyone?", "user", false));

        let stats = compute_statistics(&session);
        assert_eq!(stats.average_response_seconds, None);
    }

    #[test]
    fn test_empty_session() {
        let stats = compute_statistics(&ChatSession::new("Empty"));
        assert_eq!(stats.total_messages, 0);
        assert_eq!(stats.average_message_length, 0.0);
        assert_eq!(stats.average_response_seconds, None);
    }
}
