//! Tokenization, match detection, and relevance scoring.

use chrono::{DateTime, Utc};
use strata_core::ChatMessage;

/// Minimum token length; shorter tokens are noise.
const MIN_TOKEN_LEN: usize = 3;

/// Maximum length difference for a fuzzy containment match.
const FUZZY_LEN_DELTA: usize = 2;

/// Lowercase alphanumeric tokens of a text, dropping tokens shorter than
/// three characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Fuzzy containment: one token contains the other and their lengths differ
/// by at most two characters.
pub fn fuzzy_match(a: &str, b: &str) -> bool {
    let delta = a.len().abs_diff(b.len());
    delta <= FUZZY_LEN_DELTA && (a.contains(b) || b.contains(a))
}

/// The terms of `query_tokens` that match `message_tokens` exactly or
/// fuzzily, plus the raw phrase when it is contained in the message.
///
/// An empty return means the message does not match at all.
pub fn matched_terms(
    query_raw: &str,
    query_tokens: &[String],
    message_raw: &str,
    message_tokens: &[String],
) -> Vec<String> {
    let mut matched = Vec::new();
    for token in query_tokens {
        let hit = message_tokens
            .iter()
            .any(|mt| mt == token || fuzzy_match(token, mt));
        if hit && !matched.contains(token) {
            matched.push(token.clone());
        }
    }

    let phrase = query_raw.trim().to_lowercase();
    if !phrase.is_empty()
        && message_raw.to_lowercase().contains(&phrase)
        && !matched.contains(&phrase)
    {
        matched.push(phrase);
    }
    matched
}

/// Relevance score for a retained message.
///
/// Base points: +10 per query token found as a literal substring of the
/// message text, +5 per occurrence of each matched term among the message's
/// own tokens. Multipliers compound: x1.2 under 100 chars, x1.5 under 50,
/// x1.1 for user-authored messages, x1.1 for messages younger than 7 days.
pub fn score_message(
    message: &ChatMessage,
    query_tokens: &[String],
    message_tokens: &[String],
    matched: &[String],
    now: DateTime<Utc>,
) -> f64 {
    let text_lower = message.text.to_lowercase();

    let mut score = 0.0;
    for token in query_tokens {
        if text_lower.contains(token.as_str()) {
            score += 10.0;
        }
    }
    for term in matched {
        let occurrences = message_tokens.iter().filter(|mt| *mt == term).count();
        score += 5.0 * occurrences as f64;
    }

    let length = message.text.chars().count();
    if length < 100 {
        score *= 1.2;
    }
    if length < 50 {
        score *= 1.5;
    }
    if !message.from_assistant {
        score *= 1.1;
    }
    if now.signed_duration_since(message.timestamp) < chrono::Duration::days(7) {
        score *= 1.1;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_drops_short_tokens() {
        let tokens = tokenize("My order IS broken, ok?");
        assert_eq!(tokens, vec!["order", "broken"]);
    }

    #[test]
    fn test_tokenize_splits_on_non_alphanumeric() {
        let tokens = tokenize("refund-request #4521!");
        assert_eq!(tokens, vec!["refund", "request", "4521"]);
    }

    #[test]
    fn test_fuzzy_match_containment_within_delta() {
        assert!(fuzzy_match("order", "orders"));
        assert!(fuzzy_match("orders", "order"));
        // Length delta of 3 is too far even though containment holds.
        assert!(!fuzzy_match("order", "reordered"));
        assert!(!fuzzy_match("order", "cache"));
    }

    #[test]
    fn test_matched_terms_exact_and_phrase() {
        let query_tokens = tokenize("order");
        let message = "My order is broken";
        let message_tokens = tokenize(message);
        let matched = matched_terms("order", &query_tokens, message, &message_tokens);
        assert!(matched.contains(&"order".to_string()));
    }

    #[test]
    fn test_matched_terms_empty_when_no_overlap() {
        let query_tokens = tokenize("billing");
        let message = "My order is broken";
        let matched = matched_terms("billing", &query_tokens, message, &tokenize(message));
        assert!(matched.is_empty());
    }

    #[test]
    fn test_phrase_match_retains_message_without_token_overlap() {
        // Query tokens are all dropped as noise, but the raw phrase appears.
        let query = "ok";
        let query_tokens = tokenize(query);
        assert!(query_tokens.is_empty());

        let message = "that is ok with me";
        let matched = matched_terms(query, &query_tokens, message, &tokenize(message));
        assert_eq!(matched, vec!["ok".to_string()]);
    }

    #[test]
    fn test_short_message_multipliers_compound() {
        let now = Utc::now();
        let old = now - chrono::Duration::days(30);
        let query_tokens = tokenize("refund");

        let short = ChatMessage::new("refund please now thanks a lot ok", "user", true).at(old);
        let long = ChatMessage::new(
            "refund please now thanks a lot ok ".repeat(12).trim().to_string(),
            "user",
            true,
        )
        .at(old);

        let short_tokens = tokenize(&short.text);
        let long_tokens = tokenize(&long.text);
        let matched = vec!["refund".to_string()];

        let short_score = score_message(&short, &query_tokens, &short_tokens, &matched, now);
        let long_score = score_message(&long, &query_tokens, &long_tokens, &matched, now);

        // Short message: base 15, x1.2 and x1.5. Long message: 10 + 5*12.
        assert!((short_score - 15.0 * 1.2 * 1.5).abs() < 1e-9);
        assert!(long_score > short_score);
    }

    #[test]
    fn test_user_and_recency_multipliers() {
        let now = Utc::now();
        let query_tokens = tokenize("refund");
        let matched = vec!["refund".to_string()];

        let text = "I would like a refund for my last order purchase because it arrived broken and unusable";
        let tokens = tokenize(text);

        let assistant_old =
            ChatMessage::new(text, "bot", true).at(now - chrono::Duration::days(30));
        let user_recent = ChatMessage::new(text, "user", false).at(now);

        let base = score_message(&assistant_old, &query_tokens, &tokens, &matched, now);
        let boosted = score_message(&user_recent, &query_tokens, &tokens, &matched, now);
        assert!((boosted - base * 1.1 * 1.1).abs() < 1e-9);
    }
}
