//! Search execution, ranking, and highlighting.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strata_core::{ChatMessage, ChatSession, SortDirection};
use tracing::debug;
use uuid::Uuid;

use crate::filters::{SearchFilters, SearchSortKey};
use crate::score::{matched_terms, score_message, tokenize};

/// Messages kept on each side of a matched message.
const CONTEXT_RADIUS: usize = 2;

/// One ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub session_id: Uuid,
    pub session_title: String,
    pub message: ChatMessage,
    pub score: f64,
    /// Query terms (and the raw phrase, when contained) that matched.
    pub matched_terms: Vec<String>,
    /// Up to two messages preceding the match, clipped at session start.
    pub context_before: Vec<ChatMessage>,
    /// Up to two messages following the match, clipped at session end.
    pub context_after: Vec<ChatMessage>,
}

/// Aggregate counters for one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub sessions_searched: usize,
    pub messages_scanned: usize,
    pub messages_matched: usize,
    pub elapsed: Duration,
}

/// Ranked results plus stats for one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub stats: SearchStats,
}

/// Rank `sessions` against `filters`.
///
/// Pure: results are recomputed per call and never persisted. A blank
/// query yields an empty outcome.
pub fn search(sessions: &[ChatSession], filters: &SearchFilters) -> SearchOutcome {
    let started = Instant::now();
    let now = Utc::now();
    let query_raw = filters.query.trim();
    let query_tokens = tokenize(query_raw);

    let mut results = Vec::new();
    let mut scanned = 0usize;

    if !query_raw.is_empty() {
        for session in sessions {
            for (index, message) in session.messages.iter().enumerate() {
                scanned += 1;
                if !filters.admits(message) {
                    continue;
                }

                let message_tokens = tokenize(&message.text);
                let matched =
                    matched_terms(query_raw, &query_tokens, &message.text, &message_tokens);
                if matched.is_empty() {
                    continue;
                }

                let score =
                    score_message(message, &query_tokens, &message_tokens, &matched, now);
                let before_start = index.saturating_sub(CONTEXT_RADIUS);
                let after_end = (index + 1 + CONTEXT_RADIUS).min(session.messages.len());

                results.push(SearchResult {
                    session_id: session.id,
                    session_title: session.title.clone(),
                    message: message.clone(),
                    score,
                    matched_terms: matched,
                    context_before: session.messages[before_start..index].to_vec(),
                    context_after: session.messages[index + 1..after_end].to_vec(),
                });
            }
        }
    }

    sort_results(&mut results, filters.sort_key, filters.sort_direction);
    let matched = results.len();
    if let Some(limit) = filters.limit {
        results.truncate(limit);
    }

    let elapsed = started.elapsed();
    debug!(
        query = query_raw,
        scanned,
        matched,
        ?elapsed,
        "search completed"
    );

    SearchOutcome {
        results,
        stats: SearchStats {
            sessions_searched: sessions.len(),
            messages_scanned: scanned,
            messages_matched: matched,
            elapsed,
        },
    }
}

/// Sort by the chosen key, ties broken by session id then message id so the
/// order is deterministic.
fn sort_results(results: &mut [SearchResult], key: SearchSortKey, direction: SortDirection) {
    results.sort_by(|a, b| {
        let primary = match key {
            SearchSortKey::Relevance => a.score.total_cmp(&b.score),
            SearchSortKey::Date => a.message.timestamp.cmp(&b.message.timestamp),
            SearchSortKey::Length => a
                .message
                .text
                .chars()
                .count()
                .cmp(&b.message.text.chars().count()),
        };
        let primary = match direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary
            .then_with(|| a.session_id.cmp(&b.session_id))
            .then_with(|| a.message.id.cmp(&b.message.id))
    });
}

/// Search engine retaining the last computed outcome.
///
/// The retained outcome exists for UI convenience only; it is never
/// authoritative and a fresh [`search`] call always recomputes.
#[derive(Default)]
pub struct SearchEngine {
    last: RwLock<Option<SearchOutcome>>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a search and retain its outcome.
    pub fn search(&self, sessions: &[ChatSession], filters: &SearchFilters) -> SearchOutcome {
        let outcome = search(sessions, filters);
        if let Ok(mut last) = self.last.write() {
            *last = Some(outcome.clone());
        }
        outcome
    }

    /// The most recently computed outcome, if any.
    pub fn last_outcome(&self) -> Option<SearchOutcome> {
        self.last.read().ok().and_then(|last| last.clone())
    }

    /// Drop the retained outcome.
    pub fn reset(&self) {
        if let Ok(mut last) = self.last.write() {
            *last = None;
        }
    }
}

/// Wrap every case-insensitive occurrence of the query phrase and its
/// tokens in `<mark>`/`</mark>` for downstream rendering. Overlapping
/// matches are merged into one marked span.
pub fn highlight(text: &str, query: &str) -> String {
    let mut needles: Vec<String> = Vec::new();
    let phrase = query.trim().to_lowercase();
    if !phrase.is_empty() {
        needles.push(phrase);
    }
    for token in tokenize(query) {
        if !needles.contains(&token) {
            needles.push(token);
        }
    }
    if needles.is_empty() {
        return text.to_string();
    }

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for needle in &needles {
        for (start, len) in find_all_ci(text, needle) {
            ranges.push((start, start + len));
        }
    }
    if ranges.is_empty() {
        return text.to_string();
    }
    ranges.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in ranges {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => *last_end = (*last_end).max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut output = String::with_capacity(text.len() + merged.len() * 13);
    let mut cursor = 0;
    for (start, end) in merged {
        output.push_str(&text[cursor..start]);
        output.push_str("<mark>");
        output.push_str(&text[start..end]);
        output.push_str("</mark>");
        cursor = end;
    }
    output.push_str(&text[cursor..]);
    output
}

/// Byte offsets and lengths of case-insensitive occurrences of `needle`.
///
/// Comparison is per-character so the offsets are valid for the original
/// string even when lowercasing would change its byte length.
fn find_all_ci(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    for (start, _) in haystack.char_indices() {
        if let Some(len) = prefix_len_ci(&haystack[start..], needle) {
            found.push((start, len));
        }
    }
    found
}

/// Byte length of a case-insensitive match of `needle` at the start of
/// `haystack`, if present.
fn prefix_len_ci(haystack: &str, needle: &str) -> Option<usize> {
    let mut hay = haystack.char_indices();
    let mut matched = 0;
    for nc in needle.chars() {
        let (offset, hc) = hay.next()?;
        if !hc.to_lowercase().eq(nc.to_lowercase()) {
            return None;
        }
        matched = offset + hc.len_utf8();
    }
    Some(matched)
}
