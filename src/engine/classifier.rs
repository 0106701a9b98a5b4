//! Query routing classification
//!
//! Classifies an incoming query into a `RoutingClass` that determines which
//! stores the router consults. Keyword/pattern heuristics only: fast,
//! deterministic, no I/O. Examples:
//!   "What's my dog's name?"          → Factual   → relational only
//!   "When did I visit Lisbon?"       → Temporal  → vector + graph
//!   "How is Priya related to Arjun?" → Relational→ vector + graph
//!   "What do you know about me?"     → Complex   → all three stores

use lazy_static::lazy_static;
use regex::Regex;

use crate::engine::types::RoutingClass;

lazy_static! {
    /// Relative time references: "3 days ago", "two weeks ago", "a year ago"
    static ref RELATIVE_TIME_RE: Regex = Regex::new(
        r"\b(\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten)\s+(day|week|month|year)s?\s+ago\b"
    )
    .unwrap();
}

/// Classify a query into its routing class.
pub fn classify(query: &str) -> RoutingClass {
    let q = query.to_lowercase();
    let word_count = q.split_whitespace().count();

    let mut factual = 0.0_f32;
    let mut relational = 0.0_f32;
    let mut temporal = 0.0_f32;
    let mut complex = 0.0_f32;

    // ── Factual signals ──────────────────────────────────────────────────
    // Direct attribute lookups: "what is my X", "what's X's name"
    if starts_with_any(&q, &["what is ", "what's ", "who is ", "who's ", "where is ", "where's "]) {
        factual += 0.6;
    }
    if contains_any(&q, &["my ", "name of", "how many", "how much", "how old", "phone number", "birthday", "address", "email"]) {
        factual += 0.3;
    }
    if contains_any(&q, &["'s name", "s name", "favorite", "favourite", "prefer"]) {
        factual += 0.3;
    }

    // ── Temporal signals ─────────────────────────────────────────────────
    if starts_with_any(&q, &["when did ", "when was ", "when is ", "what happened"]) {
        temporal += 0.7;
    }
    if contains_any(&q, &[
        "yesterday", "last week", "last month", "last year", "last time",
        "this morning", "earlier", "ago", "recently", "before", "after",
        "first time", "how long",
    ]) {
        temporal += 0.5;
    }
    if RELATIVE_TIME_RE.is_match(&q) {
        temporal += 0.4;
    }

    // ── Relational signals ───────────────────────────────────────────────
    if contains_any(&q, &[
        "related to", "relationship", "connected", "in common", "know each other",
        "friends with", "married to", "works with", "works for", "between",
    ]) {
        relational += 0.7;
    }
    if contains_any(&q, &["who else", "who do i know"]) {
        relational += 0.5;
    }

    // ── Complex signals ──────────────────────────────────────────────────
    // Broad or multi-faceted questions that need every store
    if contains_any(&q, &[
        "everything", "all about", "know about me", "tell me about my life",
        "summarize", "summary", "overview", "full picture", "complete",
    ]) {
        complex += 0.8;
    }
    if q.matches('?').count() > 1 {
        complex += 0.4;
    }
    if word_count > 25 {
        complex += 0.3;
    }
    // Two question facets joined together
    if (factual > 0.0 && temporal > 0.0) || (factual > 0.0 && relational > 0.0) {
        complex += 0.3;
    }

    // Highest signal wins; Semantic is the default when nothing matches.
    // Complex checked first so broad questions don't get pigeonholed.
    let max = complex.max(temporal).max(relational).max(factual);
    if max < 0.3 {
        return RoutingClass::Semantic;
    }
    if (complex - max).abs() < f32::EPSILON {
        RoutingClass::Complex
    } else if (temporal - max).abs() < f32::EPSILON {
        RoutingClass::Temporal
    } else if (relational - max).abs() < f32::EPSILON {
        RoutingClass::Relational
    } else {
        RoutingClass::Factual
    }
}

fn starts_with_any(s: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| s.starts_with(p))
}

fn contains_any(s: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| s.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factual() {
        assert_eq!(classify("What's my dog's name?"), RoutingClass::Factual);
        assert_eq!(classify("What is my sister's birthday?"), RoutingClass::Factual);
    }

    #[test]
    fn test_temporal() {
        assert_eq!(classify("When did I visit Lisbon?"), RoutingClass::Temporal);
        assert_eq!(
            classify("What happened in the meeting yesterday?"),
            RoutingClass::Temporal
        );
        assert_eq!(
            classify("Did I mention the dentist two weeks ago"),
            RoutingClass::Temporal
        );
    }

    #[test]
    fn test_relational() {
        assert_eq!(
            classify("How is Priya related to Arjun?"),
            RoutingClass::Relational
        );
        assert_eq!(
            classify("Which of my colleagues works with Sam?"),
            RoutingClass::Relational
        );
    }

    #[test]
    fn test_complex() {
        assert_eq!(
            classify("Tell me everything you know about me"),
            RoutingClass::Complex
        );
        assert_eq!(
            classify("Can you summarize my preferences?"),
            RoutingClass::Complex
        );
    }

    #[test]
    fn test_semantic_default() {
        assert_eq!(
            classify("thoughts on that restaurant we discussed"),
            RoutingClass::Semantic
        );
    }

    #[test]
    fn test_store_selection_follows_class() {
        let (vector, graph, relational) = classify("What's my dog's name?").store_selection();
        assert!(!vector && !graph && relational);

        let (vector, graph, relational) =
            classify("Tell me everything you know about me").store_selection();
        assert!(vector && graph && relational);
    }
}
