//! Triage classification: is this message worth remembering?
//!
//! Runs on every message, independent of whether context was requested,
//! because memorability is orthogonal to whether context is needed this turn.
//! The classifier fails closed: on timeout, model error, or unparseable
//! output the decision is remember=false. We never block the caller and
//! never memorize content the classifier could not vet.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::engine::types::{MemoryPriority, TriageDecision};
use crate::metrics;
use crate::reasoner::{call_bounded, extract_json, Reasoner};

/// Expected JSON output from the reasoner
#[derive(Debug, Deserialize)]
struct TriageOutput {
    remember: bool,
    #[serde(default)]
    content: String,
    #[serde(default)]
    priority: String,
}

pub struct TriageClassifier {
    reasoner: Arc<dyn Reasoner>,
    timeout: Duration,
}

impl TriageClassifier {
    pub fn new(reasoner: Arc<dyn Reasoner>, timeout: Duration) -> Self {
        Self { reasoner, timeout }
    }

    /// Classify a message into a remember/skip decision.
    ///
    /// A deterministic prefilter skips obviously unmemorable input without a
    /// reasoner round-trip; everything else is decided by the model under the
    /// triage budget.
    pub async fn classify(&self, message: &str) -> TriageDecision {
        if Self::prefilter_skip(message) {
            metrics::TRIAGE_DECISIONS_TOTAL
                .with_label_values(&["prefiltered"])
                .inc();
            return TriageDecision::skip();
        }

        let prompt = Self::build_prompt(message);

        match call_bounded(self.reasoner.as_ref(), "triage", self.timeout, &prompt).await {
            Ok(output) => match Self::parse_output(&output, message) {
                Some(decision) => {
                    let label = if decision.remember { "remember" } else { "skip" };
                    metrics::TRIAGE_DECISIONS_TOTAL
                        .with_label_values(&[label])
                        .inc();
                    decision
                }
                None => {
                    debug!("Triage output unparseable, failing closed: {}", output);
                    metrics::TRIAGE_DECISIONS_TOTAL
                        .with_label_values(&["failed_closed"])
                        .inc();
                    TriageDecision::skip()
                }
            },
            Err(e) => {
                debug!("Triage reasoner call failed, failing closed: {}", e);
                metrics::TRIAGE_DECISIONS_TOTAL
                    .with_label_values(&["failed_closed"])
                    .inc();
                TriageDecision::skip()
            }
        }
    }

    /// Cheap rejection of input that can never be a memory: empty text,
    /// acknowledgements, greetings, and bare questions that state no fact.
    fn prefilter_skip(message: &str) -> bool {
        let trimmed = message.trim();
        if trimmed.len() < 8 {
            return true;
        }

        const BOILERPLATE: &[&str] = &[
            "ok", "okay", "thanks", "thank you", "yes", "no", "sure", "got it", "sounds good",
            "hello", "hi", "hey", "bye", "goodbye", "please", "great", "nice", "cool",
        ];
        let lower = trimmed.to_lowercase();
        let stripped = lower.trim_end_matches(['.', '!', '?']);
        if BOILERPLATE.contains(&stripped) {
            return true;
        }

        // A bare question carries a request, not a fact. Questions that embed
        // declarative content ("remember that..., right?") survive the filter
        // by length and structure.
        if trimmed.ends_with('?') && trimmed.split_whitespace().count() <= 8 {
            return true;
        }

        false
    }

    fn build_prompt(message: &str) -> String {
        format!(
            r#"You decide whether a user message contains personal information worth storing in long-term memory (preferences, facts about the user, people, dates, decisions). Transient chit-chat and questions are not worth storing.
Output ONLY valid JSON, no explanation or markdown.

Message: "{message}"

Output this exact JSON structure:
{{"remember":true,"content":"canonical one-sentence restatement of the fact","priority":"low|normal|high"}}"#
        )
    }

    fn parse_output(output: &str, original_message: &str) -> Option<TriageDecision> {
        let json = extract_json(output);
        let parsed: TriageOutput = serde_json::from_str(&json).ok()?;

        if !parsed.remember {
            return Some(TriageDecision::skip());
        }

        // An affirmative decision with no extracted content falls back to the
        // raw message rather than storing an empty record.
        let canonical = if parsed.content.trim().is_empty() {
            original_message.trim().to_string()
        } else {
            parsed.content.trim().to_string()
        };

        Some(TriageDecision {
            remember: true,
            canonical_content: canonical,
            priority: MemoryPriority::parse(&parsed.priority),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::StaticReasoner;
    use anyhow::Result;
    use async_trait::async_trait;

    fn classifier(response: &str) -> TriageClassifier {
        TriageClassifier::new(
            Arc::new(StaticReasoner::new(response)),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_remember_decision_parsed() {
        let c = classifier(
            r#"{"remember":true,"content":"User prefers dark mode","priority":"normal"}"#,
        );
        let decision = c.classify("Remember that I prefer dark mode").await;
        assert!(decision.remember);
        assert_eq!(decision.canonical_content, "User prefers dark mode");
        assert_eq!(decision.priority, MemoryPriority::Normal);
    }

    #[tokio::test]
    async fn test_skip_decision() {
        let c = classifier(r#"{"remember":false,"content":"","priority":"low"}"#);
        let decision = c.classify("the weather sure is something today").await;
        assert!(!decision.remember);
    }

    #[tokio::test]
    async fn test_garbage_output_fails_closed() {
        let c = classifier("I think you should remember this! (not json)");
        let decision = c.classify("I moved to Berlin last month for work").await;
        assert!(!decision.remember);
    }

    #[tokio::test]
    async fn test_reasoner_error_fails_closed() {
        struct BrokenReasoner;

        #[async_trait]
        impl Reasoner for BrokenReasoner {
            async fn classify(&self, _prompt: &str) -> Result<String> {
                Err(anyhow::anyhow!("model unavailable"))
            }
            fn name(&self) -> &'static str {
                "BrokenReasoner"
            }
        }

        let c = TriageClassifier::new(Arc::new(BrokenReasoner), Duration::from_secs(1));
        let decision = c.classify("I moved to Berlin last month for work").await;
        assert!(!decision.remember);
    }

    #[tokio::test]
    async fn test_timeout_fails_closed_quickly() {
        struct SlowReasoner;

        #[async_trait]
        impl Reasoner for SlowReasoner {
            async fn classify(&self, _prompt: &str) -> Result<String> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(r#"{"remember":true,"content":"x","priority":"high"}"#.to_string())
            }
            fn name(&self) -> &'static str {
                "SlowReasoner"
            }
        }

        let c = TriageClassifier::new(Arc::new(SlowReasoner), Duration::from_millis(50));
        let start = std::time::Instant::now();
        let decision = c.classify("I moved to Berlin last month for work").await;
        assert!(!decision.remember);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_prefilter_skips_without_reasoner_call() {
        // Reasoner says remember, but the prefilter never lets it run
        let c = classifier(r#"{"remember":true,"content":"x","priority":"high"}"#);

        assert!(!c.classify("ok").await.remember);
        assert!(!c.classify("thanks!").await.remember);
        assert!(!c.classify("What's my dog's name?").await.remember);
    }

    #[tokio::test]
    async fn test_empty_content_falls_back_to_message() {
        let c = classifier(r#"{"remember":true,"content":"","priority":"normal"}"#);
        let decision = c.classify("My sister Ana lives in Porto").await;
        assert!(decision.remember);
        assert_eq!(decision.canonical_content, "My sister Ana lives in Porto");
    }
}
