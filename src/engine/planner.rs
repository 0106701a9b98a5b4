//! Context-depth strategy planning
//!
//! State machine over conversation state:
//!   NewConversation  → warm cache: serve narrative, no store access
//!                    → cold cache: Deep retrieval
//!   Continuing, needs_context=false → None
//!   Continuing, needs_context=true  → Relevant, or Comprehensive on an
//!                                     explicit exhaustive-recall request
//!
//! Deep and Comprehensive query sets are expanded through the reasoner under
//! a strict budget; on timeout or failure the planner falls back
//! deterministically instead of failing the request.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::EngineConfig;
use crate::constants;
use crate::engine::classifier;
use crate::engine::narrative::NarrativeCache;
use crate::engine::types::{ConversationState, RoutingClass, StrategyDecision, StrategyDepth};
use crate::reasoner::{call_bounded, Reasoner};
use crate::stores::mem::extract_entities;

/// What the fast path should do for this message
#[derive(Debug)]
pub enum PlanOutcome {
    /// No store access; context not needed
    Skip,
    /// Serve the cached narrative verbatim
    ServeNarrative(String),
    /// Run the router with this decision
    Retrieve(StrategyDecision),
}

pub struct StrategyPlanner {
    reasoner: Arc<dyn Reasoner>,
    narrative: Arc<NarrativeCache>,
    config: EngineConfig,
}

impl StrategyPlanner {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        narrative: Arc<NarrativeCache>,
        config: EngineConfig,
    ) -> Self {
        Self {
            reasoner,
            narrative,
            config,
        }
    }

    /// Plan the retrieval strategy for one incoming message.
    pub async fn plan(
        &self,
        user_id: &str,
        state: ConversationState,
        message: &str,
    ) -> PlanOutcome {
        if state.is_new_conversation {
            if let Some(entry) = self.narrative.get(user_id) {
                debug!(user_id, "Narrative cache hit, skipping retrieval");
                return PlanOutcome::ServeNarrative(entry.narrative_text);
            }
            // Cold cache: gather enough to both answer and seed the narrative
            return PlanOutcome::Retrieve(self.deep_decision(message).await);
        }

        if !state.needs_context {
            return PlanOutcome::Skip;
        }

        if wants_exhaustive_recall(message) {
            return PlanOutcome::Retrieve(self.comprehensive_decision(message).await);
        }

        PlanOutcome::Retrieve(self.relevant_decision(message))
    }

    /// Relevant depth: 1-3 targeted queries, deterministic expansion only.
    /// The fast path's tightest deadline leaves no room for a planning call.
    pub fn relevant_decision(&self, message: &str) -> StrategyDecision {
        let routing = classifier::classify(message);
        let queries = fallback_queries(message, constants::RELEVANT_MAX_QUERIES);
        let (use_vector, use_graph, use_relational) = routing.store_selection();

        StrategyDecision {
            depth: StrategyDepth::Relevant,
            queries,
            routing,
            use_vector,
            use_graph,
            use_relational,
            per_store_limit: constants::RELEVANT_PER_STORE_LIMIT,
            deadline: self.config.relevant_deadline,
        }
    }

    /// Deep depth: reasoner-expanded queries across all three stores.
    /// Used for cold new conversations and background narrative refresh.
    pub async fn deep_decision(&self, message: &str) -> StrategyDecision {
        let queries = self
            .expand_queries(message, constants::DEEP_MAX_QUERIES)
            .await;

        StrategyDecision {
            depth: StrategyDepth::Deep,
            queries,
            routing: RoutingClass::Complex,
            use_vector: true,
            use_graph: true,
            use_relational: true,
            per_store_limit: constants::DEEP_PER_STORE_LIMIT,
            deadline: self.config.deep_deadline,
        }
    }

    async fn comprehensive_decision(&self, message: &str) -> StrategyDecision {
        let queries = self
            .expand_queries(message, constants::COMPREHENSIVE_MAX_QUERIES)
            .await;

        StrategyDecision {
            depth: StrategyDepth::Comprehensive,
            queries,
            routing: RoutingClass::Complex,
            use_vector: true,
            use_graph: true,
            use_relational: true,
            per_store_limit: constants::COMPREHENSIVE_PER_STORE_LIMIT,
            deadline: self.config.comprehensive_deadline,
        }
    }

    /// Expand a message into up to `max` search queries via the reasoner,
    /// falling back deterministically on timeout or failure.
    async fn expand_queries(&self, message: &str, max: usize) -> Vec<String> {
        let prompt = format!(
            r#"Generate up to {max} short search queries to retrieve stored personal memories relevant to this message. One query per line, no numbering, no explanation.

Message: "{message}""#
        );

        match call_bounded(
            self.reasoner.as_ref(),
            "planner",
            self.config.plan_timeout,
            &prompt,
        )
        .await
        {
            Ok(output) => {
                let queries = parse_query_lines(&output, message, max);
                if queries.len() > 1 {
                    queries
                } else {
                    // Model produced nothing usable
                    fallback_queries(message, max)
                }
            }
            Err(e) => {
                debug!("Query expansion failed, using deterministic fallback: {}", e);
                fallback_queries(message, max)
            }
        }
    }
}

/// Does the message explicitly ask for exhaustive recall?
fn wants_exhaustive_recall(message: &str) -> bool {
    let m = message.to_lowercase();
    [
        "tell me everything",
        "everything you know",
        "everything you remember",
        "all my memories",
        "complete history",
        "full history",
    ]
    .iter()
    .any(|p| m.contains(p))
}

/// Parse reasoner output into query lines; the raw message always leads.
fn parse_query_lines(output: &str, message: &str, max: usize) -> Vec<String> {
    let mut queries = vec![message.trim().to_string()];

    for line in output.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
            .trim()
            .trim_matches('"');
        if cleaned.len() < 3 {
            continue;
        }
        let candidate = cleaned.to_string();
        if !queries.iter().any(|q| q.eq_ignore_ascii_case(&candidate)) {
            queries.push(candidate);
        }
        if queries.len() >= max {
            break;
        }
    }

    queries
}

/// Deterministic query expansion: the raw message plus one query per
/// extracted entity.
fn fallback_queries(message: &str, max: usize) -> Vec<String> {
    let mut queries = vec![message.trim().to_string()];

    for entity in extract_entities(message, max) {
        if queries.len() >= max {
            break;
        }
        if !queries.iter().any(|q| q.eq_ignore_ascii_case(&entity)) {
            queries.push(entity);
        }
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::StaticReasoner;
    use std::time::Duration;

    fn planner(response: &str) -> (StrategyPlanner, Arc<NarrativeCache>) {
        let narrative = Arc::new(NarrativeCache::new());
        let planner = StrategyPlanner::new(
            Arc::new(StaticReasoner::new(response)),
            narrative.clone(),
            EngineConfig::default(),
        );
        (planner, narrative)
    }

    fn continuing(needs_context: bool) -> ConversationState {
        ConversationState {
            is_new_conversation: false,
            needs_context,
        }
    }

    #[tokio::test]
    async fn test_no_context_needed_skips() {
        let (planner, _) = planner("unused");
        let outcome = planner
            .plan("alice", continuing(false), "just chatting")
            .await;
        assert!(matches!(outcome, PlanOutcome::Skip));
    }

    #[tokio::test]
    async fn test_continuing_with_context_is_relevant() {
        let (planner, _) = planner("unused");
        let outcome = planner
            .plan("alice", continuing(true), "What's my dog's name?")
            .await;

        let PlanOutcome::Retrieve(decision) = outcome else {
            panic!("expected retrieval");
        };
        assert_eq!(decision.depth, StrategyDepth::Relevant);
        assert_eq!(decision.routing, RoutingClass::Factual);
        assert!(decision.use_relational);
        assert!(!decision.use_vector);
        assert!(!decision.use_graph);
        assert!(decision.queries.len() <= 3);
        assert_eq!(decision.deadline, EngineConfig::default().relevant_deadline);
    }

    #[tokio::test]
    async fn test_new_conversation_cold_cache_goes_deep() {
        let (planner, _) = planner("dog name\npreferences\nwork projects");
        let state = ConversationState {
            is_new_conversation: true,
            needs_context: true,
        };
        let outcome = planner.plan("alice", state, "hi, I'm back").await;

        let PlanOutcome::Retrieve(decision) = outcome else {
            panic!("expected retrieval");
        };
        assert_eq!(decision.depth, StrategyDepth::Deep);
        assert!(decision.use_vector && decision.use_graph && decision.use_relational);
        assert!(decision.queries.len() > 1);
    }

    #[tokio::test]
    async fn test_new_conversation_warm_cache_serves_narrative() {
        let (planner, narrative) = planner("unused");
        narrative.put(
            "alice",
            "Alice is a Rust developer.".to_string(),
            Duration::from_secs(60),
        );

        let state = ConversationState {
            is_new_conversation: true,
            needs_context: true,
        };
        let outcome = planner.plan("alice", state, "hello again").await;

        let PlanOutcome::ServeNarrative(text) = outcome else {
            panic!("expected narrative");
        };
        assert_eq!(text, "Alice is a Rust developer.");
    }

    #[tokio::test]
    async fn test_exhaustive_recall_is_comprehensive() {
        let (planner, _) = planner("q1\nq2\nq3\nq4");
        let outcome = planner
            .plan("alice", continuing(true), "Tell me everything you know about me")
            .await;

        let PlanOutcome::Retrieve(decision) = outcome else {
            panic!("expected retrieval");
        };
        assert_eq!(decision.depth, StrategyDepth::Comprehensive);
    }

    #[tokio::test]
    async fn test_expansion_falls_back_on_broken_reasoner() {
        struct BrokenReasoner;

        #[async_trait::async_trait]
        impl crate::reasoner::Reasoner for BrokenReasoner {
            async fn classify(&self, _prompt: &str) -> anyhow::Result<String> {
                Err(anyhow::anyhow!("down"))
            }
            fn name(&self) -> &'static str {
                "BrokenReasoner"
            }
        }

        let planner = StrategyPlanner::new(
            Arc::new(BrokenReasoner),
            Arc::new(NarrativeCache::new()),
            EngineConfig::default(),
        );

        let decision = planner.deep_decision("Did Melanie visit Lisbon?").await;
        // Deterministic fallback: raw message first, then entity queries
        assert_eq!(decision.queries[0], "Did Melanie visit Lisbon?");
        assert!(decision.queries.iter().any(|q| q == "melanie"));
    }

    #[test]
    fn test_parse_query_lines_strips_bullets() {
        let output = "- dog name\n2. food preferences\n\"work projects\"";
        let queries = parse_query_lines(output, "msg", 8);
        assert_eq!(queries[0], "msg");
        assert!(queries.contains(&"dog name".to_string()));
        assert!(queries.contains(&"food preferences".to_string()));
        assert!(queries.contains(&"work projects".to_string()));
    }

    #[test]
    fn test_wants_exhaustive_recall() {
        assert!(wants_exhaustive_recall("Tell me everything you know about me"));
        assert!(!wants_exhaustive_recall("What's my dog's name?"));
    }
}
