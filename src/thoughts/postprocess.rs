//! Extraction of reasoning summaries from model output.
//!
//! The post-processor is an observer: it reads a [`ChatResponse`] and records
//! what it finds in the session state, but never alters the response.
//! Reasoning blocks can carry continuation signatures that the provider
//! requires verbatim on the next request.

use crate::llm::ChatResponse;

use super::{SessionState, ThoughtEvent};

/// Where the session is in the model-call cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelPhase {
    #[default]
    Idle,
    AwaitingModelOutput,
    Extracting,
}

/// What the post-processor found in one model output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Id of the summary entry appended to the stream, if any.
    pub summary_id: Option<String>,
    /// Number of reasoning segments with text.
    pub reasoning_segments: usize,
    /// Reasoning tokens added to the running total.
    pub reasoning_tokens: u64,
}

impl SessionState {
    /// Mark that a model call is in flight.
    pub fn before_model(&mut self) {
        self.phase = ModelPhase::AwaitingModelOutput;
    }

    /// Record reasoning from `response` and return to idle.
    ///
    /// All reasoning segments with text are joined into one summary entry
    /// attributed to the currently delegated agent. Nothing to extract is a no-op.
    pub fn observe_model_output(&mut self, response: &ChatResponse) -> Extraction {
        self.phase = ModelPhase::Extracting;
        let mut extraction = Extraction::default();

        let segments: Vec<&str> = response
            .reasoning_blocks()
            .iter()
            .filter_map(|block| block.summary_text())
            .collect();

        if !segments.is_empty() {
            let summary = segments.join("\n");
            let agent_name = self.delegated_agent.clone();
            let event = ThoughtEvent::summary(&agent_name, &summary);
            extraction.summary_id = Some(event.id.clone());
            extraction.reasoning_segments = segments.len();

            self.thought_summary = Some(summary);
            self.thought_summary_agent = Some(agent_name);
            self.thought_stream.append(event);
        }

        if let Some(tokens) = response.usage.as_ref().and_then(|u| u.reasoning_tokens) {
            self.thinking_tokens_total = self.thinking_tokens_total.saturating_add(tokens);
            extraction.reasoning_tokens = tokens;
        }

        self.phase = ModelPhase::Idle;
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ReasoningContent, TokenUsage};
    use crate::thoughts::{ThoughtStatus, ROOT_AGENT};

    fn response_with(
        reasoning: Vec<ReasoningContent>,
        reasoning_tokens: Option<u64>,
    ) -> ChatResponse {
        ChatResponse {
            content: Some("The answer is 42.".to_string()),
            reasoning: Some(reasoning),
            usage: Some(TokenUsage::new(100, 20).with_reasoning_tokens(reasoning_tokens)),
            ..Default::default()
        }
    }

    #[test]
    fn consolidates_reasoning_into_one_summary() {
        let mut state = SessionState::new();
        state.on_agent_start(ROOT_AGENT);
        state.on_agent_start("analysis_agent");

        let response = response_with(
            vec![
                ReasoningContent::text("Look at the numbers"),
                ReasoningContent {
                    data: Some("signature".to_string()),
                    ..Default::default()
                },
                ReasoningContent::text("Compute the mean"),
            ],
            None,
        );
        let original = response.clone();

        let extraction = state.observe_model_output(&response);
        assert_eq!(response, original);
        assert_eq!(extraction.reasoning_segments, 2);
        assert_eq!(state.thought_stream().len(), 1);

        let entry = state.thought_stream().last().unwrap();
        assert!(entry.is_summary);
        assert_eq!(entry.status, ThoughtStatus::Completed);
        assert_eq!(entry.agent_name, "analysis_agent");
        assert_eq!(entry.message, "Look at the numbers\nCompute the mean");
        assert_eq!(Some(entry.id.clone()), extraction.summary_id);
        assert_eq!(state.thought_summary_agent(), Some("analysis_agent"));
    }

    #[test]
    fn nothing_to_extract_is_noop() {
        let mut state = SessionState::new();
        state.before_model();
        assert_eq!(state.phase(), ModelPhase::AwaitingModelOutput);

        let response = ChatResponse {
            content: Some("plain answer".to_string()),
            ..Default::default()
        };
        let extraction = state.observe_model_output(&response);
        assert_eq!(extraction, Extraction::default());
        assert!(state.thought_stream().is_empty());
        assert_eq!(state.phase(), ModelPhase::Idle);
    }

    #[test]
    fn accumulates_reasoning_tokens() {
        let mut state = SessionState::new();
        state.observe_model_output(&response_with(vec![], Some(50)));
        state.observe_model_output(&response_with(vec![], Some(30)));
        assert_eq!(state.thinking_tokens_total(), 80);
        assert!(state.thought_stream().is_empty());
    }

    #[test]
    fn summary_defaults_to_root_when_chain_empty() {
        let mut state = SessionState::new();
        state.observe_model_output(&response_with(vec![ReasoningContent::text("hmm")], None));
        assert_eq!(state.thought_stream().last().unwrap().agent_name, ROOT_AGENT);
    }
}
