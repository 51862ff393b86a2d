//! Agent loop with delegation through `transfer_to_agent`.
//!
//! Each agent runs a model/tool loop. The root delegates by calling the
//! transfer tool; the child runs to completion and its answer comes back as
//! the tool result. Lifecycle hooks and the post-processor are invoked on the
//! session around every agent run and model call.

use std::sync::Arc;

use async_recursion::async_recursion;
use serde_json::{json, Value};

use super::roster::{find_agent, system_prompt, AgentSpec, ROOT};
use super::AgentError;
use crate::llm::{
    ChatMessage, ChatOptions, FunctionDefinition, LlmClient, ToolCall, ToolDefinition,
};
use crate::thoughts::SharedSession;
use crate::tools::{ToolContext, ToolRegistry};

pub const TRANSFER_TOOL: &str = "transfer_to_agent";

/// Result of one user turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    /// Distinct agents that ran during the turn, in first-start order.
    pub agents: Vec<String>,
}

/// Drives the agent team for a session.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    model: String,
    options: ChatOptions,
    max_iterations: usize,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
        options: ChatOptions,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            model: model.into(),
            options,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Run one user message through the root agent.
    ///
    /// On error the delegation chain is left as it was when the error happened;
    /// the next turn discards it.
    pub async fn run_turn(
        &self,
        session: &SharedSession,
        message: &str,
    ) -> Result<TurnOutcome, AgentError> {
        session.begin_turn().await;
        let mut agents = Vec::new();
        let answer = self.run_agent(&ROOT, message, session, &mut agents).await?;
        tracing::info!(
            "Session {}: turn finished ({} agents involved)",
            session.session_id(),
            agents.len()
        );
        Ok(TurnOutcome { answer, agents })
    }

    #[async_recursion]
    async fn run_agent(
        &self,
        spec: &'static AgentSpec,
        request: &str,
        session: &SharedSession,
        agents: &mut Vec<String>,
    ) -> Result<String, AgentError> {
        session.on_agent_start(spec.name).await;
        if !agents.iter().any(|a| a == spec.name) {
            agents.push(spec.name.to_string());
        }

        let answer = self.agent_loop(spec, request, session, agents).await?;

        session.on_agent_end(spec.name).await;
        Ok(answer)
    }

    async fn agent_loop(
        &self,
        spec: &'static AgentSpec,
        request: &str,
        session: &SharedSession,
        agents: &mut Vec<String>,
    ) -> Result<String, AgentError> {
        let mut messages = vec![
            ChatMessage::system(system_prompt(spec)),
            ChatMessage::user(request),
        ];
        let mut tool_schemas = self.tools.get_tool_schemas(spec.tools);
        if !spec.sub_agents.is_empty() {
            tool_schemas.push(transfer_tool_definition(spec));
        }
        let ctx = ToolContext::new(spec.name, Arc::clone(session));

        for iteration in 0..self.max_iterations {
            tracing::debug!("{} iteration {}", spec.name, iteration + 1);

            session.before_model().await;
            let response = self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas), &self.options)
                .await
                .map_err(|e| AgentError::Llm(e.to_string()))?;
            let response = session.after_model(response).await;

            let calls = response.tool_calls();
            if calls.is_empty() {
                let answer = response.content.unwrap_or_default();
                if answer.trim().is_empty() {
                    tracing::warn!("{} returned an empty answer", spec.name);
                }
                return Ok(answer);
            }

            messages.push(ChatMessage::from_response(&response));
            for call in calls {
                let output = if call.function.name == TRANSFER_TOOL && !spec.sub_agents.is_empty() {
                    self.transfer(spec, call, session, agents).await?
                } else {
                    self.execute_tool(spec, call, &ctx).await
                };
                messages.push(ChatMessage::tool_result(&call.id, output.to_string()));
            }
        }

        Err(AgentError::MaxIterations {
            agent: spec.name.to_string(),
            limit: self.max_iterations,
        })
    }

    /// Run a worker tool. Failures become `{"error": ...}` results for the model.
    async fn execute_tool(&self, spec: &AgentSpec, call: &ToolCall, ctx: &ToolContext) -> Value {
        let name = call.function.name.as_str();
        if !spec.tools.contains(&name) {
            tracing::warn!("{} called unavailable tool {}", spec.name, name);
            return json!({ "error": format!("Tool '{}' is not available to {}", name, spec.name) });
        }

        let args = call.function.parsed_arguments();
        match self.tools.execute(name, args, ctx).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("{} tool {} failed: {}", spec.name, name, e);
                json!({ "error": e.to_string() })
            }
        }
    }

    /// Hand a request to a child agent and return its answer as a tool result.
    ///
    /// Bad targets are reported to the model; a failing child fails the turn.
    async fn transfer(
        &self,
        spec: &'static AgentSpec,
        call: &ToolCall,
        session: &SharedSession,
        agents: &mut Vec<String>,
    ) -> Result<Value, AgentError> {
        let args = call.function.parsed_arguments();
        let target = args.get("agent_name").and_then(Value::as_str).unwrap_or("");
        let child = match find_agent(target).filter(|_| spec.can_transfer_to(target)) {
            Some(child) => child,
            None => {
                tracing::warn!("{} tried to transfer to unknown agent '{}'", spec.name, target);
                return Ok(json!({
                    "error": format!(
                        "Unknown agent '{}'. Available agents: {}",
                        target,
                        spec.sub_agents.join(", ")
                    )
                }));
            }
        };
        let request = args
            .get("request")
            .and_then(Value::as_str)
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("Continue with the user's request.");

        tracing::info!("{} -> {}", spec.name, child.name);
        let answer = self.run_agent(child, request, session, agents).await?;
        Ok(json!({ "agent_name": child.name, "result": answer }))
    }
}

fn transfer_tool_definition(spec: &AgentSpec) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: TRANSFER_TOOL.to_string(),
            description: "Transfer a request to a specialized sub-agent and receive its answer."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "agent_name": {
                        "type": "string",
                        "enum": spec.sub_agents,
                        "description": "The agent to hand the request to."
                    },
                    "request": {
                        "type": "string",
                        "description": "What the agent should do, with all context it needs."
                    }
                },
                "required": ["agent_name", "request"]
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, FunctionCall, ReasoningContent, TokenUsage};
    use crate::thoughts::{SessionHandle, SessionState, ThoughtStatus, ROOT_AGENT};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records each request.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<anyhow::Result<ChatResponse>>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<anyhow::Result<ChatResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
            _options: &ChatOptions,
        ) -> anyhow::Result<ChatResponse> {
            self.requests.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
        }
    }

    fn call(id: &str, name: &str, args: Value) -> ChatResponse {
        ChatResponse {
            tool_calls: Some(vec![ToolCall {
                id: id.to_string(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: args.to_string(),
                    thought_signature: None,
                },
                thought_signature: None,
            }]),
            ..Default::default()
        }
    }

    fn answer(text: &str) -> ChatResponse {
        ChatResponse {
            content: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn orchestrator(llm: Arc<ScriptedLlm>, max_iterations: usize) -> Orchestrator {
        Orchestrator::new(
            llm,
            Arc::new(ToolRegistry::new()),
            "test/model",
            ChatOptions::default(),
            max_iterations,
        )
    }

    fn session() -> SharedSession {
        Arc::new(SessionHandle::new("s1", SessionState::new()))
    }

    #[tokio::test]
    async fn delegation_round_trip() {
        let mut thinking = call(
            "c1",
            "emit_thought",
            json!({ "agent_name": "root_agent", "message": "Delegating to research" }),
        );
        thinking.reasoning = Some(vec![ReasoningContent::text("User wants facts")]);
        thinking.usage = Some(TokenUsage::new(10, 5).with_reasoning_tokens(Some(12)));

        let llm = ScriptedLlm::new(vec![
            Ok(thinking),
            Ok(call(
                "c2",
                TRANSFER_TOOL,
                json!({ "agent_name": "research_agent", "request": "Find facts about tides" }),
            )),
            // research_agent
            Ok(call("c3", "search_knowledge_base", json!({ "query": "tides" }))),
            Ok(answer("Tides are caused by the moon.")),
            // back in root
            Ok(call(
                "c4",
                "emit_thought",
                json!({
                    "agent_name": "root_agent",
                    "message": "Research complete",
                    "status": "completed"
                }),
            )),
            Ok(answer("The moon drives the tides.")),
        ]);
        let orchestrator = orchestrator(llm.clone(), 10);
        let session = session();

        let outcome = orchestrator.run_turn(&session, "Why are there tides?").await.unwrap();
        assert_eq!(outcome.answer, "The moon drives the tides.");
        assert_eq!(outcome.agents, ["root_agent", "research_agent"]);

        let state = session.snapshot().await;
        assert!(state.delegation_chain().is_empty());
        assert_eq!(state.delegated_agent(), ROOT_AGENT);
        assert_eq!(state.thinking_tokens_total(), 12);

        let entries = state.thought_stream().to_vec();
        // summary, root progress (closed in place), research tool progress
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_summary);
        assert_eq!(entries[0].agent_name, ROOT_AGENT);
        assert_eq!(entries[1].message, "Research complete");
        assert_eq!(entries[1].status, ThoughtStatus::Completed);
        assert_eq!(entries[2].agent_name, "research_agent");
        assert_eq!(entries[2].status, ThoughtStatus::Completed);

        // The child's answer came back to the root as the transfer result.
        let requests = llm.requests.lock().unwrap();
        let root_after_transfer = &requests[4];
        let transfer_result = root_after_transfer
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("c2"))
            .and_then(|m| m.content.clone())
            .unwrap();
        assert!(transfer_result.contains("Tides are caused by the moon."));
        // The child saw only its own prompt and the request.
        assert_eq!(requests[2].len(), 2);
        assert_eq!(requests[2][1].content.as_deref(), Some("Find facts about tides"));
    }

    #[tokio::test]
    async fn reasoning_is_sent_back_unchanged() {
        let mut first = call("c1", "emit_thought", json!({ "message": "plan" }));
        first.reasoning = Some(vec![ReasoningContent {
            id: Some("c1".to_string()),
            data: Some("opaque-signature".to_string()),
            ..Default::default()
        }]);
        let llm = ScriptedLlm::new(vec![Ok(first.clone()), Ok(answer("done"))]);
        orchestrator(llm.clone(), 5)
            .run_turn(&session(), "hi")
            .await
            .unwrap();

        let requests = llm.requests.lock().unwrap();
        let assistant = &requests[1][2];
        assert_eq!(assistant.reasoning, first.reasoning);
        assert_eq!(assistant.tool_calls, first.tool_calls);
    }

    #[tokio::test]
    async fn bad_transfer_and_tool_errors_are_reported_to_model() {
        let llm = ScriptedLlm::new(vec![
            Ok(call("c1", TRANSFER_TOOL, json!({ "agent_name": "root_agent", "request": "loop" }))),
            Ok(call("c2", "web_search", json!({ "query": "x" }))),
            Ok(call("c3", "emit_thought", json!({ "message": "x", "status": "weird" }))),
            Ok(answer("ok")),
        ]);
        let outcome = orchestrator(llm.clone(), 10)
            .run_turn(&session(), "hi")
            .await
            .unwrap();
        assert_eq!(outcome.agents, ["root_agent"]);

        let requests = llm.requests.lock().unwrap();
        let last = requests.last().unwrap();
        let results: Vec<Value> = last
            .iter()
            .filter(|m| m.tool_call_id.is_some())
            .map(|m| serde_json::from_str(m.content.as_deref().unwrap()).unwrap())
            .collect();
        assert_eq!(results.len(), 3);
        assert!(results[0]["error"].as_str().unwrap().contains("Unknown agent"));
        assert!(results[1]["error"].as_str().unwrap().contains("not available"));
        assert!(results[2]["error"].as_str().unwrap().contains("Invalid status"));
    }

    #[tokio::test]
    async fn max_iterations_is_an_error() {
        let llm = ScriptedLlm::new(vec![
            Ok(call("c1", "emit_thought", json!({ "message": "a" }))),
            Ok(call("c2", "emit_thought", json!({ "message": "b" }))),
        ]);
        let err = orchestrator(llm, 2)
            .run_turn(&session(), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations { limit: 2, .. }));
    }

    #[tokio::test]
    async fn failed_child_leaves_chain_until_next_turn() {
        let llm = ScriptedLlm::new(vec![
            Ok(call(
                "c1",
                TRANSFER_TOOL,
                json!({ "agent_name": "analysis_agent", "request": "crunch" }),
            )),
            Err(anyhow::anyhow!("provider down")),
            Ok(answer("recovered")),
        ]);
        let orchestrator = orchestrator(llm, 5);
        let session = session();

        let err = orchestrator.run_turn(&session, "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
        let state = session.snapshot().await;
        assert_eq!(
            state.delegation_chain().as_slice(),
            ["root_agent".to_string(), "analysis_agent".to_string()]
        );

        let outcome = orchestrator.run_turn(&session, "again").await.unwrap();
        assert_eq!(outcome.answer, "recovered");
        assert!(session.snapshot().await.delegation_chain().is_empty());
    }
}
