//! `emit_thought`: lets an agent report its own progress.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{opt_str_arg, str_arg, Tool, ToolContext};
use crate::thoughts::ThoughtStatus;

/// Report what the agent is doing or has finished doing.
///
/// Uses the scan-based emission: a completed/error report closes the agent's
/// newest running entry.
pub struct EmitThought;

#[async_trait]
impl Tool for EmitThought {
    fn name(&self) -> &str {
        "emit_thought"
    }

    fn description(&self) -> &str {
        "Emit a thought step to the user's thought stream. Call this to report what you are \
         currently doing or have finished doing. Use status=\"running\" when starting a task \
         and status=\"completed\" when done."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "description": "Name of the agent emitting the thought (e.g. \"root_agent\")."
                },
                "message": {
                    "type": "string",
                    "description": "A brief description of the current activity."
                },
                "status": {
                    "type": "string",
                    "enum": ["running", "completed", "error"],
                    "description": "Defaults to \"running\"."
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let message = str_arg(&args, "message")?;
        let agent_name = opt_str_arg(&args, "agent_name")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| ctx.agent_name.clone());
        let status = match opt_str_arg(&args, "status") {
            None => ThoughtStatus::Running,
            Some(raw) => ThoughtStatus::parse(&raw).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid status '{}': expected running, completed or error",
                    raw
                )
            })?,
        };

        let receipt = ctx.session.emit(&agent_name, &message, status).await;
        Ok(json!({
            "status": "ok",
            "event_id": receipt.event_id,
            "thought_count": receipt.count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context;

    #[tokio::test]
    async fn running_then_completed_updates_in_place() {
        let ctx = context("root_agent");
        let first = EmitThought
            .execute(
                json!({ "agent_name": "root_agent", "message": "Delegating to research" }),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(first["status"], "ok");
        assert_eq!(first["thought_count"], 1);

        let second = EmitThought
            .execute(
                json!({
                    "agent_name": "root_agent",
                    "message": "Research done",
                    "status": "completed"
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(second["thought_count"], 1);
        assert_eq!(second["event_id"], first["event_id"]);

        let state = ctx.session.snapshot().await;
        let entry = state.thought_stream().last().unwrap();
        assert_eq!(entry.message, "Research done");
        assert_eq!(entry.status, ThoughtStatus::Completed);
    }

    #[tokio::test]
    async fn agent_name_defaults_to_caller() {
        let ctx = context("root_agent");
        EmitThought
            .execute(json!({ "message": "Planning" }), &ctx)
            .await
            .unwrap();
        let state = ctx.session.snapshot().await;
        assert_eq!(state.thought_stream().last().unwrap().agent_name, "root_agent");
    }

    #[tokio::test]
    async fn invalid_status_is_rejected() {
        let ctx = context("root_agent");
        let err = EmitThought
            .execute(json!({ "message": "x", "status": "paused" }), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid status"));
        assert!(ctx.session.snapshot().await.thought_stream().is_empty());
    }
}
