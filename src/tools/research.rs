//! Research tools: knowledge base and web search.

use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};

use super::{round2, str_arg, Tool, ToolContext};

/// Search the internal knowledge base.
pub struct SearchKnowledgeBase;

#[async_trait]
impl Tool for SearchKnowledgeBase {
    fn name(&self) -> &str {
        "search_knowledge_base"
    }

    fn description(&self) -> &str {
        "Search the internal knowledge base for information relevant to the query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find relevant information."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let query = str_arg(&args, "query")?;
        let token = ctx
            .begin(&format!("Searching knowledge base for '{}'", query))
            .await;

        let (results_found, confidence) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(3..=15u32), round2(rng.gen_range(0.75..=0.98)))
        };

        let result = json!({
            "query": query,
            "results_found": results_found,
            "sources": ["internal_docs", "faq_database", "product_catalog"],
            "top_results": [
                format!(
                    "Result 1: Relevant information about '{}' from internal documentation.",
                    query
                ),
                format!("Result 2: FAQ entry related to '{}'.", query),
                format!("Result 3: Product details matching '{}'.", query),
            ],
            "confidence": confidence,
        });

        ctx.finish(
            &token,
            &format!("Found {} knowledge base results", results_found),
        )
        .await;
        Ok(result)
    }
}

/// Search the web for current information.
pub struct WebSearch;

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information about the query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to look up online."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let query = str_arg(&args, "query")?;
        let token = ctx.begin(&format!("Searching the web for '{}'", query)).await;

        let slug = query.replace(' ', "-");
        let total_results: u32 = rand::thread_rng().gen_range(100..=10_000);
        let result = json!({
            "query": query,
            "web_results": [
                {
                    "title": format!("Latest info on {}", query),
                    "snippet": format!("Comprehensive overview of {} with recent updates and analysis.", query),
                    "url": format!("https://example.com/{}", slug),
                },
                {
                    "title": format!("{} - Expert Analysis", query),
                    "snippet": format!("In-depth expert analysis covering key aspects of {}.", query),
                    "url": format!("https://example.com/analysis/{}", slug),
                }
            ],
            "total_results": total_results,
        });

        ctx.finish(&token, &format!("Found {} web results", total_results))
            .await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thoughts::ThoughtStatus;
    use crate::tools::test_support::context;

    #[tokio::test]
    async fn knowledge_base_results_in_range() {
        let ctx = context("research_agent");
        for _ in 0..20 {
            let result = SearchKnowledgeBase
                .execute(json!({ "query": "solar panels" }), &ctx)
                .await
                .unwrap();
            let found = result["results_found"].as_u64().unwrap();
            assert!((3..=15).contains(&found));
            let confidence = result["confidence"].as_f64().unwrap();
            assert!((0.75..=0.98).contains(&confidence));
            assert_eq!(result["top_results"].as_array().unwrap().len(), 3);
        }
    }

    #[tokio::test]
    async fn knowledge_base_reports_progress() {
        let ctx = context("research_agent");
        SearchKnowledgeBase
            .execute(json!({ "query": "rust" }), &ctx)
            .await
            .unwrap();
        let state = ctx.session.snapshot().await;
        assert_eq!(state.thought_stream().len(), 1);
        let entry = state.thought_stream().last().unwrap();
        assert_eq!(entry.agent_name, "research_agent");
        assert_eq!(entry.status, ThoughtStatus::Completed);
        assert!(entry.message.starts_with("Found "));
    }

    #[tokio::test]
    async fn web_search_builds_slugged_urls() {
        let ctx = context("research_agent");
        let result = WebSearch
            .execute(json!({ "query": "electric cars" }), &ctx)
            .await
            .unwrap();
        assert_eq!(result["web_results"].as_array().unwrap().len(), 2);
        assert_eq!(
            result["web_results"][0]["url"],
            "https://example.com/electric-cars"
        );
        let total = result["total_results"].as_u64().unwrap();
        assert!((100..=10_000).contains(&total));
    }

    #[tokio::test]
    async fn missing_query_is_error_without_thought() {
        let ctx = context("research_agent");
        assert!(WebSearch.execute(json!({}), &ctx).await.is_err());
        assert!(ctx.session.snapshot().await.thought_stream().is_empty());
    }
}
