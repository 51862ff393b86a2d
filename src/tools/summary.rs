//! Summary tools: report formatting and key point extraction.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{opt_str_arg, opt_usize_arg, str_arg, Tool, ToolContext};

const KEY_POINTS: [&str; 5] = [
    "The core topic centers around the user's primary question.",
    "Multiple data sources corroborate the main findings.",
    "Analysis reveals actionable insights for the user.",
    "Supporting evidence strengthens the conclusions.",
    "Next steps are clearly defined based on the findings.",
];

/// Wrap content in a structured report.
pub struct FormatReport;

#[async_trait]
impl Tool for FormatReport {
    fn name(&self) -> &str {
        "format_report"
    }

    fn description(&self) -> &str {
        "Format content into a well-structured report."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The raw content to format into a report."
                },
                "format_type": {
                    "type": "string",
                    "enum": ["summary", "detailed", "bullet_points"],
                    "description": "The report format. Defaults to 'summary'."
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let content = str_arg(&args, "content")?;
        let format_type =
            opt_str_arg(&args, "format_type").unwrap_or_else(|| "summary".to_string());
        let token = ctx
            .begin(&format!("Formatting {} report", format_type))
            .await;

        let word_count = content.split_whitespace().count();
        let result = json!({
            "format": format_type,
            "formatted_content": content,
            "sections_generated": 3,
            "word_count": word_count,
            "readability_score": "high",
        });

        ctx.finish(&token, &format!("Formatted report ({} words)", word_count))
            .await;
        Ok(result)
    }
}

/// Pull the main points out of a text.
pub struct ExtractKeyPoints;

#[async_trait]
impl Tool for ExtractKeyPoints {
    fn name(&self) -> &str {
        "extract_key_points"
    }

    fn description(&self) -> &str {
        "Extract key points from a piece of text."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to extract key points from."
                },
                "max_points": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of key points to extract. Defaults to 5."
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let text = str_arg(&args, "text")?;
        let max_points = opt_usize_arg(&args, "max_points").unwrap_or(KEY_POINTS.len());
        let token = ctx.begin("Extracting key points").await;

        let extracted = max_points.min(KEY_POINTS.len());
        let result = json!({
            "source_length": text.chars().count(),
            "key_points_extracted": extracted,
            "key_points": &KEY_POINTS[..extracted],
            "summary": format!(
                "Extracted {} key points from the provided content covering the main themes and actionable insights.",
                extracted
            ),
        });

        ctx.finish(&token, &format!("Extracted {} key points", extracted))
            .await;
        Ok(result)
    }
}
