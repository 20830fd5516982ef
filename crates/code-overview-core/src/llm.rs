//! Language model collaborator.
//!
//! The pipeline only needs two things from a model: free text for a prompt,
//! and a JSON value for a prompt plus schema. Providers implement
//! [`LanguageModel::invoke`]; the structured variant has a default that asks
//! for JSON in the prompt and parses the reply, which providers with a
//! native JSON mode may override.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Placeholder substituted by [`fill_prompt`].
pub const TEXT_PLACEHOLDER: &str = "{text}";

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier used in logs (e.g. `"gpt-4.1-mini"`).
    fn model_name(&self) -> &str;

    /// Send one prompt, get the completion text back.
    async fn invoke(&self, prompt: &str) -> Result<String>;

    /// Ask for a JSON value shaped like `schema`.
    ///
    /// The default implementation appends the schema to the prompt and
    /// parses the reply. Markdown code fences around the JSON are tolerated.
    async fn invoke_structured(&self, prompt: &str, schema: &Value) -> Result<Value> {
        let schema_text = serde_json::to_string_pretty(schema)?;
        let full_prompt = format!(
            "{}\n\nRespond with JSON only, no prose, matching this JSON schema:\n{}",
            prompt, schema_text
        );
        let reply = self.invoke(&full_prompt).await?;
        parse_json_reply(&reply)
    }
}

/// A reply that was expected to be JSON but isn't.
///
/// Returned inside the `anyhow::Error` from [`parse_json_reply`] and the
/// default [`LanguageModel::invoke_structured`], so callers can tell a bad
/// reply apart from a failed call with `downcast_ref`.
#[derive(Debug, thiserror::Error)]
#[error("model reply is not valid JSON: {preview}")]
pub struct MalformedReply {
    /// First characters of the offending reply.
    pub preview: String,
    #[source]
    pub source: serde_json::Error,
}

/// Parse a model reply as JSON, stripping a surrounding code fence if any.
pub fn parse_json_reply(reply: &str) -> Result<Value> {
    let trimmed = reply.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(rest) => {
            // Drop the info string ("json") on the opening fence line.
            let rest = rest.split_once('\n').map_or("", |(_, body)| body);
            rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    };
    serde_json::from_str(body).map_err(|source| {
        anyhow::Error::new(MalformedReply {
            preview: body.chars().take(200).collect(),
            source,
        })
    })
}

/// Substitute `{text}` in a prompt template.
///
/// Templates without the placeholder get the text appended after a blank
/// line, so custom prompts can't silently drop the input.
pub fn fill_prompt(template: &str, text: &str) -> String {
    if template.contains(TEXT_PLACEHOLDER) {
        template.replace(TEXT_PLACEHOLDER, text)
    } else {
        format!("{}\n\n{}", template, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl LanguageModel for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_fill_prompt() {
        assert_eq!(fill_prompt("Summarize: {text}", "abc"), "Summarize: abc");
        assert_eq!(fill_prompt("Summarize", "abc"), "Summarize\n\nabc");
    }

    #[test]
    fn test_parse_plain_and_fenced() {
        assert_eq!(parse_json_reply(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(
            parse_json_reply("```json\n[1, 2]\n```").unwrap(),
            json!([1, 2])
        );
        assert_eq!(parse_json_reply("```\n{}\n```\n").unwrap(), json!({}));
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = parse_json_reply("Sure! Here is the JSON you asked for").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
        assert!(err.downcast_ref::<MalformedReply>().is_some());
    }

    #[tokio::test]
    async fn test_default_structured_invoke() {
        let model = Echo(r#"{"overviews": []}"#);
        let value = model
            .invoke_structured("extract", &json!({"type": "object"}))
            .await
            .unwrap();
        assert_eq!(value, json!({"overviews": []}));

        let bad = Echo("no json here");
        assert!(bad.invoke_structured("extract", &json!({})).await.is_err());
    }
}
