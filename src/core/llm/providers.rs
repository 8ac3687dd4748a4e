use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ReviewError, Result};
use crate::config::LlmConfig;
use super::{GeneratedRecommendation, GenerationRequest, Generator};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Factory function to create the appropriate generator based on config
pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn Generator>> {
    if !config.enabled {
        return Err(ReviewError::Config("LLM integration is disabled".to_string()));
    }

    match config.provider.as_str() {
        "openai" | "openai-compatible" => Ok(Box::new(OpenAiGenerator::new(config)?)),
        _ => Err(ReviewError::Config(format!(
            "Unsupported LLM provider: {}",
            config.provider
        ))),
    }
}

/// Generator speaking the OpenAI-compatible chat-completions protocol
pub struct OpenAiGenerator {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(ReviewError::Config(
                "API key required for external LLM providers".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewError::Backend(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    async fn call_chat_api(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ReviewError::Config("LLM API key not set".to_string()))?;
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');

        let payload = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a senior software engineer performing detailed, educational code reviews."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "max_tokens": self.config.max_tokens.unwrap_or(2000),
            "temperature": self.config.temperature.unwrap_or(0.3)
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReviewError::Backend(format!("LLM request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReviewError::Backend(format!(
                "LLM API error {}: {}",
                status, error_text
            )));
        }

        let response_data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReviewError::Backend(format!("failed to parse LLM response: {}", e)))?;

        response_data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ReviewError::Backend("LLM response missing content".to_string()))
    }

    fn build_review_prompt(&self, request: &GenerationRequest) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "Analyze the following change in file {}:\n```\n{}\n```\n\n",
            request.file_path, request.diff
        ));

        if !request.similar_code.is_empty() {
            prompt.push_str("Similar code in the repository:\n\n");
            for (idx, similar) in request.similar_code.iter().enumerate() {
                prompt.push_str(&format!(
                    "Example {} from {}:\n```\n{}\n```\n\n",
                    idx + 1,
                    similar.file,
                    similar.content
                ));
            }
        }

        prompt.push_str("Perform a comprehensive review focusing on:\n");
        prompt.push_str("1. Code quality and readability\n");
        prompt.push_str("2. Performance optimizations\n");
        prompt.push_str("3. Security concerns\n");
        prompt.push_str("4. Bug prevention (edge cases, error handling, state management)\n");
        prompt.push_str("5. Maintainability (testing coverage, modularity, coupling)\n\n");

        prompt.push_str("For each issue found:\n");
        prompt.push_str("1. Be specific about the line numbers or code sections\n");
        prompt.push_str("2. Explain WHY it's an issue\n");
        prompt.push_str("3. Suggest a concrete solution with example code where appropriate\n");
        prompt.push_str("4. Rate severity (high/medium/low)\n\n");

        prompt.push_str("Format your response as a JSON list of recommendations:\n");
        prompt.push_str("[\n");
        prompt.push_str("    {\n");
        prompt.push_str("        \"type\": \"style|architecture|functionality\",\n");
        prompt.push_str("        \"subtype\": \"specific_category\",\n");
        prompt.push_str("        \"message\": \"Detailed issue description with line numbers\",\n");
        prompt.push_str("        \"explanation\": \"Why this is an issue or best practice\",\n");
        prompt.push_str("        \"suggestion\": \"Concrete solution with example code if applicable\",\n");
        prompt.push_str("        \"severity\": \"high|medium|low\"\n");
        prompt.push_str("    }\n");
        prompt.push_str("]\n\n");
        prompt.push_str("Provide substantive recommendations that would truly help improve this code. Respond with the JSON list only.\n");

        prompt
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn review_diff(&self, request: &GenerationRequest) -> Result<Vec<GeneratedRecommendation>> {
        let prompt = self.build_review_prompt(request);
        let content = self.call_chat_api(&prompt).await?;
        Ok(parse_recommendations(&content))
    }

    fn provider_name(&self) -> &str {
        match self.config.provider.as_str() {
            "openai" => "OpenAI",
            _ => "OpenAI-compatible",
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Parse the backend's reply as an untrusted JSON list. A non-list reply or
/// a non-conforming entry is discarded with a warning, contributing zero
/// recommendations.
fn parse_recommendations(content: &str) -> Vec<GeneratedRecommendation> {
    let stripped = strip_code_fences(content);

    let value: serde_json::Value = match serde_json::from_str(stripped) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse LLM response as JSON: {}", e);
            return Vec::new();
        }
    };

    let Some(entries) = value.as_array() else {
        warn!("LLM response is not a list");
        return Vec::new();
    };

    let mut recommendations = Vec::new();
    for entry in entries {
        match serde_json::from_value::<GeneratedRecommendation>(entry.clone()) {
            Ok(recommendation) => recommendations.push(recommendation),
            Err(e) => {
                warn!("Discarding non-conforming LLM recommendation: {}", e);
            }
        }
    }

    debug!("Parsed {} generative recommendations", recommendations.len());
    recommendations
}

/// Models often wrap JSON in Markdown fences; tolerate that.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .trim_end()
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::detector::{IssueKind, Severity};

    #[test]
    fn test_create_generator_requires_enablement_and_key() {
        let mut config = Config::default().llm;
        assert!(create_generator(&config).is_err());

        config.enabled = true;
        config.api_key = None;
        assert!(create_generator(&config).is_err());

        config.api_key = Some("key".to_string());
        assert!(create_generator(&config).is_ok());
    }

    #[test]
    fn test_parse_valid_recommendations() {
        let content = r#"[
            {
                "type": "functionality",
                "subtype": "edge_case",
                "message": "Division by zero on line 3",
                "explanation": "The denominator is unchecked.",
                "suggestion": "Guard against zero.",
                "severity": "high"
            }
        ]"#;
        let parsed = parse_recommendations(content);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].kind, IssueKind::Functionality);
        assert_eq!(parsed[0].severity, Severity::High);
        assert!(parsed[0].explanation.is_some());
    }

    #[test]
    fn test_parse_tolerates_code_fences() {
        let content = "```json\n[{\"type\": \"style\", \"subtype\": \"s\", \"message\": \"m\", \"suggestion\": \"s\", \"severity\": \"low\"}]\n```";
        assert_eq!(parse_recommendations(content).len(), 1);
    }

    #[test]
    fn test_malformed_responses_contribute_nothing() {
        assert!(parse_recommendations("not json at all").is_empty());
        assert!(parse_recommendations("{\"type\": \"style\"}").is_empty());
    }

    #[test]
    fn test_non_conforming_entries_are_discarded() {
        let content = r#"[
            {"type": "style", "subtype": "s", "message": "m", "suggestion": "s", "severity": "low"},
            {"type": "mystery", "subtype": "s", "message": "m", "suggestion": "s", "severity": "low"},
            {"type": "style", "subtype": "s", "message": "m", "suggestion": "s", "severity": "sometimes"}
        ]"#;
        let parsed = parse_recommendations(content);
        assert_eq!(parsed.len(), 1);
    }
}
