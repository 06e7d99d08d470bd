//! Prompt templates for Tubechat.
//!
//! Prompts can be customized by placing a `rag.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub rag: RagPrompts,
}

/// Prompts for answer synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// System instruction. `{{context}}` is replaced with the retrieved transcript excerpts.
    pub system: String,
    /// Returned verbatim when a session has no usable context for a question.
    pub fallback: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a question-answering assistant for YouTube video transcripts.

Guidelines:
- Provide accurate, concise and useful answers based only on the video context below
- If the context does not contain enough information to answer fully, say so
- If the question cannot be answered from the context, clearly state "I don't know" or "The provided context doesn't contain information about this."
- Keep answers concise (2-4 sentences typically) while ensuring completeness
- Maintain a helpful, neutral tone and do not speculate beyond what the context supports
- Do not reproduce harmful, unethical or dangerous content from the context; if such content appears, respond without endorsing or amplifying it
- Bullet points are fine when they help, but prefer straightforward prose

Context:
{{context}}"#
                .to_string(),

            fallback: "I don't have enough context from your ingested videos to answer this question."
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, applying overrides from a custom directory if given.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.rag.system.contains("{{context}}"));
        assert!(!prompts.rag.fallback.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_load_custom_rag_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rag.toml"),
            "system = \"Answer tersely.\\n{{context}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str()).unwrap();
        assert!(prompts.rag.system.starts_with("Answer tersely."));
        // Unset keys fall back to defaults.
        assert_eq!(prompts.rag.fallback, RagPrompts::default().fallback);
    }
}
