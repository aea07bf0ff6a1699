use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prompt template, built in or read from `.docent/prompts/<id>.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub id: String,
    pub title: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Sent as the system message, never rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Names the caller must supply when rendering
    #[serde(default)]
    pub variables: Vec<String>,
    /// Handlebars source
    pub template: String,
}

impl PromptDefinition {
    /// Declared variables absent from `supplied`, in declaration order.
    pub fn missing_variables<'a>(&'a self, supplied: &HashMap<String, String>) -> Vec<&'a str> {
        self.variables
            .iter()
            .filter(|name| !supplied.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Output of [`build_prompt`](crate::build_prompt).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltPrompt {
    pub prompt_id: String,
    pub system: Option<String>,
    pub user: String,
}

impl BuiltPrompt {
    /// Characters the model receives: rendered user text plus system text.
    pub fn char_len(&self) -> usize {
        self.user.chars().count() + self.system.as_ref().map_or(0, |s| s.chars().count())
    }
}
