//! Prompt catalog types served by `prompts/list`.
//!
//! The core never exercises `prompts/get` (no prompt ships with the
//! transport/coordination layer); only the list shape is needed so a
//! collaborator-supplied catalog can be wired in later without a protocol
//! change.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    pub prompts: Vec<PromptDefinition>,
}

impl ListPromptsResult {
    pub fn empty() -> Self {
        Self { prompts: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_serializes_to_empty_array() {
        let json = serde_json::to_value(ListPromptsResult::empty()).unwrap();
        assert_eq!(json["prompts"].as_array().unwrap().len(), 0);
    }
}
