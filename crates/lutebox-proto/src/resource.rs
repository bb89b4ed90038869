//! Resource types for `resources/list`, `resources/templates/list`, and
//! `resources/read`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    pub resources: Vec<ResourceDescriptor>,
}

impl ListResourcesResult {
    pub fn empty() -> Self {
        Self {
            resources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourceTemplatesResult {
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<serde_json::Value>,
}

impl ListResourceTemplatesResult {
    pub fn empty() -> Self {
        Self {
            resource_templates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobResourceContents {
    pub uri: String,
    pub blob: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<BlobResourceContents>,
}

impl ReadResourceResult {
    pub fn single_blob(uri: impl Into<String>, blob: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            contents: vec![BlobResourceContents {
                uri: uri.into(),
                blob: blob.into(),
                mime_type: mime_type.into(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_resource_result_wraps_single_blob() {
        let result = ReadResourceResult::single_blob("file:///x.png", "QUJD", "image/png");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["contents"][0]["mimeType"], "image/png");
    }
}
