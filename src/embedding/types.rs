use serde::{Deserialize, Serialize};

/// Request body for an OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

/// Response body from an embeddings endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
    pub model: Option<String>,
}

/// One embedding in a response
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
}

impl EmbeddingRequest {
    /// Create a request for a single text
    pub fn single(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: vec![text.into()],
        }
    }
}

impl EmbeddingResponse {
    /// Take the vector for input position `index`
    pub fn into_vector(self, index: usize) -> Option<Vec<f32>> {
        self.data
            .into_iter()
            .find(|d| d.index == index)
            .map(|d| d.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = EmbeddingRequest::single("all-minilm", "sketch the roof");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "all-minilm");
        assert_eq!(json["input"][0], "sketch the roof");
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "object": "list",
            "data": [{"object": "embedding", "embedding": [0.1, 0.2], "index": 0}],
            "model": "all-minilm"
        }"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.model.as_deref(), Some("all-minilm"));
        assert_eq!(response.into_vector(0), Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_response_missing_index() {
        let json = r#"{"data": []}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert!(response.into_vector(0).is_none());
    }
}
