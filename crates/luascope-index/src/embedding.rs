//! Voyage Code 3 API client for embedding code entities.
//!
//! Provides batch and single-query embedding via the Voyage AI API.
//! Uses `input_type: "document"` for indexing and `input_type: "query"`
//! for searching. Every response is checked against the 1:1 text/vector
//! contract before anything downstream sees it.

use luascope_core::{CodeEntity, EmbeddingConfig, LuascopeError};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
const DEFAULT_MODEL: &str = "voyage-code-3";
const BATCH_SIZE: usize = 100;
const BATCH_DELAY_MS: u64 = 200;

/// An embedding provider.
///
/// The retriever and pipeline are generic over this so tests can swap in
/// a deterministic stub instead of the live API.
#[allow(async_fn_in_trait)]
pub trait Embedder {
    /// The model name this provider embeds with.
    fn model(&self) -> &str;

    /// Embed a batch of documents. Vectors come back in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LuascopeError>;

    /// Embed a single search query.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, LuascopeError>;
}

/// Client for the Voyage Code 3 embedding API.
///
/// # Examples
///
/// ```
/// use luascope_index::embedding::{Embedder, VoyageClient};
///
/// let client = VoyageClient::new("test-key");
/// assert_eq!(client.model(), "voyage-code-3");
/// ```
pub struct VoyageClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for VoyageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoyageClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
    input_type: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

impl VoyageClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Falls back to `VOYAGE_API_KEY` env var if no key in config.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Config`] if no API key is available.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use luascope_core::EmbeddingConfig;
    /// use luascope_index::embedding::VoyageClient;
    ///
    /// let config = EmbeddingConfig::default();
    /// let client = VoyageClient::with_config(&config).unwrap();
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, LuascopeError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("VOYAGE_API_KEY").ok())
            .ok_or_else(|| {
                LuascopeError::Config(
                    "embedding API key not found: set embedding.api_key in .luascope.toml or VOYAGE_API_KEY env var".into(),
                )
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: config.model.clone(),
        })
    }

    async fn post_embed(&self, request: &EmbedRequest) -> Result<EmbedResponse, LuascopeError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| LuascopeError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(LuascopeError::Embedding(format!(
                "Voyage API returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LuascopeError::Embedding(format!("failed to parse response: {e}")))
    }

    /// Build the JSON request body for a batch embed call (for testing).
    #[cfg(test)]
    fn build_request(&self, texts: &[String], input_type: &str) -> EmbedRequest {
        EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
            input_type: input_type.to_string(),
        }
    }
}

impl Embedder for VoyageClient {
    fn model(&self) -> &str {
        &self.model
    }

    /// Embed a batch of documents. Returns vectors in the same order.
    ///
    /// Splits into sub-batches of 100 with 200ms delays for rate
    /// limiting. Each sub-batch response must contain exactly one vector
    /// per input text.
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Embedding`] if the API call fails, or
    /// [`LuascopeError::EmbeddingMismatch`] if the provider returns the
    /// wrong number of vectors.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LuascopeError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(BATCH_DELAY_MS)).await;
            }

            let request = EmbedRequest {
                model: self.model.clone(),
                input: batch.to_vec(),
                input_type: "document".to_string(),
            };

            let embed_response = self.post_embed(&request).await?;

            if embed_response.data.len() != batch.len() {
                return Err(LuascopeError::EmbeddingMismatch {
                    expected: batch.len(),
                    received: embed_response.data.len(),
                });
            }

            for item in embed_response.data {
                all_embeddings.push(item.embedding);
            }
        }

        Ok(all_embeddings)
    }

    /// Embed a single query (uses `input_type: "query"`).
    ///
    /// # Errors
    ///
    /// Returns [`LuascopeError::Embedding`] if the API call fails or the
    /// response carries no vector.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, LuascopeError> {
        let request = EmbedRequest {
            model: self.model.clone(),
            input: vec![query.to_string()],
            input_type: "query".to_string(),
        };

        let embed_response = self.post_embed(&request).await?;

        let first = embed_response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| LuascopeError::Embedding("empty response from Voyage API".into()))?;

        Ok(first.embedding)
    }
}

/// Attach embedding vectors to entities, enforcing the 1:1 contract.
///
/// Entity contents are embedded in order and zipped back onto the
/// entities. If the provider returns any count other than one vector per
/// entity, nothing is attached and the batch fails.
///
/// # Errors
///
/// Returns [`LuascopeError::EmbeddingMismatch`] on a count mismatch and
/// propagates provider errors unchanged.
pub async fn attach_embeddings<E: Embedder>(
    embedder: &E,
    entities: &mut [CodeEntity],
) -> Result<(), LuascopeError> {
    if entities.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = entities.iter().map(|e| e.content.clone()).collect();
    let vectors = embedder.embed_documents(&texts).await?;

    if vectors.len() != entities.len() {
        return Err(LuascopeError::EmbeddingMismatch {
            expected: entities.len(),
            received: vectors.len(),
        });
    }

    for (entity, vector) in entities.iter_mut().zip(vectors) {
        entity.vector = Some(vector);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use luascope_core::EntityKind;

    struct CountingStub {
        vectors_per_call: usize,
    }

    impl Embedder for CountingStub {
        fn model(&self) -> &str {
            "stub"
        }

        async fn embed_documents(
            &self,
            _texts: &[String],
        ) -> Result<Vec<Vec<f32>>, LuascopeError> {
            Ok(vec![vec![1.0, 0.0]; self.vectors_per_call])
        }

        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, LuascopeError> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn entity(name: &str) -> CodeEntity {
        CodeEntity {
            kind: EntityKind::Function,
            name: name.to_string(),
            content: format!("function {name}() end"),
            file_path: PathBuf::from("a.lua"),
            start_line: 0,
            end_line: 0,
            dependencies: Vec::new(),
            vector: None,
        }
    }

    #[test]
    fn request_format_is_correct() {
        let client = VoyageClient::new("test-key");
        let texts = vec![
            "function foo() end".to_string(),
            "function bar() end".to_string(),
        ];
        let request = client.build_request(&texts, "document");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "voyage-code-3");
        assert_eq!(json["input_type"], "document");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn response_parsing_works() {
        let json = r#"{
            "data": [
                {"embedding": [0.1, 0.2, 0.3]},
                {"embedding": [0.4, 0.5, 0.6]}
            ]
        }"#;
        let response: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn batch_splitting_calculates_correctly() {
        let texts: Vec<String> = (0..250).map(|i| format!("text {i}")).collect();
        let batches: Vec<&[String]> = texts.chunks(BATCH_SIZE).collect();
        assert_eq!(batches.len(), 3); // 100 + 100 + 50
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[2].len(), 50);
    }

    #[test]
    fn missing_api_key_gives_clear_error() {
        std::env::remove_var("VOYAGE_API_KEY");
        let config = EmbeddingConfig {
            api_key: None,
            ..EmbeddingConfig::default()
        };
        let result = VoyageClient::with_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("API key"),
            "error should mention API key: {err}"
        );
    }

    #[test]
    fn query_request_uses_query_input_type() {
        let client = VoyageClient::new("test-key");
        let request = client.build_request(&["spell cast".to_string()], "query");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input_type"], "query");
    }

    #[tokio::test]
    async fn attach_zips_vectors_in_order() {
        let stub = CountingStub {
            vectors_per_call: 2,
        };
        let mut entities = vec![entity("a"), entity("b")];
        attach_embeddings(&stub, &mut entities).await.unwrap();

        assert_eq!(entities[0].vector, Some(vec![1.0, 0.0]));
        assert_eq!(entities[1].vector, Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn attach_rejects_count_mismatch() {
        let stub = CountingStub {
            vectors_per_call: 1,
        };
        let mut entities = vec![entity("a"), entity("b")];
        let err = attach_embeddings(&stub, &mut entities).await.unwrap_err();

        assert!(matches!(
            err,
            LuascopeError::EmbeddingMismatch {
                expected: 2,
                received: 1
            }
        ));
        // Nothing is attached on failure
        assert!(entities.iter().all(|e| e.vector.is_none()));
    }

    #[tokio::test]
    async fn attach_skips_empty_batches() {
        let stub = CountingStub {
            vectors_per_call: 0,
        };
        let mut entities: Vec<CodeEntity> = Vec::new();
        attach_embeddings(&stub, &mut entities).await.unwrap();
    }
}
