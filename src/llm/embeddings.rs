use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Maximum characters to send per text to the embedding API.
/// text-embedding-3 models accept 8 191 tokens; English prose averages about
/// 4 chars per token, so 24 000 chars stays under the limit with headroom for
/// dense content.
const MAX_EMBED_CHARS: usize = 24_000;

/// Inputs per `/v1/embeddings` request.
const BATCH_SIZE: usize = 100;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    // Find the last char boundary at or before the limit
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Generate embeddings for a batch of texts through the OpenAI-compatible
/// `/v1/embeddings` endpoint at `config.base_url`. Local servers such as
/// Ollama and vLLM expose the same route. The result is parallel with `texts`.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let mut embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(BATCH_SIZE) {
        let input: Vec<String> = batch
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();
        let vectors = request_embeddings(client, config, input).await?;

        if vectors.len() != batch.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} inputs",
                vectors.len(),
                batch.len()
            );
        }
        embeddings.extend(vectors);
    }

    Ok(embeddings)
}

/// Generate embedding for a single text.
pub async fn embed_single(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let results = embed_batch(client, config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .context("No embedding returned")
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Only the text-embedding-3 family accepts a requested output size.
fn requested_dimensions(config: &LlmConfig) -> Option<usize> {
    config
        .embedding_model
        .starts_with("text-embedding-3")
        .then_some(config.embedding_dim)
}

/// One `/v1/embeddings` round trip. Vectors come back in input order.
async fn request_embeddings(
    client: &reqwest::Client,
    config: &LlmConfig,
    input: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    let request = EmbeddingRequest {
        model: &config.embedding_model,
        input,
        dimensions: requested_dimensions(config),
    };

    let mut builder = client
        .post(format!("{}/v1/embeddings", config.base_url))
        .json(&request);
    if let Some(key) = config.api_key.as_deref() {
        builder = builder.bearer_auth(key);
    }

    let resp = builder
        .send()
        .await
        .context("Failed to reach embedding provider")?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Embedding provider returned {status}: {body}");
    }

    let mut body: EmbeddingResponse = resp
        .json()
        .await
        .context("Failed to parse embedding response")?;

    // `data` is not guaranteed to follow input order.
    body.data.sort_by_key(|d| d.index);
    Ok(body.data.into_iter().map(|d| d.embedding).collect())
}
