use crate::domain::ports::{FragmentStream, ModelClient};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line of a streamed `/api/generate` response.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateChunk {
    response: String,
    done: bool,
    error: Option<String>,
}

/// Splits a byte stream into NDJSON lines, buffering lines cut across chunks.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Feeds raw bytes and returns the text fragments of every complete line.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(bytes);

        let mut fragments = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(fragment) = decode_line(&line)? {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    /// Decodes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Result<Option<String>> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

fn decode_line(line: &[u8]) -> Result<Option<String>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let chunk: GenerateChunk = serde_json::from_str(text).map_err(|e| EtlError::ModelStreamError {
        message: format!("undecodable stream line '{}': {}", text, e),
    })?;

    if let Some(message) = chunk.error {
        return Err(EtlError::ModelStreamError { message });
    }
    if chunk.done {
        tracing::debug!("Model reported done");
    }

    Ok((!chunk.response.is_empty()).then_some(chunk.response))
}

/// Client for an Ollama-compatible generation service.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    endpoint: String,
}

impl OllamaClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

struct DecodeState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: NdjsonDecoder,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn generate_stream(&self, model: &str, prompt: &str) -> Result<FragmentStream> {
        let url = format!("{}/api/generate", self.endpoint);
        tracing::debug!("Requesting streamed generation from {} (model: {})", url, model);

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: true,
            })
            .send()
            .await?
            .error_for_status()?;

        tracing::debug!("Model API response status: {}", response.status());

        let state = DecodeState {
            bytes: response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()))
                .boxed(),
            decoder: NdjsonDecoder::default(),
            pending: VecDeque::new(),
            finished: false,
        };

        let fragments = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => match state.decoder.push(&chunk) {
                        Ok(fragments) => state.pending.extend(fragments.into_iter().map(Ok)),
                        Err(e) => {
                            state.pending.push_back(Err(e));
                            state.finished = true;
                        }
                    },
                    Some(Err(e)) => {
                        state.pending.push_back(Err(EtlError::ApiError(e)));
                        state.finished = true;
                    }
                    None => {
                        match state.decoder.finish() {
                            Ok(Some(fragment)) => state.pending.push_back(Ok(fragment)),
                            Ok(None) => {}
                            Err(e) => state.pending.push_back(Err(e)),
                        }
                        state.finished = true;
                    }
                }
            }
        });

        Ok(fragments.boxed())
    }
}
