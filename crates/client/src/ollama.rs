//! Image description through an Ollama `/api/generate` endpoint.

use std::path::Path;

use base64::Engine;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "llava:7b";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: [String; 1],
}

/// One line of the streamed NDJSON reply.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Joins the `response` fragments of a streamed reply.
///
/// Bytes may arrive split anywhere, so partial lines are buffered until the
/// newline shows up. Lines that are not valid JSON are logged and dropped.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes. Returns `true` once a line with `done: true`
    /// has been seen; later input is ignored.
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        if self.done {
            return true;
        }
        self.pending.extend_from_slice(bytes);

        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.consume_line(&line);
            if self.done {
                self.pending.clear();
                break;
            }
        }
        self.done
    }

    fn consume_line(&mut self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }

        match serde_json::from_slice::<GenerateChunk>(line) {
            Ok(chunk) => {
                if let Some(fragment) = chunk.response {
                    self.text.push_str(&fragment);
                }
                self.done = chunk.done;
            }
            Err(e) => log::warn!("Skipping undecodable response line: {e}"),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The assembled text, trimmed. A trailing line without a newline is
    /// still taken into account.
    pub fn finish(mut self) -> String {
        if !self.done && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.consume_line(&rest);
        }
        self.text.trim().to_string()
    }
}

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model to describe the image at `path`.
    pub async fn describe_image(&self, path: &Path, prompt: &str) -> Result<String> {
        let image = tokio::fs::read(path).await?;
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            images: [base64::engine::general_purpose::STANDARD.encode(image)],
        };

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let mut assembler = ResponseAssembler::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            if assembler.push(&chunk?) {
                break;
            }
        }

        if !assembler.is_done() {
            log::debug!("Stream for {} ended without a done marker", path.display());
        }
        Ok(assembler.finish())
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL)
    }
}

/// Whether `err` means the image file does not exist.
pub fn is_missing_image(err: &ClientError) -> bool {
    matches!(err, ClientError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
}
