//! Boundary to the generative-answer backend.
//!
//! The backend is a black box that, per turn, yields a stream of fragments:
//! plain text to be concatenated verbatim, or structured documents. The only
//! document shape understood here is the spa-availability result; everything
//! else passes through as opaque and is ignored by the caller.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// One unit of a streamed backend response.
#[derive(Debug, Clone)]
pub enum Fragment {
    Text(String),
    Document(Value),
}

pub type FragmentStream = BoxStream<'static, Result<Fragment>>;

/// The distinguished structured contract: a spa availability result.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SpaAvailability {
    pub date: NaiveDate,
    pub available_slots: Vec<String>,
}

impl SpaAvailability {
    /// Recognize the `{response_type: "spa_availability", ...}` document
    /// shape. Any other document returns `None` and stays opaque.
    pub fn from_document(doc: &Value) -> Option<Self> {
        if doc.get("response_type").and_then(Value::as_str) != Some("spa_availability") {
            return None;
        }
        serde_json::from_value(doc.clone()).ok()
    }
}

/// Generative backend client. Session state lives on the backend side, keyed
/// by the conversation's stable id; callers serialize turns per session key.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn invoke(
        &self,
        session_key: &str,
        input_text: &str,
        session_attributes: &HashMap<String, String>,
    ) -> Result<FragmentStream>;

    /// Drop any session state held for `session_key`, so the next turn
    /// starts a fresh exchange.
    async fn invalidate_session(&self, session_key: &str) -> Result<()>;
}

/// HTTP-backed implementation speaking newline-delimited JSON: each line is
/// either `{"text": "..."}` or `{"document": {...}}`.
pub struct HttpFlowBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(serde::Serialize)]
struct InvokeBody<'a> {
    session_id: &'a str,
    input_text: &'a str,
    session_attributes: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    end_session: bool,
}

impl HttpFlowBackend {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    fn parse_line(line: &str) -> Option<Fragment> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let value: Value = serde_json::from_str(line).ok()?;
        if let Some(text) = value.get("text").and_then(Value::as_str) {
            return Some(Fragment::Text(text.to_string()));
        }
        value.get("document").cloned().map(Fragment::Document)
    }
}

#[async_trait]
impl AssistantBackend for HttpFlowBackend {
    async fn invoke(
        &self,
        session_key: &str,
        input_text: &str,
        session_attributes: &HashMap<String, String>,
    ) -> Result<FragmentStream> {
        let response = self
            .client
            .post(format!("{}/invoke", self.base_url))
            .json(&InvokeBody {
                session_id: session_key,
                input_text,
                session_attributes,
                end_session: false,
            })
            .send()
            .await
            .context("assistant backend unreachable")?
            .error_for_status()
            .context("assistant backend rejected the invocation")?;

        debug!("backend invocation accepted for session {}", session_key);

        // Re-chunk the byte stream into NDJSON lines, holding any partial
        // trailing line in the scan buffer until its newline arrives.
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.context("assistant backend stream failed"))
            .scan(String::new(), |buffer, chunk| {
                let fragments: Vec<Result<Fragment>> = match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        let mut out = Vec::new();
                        while let Some(pos) = buffer.find('\n') {
                            let line: String = buffer.drain(..=pos).collect();
                            if let Some(fragment) = Self::parse_line(&line) {
                                out.push(Ok(fragment));
                            }
                        }
                        out
                    }
                    Err(e) => vec![Err(e)],
                };
                std::future::ready(Some(futures_util::stream::iter(fragments)))
            })
            .flatten();

        Ok(stream.boxed())
    }

    async fn invalidate_session(&self, session_key: &str) -> Result<()> {
        let no_attributes = HashMap::new();
        self.client
            .post(format!("{}/invoke", self.base_url))
            .json(&InvokeBody {
                session_id: session_key,
                input_text: "Hi",
                session_attributes: &no_attributes,
                end_session: true,
            })
            .send()
            .await
            .context("assistant backend unreachable")?
            .error_for_status()
            .context("session invalidation rejected")?;
        debug!("backend session invalidated: {}", session_key);
        Ok(())
    }
}
