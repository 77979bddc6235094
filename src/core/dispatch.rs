//! Sends conversation history to the provider and reports the answer back
//! over a channel, tagged with the id of the request it belongs to.

use std::fmt;

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{
    ChatCompletion, ChatMessage, ChatRequest, ChatResponse, ImageGenerationRequest,
    ImageGenerationResponse, WebSearchOptions,
};
use crate::utils::url::api_url;

const IMAGE_SIZE: &str = "1024x1024";

/// A response that arrived in one piece rather than as a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Complete(String),
    Image { url: String, prompt: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Chunk(String),
    Complete(DispatchOutcome),
    Error(String),
    End,
}

#[derive(Debug)]
pub enum DispatchError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    Malformed(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Http(err) => write!(f, "{}", format_api_error(&err.to_string())),
            DispatchError::Api { body, .. } => write!(f, "{}", format_api_error(body)),
            DispatchError::Malformed(detail) => {
                write!(f, "Unexpected response from provider: {detail}")
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Http(err)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    /// `stream: false` asks for the whole answer in one response body.
    Chat { web_search: bool, stream: bool },
    ImageGeneration { prompt: String },
}

pub struct DispatchParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub mode: DispatchMode,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

type StreamSender = mpsc::UnboundedSender<(StreamMessage, u64)>;

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Returns true once the stream is over.
fn handle_data_payload(payload: &str, tx: &StreamSender, stream_id: u64) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send((StreamMessage::End, stream_id));
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(content) = response
                .choices
                .first()
                .and_then(|choice| choice.delta.content.as_ref())
            {
                if !content.is_empty() {
                    let _ = tx.send((StreamMessage::Chunk(content.clone()), stream_id));
                }
            }
            false
        }
        Err(_) => {
            if payload.trim().is_empty() {
                return false;
            }
            let _ = tx.send((StreamMessage::Error(format_api_error(payload)), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
            true
        }
    }
}

fn process_sse_line(line: &str, tx: &StreamSender, stream_id: u64) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx, stream_id))
        .unwrap_or(false)
}

fn process_line_bytes(bytes: &[u8], tx: &StreamSender, stream_id: u64) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(line) => process_sse_line(line.trim(), tx, stream_id),
        Err(err) => {
            warn!(stream_id, error = %err, "skipping invalid UTF-8 in stream");
            false
        }
    }
}

/// Splits the response body into lines, holding back a partial last line
/// until more bytes arrive or the body ends.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends `bytes` and processes every complete line. Returns true once
    /// the stream is over.
    fn feed(&mut self, bytes: &[u8], tx: &StreamSender, stream_id: u64) -> bool {
        self.pending.extend_from_slice(bytes);
        while let Some(newline_pos) = memchr(b'\n', &self.pending) {
            let should_end = process_line_bytes(&self.pending[..newline_pos], tx, stream_id);
            self.pending.drain(..=newline_pos);
            if should_end {
                return true;
            }
        }
        false
    }

    /// The body ended: a last line without a newline still counts, then the
    /// stream is closed unless that line already closed it.
    fn finish(self, tx: &StreamSender, stream_id: u64) {
        if !self.pending.is_empty() && process_line_bytes(&self.pending, tx, stream_id) {
            return;
        }
        let _ = tx.send((StreamMessage::End, stream_id));
    }
}

pub(crate) fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// "API Error: summary" followed by the body in a fenced block, so the
/// notification and the transcript log both stay readable.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty) = serde_json::to_string_pretty(&value) {
            return match extract_error_summary(&value).filter(|s| !s.is_empty()) {
                Some(summary) => format!("API Error: {summary}\n```json\n{pretty}\n```"),
                None => format!("API Error:\n```json\n{pretty}\n```"),
            };
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{trimmed}\n```")
    } else {
        format!("API Error:\n```\n{trimmed}\n```")
    }
}

/// First line of a formatted API error, short enough for a toast.
pub fn error_headline(formatted: &str) -> &str {
    formatted.lines().next().unwrap_or(formatted).trim_end_matches(':')
}

#[derive(Clone)]
pub struct RequestDispatcher {
    tx: StreamSender,
}

impl RequestDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Starts the request on the runtime. Everything it produces, including
    /// failures, arrives on the receiver under `params.stream_id`; nothing is
    /// sent once `cancel_token` fires.
    pub fn dispatch(&self, params: DispatchParams) {
        let tx = self.tx.clone();
        let cancel_token = params.cancel_token.clone();
        let stream_id = params.stream_id;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "request cancelled");
                }
                _ = run_request(params, &tx) => {}
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}

async fn run_request(params: DispatchParams, tx: &StreamSender) {
    let stream_id = params.stream_id;
    let result = match &params.mode {
        DispatchMode::Chat { web_search, stream } => {
            send_chat(&params, *web_search, *stream, tx).await
        }
        DispatchMode::ImageGeneration { prompt } => generate_image(&params, prompt)
            .await
            .map(|outcome| {
                let _ = tx.send((StreamMessage::Complete(outcome), stream_id));
                let _ = tx.send((StreamMessage::End, stream_id));
            }),
    };
    if let Err(err) = result {
        warn!(stream_id, error = %err, "request failed");
        let _ = tx.send((StreamMessage::Error(err.to_string()), stream_id));
        let _ = tx.send((StreamMessage::End, stream_id));
    }
}

async fn send_chat(
    params: &DispatchParams,
    web_search: bool,
    stream: bool,
    tx: &StreamSender,
) -> Result<(), DispatchError> {
    let stream_id = params.stream_id;
    let request = ChatRequest {
        model: params.model.clone(),
        messages: params.messages.clone(),
        stream,
        web_search_options: web_search.then(WebSearchOptions::default),
    };

    let response = params
        .client
        .post(api_url(&params.base_url, "chat/completions"))
        .bearer_auth(&params.api_key)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(DispatchError::Api { status, body });
    }

    // Some compatible servers ignore `stream` and answer in one piece.
    if !stream || is_json_response(&response) {
        debug!(stream_id, "reading whole completion");
        let body = response.text().await?;
        let outcome = completion_outcome(&body)?;
        let _ = tx.send((StreamMessage::Complete(outcome), stream_id));
        let _ = tx.send((StreamMessage::End, stream_id));
        return Ok(());
    }

    let mut body = response.bytes_stream();
    let mut lines = LineBuffer::default();
    while let Some(chunk) = body.next().await {
        if params.cancel_token.is_cancelled() {
            return Ok(());
        }
        if lines.feed(&chunk?, tx, stream_id) {
            return Ok(());
        }
    }
    lines.finish(tx, stream_id);
    Ok(())
}

fn is_json_response(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

fn completion_outcome(body: &str) -> Result<DispatchOutcome, DispatchError> {
    let completion: ChatCompletion =
        serde_json::from_str(body).map_err(|err| DispatchError::Malformed(err.to_string()))?;
    Ok(DispatchOutcome::Complete(completion.into_text()))
}

async fn generate_image(
    params: &DispatchParams,
    prompt: &str,
) -> Result<DispatchOutcome, DispatchError> {
    let request = ImageGenerationRequest {
        model: params.model.clone(),
        prompt: prompt.to_string(),
        n: 1,
        size: IMAGE_SIZE.to_string(),
    };

    let response = params
        .client
        .post(api_url(&params.base_url, "images/generations"))
        .bearer_auth(&params.api_key)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(DispatchError::Api { status, body });
    }

    let body: ImageGenerationResponse = response.json().await?;
    image_outcome(body, prompt)
}

fn image_outcome(
    body: ImageGenerationResponse,
    prompt: &str,
) -> Result<DispatchOutcome, DispatchError> {
    let image = body
        .data
        .into_iter()
        .next()
        .ok_or_else(|| DispatchError::Malformed("no image in response".into()))?;
    let url = match (image.url, image.b64_json) {
        (Some(url), _) => url,
        (None, Some(b64)) => format!("data:image/png;base64,{b64}"),
        (None, None) => return Err(DispatchError::Malformed("image has no data".into())),
    };
    Ok(DispatchOutcome::Image {
        url,
        prompt: image.revised_prompt.unwrap_or_else(|| prompt.to_string()),
    })
}

/// Markdown stored as the assistant record's content for a generated image.
pub fn image_markdown(url: &str, prompt: &str) -> String {
    let alt = prompt.replace(['[', ']', '\n'], " ");
    format!("![{}]({url})", alt.trim())
}
