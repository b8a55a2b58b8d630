use super::{GatewayError, TaskGateway};
use crate::download::ingest::ProgressEvent;
use crate::download::task::TaskId;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Delay before reopening a dropped event stream
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Gateway to a backend reachable over HTTP.
///
/// Operations are `POST {base}/api/{operation}` with a JSON body. Progress
/// events arrive as newline-delimited JSON on `GET {base}/api/events`.
pub struct HttpGateway {
    client: reqwest::Client,
    base: Url,
    ready: AtomicBool,
}

impl HttpGateway {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, GatewayError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| GatewayError::InvalidEndpoint(format!("{}: {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base,
            ready: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, operation: &str) -> Result<Url, GatewayError> {
        self.base
            .join(&format!("api/{}", operation))
            .map_err(|e| GatewayError::InvalidEndpoint(e.to_string()))
    }

    /// Probe the backend and mark the gateway ready if it answers
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let result = self.ping().await;
        self.ready.store(result.is_ok(), Ordering::SeqCst);
        match &result {
            Ok(()) => tracing::info!("Backend ready at {}", self.base),
            Err(e) => tracing::warn!("Backend at {} not reachable: {}", self.base, e),
        }
        result
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        let response = self
            .client
            .get(self.endpoint("ping")?)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(response.status())
    }

    async fn call(&self, operation: &str, body: Value) -> Result<Value, GatewayError> {
        tracing::trace!("POST api/{} {}", operation, body);
        let response = self
            .client
            .post(self.endpoint(operation)?)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&body)?)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(response.status())?;

        let text = response.text().await.map_err(map_transport)?;
        // Non-JSON bodies are kept verbatim and decoded leniently later
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// Read the event stream until it ends, forwarding every event
    pub async fn subscribe(&self, tx: &mpsc::Sender<ProgressEvent>) -> Result<(), GatewayError> {
        let response = self
            .client
            .get(self.endpoint("events")?)
            .send()
            .await
            .map_err(map_transport)?;
        check_status(response.status())?;
        tracing::debug!("Event stream opened");

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk.map_err(map_transport)?);
            for line in drain_lines(&mut buffer) {
                if let Some(event) = decode_event_line(&line) {
                    if tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }

        // Final line without a trailing newline
        if let Some(event) = decode_event_line(&buffer) {
            let _ = tx.send(event).await;
        }
        tracing::debug!("Event stream closed by backend");
        Ok(())
    }

    /// Keep an event stream open in the background, reconnecting after
    /// failures, until the receiver goes away
    pub fn spawn_event_stream(self: Arc<Self>, tx: mpsc::Sender<ProgressEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while !tx.is_closed() {
                if !self.ready.load(Ordering::SeqCst) && self.connect().await.is_err() {
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
                if let Err(e) = self.subscribe(&tx).await {
                    tracing::warn!("Event stream error: {}", e);
                }
                if tx.is_closed() {
                    break;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        })
    }
}

fn map_transport(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e)
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), GatewayError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(GatewayError::Status {
            status: status.as_u16(),
        })
    }
}

/// Split complete lines off the front of `buffer`
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let mut line: Vec<u8> = buffer.drain(..=pos).collect();
        line.pop();
        lines.push(line);
    }
    lines
}

fn decode_event_line(line: &[u8]) -> Option<ProgressEvent> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match ProgressEvent::from_json(text) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("Skipping unreadable event {:?}: {}", text, e);
            None
        }
    }
}

#[async_trait]
impl TaskGateway for HttpGateway {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn analyze(&self, url: &str) -> Result<Value, GatewayError> {
        self.call("analyze", json!({ "url": url })).await
    }

    async fn start_download(&self, url: &str, format_id: &str) -> Result<Value, GatewayError> {
        self.call("start_download", json!({ "url": url, "format_id": format_id }))
            .await
    }

    async fn start_batch_download(
        &self,
        urls: &[String],
        format_id: &str,
    ) -> Result<Value, GatewayError> {
        self.call(
            "start_batch_download",
            json!({ "urls": urls, "format_id": format_id }),
        )
        .await
    }

    async fn pause_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.call("pause_download", json!({ "task_id": task_id })).await
    }

    async fn resume_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.call("resume_download", json!({ "task_id": task_id })).await
    }

    async fn retry_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.call("retry_download", json!({ "task_id": task_id })).await
    }

    async fn cancel_download(&self, task_id: &TaskId) -> Result<Value, GatewayError> {
        self.call("cancel_download", json!({ "task_id": task_id })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let gateway = HttpGateway::new("http://127.0.0.1:8765/backend", Duration::from_secs(1)).unwrap();
        assert_eq!(
            gateway.endpoint("ping").unwrap().as_str(),
            "http://127.0.0.1:8765/backend/api/ping"
        );
        assert!(!gateway.is_ready());
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpGateway::new("not a url", Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, GatewayError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_drain_lines_keeps_partial_tail() {
        let mut buffer = b"{\"a\":1}\n{\"b\":2}\n{\"c\"".to_vec();
        let lines = drain_lines(&mut buffer);
        assert_eq!(lines, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
        assert_eq!(buffer, b"{\"c\"".to_vec());
    }

    #[test]
    fn test_decode_event_line_skips_noise() {
        assert!(decode_event_line(b"   \r").is_none());
        assert!(decode_event_line(b"not json").is_none());
        let event = decode_event_line(b"{\"type\":\"complete\",\"task_id\":\"t1\"}\r").unwrap();
        assert_eq!(event.task_id().as_str(), "t1");
    }
}
