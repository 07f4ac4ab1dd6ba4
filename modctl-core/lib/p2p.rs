//! P2P transport: an alternative to [`crate::remote::RemoteClient::pull_blob`]
//! that delegates the actual transfer to a local daemon (Dragonfly-style)
//! instead of fetching blob bytes directly from the registry.
//!
//! The daemon writes straight to `output_path` and reports progress over a
//! streaming response of newline-delimited JSON events; this client carries
//! no gRPC dependency (none exists in the corpus's stack) and instead speaks
//! the daemon's HTTP endpoint with `reqwest`, the same crate the Remote
//! Client already uses for its own bearer-token exchange.

use std::path::{Path, PathBuf};

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio_util::{io::StreamReader, sync::CancellationToken};

use crate::{ModctlError, ModctlResult, progress::ProgressHandle};

/// One P2P fetch request, matching `{url, outputPath,
/// authorizationHeader, priority}` shape.
#[derive(Debug, Clone, Serialize)]
pub struct P2pRequest {
    /// The blob's pullable URL on the origin registry.
    pub url: String,

    /// Where the daemon should write the fetched bytes.
    #[serde(rename = "outputPath")]
    pub output_path: PathBuf,

    /// `Bearer <token>` header forwarded from [`crate::remote::RemoteClient::get_auth_token`],
    /// if the origin requires authentication.
    #[serde(rename = "authorizationHeader", skip_serializing_if = "Option::is_none")]
    pub authorization_header: Option<String>,

    /// Relative fetch priority, higher values fetched first by the daemon's
    /// own scheduler.
    pub priority: u8,
}

impl P2pRequest {
    /// Builds a request for `url`, to be written at `output_path`, with no
    /// priority preference (priority `0`).
    pub fn new(url: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        P2pRequest {
            url: url.into(),
            output_path: output_path.into(),
            authorization_header: None,
            priority: 0,
        }
    }

    /// Sets the `Authorization` header value, formatted as `Bearer <token>`
    /// per this crate's Open Question resolution (DESIGN.md item 2).
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.authorization_header = Some(format!("Bearer {}", token.into()));
        self
    }

    /// Sets the fetch priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// One event in a P2P fetch's response stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum P2pEvent {
    /// The daemon has accepted the request and begun fetching.
    Started,
    /// One piece finished downloading; `length` is its byte count.
    PieceFinished {
        /// Bytes written by this piece.
        length: u64,
    },
}

/// A client over a local P2P daemon's HTTP endpoint.
pub struct P2pClient {
    http: reqwest::Client,
    endpoint: String,
}

impl P2pClient {
    /// Builds a client that speaks to a daemon listening at `endpoint`
    /// (e.g. `http://127.0.0.1:65001`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        P2pClient {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Issues `request`, driving `on_piece` once per `PieceFinished` event
    /// so the caller can advance a [`ProgressHandle`] as pieces land, and
    /// returning once the daemon closes the response stream (implying the
    /// fetch completed; the daemon itself does not emit an explicit
    /// "finished" event distinct from stream closure ).
    pub async fn fetch(&self, request: &P2pRequest, handle: &dyn ProgressHandle, cancel: &CancellationToken) -> ModctlResult<()> {
        let url = format!("{}/fetch", self.endpoint);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ModctlError::Transport(format!("starting p2p fetch for {}: {e}", request.url)))?;

        if !response.status().is_success() {
            return Err(ModctlError::Transport(format!(
                "p2p daemon rejected fetch for {} with status {}",
                request.url,
                response.status()
            )));
        }

        let byte_stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = StreamReader::new(byte_stream);
        let mut lines = tokio::io::BufReader::new(reader).lines();

        loop {
            if cancel.is_cancelled() {
                return Err(ModctlError::Canceled);
            }

            let line = tokio::select! {
                line = lines.next_line() => line.map_err(ModctlError::Storage)?,
                _ = cancel.cancelled() => return Err(ModctlError::Canceled),
            };

            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }

            let event: P2pEvent = serde_json::from_str(&line)?;
            match event {
                P2pEvent::Started => {}
                P2pEvent::PieceFinished { length } => handle.inc(length),
            }
        }

        Ok(())
    }
}

/// True if `output_path` was actually written by a completed fetch (the
/// orchestrator's sanity check before post-processing, since a daemon that
/// closes its stream early without error would otherwise look successful).
pub async fn verify_output_written(output_path: &Path) -> bool {
    tokio::fs::metadata(output_path).await.map(|m| m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_camel_case_fields() {
        let request = P2pRequest::new("https://registry.example/v2/demo/blobs/sha256:abc", "/tmp/out.tar").with_bearer_token("tok123").with_priority(5);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["outputPath"], "/tmp/out.tar");
        assert_eq!(json["authorizationHeader"], "Bearer tok123");
        assert_eq!(json["priority"], 5);
    }

    #[test]
    fn parses_started_and_piece_finished_events() {
        let started: P2pEvent = serde_json::from_str(r#"{"event":"started"}"#).unwrap();
        assert!(matches!(started, P2pEvent::Started));

        let piece: P2pEvent = serde_json::from_str(r#"{"event":"pieceFinished","length":4096}"#).unwrap();
        assert!(matches!(piece, P2pEvent::PieceFinished { length: 4096 }));
    }

    #[tokio::test]
    async fn verify_output_written_false_for_missing_file() {
        assert!(!verify_output_written(Path::new("/nonexistent/does-not-exist")).await);
    }
}
