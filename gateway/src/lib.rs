//! Client for the external diagram generation service.
//!
//! The service exposes three actions over a single POST endpoint, each one
//! request/response round trip: free-text update, generate-from-files, and
//! update-from-files. There is no streaming and no retry; the orchestrator
//! surfaces failures to the user, who re-triggers manually.
//!
//! # Error Handling
//!
//! Every failure mode - transport errors, non-success statuses, malformed
//! bodies - collapses into one opaque [`GatewayError`]. Callers only need to
//! know that the operation failed and what to show the user; no partial
//! results escape.

mod wire;

pub use wire::{GatewayRequest, GatewayResponse};

use std::sync::OnceLock;
use std::time::Duration;

use mermake_types::{DiagramKind, FileRecord, strip_mermaid_fences};
use thiserror::Error;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Opaque failure from the generation service.
///
/// The message is suitable for display; no error subtypes are exposed.
#[derive(Debug, Error)]
#[error("generation request failed: {0}")]
pub struct GatewayError(String);

impl GatewayError {
    /// Wrap a display message. Also used by test doubles implementing
    /// [`DiagramGateway`].
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Boundary abstraction over the generation service.
///
/// The engine is generic over this trait so its state machine can be tested
/// against an in-memory double instead of a live HTTP endpoint.
#[allow(async_fn_in_trait)]
pub trait DiagramGateway {
    /// Rewrite `current` according to a natural-language `instruction`.
    async fn update_free_text(
        &self,
        current: &str,
        instruction: &str,
    ) -> Result<String, GatewayError>;

    /// Produce a brand-new diagram of `kind` from the file corpus.
    async fn generate_from_files(
        &self,
        files: &[FileRecord],
        kind: DiagramKind,
        focus_hint: Option<&str>,
    ) -> Result<String, GatewayError>;

    /// Merge new information from the file corpus into `current` without
    /// changing its diagram kind.
    async fn update_from_files(
        &self,
        current: &str,
        files: &[FileRecord],
        focus_hint: Option<&str>,
    ) -> Result<String, GatewayError>;
}

/// Shared HTTP client.
///
/// No total request timeout is set: a hung round trip is left in flight by
/// design rather than guessed at with an arbitrary deadline.
fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build HTTP client: {e}. Falling back to defaults.");
                reqwest::Client::new()
            })
    })
}

async fn read_capped_error_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(body) => {
            let text = String::from_utf8_lossy(&body);
            if text.len() > MAX_ERROR_BODY_BYTES {
                let mut end = MAX_ERROR_BODY_BYTES;
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...(truncated)", &text[..end])
            } else {
                text.into_owned()
            }
        }
        Err(_) => String::new(),
    }
}

/// HTTP implementation of [`DiagramGateway`].
#[derive(Debug, Clone)]
pub struct HttpGateway {
    endpoint: String,
    api_key: String,
}

impl HttpGateway {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// One round trip: POST the envelope, check the status, parse
    /// `{result}`, and strip code fences from the payload.
    async fn send(&self, request: GatewayRequest<'_>) -> Result<String, GatewayError> {
        let action = request.action();
        tracing::debug!(action, "Sending generation request");

        let response = http_client()
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(action, "Generation request transport failure: {e}");
                GatewayError::new(format!("could not reach the generation service: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            tracing::warn!(action, %status, "Generation service returned an error");
            return Err(GatewayError::new(format!(
                "generation service error {status}: {body}"
            )));
        }

        let body: GatewayResponse = response.json().await.map_err(|e| {
            tracing::warn!(action, "Malformed generation service response: {e}");
            GatewayError::new(format!("malformed response from generation service: {e}"))
        })?;

        Ok(strip_mermaid_fences(&body.result))
    }
}

impl DiagramGateway for HttpGateway {
    async fn update_free_text(
        &self,
        current: &str,
        instruction: &str,
    ) -> Result<String, GatewayError> {
        self.send(GatewayRequest::UpdateMermaid {
            current_code: current,
            instruction,
        })
        .await
    }

    async fn generate_from_files(
        &self,
        files: &[FileRecord],
        kind: DiagramKind,
        focus_hint: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.send(GatewayRequest::GenerateDiagram {
            file_infos: files,
            diagram_type: kind,
            user_instruction: focus_hint,
        })
        .await
    }

    async fn update_from_files(
        &self,
        current: &str,
        files: &[FileRecord],
        focus_hint: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.send(GatewayRequest::UpdateDiagram {
            current_code: current,
            file_infos: files,
            user_instruction: focus_hint,
        })
        .await
    }
}
