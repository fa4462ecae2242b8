//! Control-plane progress callback
//!
//! Streams report lifecycle progress to an external control plane over HTTP.
//! Server errors and transport failures are retried with exponential backoff;
//! a 4xx means the control plane rejected the payload and retrying cannot
//! help, so it fails immediately.

use std::time::Duration;

use serde::Serialize;

use crate::core::{CoreError, CoreResult, TaskState};
use crate::streaming::StreamResult;

/// Progress payload posted to the control plane
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    /// Task id
    pub task_id: String,

    /// Subtask id
    pub subtask_id: String,

    /// Progress percentage, 0-100
    pub progress: u8,

    /// Externally visible task state
    pub status: TaskState,

    /// Optional human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Final structured result, on terminal updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StreamResult>,
}

impl ProgressUpdate {
    /// Create an update. The state is mapped to its external form, so
    /// INTERRUPTED never leaves the process.
    pub fn new(
        task_id: impl Into<String>,
        subtask_id: impl Into<String>,
        progress: u8,
        status: TaskState,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            subtask_id: subtask_id.into(),
            progress: progress.min(100),
            status: status.as_external(),
            message: None,
            result: None,
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the final result
    pub fn with_result(mut self, result: StreamResult) -> Self {
        self.result = Some(result);
        self
    }
}

/// HTTP client for the control-plane callback endpoint
pub struct ControlPlaneClient {
    endpoint: String,
    auth_token: Option<String>,
    client: reqwest::Client,
    max_attempts: u32,
}

impl ControlPlaneClient {
    /// Create a client for the given callback endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: None,
            client: reqwest::Client::new(),
            max_attempts: 3,
        }
    }

    /// Attach a bearer token sent with every update
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the total attempt budget (including the first try)
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Backoff before retry number `attempt` (0-based), capped at 8s
    pub fn backoff_delay(attempt: u32) -> Duration {
        let millis = 500u64.saturating_mul(1u64 << attempt.min(4));
        Duration::from_millis(millis.min(8_000))
    }

    /// Post a progress update, retrying transient failures
    pub async fn send(&self, update: &ProgressUpdate) -> CoreResult<()> {
        let mut last_error = String::new();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(Self::backoff_delay(attempt - 1)).await;
            }

            let mut request = self.client.post(&self.endpoint).json(update);
            if let Some(token) = &self.auth_token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(
                        task_id = %update.task_id,
                        status = %update.status,
                        "[ControlPlaneClient] Progress update delivered"
                    );
                    return Ok(());
                }
                Ok(response) if response.status().is_client_error() => {
                    // The payload was rejected; retrying cannot change that.
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(CoreError::Callback(format!(
                        "control plane rejected update: {} {}",
                        status, body
                    )));
                }
                Ok(response) => {
                    last_error = format!("control plane returned {}", response.status());
                    tracing::warn!(
                        task_id = %update.task_id,
                        attempt = attempt + 1,
                        "[ControlPlaneClient] {}",
                        last_error
                    );
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        task_id = %update.task_id,
                        attempt = attempt + 1,
                        "[ControlPlaneClient] Callback transport error: {}",
                        last_error
                    );
                }
            }
        }

        Err(CoreError::Callback(format!(
            "callback failed after {} attempts: {}",
            self.max_attempts, last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(ControlPlaneClient::backoff_delay(0), Duration::from_millis(500));
        assert_eq!(ControlPlaneClient::backoff_delay(1), Duration::from_millis(1_000));
        assert_eq!(ControlPlaneClient::backoff_delay(2), Duration::from_millis(2_000));
        assert_eq!(ControlPlaneClient::backoff_delay(10), Duration::from_millis(8_000));
    }

    #[test]
    fn test_update_maps_state_to_external() {
        let update = ProgressUpdate::new("task-1", "sub-1", 50, TaskState::Interrupted);
        assert_eq!(update.status, TaskState::Cancelled);

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "CANCELLED");
        assert_eq!(json["progress"], 50);
        // Empty optionals are omitted from the payload.
        assert!(json.get("message").is_none());
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_progress_is_clamped() {
        let update = ProgressUpdate::new("task-1", "sub-1", 250, TaskState::Running);
        assert_eq!(update.progress, 100);
    }
}
