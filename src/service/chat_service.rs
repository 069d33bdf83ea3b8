use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;

#[derive(Debug, Deserialize)]
struct ThreadCreatedResponse {
    #[serde(rename = "threadId")]
    thread_id: String,
}

/// Thin client for the internal messaging service. Every call here is
/// best-effort: chat being down must never fail a proposal workflow.
#[derive(Debug, Clone)]
pub struct ChatService {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl ChatService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.chat_service_url.clone(),
        }
    }

    /// Opens a negotiation thread for a proposal. Returns None when messaging
    /// is not configured or the call fails.
    pub async fn create_thread(&self, proposal_id: Uuid, participants: [Uuid; 2]) -> Option<String> {
        let base_url = self.base_url.as_deref()?;

        let body = json!({
            "kind": "work_proposal",
            "referenceId": proposal_id,
            "participants": participants,
        });

        let result = self
            .client
            .post(format!("{}/internal/threads", base_url))
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<ThreadCreatedResponse>().await {
                    Ok(created) => Some(created.thread_id),
                    Err(e) => {
                        tracing::warn!("chat thread response could not be decoded: {}", e);
                        None
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(
                    "chat service returned {} while creating a thread for proposal {}",
                    response.status(),
                    proposal_id
                );
                None
            }
            Err(e) => {
                tracing::warn!("chat service unreachable while creating a thread: {}", e);
                None
            }
        }
    }

    /// Posts a system line into an existing thread. Failures are logged,
    /// never surfaced.
    pub async fn post_system_message(&self, thread_id: &str, body: &str) {
        let Some(base_url) = self.base_url.as_deref() else {
            return;
        };

        let payload = json!({
            "threadId": thread_id,
            "kind": "system",
            "body": body,
        });

        let result = self
            .client
            .post(format!("{}/internal/messages", base_url))
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    "chat service returned {} while posting to thread {}",
                    response.status(),
                    thread_id
                );
            }
            Err(e) => {
                tracing::warn!("chat message delivery failed for thread {}: {}", thread_id, e);
            }
            _ => {}
        }
    }
}
