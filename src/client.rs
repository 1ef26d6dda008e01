//! Gmail API client with retry logic

use async_trait::async_trait;
use google_gmail1::api::{Label, Message as ApiMessage, MessagePart, ModifyThreadRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::error::{GmailError, Result};
use crate::models::{Header, LabelInfo, Message, ThreadRef};

const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
const LABELS_SCOPE: &str = "https://www.googleapis.com/auth/gmail.labels";

/// Upper bound for a single listing call
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Gmail operations used by the labeler
///
/// Every method acts on the authenticated mailbox ("me").
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List up to `max` of the most recent threads
    async fn list_recent_threads(&self, max: u32) -> Result<Vec<ThreadRef>>;

    /// Fetch every message of a thread with headers and decoded body
    async fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<Message>>;

    /// List all labels visible to the user
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a user label shown in both the label list and message list
    async fn create_label(&self, name: &str) -> Result<LabelInfo>;

    /// Add labels to every message of a thread in one modify call
    async fn apply_labels(&self, thread_id: &str, label_ids: &[String]) -> Result<()>;
}

/// Production Gmail client backed by the google-gmail1 hub
///
/// Label listing, label creation and thread modification are retried with
/// exponential backoff. Thread listing and fetching are left to the caller's
/// retry policy so its attempt budget stays exact.
pub struct ProductionGmailClient {
    hub: GmailHub,
    query: Option<String>,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self { hub, query: None }
    }

    /// Restrict thread listing with a Gmail search query
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.trim().is_empty());
        self
    }

    /// Check if an error is retryable
    fn should_retry(error: &GmailError) -> bool {
        matches!(
            error,
            GmailError::ServerError { .. }
                | GmailError::RateLimitExceeded { .. }
                | GmailError::NetworkError(_)
        )
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(
        operation_name: &str,
        max_retries: u32,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name,
                        attempts,
                        max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wrap a call in [`API_TIMEOUT`], mapping expiry to a network error
async fn with_timeout<T, Fut>(operation_name: &str, call: Fut) -> Result<T>
where
    Fut: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(API_TIMEOUT, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Gmail API {} call timed out after {:?}", operation_name, API_TIMEOUT);
            Err(GmailError::NetworkError(format!(
                "API call timed out after {:?}",
                API_TIMEOUT
            )))
        }
    }
}

/// Convert an API message into headers plus plain-text body
fn parse_message(msg: ApiMessage) -> Message {
    let id = msg.id.unwrap_or_default();
    let Some(payload) = msg.payload else {
        return Message {
            id,
            ..Default::default()
        };
    };

    let headers = payload
        .headers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|h| match (&h.name, &h.value) {
            (Some(name), Some(value)) => Some(Header::new(name.as_str(), value.as_str())),
            _ => None,
        })
        .collect();

    Message {
        id,
        headers,
        body: extract_body(&payload),
    }
}

/// First `text/plain` part found depth-first, else the top-level body
fn extract_body(payload: &MessagePart) -> Option<String> {
    find_plain_text(payload)
        .or_else(|| body_text(payload))
        .filter(|body| !body.is_empty())
}

fn find_plain_text(part: &MessagePart) -> Option<String> {
    let is_plain = part
        .mime_type
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case("text/plain"));
    if is_plain {
        if let Some(text) = body_text(part) {
            return Some(text);
        }
    }

    part.parts
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find_map(find_plain_text)
}

fn body_text(part: &MessagePart) -> Option<String> {
    part.body
        .as_ref()
        .and_then(|body| body.data.as_deref())
        .filter(|data| !data.is_empty())
        .map(|data| String::from_utf8_lossy(data).into_owned())
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_recent_threads(&self, max: u32) -> Result<Vec<ThreadRef>> {
        let call = async {
            let mut call = self.hub.users().threads_list("me").max_results(max);
            if let Some(query) = self.query.as_deref() {
                call = call.q(query);
            }
            let (_, response) = call.add_scope(MODIFY_SCOPE).doit().await?;
            Ok::<_, GmailError>(response)
        };
        let response = with_timeout("threads_list", call).await?;

        let threads: Vec<ThreadRef> = response
            .threads
            .unwrap_or_default()
            .into_iter()
            .filter_map(|thread| thread.id.map(ThreadRef::new))
            .take(max as usize)
            .collect();

        debug!("Listed {} threads", threads.len());
        Ok(threads)
    }

    async fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let call = async {
            let (_, thread) = self
                .hub
                .users()
                .threads_get("me", thread_id)
                .format("full")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;
            Ok::<_, GmailError>(thread)
        };
        let thread = with_timeout("threads_get", call).await?;

        Ok(thread
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(parse_message)
            .collect())
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Self::with_retry("list_labels", 3, || async {
            let call = async {
                debug!("Calling Gmail API to list labels...");
                let (_, response) = self
                    .hub
                    .users()
                    .labels_list("me")
                    .add_scope(LABELS_SCOPE)
                    .doit()
                    .await?;
                Ok::<_, GmailError>(response)
            };
            let response = with_timeout("labels_list", call).await?;

            let labels: Vec<LabelInfo> = response
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| match (label.id, label.name) {
                    (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                    _ => None,
                })
                .collect();

            debug!("Successfully parsed {} labels", labels.len());
            Ok(labels)
        })
        .await
    }

    async fn create_label(&self, name: &str) -> Result<LabelInfo> {
        Self::with_retry("create_label", 3, || async {
            let label = Label {
                name: Some(name.to_string()),
                message_list_visibility: Some("show".to_string()),
                label_list_visibility: Some("labelShow".to_string()),
                ..Default::default()
            };

            let (_, created) = self
                .hub
                .users()
                .labels_create(label, "me")
                .add_scope(LABELS_SCOPE)
                .doit()
                .await?;

            let id = created.id.ok_or_else(|| {
                GmailError::ApiError(format!("Created label '{}' has no ID", name))
            })?;
            Ok(LabelInfo::new(id, created.name.unwrap_or_else(|| name.to_string())))
        })
        .await
    }

    async fn apply_labels(&self, thread_id: &str, label_ids: &[String]) -> Result<()> {
        if label_ids.is_empty() {
            return Ok(());
        }

        Self::with_retry("apply_labels", 3, || async {
            let request = ModifyThreadRequest {
                add_label_ids: Some(label_ids.to_vec()),
                remove_label_ids: None,
            };

            self.hub
                .users()
                .threads_modify(request, "me", thread_id)
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            Ok(())
        })
        .await
    }
}

#[async_trait]
impl GmailClient for Arc<ProductionGmailClient> {
    async fn list_recent_threads(&self, max: u32) -> Result<Vec<ThreadRef>> {
        (**self).list_recent_threads(max).await
    }

    async fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        (**self).get_thread_messages(thread_id).await
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        (**self).list_labels().await
    }

    async fn create_label(&self, name: &str) -> Result<LabelInfo> {
        (**self).create_label(name).await
    }

    async fn apply_labels(&self, thread_id: &str, label_ids: &[String]) -> Result<()> {
        (**self).apply_labels(thread_id, label_ids).await
    }
}
