//! Common test utilities and fixtures
#![allow(dead_code)]

use gmail_labeler::client::GmailClient;
use gmail_labeler::error::{GmailError, Result};
use gmail_labeler::models::{Header, LabelInfo, Message, ThreadRef};
use mockall::mock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Create a header
pub fn header(name: &str, value: &str) -> Header {
    Header::new(name, value)
}

/// Create a message with the given headers and optional plain-text body
pub fn message(id: &str, headers: &[(&str, &str)], body: Option<&str>) -> Message {
    Message {
        id: id.to_string(),
        headers: headers.iter().map(|(n, v)| header(n, v)).collect(),
        body: body.map(str::to_string),
    }
}

/// Create a message sent by `from` to `to`
pub fn simple_message(id: &str, from: &str, to: &str, body: Option<&str>) -> Message {
    message(id, &[("From", from), ("To", to)], body)
}

/// Create a test LabelInfo
pub fn label(id: &str, name: &str) -> LabelInfo {
    LabelInfo::new(id, name)
}

/// Kinds of scripted fetch failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    Transient,
    NotFound,
}

impl FetchFailure {
    fn to_error(self, thread_id: &str) -> GmailError {
        match self {
            FetchFailure::Transient => GmailError::NetworkError("connection reset".to_string()),
            FetchFailure::NotFound => GmailError::NotFound(format!("thread {}", thread_id)),
        }
    }
}

/// Stateful in-memory mailbox
///
/// Threads are listed in insertion order. Labels behave like Gmail: names are
/// unique case-insensitively and creating a duplicate fails.
#[derive(Default)]
pub struct FakeGmail {
    thread_order: Mutex<Vec<String>>,
    threads: Mutex<HashMap<String, Vec<Message>>>,
    labels: Mutex<Vec<LabelInfo>>,
    /// thread id -> (remaining failures, kind)
    fetch_failures: Mutex<HashMap<String, (usize, FetchFailure)>>,
    fetch_calls: Mutex<HashMap<String, usize>>,
    create_calls: Mutex<Vec<String>>,
    list_label_calls: Mutex<usize>,
    failing_creates: Mutex<HashSet<String>>,
    fail_listing: Mutex<bool>,
    applied: Mutex<Vec<(String, Vec<String>)>>,
    cancel_after_fetches: Mutex<Option<(usize, CancellationToken)>>,
}

impl FakeGmail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thread(&self, thread_id: &str, messages: Vec<Message>) {
        self.thread_order.lock().unwrap().push(thread_id.to_string());
        self.threads
            .lock()
            .unwrap()
            .insert(thread_id.to_string(), messages);
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.labels.lock().unwrap().push(label(id, name));
    }

    /// Fail the next `times` fetches of `thread_id`
    pub fn fail_fetch(&self, thread_id: &str, times: usize, kind: FetchFailure) {
        self.fetch_failures
            .lock()
            .unwrap()
            .insert(thread_id.to_string(), (times, kind));
    }

    /// Make creation of `name` fail with a permission error
    pub fn fail_create(&self, name: &str) {
        self.failing_creates.lock().unwrap().insert(name.to_lowercase());
    }

    pub fn fail_listing(&self) {
        *self.fail_listing.lock().unwrap() = true;
    }

    /// Cancel `token` once `fetches` thread fetches have completed
    pub fn cancel_after(&self, fetches: usize, token: CancellationToken) {
        *self.cancel_after_fetches.lock().unwrap() = Some((fetches, token));
    }

    pub fn fetch_calls(&self, thread_id: &str) -> usize {
        self.fetch_calls
            .lock()
            .unwrap()
            .get(thread_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetch_calls(&self) -> usize {
        self.fetch_calls.lock().unwrap().values().sum()
    }

    pub fn created_labels(&self) -> Vec<String> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn list_label_calls(&self) -> usize {
        *self.list_label_calls.lock().unwrap()
    }

    pub fn label_id(&self, name: &str) -> Option<String> {
        self.labels
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .map(|l| l.id.clone())
    }

    /// Label names applied to `thread_id`, in application order
    pub fn applied_names(&self, thread_id: &str) -> Vec<String> {
        let labels = self.labels.lock().unwrap();
        self.applied
            .lock()
            .unwrap()
            .iter()
            .filter(|(thread, _)| thread == thread_id)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| labels.iter().find(|l| &l.id == id).map(|l| l.name.clone()))
            .collect()
    }

    pub fn apply_calls(&self) -> usize {
        self.applied.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl GmailClient for FakeGmail {
    async fn list_recent_threads(&self, max: u32) -> Result<Vec<ThreadRef>> {
        if *self.fail_listing.lock().unwrap() {
            return Err(GmailError::Forbidden("insufficient scope".to_string()));
        }
        Ok(self
            .thread_order
            .lock()
            .unwrap()
            .iter()
            .take(max as usize)
            .map(|id| ThreadRef::new(id.as_str()))
            .collect())
    }

    async fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        *self
            .fetch_calls
            .lock()
            .unwrap()
            .entry(thread_id.to_string())
            .or_insert(0) += 1;

        {
            let mut failures = self.fetch_failures.lock().unwrap();
            if let Some((remaining, kind)) = failures.get_mut(thread_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(kind.to_error(thread_id));
                }
            }
        }

        let result = self
            .threads
            .lock()
            .unwrap()
            .get(thread_id)
            .cloned()
            .ok_or_else(|| GmailError::NotFound(format!("thread {}", thread_id)));

        if let Some((after, token)) = self.cancel_after_fetches.lock().unwrap().as_ref() {
            if self.total_fetch_calls() >= *after {
                token.cancel();
            }
        }

        result
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        *self.list_label_calls.lock().unwrap() += 1;
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn create_label(&self, name: &str) -> Result<LabelInfo> {
        self.create_calls.lock().unwrap().push(name.to_string());

        if self.failing_creates.lock().unwrap().contains(&name.to_lowercase()) {
            return Err(GmailError::Forbidden(format!("cannot create {}", name)));
        }

        let mut labels = self.labels.lock().unwrap();
        if labels.iter().any(|l| l.name.eq_ignore_ascii_case(name)) {
            return Err(GmailError::BadRequest(format!(
                "Label name exists or conflicts: {}",
                name
            )));
        }
        let created = label(&format!("Label_{}", labels.len() + 1), name);
        labels.push(created.clone());
        Ok(created)
    }

    async fn apply_labels(&self, thread_id: &str, label_ids: &[String]) -> Result<()> {
        if !self.threads.lock().unwrap().contains_key(thread_id) {
            return Err(GmailError::NotFound(format!("thread {}", thread_id)));
        }
        self.applied
            .lock()
            .unwrap()
            .push((thread_id.to_string(), label_ids.to_vec()));
        Ok(())
    }
}

/// Shared handle usable both as a trait object and for assertions
pub fn fake_gmail() -> (Arc<FakeGmail>, Arc<dyn GmailClient>) {
    let fake = Arc::new(FakeGmail::new());
    let client: Arc<dyn GmailClient> = fake.clone();
    (fake, client)
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_recent_threads(&self, max: u32) -> Result<Vec<ThreadRef>>;
        async fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<Message>>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, name: &str) -> Result<LabelInfo>;
        async fn apply_labels(&self, thread_id: &str, label_ids: &[String]) -> Result<()>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_fixture() {
        let msg = simple_message("m1", "a@example.com", "b@example.com", Some("hi"));
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.headers.len(), 2);
        assert_eq!(msg.body.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_fake_rejects_duplicate_label() {
        let fake = FakeGmail::new();
        fake.add_label("Label_1", "Cleared");

        let result = fake.create_label("cleared").await;

        assert!(matches!(result, Err(GmailError::BadRequest(_))));
    }
}
