//! Label name to id resolution with on-demand creation

use crate::client::GmailClient;
use crate::error::{GmailError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves label names to Gmail label ids for the duration of one run
///
/// Names are matched case-insensitively. A label is created only after a fresh
/// listing shows that no label with that name exists, and every resolved id is
/// cached, so sequential calls never create the same label twice.
pub struct LabelResolver {
    client: Arc<dyn GmailClient>,
    label_cache: HashMap<String, String>, // lowercase name -> id
    created_labels: Vec<String>,
}

impl LabelResolver {
    pub fn new(client: Arc<dyn GmailClient>) -> Self {
        Self {
            client,
            label_cache: HashMap::new(),
            created_labels: Vec::new(),
        }
    }

    /// Warm the cache with every existing label
    pub async fn preload(&mut self) -> Result<usize> {
        let labels = self.client.list_labels().await?;
        let count = labels.len();
        for label in labels {
            self.cache_insert(&label.name, label.id);
        }
        info!("Loaded {} existing labels into cache", count);
        Ok(count)
    }

    /// Return the id of the label called `name`, creating it if necessary
    pub async fn resolve(&mut self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GmailError::LabelResolution {
                label: String::new(),
                reason: "label name cannot be empty".to_string(),
            });
        }

        if let Some(id) = self.cached_id(name) {
            debug!("Label '{}' found in cache", name);
            return Ok(id);
        }

        // Relist on every miss so labels created elsewhere are picked up
        let labels = self
            .client
            .list_labels()
            .await
            .map_err(|e| GmailError::label_resolution(name, &e))?;

        let wanted = cache_key(name);
        let mut found = None;
        for label in labels {
            if found.is_none() && cache_key(&label.name) == wanted {
                found = Some(label.id.clone());
            }
            self.cache_insert(&label.name, label.id);
        }

        if let Some(id) = found {
            debug!("Label '{}' already exists with ID: {}", name, id);
            return Ok(id);
        }

        info!("Creating label: {}", name);
        let created = self
            .client
            .create_label(name)
            .await
            .map_err(|e| GmailError::label_resolution(name, &e))?;

        self.cache_insert(name, created.id.clone());
        self.created_labels.push(created.name.clone());

        info!("Created label '{}' with ID: {}", created.name, created.id);
        Ok(created.id)
    }

    /// Cached id for `name`, without any remote call
    pub fn cached_id(&self, name: &str) -> Option<String> {
        self.label_cache.get(&cache_key(name)).cloned()
    }

    /// Names of labels created during this run
    pub fn created_labels(&self) -> &[String] {
        &self.created_labels
    }

    fn cache_insert(&mut self, name: &str, id: String) {
        self.label_cache.entry(cache_key(name)).or_insert(id);
    }
}

fn cache_key(name: &str) -> String {
    name.trim().to_lowercase()
}
