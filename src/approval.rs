//! Approved-contacts table: normalized address to optional category

use crate::error::{GmailError, Result};
use crate::models::Address;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Immutable lookup of approved addresses built once per run
#[derive(Debug, Clone, Default)]
pub struct ApprovalTable {
    entries: HashMap<Address, Option<String>>,
}

impl ApprovalTable {
    /// Build the table from raw `(address, category)` pairs
    ///
    /// Addresses are normalized; rows with an empty address are dropped and
    /// blank categories are stored as "no category". A repeated address keeps
    /// the last row's category.
    pub fn from_entries<I, A, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (A, Option<C>)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let mut table = HashMap::new();
        for (raw_address, raw_category) in entries {
            let Some(address) = Address::normalize(raw_address.as_ref()) else {
                continue;
            };
            let category = raw_category
                .map(|c| c.as_ref().trim().to_string())
                .filter(|c| !c.is_empty());
            table.insert(address, category);
        }
        Self { entries: table }
    }

    /// `None` if the address is not approved, `Some(category)` otherwise
    pub fn lookup(&self, address: &Address) -> Option<Option<&str>> {
        self.entries.get(address).map(|category| category.as_deref())
    }

    pub fn is_approved(&self, address: &Address) -> bool {
        self.entries.contains_key(address)
    }

    /// Category of an approved address, if it has one
    pub fn category(&self, address: &Address) -> Option<&str> {
        self.lookup(address).flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load the table from a CSV file with a header row
    ///
    /// `email_column` must exist. `category_column` is optional: when the file
    /// has no such column every approved address is category-less.
    pub async fn load_csv(path: &Path, email_column: &str, category_column: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GmailError::ConfigError(format!(
                "Failed to read approved emails file {:?}: {}",
                path, e
            ))
        })?;

        let table = Self::parse_csv(&content, email_column, category_column)?;
        if table.is_empty() {
            warn!("Approved emails file {:?} contains no addresses", path);
        } else {
            info!("Loaded {} approved addresses from {:?}", table.len(), path);
        }
        Ok(table)
    }

    /// Parse CSV content; see [`ApprovalTable::load_csv`]
    pub fn parse_csv(content: &str, email_column: &str, category_column: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| GmailError::ConfigError(format!("Invalid approved emails CSV: {}", e)))?
            .clone();

        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

        let email_idx = column(email_column).ok_or_else(|| {
            GmailError::ConfigError(format!(
                "Approved emails CSV has no '{}' column",
                email_column
            ))
        })?;
        let category_idx = column(category_column);
        if category_idx.is_none() {
            debug!(
                "No '{}' column in approved emails CSV, all entries are category-less",
                category_column
            );
        }

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                GmailError::ConfigError(format!(
                    "Invalid approved emails CSV at record {}: {}",
                    line + 1,
                    e
                ))
            })?;
            let email = record.get(email_idx).unwrap_or_default().to_string();
            let category = category_idx
                .and_then(|idx| record.get(idx))
                .map(str::to_string);
            rows.push((email, category));
        }

        Ok(Self::from_entries(rows))
    }
}
