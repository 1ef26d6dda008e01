//! Thread classification: which labels a thread should carry
//!
//! Three independent passes, merged in a fixed order:
//!
//! 1. **Cleared family** - at most one of `Cleared + <category>` or `Cleared`,
//!    decided from the thread's incoming (From) addresses.
//! 2. **Categories** - the category of every approved participant, sorted.
//!    The category already folded into the cleared label is not repeated.
//! 3. **Keywords** - configured keywords found in any message body, in list
//!    order.
//!
//! Label names are unique case-insensitively across the whole plan, since the
//! label namespace treats case variants as the same label.

use crate::approval::ApprovalTable;
use crate::config::LabelConfig;
use crate::extractor::ThreadAddresses;
use crate::keywords::KeywordList;
use crate::models::Address;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Label names used by the cleared-family pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelNames {
    pub cleared: String,
    /// Template with `{cleared}` and `{category}` placeholders
    pub cleared_with_category: String,
}

impl Default for LabelNames {
    fn default() -> Self {
        Self {
            cleared: "Cleared".to_string(),
            cleared_with_category: "{cleared} + {category}".to_string(),
        }
    }
}

impl From<&LabelConfig> for LabelNames {
    fn from(config: &LabelConfig) -> Self {
        Self {
            cleared: config.cleared.clone(),
            cleared_with_category: config.cleared_with_category.clone(),
        }
    }
}

impl LabelNames {
    pub fn cleared_for(&self, category: &str) -> String {
        self.cleared_with_category
            .replace("{cleared}", &self.cleared)
            .replace("{category}", category)
    }
}

/// The single cleared-family label chosen for a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearedLabel {
    /// Approved sender without a category
    Plain(String),
    /// Approved sender with a category
    WithCategory { label: String, category: String },
}

impl ClearedLabel {
    pub fn name(&self) -> &str {
        match self {
            ClearedLabel::Plain(label) => label,
            ClearedLabel::WithCategory { label, .. } => label,
        }
    }
}

/// Labels selected for one thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPlan {
    pub cleared: Option<ClearedLabel>,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
}

impl LabelPlan {
    /// Label names in application order
    pub fn labels(&self) -> Vec<String> {
        self.cleared
            .iter()
            .map(|c| c.name().to_string())
            .chain(self.categories.iter().cloned())
            .chain(self.keywords.iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cleared.is_none() && self.categories.is_empty() && self.keywords.is_empty()
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared.is_some()
    }

    /// Cleared with a category folded in
    pub fn has_cleared_category(&self) -> bool {
        matches!(self.cleared, Some(ClearedLabel::WithCategory { .. }))
    }

    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty()
    }
}

/// Pure label selection policy
#[derive(Debug, Clone, Default)]
pub struct ThreadClassifier {
    names: LabelNames,
}

impl ThreadClassifier {
    pub fn new(names: LabelNames) -> Self {
        Self { names }
    }

    /// Select the labels for a thread
    pub fn classify<B: AsRef<str>>(
        &self,
        addresses: &ThreadAddresses,
        approval: &ApprovalTable,
        bodies: &[B],
        keywords: &KeywordList,
    ) -> LabelPlan {
        let mut seen = HashSet::new();

        let cleared = self.cleared_label(&addresses.incoming, approval);
        if let Some(label) = &cleared {
            seen.insert(label.name().to_lowercase());
        }

        let folded = match &cleared {
            Some(ClearedLabel::WithCategory { category, .. }) => Some(category.to_lowercase()),
            _ => None,
        };

        let categories = category_labels(&addresses.all, approval)
            .into_iter()
            .filter(|category| folded.as_deref() != Some(category.to_lowercase().as_str()))
            .filter(|category| seen.insert(category.to_lowercase()))
            .collect();

        let keywords = keywords
            .matches(bodies)
            .into_iter()
            .filter(|keyword| seen.insert(keyword.to_lowercase()))
            .map(str::to_string)
            .collect();

        LabelPlan {
            cleared,
            categories,
            keywords,
        }
    }

    /// Cleared-family selection over incoming addresses
    ///
    /// An approved sender with a category wins over one without; among
    /// categorized senders the lexicographically smallest address decides.
    fn cleared_label(
        &self,
        incoming: &BTreeSet<Address>,
        approval: &ApprovalTable,
    ) -> Option<ClearedLabel> {
        // BTreeSet iterates in address order, so the first hit is the smallest
        let mut any_approved = false;
        for address in incoming {
            match approval.lookup(address) {
                Some(Some(category)) => {
                    return Some(ClearedLabel::WithCategory {
                        label: self.names.cleared_for(category),
                        category: category.to_string(),
                    });
                }
                Some(None) => any_approved = true,
                None => {}
            }
        }

        any_approved.then(|| ClearedLabel::Plain(self.names.cleared.clone()))
    }
}

/// Distinct categories of approved participants, sorted
fn category_labels(all: &BTreeSet<Address>, approval: &ApprovalTable) -> Vec<String> {
    // Keyed by lowercase so "Austin" and "austin" count once
    let mut categories: BTreeMap<String, String> = BTreeMap::new();
    for address in all {
        if let Some(category) = approval.category(address) {
            categories
                .entry(category.to_lowercase())
                .or_insert_with(|| category.to_string());
        }
    }

    let mut labels: Vec<String> = categories.into_values().collect();
    labels.sort();
    labels
}
