//! Thread labeling run: fetch, classify, resolve and apply

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::approval::ApprovalTable;
use crate::classifier::{LabelNames, LabelPlan, ThreadClassifier};
use crate::client::GmailClient;
use crate::config::Config;
use crate::error::Result;
use crate::extractor::{extract_addresses, message_bodies};
use crate::keywords::KeywordList;
use crate::label_manager::LabelResolver;
use crate::retry::RetryPolicy;

/// Progress callback invoked after each thread with (done, total)
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Run-level knobs
#[derive(Debug, Clone)]
pub struct LabelerOptions {
    pub max_threads: u32,
    pub retry: RetryPolicy,
    pub names: LabelNames,
    pub dry_run: bool,
}

impl Default for LabelerOptions {
    fn default() -> Self {
        Self {
            max_threads: 100,
            retry: RetryPolicy::default(),
            names: LabelNames::default(),
            dry_run: false,
        }
    }
}

impl From<&Config> for LabelerOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_threads: config.scan.max_threads,
            retry: RetryPolicy::from(&config.retry),
            names: LabelNames::from(&config.labels),
            dry_run: config.execution.dry_run,
        }
    }
}

/// What happened to one thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadOutcome {
    /// Labels resolved and applied
    Labeled(LabelPlan),
    /// Dry run: labels selected but not applied
    Planned(LabelPlan),
    /// Nothing matched
    Skipped,
    Failed(String),
}

/// Counters and identifiers for one labeling run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub threads_listed: usize,
    pub processed: usize,
    /// Threads given "Cleared" or a "Cleared + category" label
    pub cleared: usize,
    /// Threads given a "Cleared + category" label
    pub categorized: usize,
    pub keyword_labeled: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failed_thread_ids: Vec<String>,
    pub labels_created: Vec<String>,
    pub cancelled: bool,
    pub dry_run: bool,
}

impl RunSummary {
    fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            threads_listed: 0,
            processed: 0,
            cleared: 0,
            categorized: 0,
            keyword_labeled: 0,
            skipped: 0,
            failed: 0,
            failed_thread_ids: Vec::new(),
            labels_created: Vec::new(),
            cancelled: false,
            dry_run,
        }
    }

    fn record(&mut self, thread_id: &str, outcome: &ThreadOutcome) {
        self.processed += 1;
        match outcome {
            ThreadOutcome::Labeled(plan) | ThreadOutcome::Planned(plan) => {
                if plan.is_cleared() {
                    self.cleared += 1;
                }
                if plan.has_cleared_category() {
                    self.categorized += 1;
                }
                if plan.has_keywords() {
                    self.keyword_labeled += 1;
                }
            }
            ThreadOutcome::Skipped => self.skipped += 1,
            ThreadOutcome::Failed(_) => {
                self.failed += 1;
                self.failed_thread_ids.push(thread_id.to_string());
            }
        }
    }

    /// Threads that got at least one label (or would have, in a dry run)
    pub fn labeled(&self) -> usize {
        self.processed - self.skipped - self.failed
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heading = if self.dry_run {
            "Labeling summary (dry run, nothing applied)"
        } else {
            "Labeling summary"
        };
        writeln!(f, "{}", heading)?;
        writeln!(f, "  Run ID:            {}", self.run_id)?;
        writeln!(f, "  Threads listed:    {}", self.threads_listed)?;
        writeln!(f, "  Threads processed: {}", self.processed)?;
        writeln!(f, "  Cleared:           {}", self.cleared)?;
        writeln!(f, "  With category:     {}", self.categorized)?;
        writeln!(f, "  Keyword labeled:   {}", self.keyword_labeled)?;
        writeln!(f, "  No match:          {}", self.skipped)?;
        write!(f, "  Failed:            {}", self.failed)?;
        if !self.failed_thread_ids.is_empty() {
            write!(f, " ({})", self.failed_thread_ids.join(", "))?;
        }
        if !self.labels_created.is_empty() {
            write!(f, "\n  Labels created:    {}", self.labels_created.join(", "))?;
        }
        if let Some(elapsed) = self.elapsed() {
            write!(
                f,
                "\n  Duration:          {:.1}s",
                elapsed.num_milliseconds() as f64 / 1000.0
            )?;
        }
        if self.cancelled {
            write!(f, "\n  Run was cancelled before all threads were processed")?;
        }
        Ok(())
    }
}

/// Drives one labeling pass over the most recent threads
pub struct ThreadLabeler {
    client: Arc<dyn GmailClient>,
    resolver: LabelResolver,
    approval: ApprovalTable,
    keywords: KeywordList,
    classifier: ThreadClassifier,
    options: LabelerOptions,
    progress: Option<ProgressCallback>,
}

impl ThreadLabeler {
    pub fn new(
        client: Arc<dyn GmailClient>,
        resolver: LabelResolver,
        approval: ApprovalTable,
        keywords: KeywordList,
        options: LabelerOptions,
    ) -> Self {
        Self {
            client,
            resolver,
            approval,
            keywords,
            classifier: ThreadClassifier::new(options.names.clone()),
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Label up to `max_threads` recent threads
    ///
    /// Fails only when the thread listing itself fails. Per-thread errors are
    /// logged and counted, and the run moves on. `cancel` is checked before
    /// each thread.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.options.dry_run);
        info!(
            run_id = %summary.run_id,
            max_threads = self.options.max_threads,
            dry_run = self.options.dry_run,
            "Starting labeling run"
        );

        let threads = self
            .client
            .list_recent_threads(self.options.max_threads)
            .await
            .map_err(|e| {
                error!("Failed to list threads: {}", e);
                e
            })?;
        summary.threads_listed = threads.len();
        info!("Found {} threads to examine", threads.len());

        for thread in &threads {
            if cancel.is_cancelled() {
                warn!(
                    "Run cancelled, {} thread(s) left untouched",
                    summary.threads_listed - summary.processed
                );
                summary.cancelled = true;
                break;
            }

            let outcome = self.process_thread(&thread.id).await;
            summary.record(&thread.id, &outcome);

            if let Some(callback) = &self.progress {
                callback(summary.processed, summary.threads_listed);
            }
        }

        summary.labels_created = self.resolver.created_labels().to_vec();
        summary.finished_at = Some(Utc::now());

        info!(
            run_id = %summary.run_id,
            processed = summary.processed,
            cleared = summary.cleared,
            categorized = summary.categorized,
            failed = summary.failed,
            "Labeling run finished"
        );
        Ok(summary)
    }

    /// Fetch, classify and label one thread, never propagating its error
    pub async fn process_thread(&mut self, thread_id: &str) -> ThreadOutcome {
        let client = Arc::clone(&self.client);
        let fetched = self
            .options
            .retry
            .run("fetch thread", || client.get_thread_messages(thread_id))
            .await;

        let messages = match fetched {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Failed to fetch thread {}: {}", thread_id, e);
                return ThreadOutcome::Failed(e.to_string());
            }
        };
        self.options.retry.pace().await;

        let addresses = extract_addresses(&messages);
        let bodies = message_bodies(&messages);
        let plan = self
            .classifier
            .classify(&addresses, &self.approval, &bodies, &self.keywords);

        if plan.is_empty() {
            debug!("Thread {}: no labels selected", thread_id);
            return ThreadOutcome::Skipped;
        }

        let labels = plan.labels();
        if self.options.dry_run {
            info!("Thread {}: would apply {:?}", thread_id, labels);
            return ThreadOutcome::Planned(plan);
        }

        let mut label_ids = Vec::with_capacity(labels.len());
        for label in &labels {
            match self.resolver.resolve(label).await {
                Ok(id) => label_ids.push(id),
                Err(e) => {
                    warn!("Thread {}: {}", thread_id, e);
                    return ThreadOutcome::Failed(e.to_string());
                }
            }
        }

        if let Err(e) = self.client.apply_labels(thread_id, &label_ids).await {
            warn!("Failed to label thread {}: {}", thread_id, e);
            return ThreadOutcome::Failed(e.to_string());
        }

        info!("Thread {}: applied {:?}", thread_id, labels);
        ThreadOutcome::Labeled(plan)
    }
}
