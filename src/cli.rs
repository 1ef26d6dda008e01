//! Command-line interface

use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::approval::ApprovalTable;
use crate::auth;
use crate::client::{GmailClient, ProductionGmailClient};
use crate::config::Config;
use crate::error::Result;
use crate::keywords::KeywordList;
use crate::label_manager::LabelResolver;
use crate::labeler::{LabelerOptions, ProgressCallback, RunSummary, ThreadLabeler};

#[derive(Parser, Debug)]
#[command(name = "gmail-labeler")]
#[command(version)]
#[command(about = "Label Gmail threads from approved contacts and body keywords", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".gmail-labeler/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Label the most recent threads
    Run {
        /// Classify only; no labels are created or applied
        #[arg(long)]
        dry_run: bool,

        /// Number of recent threads to examine
        #[arg(long)]
        max_threads: Option<u32>,

        /// Approved contacts CSV
        #[arg(long)]
        approved: Option<PathBuf>,

        /// Keyword list JSON
        #[arg(long)]
        keywords: Option<PathBuf>,

        /// Gmail search query restricting listed threads
        #[arg(long)]
        query: Option<String>,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub dry_run: bool,
    pub max_threads: Option<u32>,
    pub approved: Option<PathBuf>,
    pub keywords: Option<PathBuf>,
    pub query: Option<String>,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut Config) {
        if self.dry_run {
            config.execution.dry_run = true;
        }
        if let Some(max_threads) = self.max_threads {
            config.scan.max_threads = max_threads;
        }
        if let Some(approved) = &self.approved {
            config.sources.approved_emails = approved.clone();
        }
        if let Some(keywords) = &self.keywords {
            config.sources.keywords = Some(keywords.clone());
        }
        if let Some(query) = &self.query {
            config.scan.query = Some(query.clone());
        }
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>4}/{len:4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✓ {}", msg));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(MultiProgress::new())
    }
}

/// Load the approval table and keyword list named by `config`
///
/// Runs before authentication so a bad input file never costs an OAuth round.
pub async fn load_sources(config: &Config) -> Result<(ApprovalTable, KeywordList)> {
    let approval = ApprovalTable::load_csv(
        &config.sources.approved_emails,
        &config.sources.email_column,
        &config.sources.category_column,
    )
    .await?;

    let keywords = match &config.sources.keywords {
        Some(path) if !path.as_os_str().is_empty() => KeywordList::load(path).await?,
        _ => {
            info!("No keyword file configured, keyword labels disabled");
            KeywordList::default()
        }
    };

    Ok((approval, keywords))
}

/// Run the OAuth flow and return the connected account address
pub async fn authenticate(cli: &Cli, force: bool) -> Result<String> {
    if let Some(parent) = cli.token_cache.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache, force).await?;

    // Must name a granted scope to avoid a second consent prompt
    let (_, profile) = hub
        .users()
        .get_profile("me")
        .add_scope("https://www.googleapis.com/auth/gmail.modify")
        .doit()
        .await?;

    Ok(profile.email_address.unwrap_or_default())
}

/// Read the config file, apply command-line overrides, then validate
pub async fn load_config(path: &Path, overrides: &RunOverrides) -> Result<Config> {
    let mut config = Config::read(path).await?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Load inputs, authenticate and label recent threads
pub async fn run_labeler(
    cli: &Cli,
    overrides: &RunOverrides,
    multi: MultiProgress,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let reporter = ProgressReporter::new(multi);

    let config_spinner = reporter.add_spinner("Loading configuration...");
    let config = load_config(&cli.config, overrides).await?;
    reporter.finish_spinner(
        &config_spinner,
        &format!("Configuration loaded from {:?}", cli.config),
    );

    let sources_spinner = reporter.add_spinner("Loading approved contacts and keywords...");
    let (approval, keywords) = load_sources(&config).await?;
    reporter.finish_spinner(
        &sources_spinner,
        &format!(
            "{} approved addresses, {} keywords",
            approval.len(),
            keywords.len()
        ),
    );

    if let Some(parent) = cli.token_cache.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let auth_spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache, false).await?;
    reporter.finish_spinner(&auth_spinner, "Gmail API authenticated successfully");

    let client: Arc<dyn GmailClient> =
        Arc::new(ProductionGmailClient::new(hub).with_query(config.scan.query.clone()));

    let mut resolver = LabelResolver::new(Arc::clone(&client));
    if !config.execution.dry_run {
        // A cold cache still works; resolution relists on every miss
        if let Err(e) = resolver.preload().await {
            warn!("Could not preload labels: {}", e);
        }
    }

    let bar = reporter.add_progress_bar(config.scan.max_threads as u64, "Labeling threads...");
    let bar_handle = bar.clone();
    let progress: ProgressCallback = Arc::new(move |done, total| {
        bar_handle.set_length(total as u64);
        bar_handle.set_position(done as u64);
    });

    let mut labeler = ThreadLabeler::new(
        client,
        resolver,
        approval,
        keywords,
        LabelerOptions::from(&config),
    )
    .with_progress(progress);

    let result = labeler.run(&cancel).await;
    bar.finish_and_clear();
    result
}
