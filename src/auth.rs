//! OAuth2 authentication for the Gmail API

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{GmailError, Result};

/// Scopes needed to read threads, manage labels and label threads
///
/// - gmail.modify: read messages and add labels to threads
/// - gmail.labels: list and create labels
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.labels",
];

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Shape of a desktop-app client secret downloaded from Google Cloud Console
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<serde_json::Value>,
    web: Option<serde_json::Value>,
}

/// Check that `path` holds an OAuth client secret before starting a flow
pub async fn check_credentials(path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        GmailError::AuthError(format!(
            "Cannot read OAuth credentials at {:?}: {}",
            path, e
        ))
    })?;

    let secret: ClientSecretFile = serde_json::from_str(&content).map_err(|e| {
        GmailError::AuthError(format!("Credentials file {:?} is not valid JSON: {}", path, e))
    })?;

    if secret.installed.is_none() && secret.web.is_none() {
        return Err(GmailError::AuthError(format!(
            "Credentials file {:?} has neither an 'installed' nor a 'web' client",
            path
        )));
    }
    Ok(())
}

/// Initialize Gmail API hub with OAuth2 authentication
///
/// Uses the installed-app flow (a browser opens on first use) and persists
/// tokens to `token_cache_path` so later runs refresh silently. With
/// `force_reauth` the cached token is discarded first.
pub async fn initialize_gmail_hub(
    credentials_path: &Path,
    token_cache_path: &Path,
    force_reauth: bool,
) -> Result<GmailHub> {
    check_credentials(credentials_path).await?;

    if force_reauth && token_cache_path.exists() {
        info!("Removing cached token at {:?}", token_cache_path);
        tokio::fs::remove_file(token_cache_path).await?;
    }

    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to read credentials: {}", e)))?;

    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Fetch once up front so the cached token carries every scope
    let _token = auth
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;
    debug!("OAuth token obtained for {} scopes", REQUIRED_SCOPES.len());

    if token_cache_path.exists() {
        secure_token_file(token_cache_path).await?;
    }

    // HTTP/1 works more reliably with google-gmail1 than HTTP/2
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| GmailError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, auth))
}

/// Restrict the token cache to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows relies on the profile directory ACLs
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
