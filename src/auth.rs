use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::debug;
use yup_oauth2::{self as oauth2, authenticator::Authenticator};

use crate::config;
use crate::error::{Result, SorterError};

/// Creates an OAuth2 authenticator for Gmail API access, caching tokens per account
pub async fn create_authenticator(
    account_email: &str,
) -> Result<Authenticator<HttpsConnector<HttpConnector>>> {
    let token_path = config::token_path(account_email)?;
    let secret_path = config::client_secret_path()?;

    if !secret_path.exists() {
        return Err(SorterError::query(format!(
            "Client secret file not found at {:?}. \
             Please download OAuth2 credentials from Google Cloud Console \
             and save them as client_secret.json in {:?}",
            secret_path,
            config::config_dir()?
        )));
    }

    let secret = oauth2::read_application_secret(&secret_path)
        .await
        .map_err(|e| SorterError::query(format!("Failed to read client secret: {e}")))?;

    if let Some(dir) = token_path.parent() {
        config::ensure_dir(dir)?;
    }
    debug!(account = account_email, tokens = %token_path.display(), "Building authenticator");

    oauth2::InstalledFlowAuthenticator::builder(
        secret,
        oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(&token_path)
    .build()
    .await
    .map_err(|e| SorterError::query(format!("Failed to build authenticator: {e}")))
}
