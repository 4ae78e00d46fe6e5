//! Authentication command handlers for OAuth flow.
//!
//! This module implements the CLI commands for:
//! - `sheetwise auth` - Initial OAuth consent flow
//! - `sheetwise auth --verify` - Verify and refresh authentication

use crate::api::TokenProvider;
use crate::commands::{load_config, Out};
use crate::error::{ErrorType, IntoResult};
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// The Google account that sheetwise is connected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
}

/// Handles the `sheetwise auth` command - runs the OAuth consent flow
///
/// This is the ONLY command that asks the user to open a browser for OAuth authentication.
///
/// 1. Loads the client secret from the `.secrets` directory
/// 2. Prints the consent URL and waits for Google to redirect back to localhost
/// 3. Saves tokens to token.json with the required scopes
/// 4. Clears the cache, which holds demo data and months of any previously connected account
///
/// # Errors
/// Returns an error if the OAuth flow fails or if client_secret.json is missing
pub async fn auth(sheetwise_home: &Path) -> Result<Out<Account>> {
    let config = load_config(sheetwise_home).await?;
    let token_provider =
        TokenProvider::initialize(&config.client_secret_path(), &config.token_path())
            .await
            .pub_result(ErrorType::Auth)?;
    match config.cache().await {
        Ok(cache) => {
            if let Err(e) = cache.clear().await {
                warn!("Unable to clear the cache: {e:#}");
            }
        }
        Err(e) => warn!("The cache is unavailable: {e:#}"),
    }
    let email = token_provider
        .user_email()
        .await
        .pub_result(ErrorType::Remote)?;
    Ok(Out::new(
        format!("Connected as {email}"),
        Account { email },
    ))
}

/// Handles the `sheetwise auth --verify` command - verifies authentication
///
/// This command NEVER starts an interactive OAuth flow. It checks that the saved tokens have the
/// right scopes, refreshes the access token and asks Google who the account belongs to.
///
/// # Errors
/// Returns an error if verification fails, credentials are missing, or tokens are invalid.
pub async fn auth_verify(sheetwise_home: &Path) -> Result<Out<Account>> {
    let config = load_config(sheetwise_home).await?;
    let token_provider = TokenProvider::load(&config.client_secret_path(), &config.token_path())
        .await
        .context(
            "Unable to use the existing tokens found in the token JSON file. \n\n\
            You should run 'sheetwise auth' (without the --verify flag).",
        )
        .pub_result(ErrorType::Auth)?;
    token_provider
        .refresh()
        .await
        .context("Unable to refresh the token")
        .pub_result(ErrorType::Auth)?;
    let email = token_provider
        .user_email()
        .await
        .pub_result(ErrorType::Remote)?;
    Ok(Out::new(
        format!("Your OAuth token is valid! Connected as {email}"),
        Account { email },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_verify_without_token() {
        let env = TestEnv::new().await;
        let err = auth_verify(env.config().root()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Auth);
        assert!(err.to_string().contains("sheetwise auth"));
    }

    #[tokio::test]
    async fn test_verify_missing_home() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = auth_verify(&dir.path().join("nope")).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
