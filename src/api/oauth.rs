//! The OAuth 2.0 flow for Google, and a `TokenProvider` that keeps the access token fresh.
//!
//! The consent flow prints a URL for the user to open, then waits for Google to redirect the
//! browser to a small callback server on `localhost:3030`. The authorization code is exchanged
//! (with PKCE) for an access token and a refresh token, which are saved to `token.json`.

use crate::api::files::{File, SecretFile, TokenFile, REDIRECT};
use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace, warn};

const CALLBACK_PORT: u16 = 3030;
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Holds the client secret and the saved tokens. Clones share the same tokens, so a refresh by
/// one clone is seen by all of them.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: Arc<Mutex<File<TokenFile>>>,
    http: reqwest::Client,
}

impl TokenProvider {
    /// Runs the interactive consent flow and saves the resulting tokens to `token_path`.
    pub(crate) async fn initialize(secret_path: &Path, token_path: &Path) -> Res<Self> {
        let secret = SecretFile::load(secret_path).await?;
        let client = oauth_client(&secret)?;
        let http = http_client()?;

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf) = OAUTH_SCOPES
            .iter()
            .fold(client.authorize_url(CsrfToken::new_random), |request, scope| {
                request.add_scope(Scope::new(scope.to_string()))
            })
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(challenge)
            .url();

        info!("Open this URL in your browser to connect your Google account:\n\n{auth_url}\n");
        let code = wait_for_code(csrf.secret()).await?;

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request_async(&http)
            .await
            .context("Failed to exchange the authorization code for tokens")?;
        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().clone())
            .context("Google did not return a refresh token")?;
        let scopes = match response.scopes() {
            Some(scopes) => scopes.iter().map(|s| s.as_str().to_string()).collect(),
            None => OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let file = File::new(
            token_path,
            TokenFile::new(
                scopes,
                response.access_token().secret().clone(),
                refresh_token,
                expires_at(response.expires_in()),
            ),
        );
        file.data().validate_scopes()?;
        file.save().await?;
        info!("Tokens saved to {}", token_path.display());

        Ok(Self {
            secret,
            token: Arc::new(Mutex::new(file)),
            http,
        })
    }

    /// Loads previously saved tokens. This fails if either file is missing or if the tokens were
    /// not granted every scope in `OAUTH_SCOPES`.
    pub(crate) async fn load(secret_path: &Path, token_path: &Path) -> Res<Self> {
        let secret = SecretFile::load(secret_path).await?;
        let token = TokenFile::load(token_path).await?;
        Ok(Self {
            secret,
            token: Arc::new(Mutex::new(token)),
            http: http_client()?,
        })
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&self) -> Res<()> {
        let mut file = self.token.lock().await;
        self.refresh_file(&mut file).await
    }

    /// Returns the access token, refreshing it first if it expires within 5 minutes.
    pub(crate) async fn token_with_refresh(&self) -> Res<String> {
        let mut file = self.token.lock().await;
        if file.data().is_expired() {
            debug!("The access token is expired or about to expire");
            self.refresh_file(&mut file).await?;
        }
        Ok(file.data().access_token().to_string())
    }

    /// The email address of the connected Google account.
    pub(crate) async fn user_email(&self) -> Res<String> {
        let token = self.token_with_refresh().await?;
        let info: UserInfo = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to request the Google account info")?
            .error_for_status()
            .context("The Google account info request was rejected")?
            .json()
            .await
            .context("Failed to parse the Google account info")?;
        Ok(info.email)
    }

    async fn refresh_file(&self, file: &mut File<TokenFile>) -> Res<()> {
        let client = oauth_client(&self.secret)?;
        let refresh_token = RefreshToken::new(file.data().refresh_token().to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
            .context("Failed to refresh the access token")?;
        file.data_mut().update(
            response.access_token().secret().clone(),
            expires_at(response.expires_in()),
            response.refresh_token().map(|t| t.secret().clone()),
        );
        file.save().await?;
        debug!("Refreshed the access token");
        Ok(())
    }

    /// A provider with a token that never needs refreshing, for tests that never reach Google.
    #[cfg(test)]
    pub(crate) fn offline(access_token: &str) -> Self {
        let token = TokenFile::new(
            OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            access_token.to_string(),
            String::new(),
            Utc::now() + chrono::Duration::days(1),
        );
        Self {
            secret: SecretFile::default(),
            token: Arc::new(Mutex::new(File::new("token.json", token))),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: String,
}

fn http_client() -> Res<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Failed to build the HTTP client")
}

fn oauth_client(secret: &SecretFile) -> Res<OAuthClient> {
    Ok(BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
        .set_token_uri(TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?)
        .set_redirect_uri(
            RedirectUrl::new(format!("{REDIRECT}:{CALLBACK_PORT}"))
                .context("Invalid redirect URI")?,
        ))
}

fn expires_at(expires_in: Option<Duration>) -> DateTime<Utc> {
    let expires_in = expires_in
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .unwrap_or_else(|| chrono::Duration::hours(1));
    Utc::now() + expires_in
}

/// Serves the OAuth callback until Google redirects back with a code, the user denies access, or
/// the timeout passes.
async fn wait_for_code(state: &str) -> Res<String> {
    let listener = TcpListener::bind(("127.0.0.1", CALLBACK_PORT))
        .await
        .with_context(|| format!("Unable to listen on port {CALLBACK_PORT} for the callback"))?;
    info!("Waiting for the authorization callback on {REDIRECT}:{CALLBACK_PORT}");

    let (tx, mut rx) = mpsc::channel::<Res<String>>(1);
    let state = state.to_string();
    let server = tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(connection) => connection,
                Err(e) => {
                    warn!("Failed to accept a callback connection: {e}");
                    continue;
                }
            };
            let tx = tx.clone();
            let state = state.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let tx = tx.clone();
                    let state = state.clone();
                    async move { Ok::<_, Infallible>(handle_callback(&req, &state, &tx)) }
                });
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!("Callback connection error: {e}");
                }
            });
        }
    });

    let received = tokio::time::timeout(CALLBACK_TIMEOUT, rx.recv()).await;
    server.abort();
    match received {
        Ok(Some(result)) => result,
        Ok(None) => bail!("The callback server stopped before receiving a response"),
        Err(_) => bail!(
            "Timed out after {} seconds waiting for authorization",
            CALLBACK_TIMEOUT.as_secs()
        ),
    }
}

fn handle_callback(
    req: &Request<Incoming>,
    state: &str,
    tx: &mpsc::Sender<Res<String>>,
) -> Response<String> {
    trace!("Callback request: {}", req.uri());
    let parsed = if req.uri().path() == "/" {
        parse_callback(req.uri().query(), state)
    } else {
        None
    };
    let Some(result) = parsed else {
        let mut response = Response::new("Not found".to_string());
        *response.status_mut() = StatusCode::NOT_FOUND;
        return response;
    };
    let (status, body) = match &result {
        Ok(_) => (
            StatusCode::OK,
            "Authorization complete. You can close this window and return to sheetwise.",
        ),
        Err(_) => (
            StatusCode::BAD_REQUEST,
            "Authorization failed. Check the sheetwise output for details.",
        ),
    };
    if tx.try_send(result).is_err() {
        debug!("Ignoring an extra callback request");
    }
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response
}

/// Reads the callback query string. `None` means the request is not an OAuth callback at all.
fn parse_callback(query: Option<&str>, expected_state: &str) -> Option<Res<String>> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }
    if code.is_none() && error.is_none() {
        return None;
    }
    if state.as_deref() != Some(expected_state) {
        return Some(Err(anyhow!(
            "The callback state does not match, refusing the authorization code"
        )));
    }
    if let Some(error) = error {
        return Some(Err(anyhow!("Authorization was denied: {error}")));
    }
    code.map(Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_code() {
        let result = parse_callback(Some("state=abc&code=4%2F0AX&scope=x"), "abc");
        assert_eq!(result.unwrap().unwrap(), "4/0AX");
    }

    #[test]
    fn test_parse_callback_wrong_state() {
        let result = parse_callback(Some("state=evil&code=123"), "abc");
        let message = result.unwrap().err().unwrap().to_string();
        assert!(message.contains("state does not match"));
    }

    #[test]
    fn test_parse_callback_denied() {
        let result = parse_callback(Some("state=abc&error=access_denied"), "abc");
        let message = result.unwrap().err().unwrap().to_string();
        assert!(message.contains("access_denied"));
    }

    #[test]
    fn test_parse_callback_not_a_callback() {
        assert!(parse_callback(None, "abc").is_none());
        assert!(parse_callback(Some("foo=bar"), "abc").is_none());
    }

    #[test]
    fn test_expires_at() {
        let soon = expires_at(Some(Duration::from_secs(60)));
        assert!(soon <= Utc::now() + chrono::Duration::seconds(60));
        let default = expires_at(None);
        assert!(default > Utc::now() + chrono::Duration::minutes(59));
    }

    #[tokio::test]
    async fn test_offline_token() {
        let provider = TokenProvider::offline("abc");
        assert_eq!(provider.token_with_refresh().await.unwrap(), "abc");
    }
}
