//! OAuth 2.0 flows for the YouTube account that owns the church's channel.
//!
//! Covers the one-time interactive sign-in an operator performs from the CLI, and the
//! refresh-token grant the [`crate::credentials::CredentialManager`] uses to keep the
//! stored access token valid.

use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    RefreshToken, RevocationUrl, Scope, TokenUrl, reqwest,
};
use std::future::Future;

/// Google's OAuth2 authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google's OAuth2 token endpoint, used for both the code exchange and refreshes.
pub const GOOGLE_TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v3/token";

/// Google's OAuth2 revocation endpoint.
pub const GOOGLE_REVOCATION_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Scope needed to create, bind and transition live broadcasts.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

const OAUTH_DONE: &str = include_str!("../oauth_success.html");

/// Client registration and endpoints for the OAuth flows.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub revocation_url: String,
}

impl OAuthConfig {
    /// Google endpoints with the given installed-application credentials.
    pub fn google(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            revocation_url: GOOGLE_REVOCATION_URL.to_string(),
        }
    }
}

/// Runs OAuth 2.0 flows against the configured provider.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    config: OAuthConfig,
    http_client: reqwest::Client,
}

impl OAuthManager {
    pub fn new(config: OAuthConfig) -> eyre::Result<Self> {
        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Performs the interactive authorization-code flow with PKCE.
    ///
    /// Binds a loopback listener for the redirect, opens the operator's browser on the
    /// consent page, and exchanges the returned code for a token.
    pub async fn authenticate(&self) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_authorization_code) = self
            .setup_redirect(csrf.clone())
            .await
            .context("set up redirect endpoint")?;

        let auth_url =
            AuthUrl::new(self.config.auth_url.clone()).context("parse authorization URL")?;
        let token_url = TokenUrl::new(self.config.token_url.clone()).context("parse token URL")?;
        let revocation_url = RevocationUrl::new(self.config.revocation_url.clone())
            .context("parse revocation URL")?;
        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url)
            .set_revocation_url(revocation_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = client
            // The flow runs exactly once, so the CSRF token is never reused.
            .authorize_url(move || csrf.clone())
            .add_scope(Scope::new(YOUTUBE_SCOPE.to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %auth_url, "asking operator to follow OAuth flow");
        webbrowser::open(auth_url.as_ref()).context("open operator's browser")?;
        let authorization_code = eventually_authorization_code
            .await
            .context("await authorization code")?;

        let token = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .context("exchange authorization code for access token")?;

        Ok(token)
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// * `Ok(Some(token))` - the provider issued a new token
    /// * `Ok(None)` - the provider rejected the refresh token as an invalid grant
    /// * `Err(_)` - anything else went wrong (network, malformed response)
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        tracing::debug!("attempting to refresh OAuth token");

        let token_url = TokenUrl::new(self.config.token_url.clone()).context("parse token URL")?;
        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
            .set_token_uri(token_url);

        let refresh_token = RefreshToken::new(refresh_token.to_string());
        match client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http_client)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }

    /// Starts a one-shot HTTP server on a random loopback port to receive the redirect.
    ///
    /// Returns the redirect URL to register with the provider, and a future that resolves to
    /// the authorization code once the browser comes back with a matching `state`.
    async fn setup_redirect(
        &self,
        csrf: CsrfToken,
    ) -> eyre::Result<(
        RedirectUrl,
        impl Future<Output = eyre::Result<AuthorizationCode>>,
    )> {
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind to localhost")?;
        let addr = socket.local_addr().context("get local address")?;
        let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
            .context("construct redirect url")?;
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let r = async move {
                let (conn, _) = socket.accept().await.context("accept")?;
                let conn = hyper_util::rt::TokioIo::new(conn);
                let (got, mut gotten) = tokio::sync::mpsc::channel(1);
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let csrf = csrf.clone();
                    let got = got.clone();
                    async move {
                        let mut presented_state = None;
                        let mut presented_code = None;
                        for (k, v) in
                            form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                        {
                            match &*k {
                                "state" => presented_state = Some(v),
                                "code" => presented_code = Some(v),
                                _ => {}
                            }
                        }
                        if presented_state.as_deref() != Some(csrf.secret().as_str()) {
                            return Err("invalid csrf token");
                        }
                        let Some(code) = presented_code else {
                            return Err("no authorization code found");
                        };
                        if got
                            .send(AuthorizationCode::new(code.into_owned()))
                            .await
                            .is_err()
                        {
                            return Err("redirect listener went away");
                        }
                        Ok(Response::new(Full::<Bytes>::from(OAUTH_DONE)))
                    }
                });
                let mut serve = std::pin::pin!(
                    hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
                );

                tokio::select! {
                    exit = &mut serve => {
                        if let Err(e) = exit {
                            Err(e).context("redirect server got bad request")
                        } else {
                            eyre::bail!("redirect server exited prematurely");
                        }
                    }
                    code = gotten.recv() => {
                        serve.as_mut().graceful_shutdown();
                        code.ok_or_else(|| eyre::eyre!("redirect handler dropped without a code"))
                    }
                }
            };
            let _ = tx.send(r.await);
        });
        Ok((url, async move {
            rx.await.context("redirect future dropped prematurely")?
        }))
    }
}
