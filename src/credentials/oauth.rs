use super::Authorizer;
use crate::config::ConsentMode;
use crate::credentials::{ClientSecret, Token};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, Client, ClientId, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope,
    StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use reqwest::redirect::Policy;
use tiny_http::{Response, Server};
use tracing::{debug, instrument};
use url::Url;

pub(crate) const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const CONSOLE_REDIRECT_URI: &str = "http://localhost";

// Type alias for the client when Auth and Token URLs are set
type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Talks to Google's OAuth endpoints for token refresh and user consent.
pub struct GoogleAuthorizer {
    http_client: reqwest::Client,
    callback_port: u16,
}

impl GoogleAuthorizer {
    pub fn new(callback_port: u16) -> Result<Self> {
        let http_client = reqwest::ClientBuilder::new()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            http_client,
            callback_port,
        })
    }

    fn oauth_client(secret: &ClientSecret, redirect_url: &str) -> Result<ConfiguredClient> {
        let auth_url = AuthUrl::new(secret.auth_uri().to_string())
            .map_err(|e| AppError::Auth(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(secret.token_uri().to_string())
            .map_err(|e| AppError::Auth(format!("Invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(redirect_url.to_string())
            .map_err(|e| AppError::Auth(format!("Invalid redirect URL: {}", e)))?;

        Ok(BasicClient::new(ClientId::new(secret.client_id().to_string()))
            .set_client_secret(oauth2::ClientSecret::new(
                secret.client_secret().to_string(),
            ))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url)
            .set_auth_type(AuthType::RequestBody))
    }

    #[instrument(name = "Waiting for OAuth consent on loopback", skip_all)]
    async fn consent_local_server(&self, secret: &ClientSecret) -> Result<Token> {
        let bind_addr = format!("127.0.0.1:{}", self.callback_port);
        let server = Server::http(&bind_addr)
            .map_err(|e| AppError::Auth(format!("Failed to bind to {}: {}", bind_addr, e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| AppError::Auth("Callback listener has no IP address".to_string()))?;

        let redirect_base = format!("http://localhost:{}", port);
        let client = Self::oauth_client(secret, &format!("{}/", redirect_base))?;
        let (auth_url, csrf_token, pkce_verifier) = authorization_url(&client);

        println!("Open this URL in your browser:\n{}", auth_url);
        println!();
        println!("Waiting for authorization...");

        let callback_url = tokio::task::spawn_blocking(move || {
            wait_for_callback(&server, &redirect_base)
        })
        .await
        .map_err(|e| AppError::Other(e.into()))??;

        let code = parse_callback(&callback_url, &csrf_token)?;
        self.exchange_code(&client, secret, code, pkce_verifier).await
    }

    #[instrument(name = "Waiting for OAuth consent on console", skip_all)]
    async fn consent_console(&self, secret: &ClientSecret) -> Result<Token> {
        let client = Self::oauth_client(secret, CONSOLE_REDIRECT_URI)?;
        let (auth_url, csrf_token, pkce_verifier) = authorization_url(&client);

        println!("Open this URL in your browser:\n{}", auth_url);
        println!();
        println!("After approving, copy the address of the page you land on.");

        let input = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("Authorization code or redirect URL")
                .interact_text()
        })
        .await
        .map_err(|e| AppError::Other(e.into()))?
        .map_err(|e| AppError::Auth(format!("Failed to read authorization code: {}", e)))?;

        let code = match Url::parse(input.trim()) {
            Ok(url) => parse_callback(&url, &csrf_token)?,
            Err(_) => AuthorizationCode::new(input.trim().to_string()),
        };
        self.exchange_code(&client, secret, code, pkce_verifier).await
    }

    async fn exchange_code(
        &self,
        client: &ConfiguredClient,
        secret: &ClientSecret,
        code: AuthorizationCode,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<Token> {
        let token_result = client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to exchange code: {:?}", e)))?;

        Ok(token_from_response(&token_result, secret, None))
    }
}

#[async_trait]
impl Authorizer for GoogleAuthorizer {
    #[instrument(name = "Refreshing access token", skip_all)]
    async fn refresh(&self, secret: &ClientSecret, token: &Token) -> Result<Token> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| AppError::Auth("Token has no refresh token".to_string()))?;

        let client = Self::oauth_client(secret, CONSOLE_REDIRECT_URI)?;
        let token_result = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to refresh token: {:?}", e)))?;

        Ok(token_from_response(&token_result, secret, Some(refresh_token)))
    }

    async fn consent(&self, secret: &ClientSecret, mode: ConsentMode) -> Result<Token> {
        match mode {
            ConsentMode::LocalServer => self.consent_local_server(secret).await,
            ConsentMode::Console => self.consent_console(secret).await,
        }
    }
}

fn authorization_url(client: &ConfiguredClient) -> (Url, CsrfToken, PkceCodeVerifier) {
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(SPREADSHEETS_SCOPE.to_string()))
        .set_pkce_challenge(pkce_challenge)
        // Without these Google only issues a refresh token on first consent
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .url();

    (auth_url, csrf_token, pkce_verifier)
}

/// Serve the loopback listener until the OAuth redirect arrives.
fn wait_for_callback(server: &Server, redirect_base: &str) -> Result<Url> {
    loop {
        let request = server
            .recv()
            .map_err(|e| AppError::Auth(format!("Failed to receive request: {}", e)))?;

        let url = Url::parse(&format!("{}{}", redirect_base, request.url()))
            .map_err(|e| AppError::Auth(format!("Failed to parse callback URL: {}", e)))?;

        let is_redirect = url
            .query_pairs()
            .any(|(key, _)| key == "code" || key == "error");
        if !is_redirect {
            // Browsers probe for favicons and the like
            debug!(path = %request.url(), "Ignoring unrelated request");
            let _ = request.respond(Response::from_string("Not found").with_status_code(404));
            continue;
        }

        let response =
            Response::from_string("Authentication successful! You can close this window.");
        request
            .respond(response)
            .map_err(|e| AppError::Auth(format!("Failed to send response: {}", e)))?;

        return Ok(url);
    }
}

fn parse_callback(url: &Url, csrf_token: &CsrfToken) -> Result<AuthorizationCode> {
    if let Some((_, error)) = url.query_pairs().find(|(key, _)| key == "error") {
        return Err(AppError::Auth(format!("Authorization denied: {}", error)));
    }

    let state_pair = url
        .query_pairs()
        .find(|(key, _)| key == "state")
        .ok_or_else(|| AppError::Auth("No state in callback".to_string()))?;

    if state_pair.1.as_ref() != csrf_token.secret() {
        return Err(AppError::Auth("CSRF token mismatch".to_string()));
    }

    let code_pair = url
        .query_pairs()
        .find(|(key, _)| key == "code")
        .ok_or_else(|| AppError::Auth("No code in callback".to_string()))?;

    Ok(AuthorizationCode::new(code_pair.1.into_owned()))
}

/// Convert a token endpoint response into a storable token.
///
/// Refresh responses usually omit the refresh token, in which case
/// `fallback_refresh_token` is carried over.
fn token_from_response(
    response: &BasicTokenResponse,
    secret: &ClientSecret,
    fallback_refresh_token: Option<&str>,
) -> Token {
    let expires_in = response
        .expires_in()
        .map(|d| d.as_secs() as i64)
        .unwrap_or(3600); // Default to 1 hour if not provided

    let scopes = match response.scopes() {
        Some(scopes) => scopes.iter().map(|s| s.as_str().to_string()).collect(),
        None => vec![SPREADSHEETS_SCOPE.to_string()],
    };

    Token {
        refresh_token: response
            .refresh_token()
            .map(|token| token.secret().clone())
            .or_else(|| fallback_refresh_token.map(str::to_string)),
        expiry: Some(Utc::now() + Duration::seconds(expires_in)),
        scopes,
        ..Token::new(response.access_token().secret().clone())
    }
    .with_client(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::test_helpers::mock_client_secret;
    use oauth2::basic::BasicTokenType;
    use oauth2::{AccessToken, EmptyExtraTokenFields, StandardTokenResponse};

    fn callback(query: &str) -> Url {
        Url::parse(&format!("http://localhost:8080/?{}", query)).unwrap()
    }

    #[test]
    fn test_authorization_url_parameters() {
        let secret = mock_client_secret();
        let client = GoogleAuthorizer::oauth_client(&secret, "http://localhost:8080/").unwrap();
        let (url, csrf_token, _) = authorization_url(&client);

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        assert!(url.as_str().starts_with(secret.auth_uri()));
        assert_eq!(get("client_id"), Some(secret.client_id()));
        assert_eq!(get("scope"), Some(SPREADSHEETS_SCOPE));
        assert_eq!(get("access_type"), Some("offline"));
        assert_eq!(get("code_challenge_method"), Some("S256"));
        assert_eq!(get("redirect_uri"), Some("http://localhost:8080/"));
        assert_eq!(get("state"), Some(csrf_token.secret().as_str()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_for_callback_skips_unrelated_requests() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let redirect_base = format!("http://localhost:{}", port);

        let listener = {
            let redirect_base = redirect_base.clone();
            tokio::task::spawn_blocking(move || wait_for_callback(&server, &redirect_base))
        };

        let favicon = reqwest::get(format!("http://127.0.0.1:{}/favicon.ico", port))
            .await
            .unwrap();
        assert_eq!(favicon.status(), reqwest::StatusCode::NOT_FOUND);

        let redirect = reqwest::get(format!("http://127.0.0.1:{}/?state=s1&code=c1", port))
            .await
            .unwrap();
        assert_eq!(redirect.status(), reqwest::StatusCode::OK);
        assert!(redirect.text().await.unwrap().contains("Authentication successful"));

        let url = listener.await.unwrap().unwrap();
        assert!(url.as_str().starts_with(&redirect_base));
        let code = parse_callback(&url, &CsrfToken::new("s1".to_string())).unwrap();
        assert_eq!(code.secret().as_str(), "c1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_for_callback_returns_denied_redirect() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let redirect_base = format!("http://localhost:{}", port);
        let listener = tokio::task::spawn_blocking(move || wait_for_callback(&server, &redirect_base));

        reqwest::get(format!("http://127.0.0.1:{}/?error=access_denied", port))
            .await
            .unwrap();

        let url = listener.await.unwrap().unwrap();
        let result = parse_callback(&url, &CsrfToken::new("s1".to_string()));
        assert!(matches!(result, Err(AppError::Auth(msg)) if msg.contains("access_denied")));
    }

    #[test]
    fn test_parse_callback_success() {
        let csrf = CsrfToken::new("state123".to_string());
        let code = parse_callback(&callback("state=state123&code=4%2Fabc"), &csrf).unwrap();
        assert_eq!(code.secret().as_str(), "4/abc");
    }

    #[test]
    fn test_parse_callback_state_mismatch() {
        let csrf = CsrfToken::new("state123".to_string());
        let result = parse_callback(&callback("state=other&code=abc"), &csrf);
        assert!(matches!(result, Err(AppError::Auth(msg)) if msg.contains("CSRF")));
    }

    #[test]
    fn test_parse_callback_denied() {
        let csrf = CsrfToken::new("state123".to_string());
        let result = parse_callback(&callback("error=access_denied&state=state123"), &csrf);
        assert!(matches!(result, Err(AppError::Auth(msg)) if msg.contains("access_denied")));
    }

    #[test]
    fn test_parse_callback_missing_code() {
        let csrf = CsrfToken::new("state123".to_string());
        assert!(parse_callback(&callback("state=state123"), &csrf).is_err());
    }

    #[test]
    fn test_token_from_refresh_response_keeps_refresh_token() {
        let secret = mock_client_secret();
        let mut response = StandardTokenResponse::new(
            AccessToken::new("new-access".to_string()),
            BasicTokenType::Bearer,
            EmptyExtraTokenFields {},
        );
        response.set_expires_in(Some(&std::time::Duration::from_secs(3599)));

        let token = token_from_response(&response, &secret, Some("old-refresh"));

        assert_eq!(token.access_token, "new-access");
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(token.client_id.as_deref(), Some(secret.client_id()));
        assert_eq!(token.scopes, vec![SPREADSHEETS_SCOPE.to_string()]);
        assert!(token.is_valid());
    }

    #[test]
    fn test_token_from_consent_response() {
        let secret = mock_client_secret();
        let mut response = StandardTokenResponse::new(
            AccessToken::new("access".to_string()),
            BasicTokenType::Bearer,
            EmptyExtraTokenFields {},
        );
        response.set_refresh_token(Some(RefreshToken::new("refresh".to_string())));

        let token = token_from_response(&response, &secret, None);

        assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
        assert!(token.expiry.is_some());
    }
}
