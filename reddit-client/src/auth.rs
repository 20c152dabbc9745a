use alphabot_core::{CoreError, RedditApiError, RedditConfig};
use oauth2::basic::BasicClient;
use oauth2::reqwest::{async_http_client, Error as TransportError};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, RequestTokenError, ResourceOwnerPassword,
    ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::{error, info};

const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    /// Tokens are treated as expired a minute early.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now + EXPIRY_MARGIN >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}

/// Script-app authentication: the bot trades its own username and password
/// for a bearer token.
#[derive(Debug)]
pub struct RedditAuthenticator {
    oauth_client: BasicClient,
    username: ResourceOwnerUsername,
    password: ResourceOwnerPassword,
}

impl RedditAuthenticator {
    pub fn new(config: &RedditConfig) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("Invalid authorization URL: {}", e),
            }
        })?;
        let token_url = TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("Invalid token URL: {}", e),
            }
        })?;

        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth_client,
            username: ResourceOwnerUsername::new(config.username.clone()),
            password: ResourceOwnerPassword::new(config.password.clone()),
        })
    }

    pub fn required_scopes() -> Vec<&'static str> {
        vec!["read", "submit"]
    }

    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        info!("Requesting access token for u/{}", self.username.as_str());

        let mut request = self
            .oauth_client
            .exchange_password(&self.username, &self.password);
        for scope in Self::required_scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let response = request
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                error!("Token exchange failed: {}", e);
                match e {
                    RequestTokenError::Request(TransportError::Reqwest(e)) if e.is_timeout() => {
                        CoreError::RedditApi(RedditApiError::RequestTimeout)
                    }
                    RequestTokenError::Request(TransportError::Reqwest(e)) => CoreError::Network(e),
                    other => CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: other.to_string(),
                    }),
                }
            })?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.as_str().to_string()).collect())
            .unwrap_or_default();

        info!("Access token valid for {} seconds", lifetime.as_secs());
        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
            scope,
        })
    }
}
