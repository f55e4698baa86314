//! OAuth 2.0 access tokens for calling FCM.
//!
//! Google access tokens only last about an hour, so a long running server has
//! to mint new ones from its service account key as they expire.

use std::{env, path::Path, sync::Arc};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

/// The OAuth scope needed to send messages through FCM.
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Where Google issues access tokens when the key file does not say.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: Duration = Duration::hours(1);

/// Tokens this close to expiring are replaced before use.
const REFRESH_MARGIN: Duration = Duration::minutes(5);

/// The errors that may occur while getting an access token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The service account key file could not be read or parsed.
    #[error("could not load the service account key: {0}")]
    KeyFile(String),

    /// The private key could not be used to sign a token request.
    #[error("could not sign the token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// The token endpoint could not be reached or refused the request.
    #[error("could not get an access token: {0}")]
    TokenRequest(String),

    /// Neither a service account key nor a fixed token was configured.
    #[error(
        "no FCM credentials, set GOOGLE_APPLICATION_CREDENTIALS to a service account key file \
        or FCM_ACCESS_TOKEN to an access token"
    )]
    MissingCredentials,
}

/// Supplies the bearer token for each FCM request.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// A token that is valid right now.
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// A fixed token, e.g. for the FCM emulator or a short manual run.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Always hand out `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

/// The fields of a Google service account key file that are needed to mint tokens.
#[derive(Deserialize)]
pub struct ServiceAccountKey {
    /// The service account's email address.
    pub client_email: String,
    /// The PEM encoded RSA private key.
    pub private_key: String,
    /// Where to exchange signed assertions for access tokens.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_owned()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: OffsetDateTime,
}

/// Mints access tokens from a service account key and caches each one until
/// it is about to expire.
pub struct ServiceAccountTokens {
    http: Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    /// Mint tokens with `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key is not a PEM encoded RSA key or the
    /// HTTP client cannot be constructed.
    pub fn new(key: ServiceAccountKey) -> Result<Self, AuthError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|error| AuthError::TokenRequest(error.to_string()))?;

        Ok(Self {
            http,
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            cached: Mutex::new(None),
        })
    }

    /// Mint tokens with the service account key file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a usable key.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|error| AuthError::KeyFile(format!("{}: {error}", path.display())))?;
        let key = serde_json::from_str(&contents)
            .map_err(|error| AuthError::KeyFile(format!("{}: {error}", path.display())))?;

        Self::new(key)
    }

    async fn fetch(&self, now: OffsetDateTime) -> Result<CachedToken, AuthError> {
        let claims = Claims {
            iss: &self.client_email,
            scope: FCM_SCOPE,
            aud: &self.token_uri,
            iat: now.unix_timestamp(),
            exp: (now + ASSERTION_LIFETIME).unix_timestamp(),
        };
        let assertion =
            jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|error| AuthError::TokenRequest(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenRequest(format!("{status}: {body}")));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|error| AuthError::TokenRequest(error.to_string()))?;

        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String, AuthError> {
        // Held across the fetch so concurrent sends share one refresh.
        let mut cached = self.cached.lock().await;
        let now = OffsetDateTime::now_utc();

        if let Some(token) = cached
            .as_ref()
            .filter(|token| token.expires_at - REFRESH_MARGIN > now)
        {
            return Ok(token.value.clone());
        }

        let token = self.fetch(now).await?;
        tracing::debug!("Fetched a new FCM access token valid until {}", token.expires_at);
        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }
}

/// Pick the token source from the environment.
///
/// `GOOGLE_APPLICATION_CREDENTIALS` names a service account key file and is
/// preferred. `FCM_ACCESS_TOKEN` is used as is and stops working once it expires.
///
/// # Errors
///
/// Returns an error if neither variable is set or the key file is unusable.
pub fn token_provider_from_env() -> Result<Arc<dyn AccessTokenProvider>, AuthError> {
    if let Ok(path) = env::var("GOOGLE_APPLICATION_CREDENTIALS") {
        return Ok(Arc::new(ServiceAccountTokens::from_file(path)?));
    }

    if let Ok(token) = env::var("FCM_ACCESS_TOKEN") {
        tracing::warn!("Using FCM_ACCESS_TOKEN, which will not be refreshed when it expires");
        return Ok(Arc::new(StaticToken::new(token)));
    }

    Err(AuthError::MissingCredentials)
}
