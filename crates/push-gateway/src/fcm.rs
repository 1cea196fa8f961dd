//! Firebase Cloud Messaging (HTTP v1) backend.

use crate::error::GatewayError;
use crate::gateway::{http_client, PushGateway};
use crate::types::{DeliveryResult, Notification};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Default FCM API base URL.
pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the signed assertion, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Access tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Google service-account key, as downloaded from the Firebase console.
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub token_uri: String,
    private_key: SecretString,
}

#[derive(Deserialize)]
struct RawServiceAccountKey {
    project_id: String,
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parse a key given either as JSON or as base64-encoded JSON.
    pub fn from_encoded(encoded: &str) -> Result<Self, GatewayError> {
        let encoded = encoded.trim();

        let json = if encoded.starts_with('{') {
            encoded.to_string()
        } else {
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|e| GatewayError::Credentials(format!("not valid base64: {}", e)))?;
            String::from_utf8(bytes)
                .map_err(|_| GatewayError::Credentials("decoded key is not UTF-8".into()))?
        };

        let raw: RawServiceAccountKey = serde_json::from_str(&json)
            .map_err(|e| GatewayError::Credentials(format!("malformed service account: {}", e)))?;

        Ok(Self {
            project_id: raw.project_id,
            client_email: raw.client_email,
            token_uri: raw.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.into()),
            private_key: SecretString::new(raw.private_key),
        })
    }
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
    token: SecretString,
    expires_at: i64,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    notification: FcmNotification<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<HashMap<String, String>>,
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// FCM HTTP v1 client authenticated with a service account.
///
/// OAuth access tokens are cached and shared between clones.
#[derive(Clone)]
pub struct FcmClient {
    client: Client,
    endpoint: String,
    project_id: String,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    access_token: Arc<Mutex<Option<CachedToken>>>,
}

impl FcmClient {
    /// Create a new FCM client.
    pub fn new(
        key: ServiceAccountKey,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| GatewayError::Credentials(format!("unusable private key: {}", e)))?;

        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project_id: key.project_id,
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            access_token: Arc::new(Mutex::new(None)),
        })
    }

    /// Firebase project messages are sent to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Send one message and return the FCM message name.
    #[instrument(skip_all)]
    pub async fn send_message(
        &self,
        token: &str,
        notification: &Notification,
    ) -> Result<String, GatewayError> {
        let access_token = self.access_token().await?;

        let request = SendRequest {
            message: FcmMessage {
                token,
                notification: FcmNotification {
                    title: &notification.title,
                    body: &notification.body,
                },
                data: notification.data(),
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/projects/{}/messages:send",
                self.endpoint, self.project_id
            ))
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // Stale or revoked token: fetch a fresh one on the next send.
            self.access_token.lock().await.take();
        }
        if !status.is_success() {
            return Err(Self::extract_error(response).await);
        }

        let sent: SendResponse = response.json().await?;
        debug!(message = %sent.name, "FCM accepted message");
        Ok(sent.name)
    }

    /// Return a valid OAuth access token, exchanging a fresh assertion if needed.
    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.access_token.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_REFRESH_MARGIN_SECS > now {
                return Ok(token.token.expose_secret().clone());
            }
        }

        let claims = Claims {
            iss: &self.client_email,
            scope: MESSAGING_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)?;

        debug!(token_uri = %self.token_uri, "Exchanging service account assertion");

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "OAuth token exchange failed");
            return Err(GatewayError::Auth(format!("{} - {}", status, body)));
        }

        let granted: TokenResponse = response.json().await?;
        let token = granted.access_token.clone();
        *cached = Some(CachedToken {
            token: SecretString::new(granted.access_token),
            expires_at: now + granted.expires_in,
        });

        Ok(token)
    }

    async fn extract_error(response: Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) => {
                let code = parsed
                    .error
                    .details
                    .iter()
                    .find_map(|d| d.error_code.clone())
                    .or(parsed.error.status)
                    .unwrap_or_else(|| status.as_u16().to_string());
                GatewayError::Rejected {
                    status: status.as_u16(),
                    code,
                    message: parsed.error.message,
                }
            }
            Err(_) => GatewayError::Rejected {
                status: status.as_u16(),
                code: status.as_u16().to_string(),
                message: body,
            },
        }
    }
}

#[async_trait]
impl PushGateway for FcmClient {
    fn provider(&self) -> &'static str {
        "fcm"
    }

    async fn send(&self, token: &str, notification: &Notification) -> DeliveryResult {
        self.send_message(token, notification).await.map(Some).into()
    }
}
