//! Expo push service backend.

use crate::error::GatewayError;
use crate::gateway::{http_client, PushGateway};
use crate::types::{DeliveryResult, Notification};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default Expo push endpoint.
pub const DEFAULT_EXPO_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct ExpoResponse {
    data: Option<PushTicket>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Deserialize)]
struct PushTicket {
    status: String,
    id: Option<String>,
    message: Option<String>,
    details: Option<TicketDetails>,
}

#[derive(Deserialize)]
struct TicketDetails {
    error: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Client for Expo's push relay.
#[derive(Clone)]
pub struct ExpoClient {
    client: Client,
    endpoint: String,
    access_token: Option<SecretString>,
}

impl ExpoClient {
    /// Create a new Expo client. `access_token` is only needed when the
    /// Expo project enforces push security.
    pub fn new(
        endpoint: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.into(),
            access_token: access_token.map(SecretString::new),
        })
    }

    /// Send one message and return the push ticket id.
    #[instrument(skip_all)]
    pub async fn send_message(
        &self,
        token: &str,
        notification: &Notification,
    ) -> Result<Option<String>, GatewayError> {
        let message = ExpoMessage {
            to: token,
            title: &notification.title,
            body: &notification.body,
            sound: notification.sound.as_deref(),
            data: notification.data(),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&message);
        if let Some(access_token) = &self.access_token {
            request = request.bearer_auth(access_token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<ExpoResponse>(&body).ok();
            let (code, message) = parsed
                .and_then(|r| r.errors.into_iter().next())
                .map(|e| (e.code, e.message))
                .unwrap_or_else(|| (status.as_u16().to_string(), body));
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let parsed: ExpoResponse = serde_json::from_str(&body)?;
        if let Some(error) = parsed.errors.into_iter().next() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                code: error.code,
                message: error.message,
            });
        }

        let ticket = parsed
            .data
            .ok_or_else(|| GatewayError::UnexpectedResponse("missing push ticket".into()))?;

        match ticket.status.as_str() {
            "ok" => {
                debug!(ticket = ?ticket.id, "Expo accepted message");
                Ok(ticket.id)
            }
            "error" => Err(GatewayError::Rejected {
                status: status.as_u16(),
                code: ticket
                    .details
                    .and_then(|d| d.error)
                    .unwrap_or_else(|| "error".into()),
                message: ticket.message.unwrap_or_default(),
            }),
            other => Err(GatewayError::UnexpectedResponse(format!(
                "unknown ticket status '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl PushGateway for ExpoClient {
    fn provider(&self) -> &'static str {
        "expo"
    }

    async fn send(&self, token: &str, notification: &Notification) -> DeliveryResult {
        self.send_message(token, notification).await.into()
    }
}
