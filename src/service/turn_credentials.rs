//! TURN credential minting through the Cloudflare Realtime API.

use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::config::TurnSettings;
use crate::error::GatewayError;

/// Short-lived TURN credentials handed to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TurnCredentials {
    /// TURN/STUN server URLs.
    pub urls: Vec<String>,
    /// TURN username.
    pub username: String,
    /// TURN password.
    pub credential: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MintRequest<'a> {
    ttl: u64,
    custom_identifier: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MintResponse {
    ice_servers: TurnCredentials,
}

/// Requests TURN credentials from the credential service.
#[derive(Debug, Clone)]
pub struct TurnCredentialMinter {
    client: reqwest::Client,
    settings: TurnSettings,
}

impl TurnCredentialMinter {
    /// Creates a minter with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the HTTP client cannot be built.
    pub fn new(settings: TurnSettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("TURN client: {e}")))?;
        Ok(Self { client, settings })
    }

    /// Credential generation URL for the configured key.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/turn/keys/{}/credentials/generate",
            self.settings.api_base_url, self.settings.key_id
        )
    }

    /// Mints one set of credentials with the configured TTL and identifier.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::CredentialMinting`] if the request fails, the
    /// service answers with a non-success status, or the reply has no
    /// `iceServers` object.
    pub async fn mint(&self) -> Result<TurnCredentials, GatewayError> {
        let response = self
            .client
            .post(self.endpoint_url())
            .bearer_auth(&self.settings.api_token)
            .json(&MintRequest {
                ttl: self.settings.credential_ttl,
                custom_identifier: &self.settings.custom_identifier,
            })
            .send()
            .await
            .map_err(|e| GatewayError::CredentialMinting(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::CredentialMinting(format!("{status}: {detail}")));
        }

        let minted: MintResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::CredentialMinting(e.to_string()))?;
        info!(ttl = self.settings.credential_ttl, "minted TURN credentials");
        Ok(minted.ice_servers)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn request_body_uses_camel_case() {
        let body = MintRequest {
            ttl: 600,
            custom_identifier: "op25_web_gateway",
        };
        let Ok(json) = serde_json::to_value(&body) else {
            panic!("request should serialize");
        };
        assert_eq!(json, serde_json::json!({"ttl": 600, "customIdentifier": "op25_web_gateway"}));
    }

    #[test]
    fn response_ice_servers_are_extracted() {
        let raw = r#"{"iceServers":{"urls":["turn:turn.example.org:3478"],"username":"u","credential":"c"}}"#;
        let Ok(parsed) = serde_json::from_str::<MintResponse>(raw) else {
            panic!("response should parse");
        };
        assert_eq!(parsed.ice_servers.urls, vec!["turn:turn.example.org:3478".to_string()]);
        assert_eq!(parsed.ice_servers.username, "u");
    }

    #[test]
    fn endpoint_includes_key_id() {
        let Ok(minter) = TurnCredentialMinter::new(TurnSettings {
            api_base_url: "https://rtc.example.org/v1".to_string(),
            key_id: "abc".to_string(),
            api_token: "token".to_string(),
            credential_ttl: 600,
            custom_identifier: "id".to_string(),
            timeout: Duration::from_secs(1),
        }) else {
            panic!("client should build");
        };
        assert_eq!(minter.endpoint_url(), "https://rtc.example.org/v1/turn/keys/abc/credentials/generate");
    }
}
