//! OAuth client-credentials token fetch for the gateway.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::GatewayError;

const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchange client credentials for a gateway access token.
pub async fn fetch_access_token(
    client_id: &str,
    client_secret: &SecretString,
    token_url: &str,
) -> Result<SecretString, GatewayError> {
    if client_id.trim().is_empty()
        || client_secret.expose_secret().trim().is_empty()
        || token_url.trim().is_empty()
    {
        return Err(GatewayError::Auth(
            "missing required OAuth credentials".to_string(),
        ));
    }
    if !(token_url.starts_with("http://") || token_url.starts_with("https://")) {
        return Err(GatewayError::Auth(format!(
            "invalid token URL format: {token_url}"
        )));
    }

    let response = reqwest::Client::new()
        .post(token_url)
        .timeout(TOKEN_TIMEOUT)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret.expose_secret()),
        ])
        .send()
        .await
        .map_err(|e| GatewayError::Auth(format!("failed to fetch access token: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Auth(format!(
            "token endpoint returned HTTP {}: {body}",
            status.as_u16()
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| GatewayError::Auth(format!("token response is not JSON: {e}")))?;

    body.get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(|token| SecretString::from(token.to_string()))
        .ok_or_else(|| {
            GatewayError::Auth("response does not contain 'access_token' field".to_string())
        })
}
