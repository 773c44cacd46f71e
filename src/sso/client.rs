//! HTTP client implementation for the IAM Identity Center OIDC and portal
//! endpoints.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::api::{ApiError, SsoApi};
use super::models::{
  ACCOUNT_ACCESS_SCOPE, CreateTokenRequest, CreateTokenResponse, DEVICE_CODE_GRANT_TYPE, DeviceAuthorization,
  ErrorResponse, GetRoleCredentialsResponse, RegisterClientRequest, RegisterClientResponse, RegisteredClient,
  RoleCredentials, StartDeviceAuthorizationRequest, StartDeviceAuthorizationResponse, TokenGrant, TokenPoll,
};
use crate::secret::Secret;

/// Header carrying the session access token on portal requests.
const BEARER_TOKEN_HEADER: &str = "x-amz-sso_bearer_token";

/// IAM Identity Center API client.
#[derive(Clone)]
pub struct SsoClient {
  oidc_url: String,
  portal_url: String,
  client: reqwest::Client,
}

impl SsoClient {
  /// Create a client for the Identity Center instance in `region`.
  ///
  /// # Arguments
  /// * `region` - SSO region, e.g. `eu-west-2`.
  /// * `timeout_secs` - Per-request timeout in seconds.
  ///
  /// # Errors
  /// Returns an error if the underlying `reqwest::Client` cannot be built.
  pub fn new(region: &str, timeout_secs: u64) -> Result<Self> {
    Self::with_endpoints(
      format!("https://oidc.{region}.amazonaws.com"),
      format!("https://portal.sso.{region}.amazonaws.com"),
      timeout_secs,
    )
  }

  /// Create a client against explicit endpoints.
  ///
  /// Used by tests and by deployments that front the service with a proxy.
  pub fn with_endpoints(
    oidc_url: impl Into<String>,
    portal_url: impl Into<String>,
    timeout_secs: u64,
  ) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .user_agent(format!("sso-creds/{} ({})", env!("CARGO_PKG_VERSION"), env!("TARGET")))
      .build()
      .context("Failed to create HTTP client")?;

    Ok(Self {
      oidc_url: oidc_url.into().trim_end_matches('/').to_string(),
      portal_url: portal_url.into().trim_end_matches('/').to_string(),
      client,
    })
  }

  async fn post_oidc<B: serde::Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ApiError> {
    let url = format!("{}{}", self.oidc_url, path);
    trace!(%url, "POST");

    self
      .client
      .post(&url)
      .header("Accept", "application/json")
      .json(body)
      .send()
      .await
      .map_err(transport_error)
  }
}

#[async_trait]
impl SsoApi for SsoClient {
  async fn register_client(&self, client_name: &str) -> Result<RegisteredClient, ApiError> {
    let request = RegisterClientRequest {
      client_name,
      client_type: "public",
      scopes: vec![ACCOUNT_ACCESS_SCOPE],
    };

    let response = self.post_oidc("/client/register", &request).await?;
    let body: RegisterClientResponse = decode(response).await?;
    debug!(client_id = %body.client_id, "Registered OIDC client");

    Ok(body.into())
  }

  async fn start_device_authorization(
    &self,
    client: &RegisteredClient,
    start_url: &str,
  ) -> Result<DeviceAuthorization, ApiError> {
    let request = StartDeviceAuthorizationRequest {
      client_id: &client.client_id,
      client_secret: client.client_secret.expose(),
      start_url,
    };

    let response = self.post_oidc("/device_authorization", &request).await?;
    let body: StartDeviceAuthorizationResponse = decode(response).await?;

    Ok(body.into())
  }

  async fn create_token(&self, client: &RegisteredClient, device_code: &Secret) -> Result<TokenPoll, ApiError> {
    let request = CreateTokenRequest {
      client_id: &client.client_id,
      client_secret: client.client_secret.expose(),
      grant_type: DEVICE_CODE_GRANT_TYPE,
      device_code: device_code.expose(),
    };

    let response = self.post_oidc("/token", &request).await?;

    if response.status().is_success() {
      let body: CreateTokenResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Decode(format!("token response: {e}")))?;
      return Ok(TokenPoll::Granted(TokenGrant {
        access_token: Secret::new(body.access_token),
        expires_in: body.expires_in,
      }));
    }

    let error = status_error(response).await;
    if let Some(poll) = error.code().and_then(TokenPoll::from_error_code) {
      return Ok(poll);
    }

    Err(error)
  }

  async fn get_role_credentials(
    &self,
    access_token: &Secret,
    account_id: &str,
    role_name: &str,
  ) -> Result<RoleCredentials, ApiError> {
    let url = format!("{}/federation/credentials", self.portal_url);
    trace!(%url, account_id, role_name, "GET");

    let response = self
      .client
      .get(&url)
      .query(&[("account_id", account_id), ("role_name", role_name)])
      .header(BEARER_TOKEN_HEADER, access_token.expose())
      .header("Accept", "application/json")
      .send()
      .await
      .map_err(transport_error)?;

    let body: GetRoleCredentialsResponse = decode(response).await?;
    Ok(body.role_credentials.into())
  }
}

/// Decode a success body, or turn the failure into an [`ApiError`].
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
  if !response.status().is_success() {
    return Err(status_error(response).await);
  }

  response.json::<T>().await.map_err(|e| ApiError::Decode(e.to_string()))
}

async fn status_error(response: Response) -> ApiError {
  let status = response.status().as_u16();
  let header_code = response
    .headers()
    .get("x-amzn-errortype")
    .and_then(|value| value.to_str().ok())
    .map(|value| value.split(':').next().unwrap_or(value).to_string());

  let text = response
    .text()
    .await
    .unwrap_or_else(|_| String::from("(no error details)"));
  let body: ErrorResponse = serde_json::from_str(&text).unwrap_or_default();

  let message = match body.description() {
    description if description.is_empty() => text,
    description => description,
  };

  ApiError::Status {
    status,
    code: body.code().or(header_code),
    message,
  }
}

fn transport_error(err: reqwest::Error) -> ApiError {
  // reqwest errors can embed the request URL; query strings here carry no secrets.
  ApiError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sso_client_regional_endpoints() {
    let client = SsoClient::new("eu-west-2", 30).unwrap();
    assert_eq!(client.oidc_url, "https://oidc.eu-west-2.amazonaws.com");
    assert_eq!(client.portal_url, "https://portal.sso.eu-west-2.amazonaws.com");
  }

  #[test]
  fn test_sso_client_removes_trailing_slash() {
    let client = SsoClient::with_endpoints("http://127.0.0.1:9000/", "http://127.0.0.1:9001/", 5).unwrap();
    assert_eq!(client.oidc_url, "http://127.0.0.1:9000");
    assert_eq!(client.portal_url, "http://127.0.0.1:9001");
  }
}
