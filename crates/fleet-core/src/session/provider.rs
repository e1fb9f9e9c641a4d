//! Third-party identity providers.

use reqwest::{Client, StatusCode};

use super::{AuthError, AuthResult, FederatedProfile};
use crate::util::{is_http_url, parse_api_error};

/// Signs a federated profile out of its provider.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider: Send + Sync {
    async fn sign_out(&self, profile: &FederatedProfile) -> AuthResult<()>;
}

/// Provider for sessions that need no remote sign-out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIdentityProvider;

impl IdentityProvider for NoopIdentityProvider {
    async fn sign_out(&self, _profile: &FederatedProfile) -> AuthResult<()> {
        Ok(())
    }
}

/// Calls a logout endpoint with the profile's bearer token.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    logout_url: String,
    client: Client,
}

impl HttpIdentityProvider {
    pub fn new(logout_url: impl AsRef<str>) -> AuthResult<Self> {
        let logout_url = logout_url.as_ref().trim().to_string();
        if !is_http_url(&logout_url) {
            return Err(AuthError::InvalidConfiguration(
                "logout URL must include http:// or https://".to_string(),
            ));
        }
        Ok(Self {
            logout_url,
            client: Client::builder().build()?,
        })
    }
}

impl IdentityProvider for HttpIdentityProvider {
    async fn sign_out(&self, profile: &FederatedProfile) -> AuthResult<()> {
        let Some(token) = profile.access_token.as_deref() else {
            tracing::debug!("No access token for {}; skipping remote sign-out", profile.uid);
            return Ok(());
        };

        let response = self
            .client
            .post(&self.logout_url)
            .bearer_auth(token)
            .send()
            .await?;
        // An already-invalid token means the provider session is gone.
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }
}
