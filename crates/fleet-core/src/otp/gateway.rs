//! SMS delivery.

use std::fmt;

use reqwest::Client;
use serde::Deserialize;

use crate::session::AuthError;
use crate::util::{compact_text, is_http_url, parse_api_error};
use crate::{Error, Result};

/// Delivers a text message to a phone number.
#[allow(async_fn_in_trait)]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<()>;
}

/// Gateway reached with a GET request carrying the message in the query.
///
/// A send only counts as delivered when the response is 2xx and its JSON
/// body reports `"status": "success"`.
#[derive(Clone)]
pub struct HttpSmsGateway {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl fmt::Debug for HttpSmsGateway {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpSmsGateway")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpSmsGateway {
    pub fn new(endpoint: impl AsRef<str>, api_key: Option<String>) -> Result<Self> {
        let endpoint = endpoint.as_ref().trim().to_string();
        if !is_http_url(&endpoint) {
            return Err(Error::Config(
                "SMS endpoint must include http:// or https://".to_string(),
            ));
        }
        let client = Client::builder()
            .build()
            .map_err(|error| Error::Config(format!("SMS client: {error}")))?;
        Ok(Self {
            endpoint,
            api_key,
            client,
        })
    }
}

impl SmsGateway for HttpSmsGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<()> {
        let mut query = vec![("numbers", phone), ("message", message)];
        if let Some(api_key) = self.api_key.as_deref() {
            query.push(("apikey", api_key));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|error| gateway_error(format!("request failed: {error}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(gateway_error(parse_api_error(status, &body)));
        }

        match serde_json::from_str::<GatewayResponse>(&body) {
            Ok(GatewayResponse {
                status: Some(state), ..
            }) if state.eq_ignore_ascii_case("success") => {
                tracing::debug!("SMS gateway accepted message");
                Ok(())
            }
            Ok(GatewayResponse { status, message }) => Err(gateway_error(format!(
                "gateway reported {}: {}",
                status.as_deref().unwrap_or("no status"),
                message.as_deref().unwrap_or("no detail")
            ))),
            Err(_) => Err(gateway_error(format!(
                "unexpected gateway response: {}",
                compact_text(&body)
            ))),
        }
    }
}

fn gateway_error(message: String) -> Error {
    tracing::warn!("SMS delivery failed: {}", message);
    AuthError::Api(format!("SMS delivery failed: {message}")).into()
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn gateway_answering(template: ResponseTemplate) -> (MockServer, HttpSmsGateway) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/send"))
            .and(query_param("numbers", "+919876543210"))
            .and(query_param("message", "code 123456"))
            .respond_with(template)
            .mount(&server)
            .await;
        let gateway =
            HttpSmsGateway::new(format!("{}/send", server.uri()), Some("key".to_string())).unwrap();
        (server, gateway)
    }

    #[tokio::test]
    async fn structured_success_is_delivered() {
        let (_server, gateway) = gateway_answering(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "success"})),
        )
        .await;
        gateway.send("+919876543210", "code 123456").await.unwrap();
    }

    #[tokio::test]
    async fn success_text_outside_status_field_is_not_enough() {
        let (_server, gateway) = gateway_answering(
            ResponseTemplate::new(200).set_body_string("message queued: success pending"),
        )
        .await;
        let error = gateway.send("+919876543210", "code 123456").await.unwrap_err();
        assert!(error.to_string().contains("unexpected gateway response"));
    }

    #[tokio::test]
    async fn failure_status_is_reported() {
        let (_server, gateway) = gateway_answering(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({"status": "failure", "message": "insufficient credits"}),
        ))
        .await;
        let error = gateway.send("+919876543210", "code 123456").await.unwrap_err();
        assert!(error.to_string().contains("insufficient credits"));
    }

    #[tokio::test]
    async fn http_errors_are_reported() {
        let (_server, gateway) = gateway_answering(ResponseTemplate::new(502)).await;
        let error = gateway.send("+919876543210", "code 123456").await.unwrap_err();
        assert!(matches!(error, Error::Auth(AuthError::Api(_))));
    }

    #[test]
    fn debug_redacts_api_key() {
        let gateway = HttpSmsGateway::new("https://sms.example.com/send", Some("k-1".to_string()))
            .unwrap();
        assert!(!format!("{gateway:?}").contains("k-1"));
    }
}
