//! REST binding for the hosted realtime tree.
//!
//! Every path maps to `<base>/<path>.json`; the optional database secret or ID
//! token travels in the `auth` query parameter. Listeners use the
//! `text/event-stream` variant of `GET`.

use std::fmt;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::sse::{SseDecoder, SseEvent};
use super::{merge_at, set_at, ListenEvent, Listener, RemoteError, RemoteResult, RemoteTree};
use crate::util::{compact_text, is_http_url, normalize_text_option, parse_api_error, path_segments};

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct RestTree {
    base_url: Url,
    auth_token: Option<String>,
    client: Client,
    reconnect_delay: Duration,
}

impl fmt::Debug for RestTree {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RestTree")
            .field("base_url", &self.base_url.as_str())
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("reconnect_delay", &self.reconnect_delay)
            .finish_non_exhaustive()
    }
}

impl RestTree {
    pub fn new(base_url: impl AsRef<str>, auth_token: Option<String>) -> RemoteResult<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url.as_ref())?,
            auth_token: normalize_text_option(auth_token),
            client: Client::builder().build()?,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        })
    }

    /// Delay between a dropped event stream and the next connection attempt.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// `<base>/<path>.json` with every path segment percent-encoded.
    fn url(&self, path: &str) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        let segments = path_segments(path);
        {
            let mut target = url.path_segments_mut().map_err(|()| {
                RemoteError::InvalidConfiguration(format!(
                    "database URL '{}' cannot hold a path",
                    self.base_url
                ))
            })?;
            target.pop_if_empty();
            match segments.split_last() {
                Some((last, parents)) => {
                    target.extend(parents).push(&format!("{last}.json"));
                }
                None => {
                    target.push(".json");
                }
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, path: &str) -> RemoteResult<RequestBuilder> {
        let request = self.client.request(method, self.url(path)?);
        Ok(match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        })
    }

    async fn stream_once(
        &self,
        path: &str,
        events: &mpsc::UnboundedSender<ListenEvent>,
    ) -> RemoteResult<StreamEnd> {
        let response = self
            .request(Method::GET, path)?
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut cache = Value::Null;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for event in decoder.feed(&chunk) {
                match apply_stream_event(&mut cache, &event)? {
                    StreamStep::Emit => {
                        let value = if cache.is_null() {
                            None
                        } else {
                            Some(cache.clone())
                        };
                        if events.send(ListenEvent::Value(value)).is_err() {
                            return Ok(StreamEnd::ListenerGone);
                        }
                    }
                    StreamStep::Continue => {}
                    StreamStep::Cancelled(reason) => return Ok(StreamEnd::Cancelled(reason)),
                }
            }
        }

        Ok(StreamEnd::Disconnected)
    }
}

impl RemoteTree for RestTree {
    async fn get(&self, path: &str) -> RemoteResult<Option<Value>> {
        let response = self.request(Method::GET, path)?.send().await?;
        let value = check_status(response).await?.json::<Value>().await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn put(&self, path: &str, value: Value) -> RemoteResult<()> {
        let response = self.request(Method::PUT, path)?.json(&value).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn patch(&self, path: &str, fields: Map<String, Value>) -> RemoteResult<()> {
        let response = self
            .request(Method::PATCH, path)?
            .json(&fields)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        let response = self.request(Method::DELETE, path)?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    fn listen(&self, path: &str) -> Listener {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_event_stream(self.clone(), path.to_string(), sender));
        Listener::new(receiver, Some(worker.abort_handle()))
    }
}

#[derive(Debug)]
enum StreamEnd {
    Disconnected,
    Cancelled(String),
    ListenerGone,
}

#[derive(Debug, PartialEq)]
enum StreamStep {
    Emit,
    Continue,
    Cancelled(String),
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

async fn run_event_stream(
    tree: RestTree,
    path: String,
    events: mpsc::UnboundedSender<ListenEvent>,
) {
    loop {
        match tree.stream_once(&path, &events).await {
            Ok(StreamEnd::ListenerGone) => return,
            Ok(StreamEnd::Cancelled(reason)) => {
                tracing::warn!("Listener on '{}' cancelled by server: {}", path, reason);
                let _ = events.send(ListenEvent::Error(reason));
                return;
            }
            Ok(StreamEnd::Disconnected) => {
                tracing::debug!("Event stream for '{}' closed; reconnecting", path);
            }
            Err(RemoteError::PermissionDenied(message)) => {
                let _ = events.send(ListenEvent::Error(format!("Permission denied: {message}")));
                return;
            }
            Err(error) => {
                tracing::warn!("Event stream for '{}' failed: {}", path, error);
                if events.send(ListenEvent::Error(error.to_string())).is_err() {
                    return;
                }
            }
        }

        if events.is_closed() {
            return;
        }
        tokio::time::sleep(tree.reconnect_delay).await;
    }
}

fn apply_stream_event(cache: &mut Value, event: &SseEvent) -> RemoteResult<StreamStep> {
    match event.event.as_str() {
        "put" => {
            let payload = serde_json::from_str::<StreamPayload>(&event.data)?;
            set_at(cache, &payload.path, payload.data);
            Ok(StreamStep::Emit)
        }
        "patch" => {
            let payload = serde_json::from_str::<StreamPayload>(&event.data)?;
            let Value::Object(fields) = payload.data else {
                return Err(RemoteError::Malformed(
                    "patch event data must be an object".to_string(),
                ));
            };
            merge_at(cache, &payload.path, fields);
            Ok(StreamStep::Emit)
        }
        "cancel" => Ok(StreamStep::Cancelled(format!(
            "listener cancelled: {}",
            compact_text(&event.data)
        ))),
        "auth_revoked" => Ok(StreamStep::Cancelled("auth credential revoked".to_string())),
        "keep-alive" => Ok(StreamStep::Continue),
        other => {
            tracing::debug!("Ignoring unknown stream event '{}'", other);
            Ok(StreamStep::Continue)
        }
    }
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(RemoteError::PermissionDenied(message))
    } else {
        Err(RemoteError::Api(message))
    }
}

fn normalize_base_url(url: &str) -> RemoteResult<Url> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "database URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(RemoteError::InvalidConfiguration(
            "database URL must include http:// or https://".to_string(),
        ));
    }
    let parsed = Url::parse(trimmed).map_err(|error| {
        RemoteError::InvalidConfiguration(format!("invalid database URL: {error}"))
    })?;
    if parsed.cannot_be_a_base() {
        return Err(RemoteError::InvalidConfiguration(
            "database URL cannot hold a path".to_string(),
        ));
    }
    Ok(parsed)
}
