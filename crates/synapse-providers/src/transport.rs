//! HTTP collaborator shared by every provider
//!
//! Performs the physical request and hands back either a decoded native
//! response, a typed native event stream, or an unclassified `UpstreamError`.

use std::fmt::Display;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt, future};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::UpstreamError;

/// Send a request, turning non-success statuses into `UpstreamError::Api`
pub async fn send(provider: &str, builder: RequestBuilder) -> Result<Response, UpstreamError> {
    let response = builder.send().await.map_err(|e| {
        tracing::error!(provider = %provider, error = %e, "upstream request failed");
        UpstreamError::Transport(e)
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = error_body(provider, status, response.text().await);
        tracing::warn!(provider = %provider, status = %status, "upstream returned error");
        return Err(UpstreamError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

/// Body of a failed response, or the status reason when it cannot be read
fn error_body(provider: &str, status: StatusCode, read: Result<String, impl Display>) -> String {
    read.unwrap_or_else(|e| {
        tracing::debug!(provider = %provider, status = %status, error = %e, "failed to read error body");
        status.canonical_reason().unwrap_or_default().to_owned()
    })
}

/// Decode a JSON response body
pub async fn json<T: DeserializeOwned>(response: Response) -> Result<T, UpstreamError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Decode a server-sent event body into typed native events
///
/// `[DONE]` sentinels, keep-alives, and frames that do not parse as `E` are
/// skipped. A broken connection surfaces as `UpstreamError::Stream`.
pub fn sse_events<E>(provider: &str, response: Response) -> impl Stream<Item = Result<E, UpstreamError>> + Send + use<E>
where
    E: DeserializeOwned + Send,
{
    let provider = provider.to_owned();

    response.bytes_stream().eventsource().filter_map(move |result| {
        let item = match result {
            Ok(event) => {
                let data = event.data.trim();
                if data.is_empty() || data == "[DONE]" {
                    None
                } else {
                    match serde_json::from_str::<E>(data) {
                        Ok(parsed) => Some(Ok(parsed)),
                        Err(e) => {
                            tracing::debug!(
                                provider = %provider,
                                event = %event.event,
                                error = %e,
                                "skipping unparseable SSE chunk"
                            );
                            None
                        }
                    }
                }
            }
            Err(e) => Some(Err(UpstreamError::Stream(e.to_string()))),
        };
        future::ready(item)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_error_body_is_kept() {
        let body = error_body("openai", StatusCode::BAD_REQUEST, Ok::<_, &str>(r#"{"error":{}}"#.to_owned()));
        assert_eq!(body, r#"{"error":{}}"#);
    }

    #[test]
    fn unreadable_error_body_falls_back_to_reason() {
        let body = error_body("groq", StatusCode::TOO_MANY_REQUESTS, Err("connection reset"));
        assert_eq!(body, "Too Many Requests");
    }
}
