//! reqwest-backed [`Transport`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::transport::{Request, Response, Transport};

/// HTTP transport with per-client connect and request timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::new(config.connect_timeout, config.request_timeout)
    }

    /// Wraps an existing client, keeping its settings.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("invalid header name {name:?}")))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            TransportError::InvalidRequest(format!("invalid value for header {name}"))
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let headers = header_map(&request.headers)?;
            debug!(
                method = %request.method,
                url = %request.url,
                body_len = request.body.len(),
                "sending request"
            );

            let resp = self
                .http
                .request(request.method, request.url)
                .headers(headers)
                .body(request.body)
                .send()
                .await?;

            let mut response = Response::new(resp.status().as_u16());
            for (name, value) in resp.headers() {
                if let Ok(value) = value.to_str() {
                    response = response.with_header(name.as_str(), value);
                }
            }
            // Drain the body so the connection can be reused.
            let _ = resp.bytes().await;

            debug!(status = response.status, "received response");
            Ok(response)
        })
    }
}
