use std::time::Duration;

use reqwest::Url;
use resumable_protocol::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};

/// Settings for an [`UploadClient`](crate::UploadClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint that creates new uploads. Required only for creation.
    pub creation_url: Option<Url>,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Timeout for one physical request, body included.
    pub request_timeout: Duration,
    /// Extra headers sent with every request. Protocol headers win on
    /// collision.
    pub headers: Vec<(String, String)>,
    /// Bytes per chunk for new transfers; 0 sends the remainder at once.
    pub chunk_size: u64,
    /// Upper bound on one request body, if any.
    pub request_payload_cap: Option<u64>,
    /// Drop the fingerprint from the store once an upload completes.
    pub remove_on_success: bool,
    /// Send PATCH as POST with `X-HTTP-Method-Override: PATCH`.
    pub method_override: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            creation_url: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            headers: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_payload_cap: None,
            remove_on_success: false,
            method_override: false,
        }
    }
}

impl ClientConfig {
    pub fn new(creation_url: Url) -> Self {
        Self {
            creation_url: Some(creation_url),
            ..Self::default()
        }
    }
}
