//! Upload sessions: creation, resumption, and the retrying upload loop.

use std::fmt;
use std::sync::Arc;

use reqwest::{Method, Url};
use resumable_protocol::constants::{DEFER_LENGTH_VALUE, TUS_VERSION, header};
use resumable_protocol::{parse_length, parse_offset};
use resumable_retry::RetryExecutor;
use tracing::{debug, info, warn};

use crate::chunked::{ChunkTransfer, FinishOutcome};
use crate::config::ClientConfig;
use crate::error::{ProtocolError, ProtocolErrorKind, UploadError};
use crate::http::HttpTransport;
use crate::store::ResumptionStore;
use crate::transport::{Request, Response, Transport};
use crate::upload::Upload;

/// Details of an upload the server has fully received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    pub url: Url,
    pub fingerprint: String,
    pub size: u64,
}

type CompletionHook = Arc<dyn Fn(&CompletedUpload) + Send + Sync>;

/// Creates and resumes uploads against one endpoint.
///
/// Cloning is cheap; clones share the transport, store and completion hook.
#[derive(Clone)]
pub struct UploadClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    store: Option<Arc<dyn ResumptionStore>>,
    on_complete: Option<CompletionHook>,
}

impl UploadClient {
    /// Creates a client talking HTTP with the configured timeouts.
    pub fn new(config: ClientConfig) -> Result<Self, UploadError> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config,
            store: None,
            on_complete: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn creation_url(&self) -> Option<&Url> {
        self.config.creation_url.as_ref()
    }

    pub fn set_creation_url(&mut self, url: Url) {
        self.config.creation_url = Some(url);
    }

    /// Replaces the extra headers sent with every request.
    pub fn set_headers(&mut self, headers: Vec<(String, String)>) {
        self.config.headers = headers;
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.config.headers
    }

    /// Turns on resumption, recording resource URLs in `store`.
    pub fn enable_resuming(&mut self, store: Arc<dyn ResumptionStore>) {
        self.store = Some(store);
    }

    pub fn disable_resuming(&mut self) {
        self.store = None;
    }

    pub fn resuming_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&Arc<dyn ResumptionStore>> {
        self.store.as_ref()
    }

    pub fn set_remove_on_success(&mut self, remove: bool) {
        self.config.remove_on_success = remove;
    }

    pub fn remove_on_success(&self) -> bool {
        self.config.remove_on_success
    }

    /// Registers a callback fired once for every upload that finishes.
    pub fn on_complete<F>(&mut self, hook: F)
    where
        F: Fn(&CompletedUpload) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(hook));
    }

    /// Creates a new resource on the server and returns a transfer at
    /// offset 0.
    pub async fn create_upload(&self, upload: &Upload) -> Result<ChunkTransfer, UploadError> {
        let creation_url = self
            .config
            .creation_url
            .clone()
            .ok_or_else(|| UploadError::Config("no creation URL configured".into()))?;

        let mut request = self.request(Method::POST, creation_url.clone());
        match upload.size() {
            Some(size) => request.set_header(header::UPLOAD_LENGTH, size.to_string()),
            None => request.set_header(header::UPLOAD_DEFER_LENGTH, DEFER_LENGTH_VALUE),
        }
        if !upload.metadata().is_empty() {
            request.set_header(header::UPLOAD_METADATA, upload.metadata().encode());
        }

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ProtocolError::unexpected_status("creating upload", response).into());
        }
        let Some(location) = response
            .header(header::LOCATION)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
        else {
            return Err(ProtocolError::missing_header(header::LOCATION, response).into());
        };
        let url = creation_url
            .join(&location)
            .map_err(|e| ProtocolError::invalid_header(header::LOCATION, e, response))?;

        info!(url = %url, fingerprint = upload.fingerprint(), size = ?upload.size(), "upload created");
        if let Some(store) = &self.store {
            store.set(upload.fingerprint(), &url)?;
        }

        Ok(ChunkTransfer::new(
            self.clone(),
            upload.clone(),
            url,
            0,
            upload.size(),
            upload.size().is_some(),
        ))
    }

    /// Resumes the upload recorded under the upload's fingerprint.
    pub async fn resume_upload(&self, upload: &Upload) -> Result<ChunkTransfer, UploadError> {
        let store = self.store.as_ref().ok_or(UploadError::ResumingNotEnabled)?;
        let url = store
            .get(upload.fingerprint())?
            .ok_or_else(|| UploadError::FingerprintNotFound(upload.fingerprint().to_string()))?;
        debug!(url = %url, fingerprint = upload.fingerprint(), "resuming upload");
        self.open_transfer(upload, url).await
    }

    /// Resumes when possible, otherwise creates.
    ///
    /// A stored URL the server no longer knows (404/410) or that describes
    /// a different payload is dropped from the store before creating.
    pub async fn resume_or_create_upload(
        &self,
        upload: &Upload,
    ) -> Result<ChunkTransfer, UploadError> {
        match self.resume_upload(upload).await {
            Ok(transfer) => Ok(transfer),
            Err(UploadError::FingerprintNotFound(_) | UploadError::ResumingNotEnabled) => {
                self.create_upload(upload).await
            }
            Err(UploadError::Protocol(err)) if err.is_stale_resource() => {
                warn!(
                    fingerprint = upload.fingerprint(),
                    error = %err,
                    "stored upload is stale, creating a new one"
                );
                if let Some(store) = &self.store {
                    store.remove(upload.fingerprint())?;
                }
                self.create_upload(upload).await
            }
            Err(err) => Err(err),
        }
    }

    /// Binds to a known resource URL without consulting the store.
    ///
    /// The URL is recorded under the upload's fingerprint when resuming is
    /// enabled.
    pub async fn begin_or_resume_upload_from_url(
        &self,
        upload: &Upload,
        url: Url,
    ) -> Result<ChunkTransfer, UploadError> {
        let transfer = self.open_transfer(upload, url).await?;
        if let Some(store) = &self.store {
            store.set(upload.fingerprint(), transfer.url())?;
        }
        Ok(transfer)
    }

    /// Uploads `upload` end to end under `executor`: every attempt resumes
    /// (or creates), sends the remaining chunks and finishes.
    pub async fn run_upload(
        &self,
        upload: &Upload,
        executor: &RetryExecutor,
    ) -> Result<FinishOutcome, UploadError> {
        executor
            .make_attempts(move |attempt| async move {
                if attempt > 0 {
                    info!(attempt, fingerprint = upload.fingerprint(), "retrying upload");
                }
                let mut transfer = self.resume_or_create_upload(upload).await?;
                while transfer.transfer_chunk().await? > 0 {}
                transfer.finish().await
            })
            .await
    }

    /// Asks the server where `url` stands and binds a transfer there.
    async fn open_transfer(&self, upload: &Upload, url: Url) -> Result<ChunkTransfer, UploadError> {
        let response = self
            .transport
            .send(self.request(Method::HEAD, url.clone()))
            .await?;
        if !response.is_success() {
            return Err(ProtocolError::unexpected_status("checking upload status", response).into());
        }

        let offset = match response.header(header::UPLOAD_OFFSET).map(parse_offset) {
            Some(Ok(offset)) => offset,
            Some(Err(e)) => {
                return Err(ProtocolError::invalid_header(header::UPLOAD_OFFSET, e, response).into());
            }
            None => return Err(ProtocolError::missing_header(header::UPLOAD_OFFSET, response).into()),
        };
        let server_length = match response.header(header::UPLOAD_LENGTH).map(parse_length) {
            Some(Ok(length)) => Some(length),
            Some(Err(e)) => {
                return Err(ProtocolError::invalid_header(header::UPLOAD_LENGTH, e, response).into());
            }
            None => None,
        };

        let size = match (upload.size(), server_length) {
            (Some(local), Some(remote)) if local != remote => {
                return Err(length_mismatch(
                    format!("server length {remote} does not match upload size {local}"),
                    local,
                    remote,
                    response,
                ));
            }
            (Some(local), _) => Some(local),
            (None, remote) => remote,
        };
        if let Some(size) = size {
            if offset > size {
                return Err(length_mismatch(
                    format!("server offset {offset} is past upload size {size}"),
                    size,
                    offset,
                    response,
                ));
            }
        }

        info!(url = %url, offset, size = ?size, "upload resumed");
        Ok(ChunkTransfer::new(
            self.clone(),
            upload.clone(),
            url,
            offset,
            size,
            server_length.is_some(),
        ))
    }

    /// Request carrying the protocol version and the configured headers.
    pub(crate) fn request(&self, method: Method, url: Url) -> Request {
        let mut request = Request::new(method, url);
        for (name, value) in &self.config.headers {
            request.set_header(name.clone(), value.clone());
        }
        request.set_header(header::TUS_RESUMABLE, TUS_VERSION);
        request
    }

    pub(crate) async fn send(&self, request: Request) -> Result<Response, UploadError> {
        Ok(self.transport.send(request).await?)
    }

    pub(crate) fn notify_complete(&self, completed: &CompletedUpload) {
        if let Some(hook) = &self.on_complete {
            hook(completed);
        }
    }
}

fn length_mismatch(message: String, expected: u64, actual: u64, response: Response) -> UploadError {
    ProtocolError::new(
        ProtocolErrorKind::LengthMismatch { expected, actual },
        message,
    )
    .with_response(response)
    .into()
}

impl fmt::Debug for UploadClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadClient")
            .field("config", &self.config)
            .field("resuming", &self.resuming_enabled())
            .field("on_complete", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}
