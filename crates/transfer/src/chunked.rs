use reqwest::{Method, Url};
use resumable_protocol::constants::{OFFSET_OCTET_STREAM, STATUS_CONFLICT, header};
use resumable_protocol::parse_offset;
use tracing::{debug, info, warn};

use crate::client::{CompletedUpload, UploadClient};
use crate::error::{ProtocolError, ProtocolErrorKind, UploadError};
use crate::store::ResumptionStore;
use crate::upload::Upload;

/// How a transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// The server holds every byte.
    Completed(CompletedUpload),
    /// The transfer was closed early; the upload can be resumed from
    /// `offset`.
    Stopped { offset: u64 },
}

/// Moves one upload's bytes to its resource URL, a chunk at a time.
///
/// The offset only moves forward, and only after the server confirms it.
/// A failed chunk leaves the transfer where it was, so calling
/// [`transfer_chunk`](Self::transfer_chunk) again resends exactly the
/// unconfirmed bytes.
#[derive(Debug)]
pub struct ChunkTransfer {
    client: UploadClient,
    upload: Upload,
    url: Url,
    offset: u64,
    size: Option<u64>,
    length_declared: bool,
    chunk_size: u64,
    request_payload_cap: Option<u64>,
}

impl ChunkTransfer {
    pub(crate) fn new(
        client: UploadClient,
        upload: Upload,
        url: Url,
        offset: u64,
        size: Option<u64>,
        length_declared: bool,
    ) -> Self {
        let chunk_size = client.config().chunk_size;
        let request_payload_cap = client.config().request_payload_cap;
        Self {
            client,
            upload,
            url,
            offset,
            size,
            length_declared,
            chunk_size,
            request_payload_cap,
        }
    }

    /// Bytes the server has confirmed.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Total size, once known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn upload(&self) -> &Upload {
        &self.upload
    }

    pub fn is_finished(&self) -> bool {
        self.length_declared && self.size == Some(self.offset)
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Bytes per chunk; 0 sends everything left in one request.
    pub fn set_chunk_size(&mut self, chunk_size: u64) {
        self.chunk_size = chunk_size;
    }

    pub fn request_payload_cap(&self) -> Option<u64> {
        self.request_payload_cap
    }

    pub fn set_request_payload_cap(&mut self, cap: Option<u64>) {
        self.request_payload_cap = cap;
    }

    /// Sends the next chunk and returns how many bytes the server accepted.
    ///
    /// Returns 0 once nothing is left to send.
    pub async fn transfer_chunk(&mut self) -> Result<u64, UploadError> {
        self.send_chunk(self.chunk_size).await
    }

    /// Like [`transfer_chunk`](Self::transfer_chunk) with a one-off chunk
    /// size.
    pub async fn transfer_chunk_sized(&mut self, chunk_size: u64) -> Result<u64, UploadError> {
        self.send_chunk(chunk_size).await
    }

    async fn send_chunk(&mut self, chunk_size: u64) -> Result<u64, UploadError> {
        if self.is_finished() {
            return Ok(0);
        }

        let remaining = self.size.map(|size| size.saturating_sub(self.offset));
        let limit = [
            (chunk_size > 0).then_some(chunk_size),
            self.request_payload_cap.filter(|&cap| cap > 0),
            remaining,
        ]
        .into_iter()
        .flatten()
        .min();

        let chunk = self
            .upload
            .read_at(self.offset, limit, self.size.is_none())
            .await?;
        let sent = chunk.data.len() as u64;

        // The length goes out with the first request once it is known.
        let declare = match self.size {
            _ if self.length_declared => None,
            Some(size) => Some(size),
            None if chunk.eof => Some(self.offset + sent),
            None => None,
        };

        if sent == 0 && declare.is_none() {
            if self.size.is_some() {
                warn!(
                    url = %self.url,
                    offset = self.offset,
                    size = ?self.size,
                    "byte source ended before the upload size"
                );
            }
            return Ok(0);
        }

        let mut request = if self.client.config().method_override {
            let mut request = self.client.request(Method::POST, self.url.clone());
            request.set_header(header::METHOD_OVERRIDE, "PATCH");
            request
        } else {
            self.client.request(Method::PATCH, self.url.clone())
        };
        request.set_header(header::UPLOAD_OFFSET, self.offset.to_string());
        request.set_header(header::CONTENT_TYPE, OFFSET_OCTET_STREAM);
        if let Some(length) = declare {
            request.set_header(header::UPLOAD_LENGTH, length.to_string());
        }
        request.body = chunk.data;

        let response = self.client.send(request).await?;

        if response.status == STATUS_CONFLICT {
            let actual = response
                .header(header::UPLOAD_OFFSET)
                .and_then(|v| parse_offset(v).ok());
            return Err(ProtocolError::new(
                ProtocolErrorKind::OffsetConflict {
                    expected: self.offset,
                    actual,
                },
                format!("server rejected offset {}", self.offset),
            )
            .with_response(response)
            .into());
        }
        if !response.is_success() {
            return Err(ProtocolError::unexpected_status("uploading chunk", response).into());
        }

        let reported = match response.header(header::UPLOAD_OFFSET).map(parse_offset) {
            Some(Ok(offset)) => offset,
            Some(Err(e)) => {
                return Err(ProtocolError::invalid_header(header::UPLOAD_OFFSET, e, response).into());
            }
            None => return Err(ProtocolError::missing_header(header::UPLOAD_OFFSET, response).into()),
        };
        let expected = self.offset + sent;
        if reported != expected {
            return Err(ProtocolError::new(
                ProtocolErrorKind::OffsetConflict {
                    expected,
                    actual: Some(reported),
                },
                format!("server reported offset {reported} after chunk, expected {expected}"),
            )
            .with_response(response)
            .into());
        }

        self.offset = expected;
        if let Some(length) = declare {
            self.size = Some(length);
            self.length_declared = true;
        }
        debug!(url = %self.url, offset = self.offset, sent, "chunk uploaded");
        Ok(sent)
    }

    /// Closes the transfer.
    ///
    /// When every byte is confirmed, the fingerprint is dropped from the
    /// store (if configured) and the completion hook fires. A store that
    /// fails to drop the entry is logged with `warn!` and does not turn a
    /// finished upload into an error.
    pub async fn finish(self) -> Result<FinishOutcome, UploadError> {
        if !self.is_finished() {
            debug!(url = %self.url, offset = self.offset, "transfer stopped before completion");
            return Ok(FinishOutcome::Stopped {
                offset: self.offset,
            });
        }

        let completed = CompletedUpload {
            url: self.url,
            fingerprint: self.upload.fingerprint().to_string(),
            size: self.offset,
        };
        if self.client.remove_on_success() {
            if let Some(store) = self.client.store() {
                if let Err(e) = store.remove(&completed.fingerprint) {
                    warn!(
                        fingerprint = %completed.fingerprint,
                        error = %e,
                        "failed to drop finished upload from resume store"
                    );
                }
            }
        }
        info!(url = %completed.url, size = completed.size, "upload finished");
        self.client.notify_complete(&completed);
        Ok(FinishOutcome::Completed(completed))
    }
}
