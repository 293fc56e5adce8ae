//! Resumable upload engine.
//!
//! An [`UploadClient`] creates or resumes an upload on a tus 1.0.0 server
//! and hands back a [`ChunkTransfer`] positioned at the offset the server
//! last acknowledged. Resource URLs are remembered per upload fingerprint in
//! a [`ResumptionStore`], so an interrupted upload can continue from another
//! process. [`UploadClient::run_upload`] ties this together with a
//! [`RetryExecutor`](resumable_retry::RetryExecutor).

mod chunked;
mod client;
mod config;
mod error;
mod http;
mod store;
mod transport;
mod upload;

#[cfg(test)]
mod testing;

pub use chunked::{ChunkTransfer, FinishOutcome};
pub use client::{CompletedUpload, UploadClient};
pub use config::ClientConfig;
pub use error::{ProtocolError, ProtocolErrorKind, StoreError, TransportError, UploadError};
pub use http::HttpTransport;
pub use store::{FileStore, MemoryStore, ResumptionStore, config_dir, default_store_path};
pub use transport::{Request, Response, Transport};
pub use upload::{ByteSource, Upload};

pub use reqwest::{Method, Url};
pub use resumable_protocol::Metadata;
pub use resumable_retry::{RetryExecutor, RetrySchedule, Retryable};
