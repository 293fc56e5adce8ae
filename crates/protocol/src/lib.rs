//! Wire-level pieces of the tus 1.0.0 resumable upload protocol.
//!
//! Everything here is transport-agnostic: header names, the protocol
//! version string, the `Upload-Metadata` codec and the parsing rules for
//! offset/length header values. The HTTP client lives in
//! `resumable-transfer`.

pub mod constants;
pub mod headers;
pub mod metadata;

pub use constants::TUS_VERSION;
pub use headers::{HeaderError, is_retryable_status, parse_length, parse_offset};
pub use metadata::{Metadata, MetadataError};
