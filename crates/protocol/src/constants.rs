use std::time::Duration;

/// Protocol version sent in every `Tus-Resumable` header.
pub const TUS_VERSION: &str = "1.0.0";

/// Header names. HTTP header names are case-insensitive; these are the
/// canonical spellings used on the wire.
pub mod header {
    pub const TUS_RESUMABLE: &str = "Tus-Resumable";
    pub const UPLOAD_LENGTH: &str = "Upload-Length";
    pub const UPLOAD_OFFSET: &str = "Upload-Offset";
    pub const UPLOAD_METADATA: &str = "Upload-Metadata";
    pub const UPLOAD_DEFER_LENGTH: &str = "Upload-Defer-Length";
    pub const LOCATION: &str = "Location";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const METHOD_OVERRIDE: &str = "X-HTTP-Method-Override";
}

/// Content type required on every PATCH body.
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Value of `Upload-Defer-Length` when the total size is not known yet.
pub const DEFER_LENGTH_VALUE: &str = "1";

/// Default logical chunk size: 2 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// Timeout for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a single physical request, body included.
///
/// Chunk uploads over slow links can take a while, so this is much larger
/// than the connect timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP 423 Locked: the server is still processing a previous request for
/// the same resource.
pub const STATUS_LOCKED: u16 = 423;

/// HTTP 409 Conflict: the asserted `Upload-Offset` does not match.
pub const STATUS_CONFLICT: u16 = 409;
