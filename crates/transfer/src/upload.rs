use std::fmt;
use std::io::{Cursor, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use resumable_protocol::Metadata;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tokio::sync::Mutex;

/// Readable, seekable byte source behind an [`Upload`].
pub trait ByteSource: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> ByteSource for T {}

/// Bytes read for one chunk.
#[derive(Debug)]
pub(crate) struct ReadChunk {
    pub data: Vec<u8>,
    /// The source has nothing past `data`.
    pub eof: bool,
}

/// Everything needed to upload one logical payload.
///
/// Cloning is cheap: clones share the byte source.
#[derive(Clone)]
pub struct Upload {
    source: Arc<Mutex<Box<dyn ByteSource>>>,
    size: Option<u64>,
    fingerprint: String,
    metadata: Metadata,
}

impl Upload {
    /// Wraps an arbitrary source. `size` is `None` when the total length is
    /// not known up front; the server is then told the length once the
    /// source is exhausted.
    pub fn new(
        source: impl ByteSource + 'static,
        size: Option<u64>,
        fingerprint: impl Into<String>,
    ) -> Self {
        let source: Box<dyn ByteSource> = Box::new(source);
        Self {
            source: Arc::new(Mutex::new(source)),
            size,
            fingerprint: fingerprint.into(),
            metadata: Metadata::new(),
        }
    }

    /// In-memory payload, fingerprinted by its SHA-256.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let fingerprint = sha256_hex(&data);
        let size = data.len() as u64;
        Self::new(Cursor::new(data), Some(size), fingerprint)
    }

    /// Opens a file. The fingerprint is derived from the canonical path and
    /// the file size, and the file name is sent as `filename` metadata.
    pub async fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let canonical = tokio::fs::canonicalize(path).await?;
        let fingerprint = sha256_hex(format!("{}-{size}", canonical.display()).as_bytes());

        let metadata: Metadata = path
            .file_name()
            .map(|name| ("filename", name.to_string_lossy().into_owned()))
            .into_iter()
            .collect();

        Ok(Self::new(file, Some(size), fingerprint).with_metadata(metadata))
    }

    /// Replaces the fingerprint. Only meaningful before a transfer starts.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Reads up to `limit` bytes starting at `offset` (everything to EOF
    /// when `limit` is `None`).
    ///
    /// The source is re-seeked on every call, so a failed request never
    /// shifts what the next call reads. With `probe_eof` set, one byte past
    /// a full read is peeked to report EOF without an extra round trip.
    pub(crate) async fn read_at(
        &self,
        offset: u64,
        limit: Option<u64>,
        probe_eof: bool,
    ) -> std::io::Result<ReadChunk> {
        let mut source = self.source.lock().await;
        source.seek(SeekFrom::Start(offset)).await?;

        let Some(limit) = limit else {
            let mut data = Vec::new();
            source.read_to_end(&mut data).await?;
            return Ok(ReadChunk { data, eof: true });
        };

        // The buffer grows with what the source yields, not with `limit`.
        let mut data = Vec::new();
        (&mut *source).take(limit).read_to_end(&mut data).await?;
        if (data.len() as u64) < limit {
            return Ok(ReadChunk { data, eof: true });
        }

        let eof = if probe_eof {
            let mut probe = [0u8; 1];
            source.read(&mut probe).await? == 0
        } else {
            false
        };
        Ok(ReadChunk { data, eof })
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("size", &self.size)
            .field("fingerprint", &self.fingerprint)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
