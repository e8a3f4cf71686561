use crate::context::CallContext;
use crate::error::{BigIpError, Result};
use crate::path::ResourcePath;
use crate::response::UploadStatus;
use crate::session::{Call, Session};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, warn};

/// Progress callback, called with the size of every chunk transferred
pub type TransferProgressFn = Box<dyn Fn(u64) + Send + Sync>;

/// Byte range of one upload chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Offset of the first byte
    pub start: u64,
    /// Number of bytes in the chunk
    pub len: u64,
    /// Size of the whole file
    pub total: u64,
}

impl ChunkRange {
    /// Whether this chunk completes the file
    pub fn is_final(&self) -> bool {
        self.start + self.len == self.total
    }

    /// `Content-Range` value: `<start>-<end>/<total>`, `0-0/0` for an empty file
    pub fn content_range(&self) -> String {
        if self.len == 0 {
            format!("{}-{}/{}", self.start, self.start, self.total)
        } else {
            format!("{}-{}/{}", self.start, self.start + self.len - 1, self.total)
        }
    }
}

/// `Content-Range` of a download response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    /// Inclusive byte range, `None` for `*/<total>`
    range: Option<(u64, u64)>,
    total: u64,
}

fn parse_content_range(value: &str) -> Result<ContentRange> {
    let malformed = || BigIpError::Protocol(format!("malformed Content-Range: {:?}", value));

    let spec = value.trim();
    let spec = spec.strip_prefix("bytes").map(str::trim_start).unwrap_or(spec);
    let (range, total) = spec.split_once('/').ok_or_else(malformed)?;
    let total: u64 = total.trim().parse().map_err(|_| malformed())?;

    let range = match range.trim() {
        "*" => None,
        r => {
            let (start, end) = r.split_once('-').ok_or_else(malformed)?;
            let start: u64 = start.trim().parse().map_err(|_| malformed())?;
            let end: u64 = end.trim().parse().map_err(|_| malformed())?;
            if end < start {
                return Err(malformed());
            }
            Some((start, end))
        }
    };
    Ok(ContentRange { range, total })
}

/// State of one upload or download.
///
/// Chunks cover strictly increasing, non-overlapping byte ranges.
#[derive(Debug, Clone)]
pub struct TransferState {
    path: String,
    total: Option<u64>,
    chunk_size: u64,
    transferred: u64,
}

impl TransferState {
    /// Create a transfer state; `total` is unknown for downloads until the first chunk
    pub fn new(path: &str, total: Option<u64>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(BigIpError::Config("chunk size must be positive".to_string()));
        }
        Ok(TransferState {
            path: path.to_string(),
            total,
            chunk_size: chunk_size as u64,
            transferred: 0,
        })
    }

    /// Remote path of the file
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bytes transferred so far
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Total size, once known
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Whether every byte has been transferred
    pub fn is_complete(&self) -> bool {
        self.total == Some(self.transferred)
    }

    /// Next chunk to upload
    pub fn next_upload_chunk(&self) -> ChunkRange {
        let total = self.total.unwrap_or(0);
        ChunkRange {
            start: self.transferred,
            len: self.chunk_size.min(total.saturating_sub(self.transferred)),
            total,
        }
    }

    /// Record an uploaded chunk
    fn advance(&mut self, len: u64) {
        self.transferred += len;
    }

    /// Inclusive range to request next
    fn next_download_range(&self) -> (u64, u64) {
        (self.transferred, self.transferred.saturating_add(self.chunk_size - 1))
    }

    /// Validate a downloaded chunk against what was requested and record it
    fn accept(&mut self, received: ContentRange, body_len: u64) -> Result<()> {
        if let Some(total) = self.total {
            if total != received.total {
                return Err(BigIpError::Protocol(format!(
                    "{}: total size changed from {} to {}",
                    self.path, total, received.total
                )));
            }
        }

        if received.total == 0 && body_len == 0 && self.transferred == 0 {
            self.total = Some(0);
            return Ok(());
        }

        let (start, end) = received.range.ok_or_else(|| {
            BigIpError::Protocol(format!("{}: response carries no byte range", self.path))
        })?;
        let (want_start, want_end) = self.next_download_range();

        if start != want_start {
            return Err(BigIpError::Protocol(format!(
                "{}: expected chunk at offset {}, got {}",
                self.path, want_start, start
            )));
        }
        if end > want_end || end >= received.total {
            return Err(BigIpError::Protocol(format!(
                "{}: chunk {}-{} exceeds the requested range or total {}",
                self.path, start, end, received.total
            )));
        }
        let expected = end - start + 1;
        if body_len != expected {
            return Err(BigIpError::Protocol(format!(
                "{}: short chunk, got {} of {} bytes at offset {}",
                self.path, body_len, expected, start
            )));
        }

        self.total = Some(received.total);
        self.transferred += expected;
        Ok(())
    }
}

/// Chunked upload/download against the appliance file-transfer namespace
pub struct FileTransfer<'a> {
    session: &'a Session,
    chunk_size: usize,
    progress: Option<Arc<TransferProgressFn>>,
}

impl Session {
    /// Start a file transfer using the configured chunk ceiling
    pub fn file_transfer(&self) -> FileTransfer<'_> {
        FileTransfer {
            session: self,
            chunk_size: self.config().chunk_size,
            progress: None,
        }
    }

    /// Upload `content` to `destination` in chunks
    pub fn write_file(&self, cx: &CallContext, content: &[u8], destination: &str) -> Result<UploadStatus> {
        self.file_transfer().write_file(cx, content, destination)
    }

    /// Download `source` in chunks
    pub fn read_file(&self, cx: &CallContext, source: &str) -> Result<Vec<u8>> {
        self.file_transfer().read_file(cx, source)
    }
}

impl<'a> FileTransfer<'a> {
    /// Override the chunk ceiling
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set progress callback
    pub fn progress(mut self, progress: TransferProgressFn) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Report progress
    fn report_progress(&self, bytes: u64) {
        if let Some(ref progress) = self.progress {
            progress(bytes);
        }
    }

    /// Upload `content` to `destination`.
    ///
    /// Each chunk is a separate request declaring its range; the chunk ending
    /// at `total - 1` finalizes the file. The first failing chunk aborts the
    /// upload and its error is returned; nothing already written is removed.
    pub fn write_file(&self, cx: &CallContext, content: &[u8], destination: &str) -> Result<UploadStatus> {
        let mut state = TransferState::new(destination, Some(content.len() as u64), self.chunk_size)?;
        let url = self
            .session
            .url(&ResourcePath::new(&self.session.config().upload_root).segments(destination))?;

        loop {
            let chunk = state.next_upload_chunk();
            let start = chunk.start as usize;
            let body = content[start..start + chunk.len as usize].to_vec();

            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
            headers.insert(CONTENT_RANGE, header_value(&chunk.content_range())?);
            let call = Call {
                method: Method::POST,
                url: url.clone(),
                headers,
                body: Some(body),
            };

            let reply = self.session.execute(cx, &call).map_err(|e| {
                warn!(
                    path = destination,
                    transferred = state.transferred(),
                    error = %e,
                    "upload aborted"
                );
                e
            })?;

            state.advance(chunk.len);
            self.report_progress(chunk.len);
            debug!(path = destination, range = %chunk.content_range(), "uploaded chunk");

            if chunk.is_final() {
                let status: UploadStatus = if reply.body.iter().all(u8::is_ascii_whitespace) {
                    UploadStatus::default()
                } else {
                    serde_json::from_slice(&reply.body)?
                };
                if let Some(remaining) = status.remaining_byte_count.filter(|r| *r > 0) {
                    return Err(BigIpError::Protocol(format!(
                        "{}: appliance still expects {} bytes after the final chunk",
                        destination, remaining
                    )));
                }
                return Ok(status);
            }
        }
    }

    /// Download `source`, requesting bounded ranges from offset 0 until the
    /// reported total is reached. Short or malformed ranges are errors.
    pub fn read_file(&self, cx: &CallContext, source: &str) -> Result<Vec<u8>> {
        let mut state = TransferState::new(source, None, self.chunk_size)?;
        let url = self
            .session
            .url(&ResourcePath::new(&self.session.config().download_root).segments(source))?;
        let mut content = Vec::new();

        while !state.is_complete() {
            let (start, end) = state.next_download_range();
            let mut headers = HeaderMap::new();
            headers.insert(RANGE, header_value(&format!("bytes={}-{}", start, end))?);
            let call = Call {
                method: Method::GET,
                url: url.clone(),
                headers,
                body: None,
            };

            let reply = self.session.execute(cx, &call).map_err(|e| {
                warn!(path = source, transferred = state.transferred(), error = %e, "download aborted");
                e
            })?;

            let received = reply
                .headers
                .get(CONTENT_RANGE)
                .ok_or_else(|| BigIpError::Protocol(format!("{}: response has no Content-Range", source)))?
                .to_str()
                .map_err(|_| BigIpError::Protocol(format!("{}: unreadable Content-Range", source)))
                .and_then(parse_content_range)?;
            let body = reply.body;

            state.accept(received, body.len() as u64)?;
            content.extend_from_slice(&body);
            self.report_progress(body.len() as u64);
            debug!(path = source, transferred = state.transferred(), total = ?state.total(), "downloaded chunk");
        }

        Ok(content)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| BigIpError::Protocol(format!("invalid header value: {}", value)))
}
