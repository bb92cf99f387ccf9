//! The inbound artifact handed over by the boundary layer.

use std::fmt;
use std::io::Cursor;
use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::error::PipelineError;

/// Byte stream of an upload. Consumed exactly once.
pub type ByteSource<'a> = Pin<Box<dyn AsyncRead + Send + Unpin + 'a>>;

/// One uploaded file. `file_name` is untrusted and only used to derive keys
/// and paths after sanitization.
pub struct UploadRequest<'a> {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    /// Declared size; when present a shorter stream is treated as truncated.
    pub content_length: Option<u64>,
    pub body: ByteSource<'a>,
}

impl<'a> UploadRequest<'a> {
    pub fn new(file_name: impl Into<String>, body: ByteSource<'a>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            content_type: None,
            content_length: None,
            body,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_length(mut self, content_length: u64) -> Self {
        self.content_length = Some(content_length);
        self
    }

    /// The file name, or `InputError` when the upload is not a named file.
    pub fn validated_file_name(&self) -> Result<&str, PipelineError> {
        match self.file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(PipelineError::Input("Invalid file format".to_string())),
        }
    }
}

impl UploadRequest<'static> {
    /// Upload backed by an in-memory buffer.
    pub fn from_bytes(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        UploadRequest::new(file_name, Box::pin(Cursor::new(data))).with_content_length(len)
    }
}

impl fmt::Debug for UploadRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
