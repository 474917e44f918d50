use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};

use crate::encoder::recorder::Chunk;
use crate::utils::error::{RecorderError, RecorderResult};

/// Finished recording artifact
#[derive(Debug, Clone)]
pub struct RecordedBlob {
    pub data: Bytes,
    pub mime_type: String,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl RecordedBlob {
    /// Concatenate `chunks` in arrival order
    pub fn assemble(chunks: &[Chunk], mime_type: &str) -> RecorderResult<Self> {
        if chunks.is_empty() {
            return Err(RecorderError::NoDataAvailable);
        }
        let total = chunks.iter().map(Chunk::size).sum();
        let mut data = BytesMut::with_capacity(total);
        for chunk in chunks {
            data.extend_from_slice(&chunk.data);
        }
        Ok(Self {
            data: data.freeze(),
            mime_type: mime_type.to_string(),
            chunk_count: chunks.len(),
            created_at: Utc::now(),
        })
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}
