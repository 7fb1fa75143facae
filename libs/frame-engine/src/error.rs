use weir_api::IngestError;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame '{0}' not found")]
    NotFound(String),

    #[error("frame '{0}' is finalized")]
    Finalized(String),

    #[error("frame '{key}': expected {expected} columns, got {got}")]
    ColumnCount { key: String, expected: usize, got: usize },

    #[error("frame '{key}': chunk {chunk_id} already written")]
    ChunkExists { key: String, chunk_id: i32 },

    #[error("frame '{key}': chunk {chunk_id} has a writer in flight")]
    ChunkBusy { key: String, chunk_id: i32 },

    #[error("frame '{key}': chunk {chunk_id} was not reserved")]
    NotReserved { key: String, chunk_id: i32 },

    #[error("frame '{key}' chunk {chunk_id} column {column}: {got} rows, expected {expected}")]
    RowCount { key: String, chunk_id: i32, column: usize, got: usize, expected: usize },
}

impl FrameError {
    /// Map onto the session-facing error type (storage kind).
    pub fn into_ingest_error(self) -> IngestError {
        IngestError::storage(self.to_string())
    }
}
