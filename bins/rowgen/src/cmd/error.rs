use weir_api::IngestError;

#[derive(Debug, thiserror::Error)]
pub enum RowGenError {
    #[error("{0}")]
    Config(String),

    #[error("connect {addr}: {source}")]
    Connect { addr: String, source: std::io::Error },

    #[error("{0}")]
    Ingest(#[from] IngestError),
}
