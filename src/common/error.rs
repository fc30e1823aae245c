use thiserror::Error;

/// Every variant here corresponds to one of the error kinds in the wire
/// protocol's response `Message` field. Conversion into a response is a
/// straight `Display` call — see `crate::wire::Response::failure`.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Syntax error: {0}")]
    SyntaxError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Transaction aborted: {0}")]
    ConflictAborted(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corruption error: {0}")]
    CorruptionError(String),
}

impl DbError {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DbError::SyntaxError(_) => "SyntaxError",
            DbError::SchemaError(_) => "SchemaError",
            DbError::ProtocolError(_) => "ProtocolError",
            DbError::ConflictAborted(_) => "ConflictAborted",
            DbError::IoError(_) => "IoError",
            DbError::CorruptionError(_) => "CorruptionError",
        }
    }
}
