use thiserror::Error;

#[derive(Error, Debug)]
pub enum DreBuilderError {
    #[error("Caller is not authenticated")]
    Unauthorized,

    #[error("File too large: {size} bytes (maximum {max})")]
    FileTooLarge { size: usize, max: usize },

    #[error("Spreadsheet has no data rows")]
    EmptySheet,

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Legend sheet is missing required columns: {0}")]
    LegendMissingColumns(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DreBuilderError>;
