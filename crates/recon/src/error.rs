use thiserror::Error;

/// Fatal conditions. Everything past table loading degrades instead of failing.
#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad threshold, empty input path, bad pattern).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Missing required column in an input table.
    #[error("table '{table}': missing column '{column}'")]
    MissingColumn { table: String, column: String },
    /// A required date could not be parsed.
    #[error("table '{table}', record '{record_id}': cannot parse date '{value}'")]
    DateParse {
        table: String,
        record_id: String,
        value: String,
    },
    /// IO error (file read, CSV framing, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl From<csv::Error> for ReconError {
    fn from(e: csv::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<std::io::Error> for ReconError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
