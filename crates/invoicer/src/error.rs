use invoicer_core::oracle::OracleError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Generic {0}")]
    Generic(String),

    #[error("Document error: {0}")]
    Document(#[from] pdf::PdfError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Oracle request failed: {0}")]
    OracleTransport(String),

    #[error("Oracle did not answer within {0} seconds")]
    OracleTimeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether another oracle attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Oracle(_) | Error::OracleTransport(_) | Error::OracleTimeout(_)
        )
    }
}
