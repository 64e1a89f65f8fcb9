use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("{message}")]
    FetchFailure { ticker: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn fetch(ticker: &str, message: impl Into<String>) -> Self {
        AnalysisError::FetchFailure {
            ticker: ticker.to_string(),
            message: message.into(),
        }
    }
}
