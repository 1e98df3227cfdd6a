use thiserror::Error;

#[derive(Error, Debug)]
/// Export error
pub enum ExportError {
    #[error("RowSource from: {0}")]
    RowSource(String),

    #[error("Sink from: {0}")]
    Sink(String),

    #[error("Transfer from: {0}")]
    Transfer(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Step {0} failed")]
    Step(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
