use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeakError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Time index is not strictly increasing at row {0}")]
    UnorderedIndex(usize),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Empty sensor table")]
    EmptySeries,

    #[error("Calibration window {0} contains no samples")]
    EmptyCalibration(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Detector is not trained")]
    NotTrained,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LeakError>;
