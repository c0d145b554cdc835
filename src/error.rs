use thiserror::Error;

/// Failures of a spectrogram run. All of them end the current invocation.
#[derive(Debug, Error)]
pub enum SpectroError {
    /// Malformed or contradictory configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Not enough samples for a single analysis frame.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The reference band is empty or has no positive energy.
    #[error("degenerate signal: {0}")]
    DegenerateSignal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SpectroError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T, E = SpectroError> = std::result::Result<T, E>;
