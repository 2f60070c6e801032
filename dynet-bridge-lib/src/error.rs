use thiserror::Error;

/// Errors surfaced to callers of the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{entity} {value} out of range {min}..={max}")]
    Range { entity: &'static str, value: u32, min: u32, max: u32 },

    #[error("level {0} outside 0.0..=1.0")]
    Level(f64),

    #[error("fade {0} not representable on the wire")]
    Fade(f64),

    #[error("connect error: {0}")]
    Connect(#[from] std::io::Error),

    #[error("bridge is shutting down")]
    Closed,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
