use thiserror::Error;

use crate::mime::MimeType;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid MIME type: {0:?}")]
    InvalidMimeType(String),

    #[error("No conversion path from {from} to {to}")]
    NoConversionPath { from: MimeType, to: MimeType },

    #[error("Conversion step {index} ({from} -> {to}) failed: {source}")]
    ConversionStepFailed {
        index: usize,
        from: MimeType,
        to: MimeType,
        #[source]
        source: Box<BrokerError>,
    },

    #[error("Unrecognized media reference: {0}")]
    UnrecognizedMediaReference(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device {device} does not support capability {capability}")]
    CapabilityUnsupported { device: String, capability: String },

    #[error("{origin} returned {actual}, expected {expected}")]
    MediaTypeMismatch {
        origin: String,
        expected: MimeType,
        actual: MimeType,
    },

    #[error("Converter error: {0}")]
    Converter(String),

    #[error("Transcoding engine error: {0}")]
    Engine(String),
}

impl BrokerError {
    /// Whether retrying the same `convert` call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BrokerError::ConversionStepFailed { source, .. } => source.is_transient(),
            BrokerError::Engine(_) | BrokerError::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
