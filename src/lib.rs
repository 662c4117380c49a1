//! Mediabroker - Media Object Conversion Broker
//! 
//! Converts media objects between MIME types by chaining registered
//! converters. Converters are found with a bounded breadth-first search over
//! the registered set; one builtin converter drives ffmpeg as a subprocess.

pub mod broker;
pub mod capability;
pub mod cli;
pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod executor;
pub mod media;
pub mod mime;
pub mod resolver;

pub use broker::MediaManager;
pub use converter::{Converter, ConverterId, FnConverter};
pub use error::{BrokerError, Result};
pub use media::{MediaData, MediaObject};
pub use mime::MimeType;
