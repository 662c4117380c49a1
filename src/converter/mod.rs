// Converter abstraction
//
// Every edge of the conversion graph is a Converter: builtin closures, the
// engine-backed snapshot converter and converters contributed by external
// participants all sit behind the same trait.
//
// - Registry: the ordered, mutable set of active converters
// - Builtin: converters the broker ships with

pub mod builtin;
pub mod registry;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub use builtin::*;
pub use registry::*;

use crate::error::Result;
use crate::media::{MediaData, Representation};
use crate::mime::MimeType;

/// Transforms a payload of one MIME type into another
#[async_trait]
pub trait Converter: Send + Sync {
    /// Human readable name used in logs
    fn name(&self) -> &str;

    /// Pattern of the types this converter accepts
    fn from_type(&self) -> &MimeType;

    /// Type (or pattern) this converter produces
    fn to_type(&self) -> &MimeType;

    /// Representation the payload is coerced to before `convert` is called
    fn input_representation(&self) -> Representation {
        Representation::Any
    }

    /// Convert `data`, declared as `from_type`, returning the payload and the
    /// concrete type it now has. A converter whose `to_type` is a wildcard
    /// must report what it actually produced.
    async fn convert(&self, data: MediaData, from_type: &MimeType) -> Result<(MediaData, MimeType)>;
}

type ConvertFn = dyn Fn(MediaData, &MimeType) -> Result<(MediaData, MimeType)> + Send + Sync;

/// Converter backed by a synchronous closure
#[derive(Clone)]
pub struct FnConverter {
    name: String,
    from_type: MimeType,
    to_type: MimeType,
    representation: Representation,
    f: Arc<ConvertFn>,
}

impl FnConverter {
    /// A converter whose output always has type `to_type`.
    pub fn new<S, F>(name: S, from_type: MimeType, to_type: MimeType, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(MediaData, &MimeType) -> Result<MediaData> + Send + Sync + 'static,
    {
        let produced = to_type.clone();
        Self::typed(name, from_type, to_type, move |data, from| {
            f(data, from).map(|data| (data, produced.clone()))
        })
    }

    /// A converter that reports the output type itself, for `to_type` patterns
    /// such as `image/*`.
    pub fn typed<S, F>(name: S, from_type: MimeType, to_type: MimeType, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(MediaData, &MimeType) -> Result<(MediaData, MimeType)> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            from_type,
            to_type,
            representation: Representation::Any,
            f: Arc::new(f),
        }
    }

    pub fn with_representation(mut self, representation: Representation) -> Self {
        self.representation = representation;
        self
    }
}

#[async_trait]
impl Converter for FnConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn from_type(&self) -> &MimeType {
        &self.from_type
    }

    fn to_type(&self) -> &MimeType {
        &self.to_type
    }

    fn input_representation(&self) -> Representation {
        self.representation
    }

    async fn convert(&self, data: MediaData, from_type: &MimeType) -> Result<(MediaData, MimeType)> {
        (self.f)(data, from_type)
    }
}

impl fmt::Debug for FnConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnConverter({}: {} -> {})", self.name, self.from_type, self.to_type)
    }
}

/// One line summary: `name (from -> to)`
pub fn describe(converter: &dyn Converter) -> String {
    format!(
        "{} ({} -> {})",
        converter.name(),
        converter.from_type(),
        converter.to_type()
    )
}
